// crates/so_grid/src/structured.rs

//! 结构化网格生成
//!
//! 内部单元为 `hx × hy × hz` 的长方体。边界环单元的中心位于域边界上，
//! 法向厚度为零，因而体积为零；它们只承载 Dirichlet 条件。
//!
//! 面传导率取名义面积（x 面为 `hy·hz`，y 面为 `hx·hz`）除以两侧中心距离，
//! 内部面距离为 `hx`，贴边面为 `hx / 2`，因此恒为正。

use so_foundation::{SoError, SoResult};

use crate::cell::{Axis, Cell, CellType, Point};

/// 结构化网格
#[derive(Debug, Clone)]
pub struct StructuredGrid {
    num_x: usize,
    num_y: usize,
    hx: f64,
    hy: f64,
    hz: f64,
    cells: Vec<Cell>,
    total_volume: f64,
}

impl StructuredGrid {
    /// 生成网格
    ///
    /// # 参数
    ///
    /// - `num_x`, `num_y`: 内部单元数
    /// - `hx`, `hy`, `hz`: 单元尺寸（无量纲）
    pub fn new(num_x: usize, num_y: usize, hx: f64, hy: f64, hz: f64) -> SoResult<Self> {
        if num_x == 0 || num_y == 0 {
            return Err(SoError::invalid_grid(format!(
                "内部单元数必须为正: {}x{}",
                num_x, num_y
            )));
        }
        SoError::check_positive("hx", hx)?;
        SoError::check_positive("hy", hy)?;
        SoError::check_positive("hz", hz)?;

        let mut grid = Self {
            num_x,
            num_y,
            hx,
            hy,
            hz,
            cells: Vec::with_capacity((num_x + 2) * (num_y + 2)),
            total_volume: 0.0,
        };

        for i in 0..num_x + 2 {
            for j in 0..num_y + 2 {
                let cell = grid.build_cell(i, j);
                grid.total_volume += cell.volume;
                grid.cells.push(cell);
            }
        }

        for cell in &grid.cells {
            if cell.stencil.len() != cell.kind.stencil_len() {
                return Err(SoError::invalid_grid(format!(
                    "单元 {} 模板长度 {} 与类型 {:?} 不符",
                    cell.id,
                    cell.stencil.len(),
                    cell.kind
                )));
            }
            if let Some(t) = cell.trans.iter().find(|t| !(**t > 0.0)) {
                return Err(SoError::out_of_range("trans", *t, f64::MIN_POSITIVE, f64::MAX));
            }
        }

        Ok(grid)
    }

    fn kind_of(&self, i: usize, j: usize) -> CellType {
        let x_edge = i == 0 || i == self.num_x + 1;
        let y_edge = j == 0 || j == self.num_y + 1;
        match (x_edge, y_edge) {
            (false, false) => CellType::Interior,
            (true, true) => CellType::Corner,
            _ => CellType::Border,
        }
    }

    fn center_x(&self, i: usize) -> f64 {
        if i == 0 {
            0.0
        } else if i == self.num_x + 1 {
            self.num_x as f64 * self.hx
        } else {
            (i as f64 - 0.5) * self.hx
        }
    }

    fn center_y(&self, j: usize) -> f64 {
        if j == 0 {
            0.0
        } else if j == self.num_y + 1 {
            self.num_y as f64 * self.hy
        } else {
            (j as f64 - 0.5) * self.hy
        }
    }

    fn inward_i(&self, i: usize) -> usize {
        if i == 0 { 1 } else { self.num_x }
    }

    fn inward_j(&self, j: usize) -> usize {
        if j == 0 { 1 } else { self.num_y }
    }

    fn build_cell(&self, i: usize, j: usize) -> Cell {
        let id = self.id_of(i, j);
        let kind = self.kind_of(i, j);
        let center = Point::new(self.center_x(i), self.center_y(j));

        let cell_hx = if i == 0 || i == self.num_x + 1 { 0.0 } else { self.hx };
        let cell_hy = if j == 0 || j == self.num_y + 1 { 0.0 } else { self.hy };

        let mut neighbours: Vec<(usize, Axis)> = Vec::with_capacity(4);
        match kind {
            CellType::Interior => {
                neighbours.push((self.id_of(i, j - 1), Axis::Y));
                neighbours.push((self.id_of(i, j + 1), Axis::Y));
                neighbours.push((self.id_of(i - 1, j), Axis::X));
                neighbours.push((self.id_of(i + 1, j), Axis::X));
            }
            CellType::Border => {
                if i == 0 || i == self.num_x + 1 {
                    neighbours.push((self.id_of(self.inward_i(i), j), Axis::X));
                } else {
                    neighbours.push((self.id_of(i, self.inward_j(j)), Axis::Y));
                }
            }
            CellType::Corner => {
                neighbours.push((self.id_of(i, self.inward_j(j)), Axis::Y));
                neighbours.push((self.id_of(self.inward_i(i), j), Axis::X));
            }
        }

        let mut stencil = Vec::with_capacity(neighbours.len() + 1);
        let mut trans = Vec::with_capacity(neighbours.len());
        stencil.push(id);
        for (nb, axis) in neighbours {
            let (ni, nj) = self.index_of(nb);
            let nb_center = Point::new(self.center_x(ni), self.center_y(nj));
            let (area, dist) = match axis {
                Axis::X => (self.hy * self.hz, (nb_center.x - center.x).abs()),
                Axis::Y => (self.hx * self.hz, (nb_center.y - center.y).abs()),
            };
            stencil.push(nb);
            trans.push(area / dist);
        }

        Cell {
            id,
            kind,
            stencil,
            trans,
            center,
            hx: cell_hx,
            hy: cell_hy,
            hz: self.hz,
            volume: cell_hx * cell_hy * self.hz,
        }
    }

    /// 名义单元尺寸 (hx, hy, hz)
    pub fn spacing(&self) -> (f64, f64, f64) {
        (self.hx, self.hy, self.hz)
    }

    /// 单元总数（含边界环）
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 全部单元
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// 按编号取单元
    #[inline]
    pub fn cell(&self, id: usize) -> &Cell {
        &self.cells[id]
    }

    /// 由含边界环的索引求编号
    #[inline]
    pub fn id_of(&self, i: usize, j: usize) -> usize {
        (self.num_y + 2) * i + j
    }

    /// 由编号求含边界环的索引
    #[inline]
    pub fn index_of(&self, id: usize) -> (usize, usize) {
        (id / (self.num_y + 2), id % (self.num_y + 2))
    }

    /// 内部单元索引（从 0 开始）对应的编号
    #[inline]
    pub fn interior_id(&self, ix: usize, iy: usize) -> usize {
        self.id_of(ix + 1, iy + 1)
    }

    /// 所有内部单元编号
    pub fn interior_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().filter(|c| c.is_interior()).map(|c| c.id)
    }

    /// 内部单元总体积
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    /// 模板编号差的上界
    pub fn bandwidth(&self) -> usize {
        self.num_y + 2
    }

    /// 内部单元沿某轴的 (负侧, 正侧) 邻居
    pub fn neighbour_pair(&self, id: usize, axis: Axis) -> Option<(usize, usize)> {
        let cell = &self.cells[id];
        if !cell.is_interior() {
            return None;
        }
        Some(match axis {
            Axis::Y => (cell.stencil[1], cell.stencil[2]),
            Axis::X => (cell.stencil[3], cell.stencil[4]),
        })
    }

    /// 两个单元中心沿某轴的距离差 `b - a`
    #[inline]
    pub fn offset(&self, a: usize, b: usize, axis: Axis) -> f64 {
        self.cells[b].center.along(axis) - self.cells[a].center.along(axis)
    }
}
