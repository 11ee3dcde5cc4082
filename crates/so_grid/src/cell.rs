// crates/so_grid/src/cell.rs

//! 网格单元

use serde::{Deserialize, Serialize};

/// 二维点（无量纲坐标）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// x 坐标
    pub x: f64,
    /// y 坐标
    pub y: f64,
}

impl Point {
    /// 创建点
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 欧氏距离
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// 沿坐标轴的分量
    #[inline]
    pub fn along(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

/// 坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// x 方向
    X,
    /// y 方向
    Y,
}

impl Axis {
    /// 两个坐标轴
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];
}

/// 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    /// 内部单元，5 点模板
    Interior,
    /// 边界环单元，2 点模板
    Border,
    /// 角点单元，3 点模板
    Corner,
}

impl CellType {
    /// 该类型的模板长度
    pub const fn stencil_len(self) -> usize {
        match self {
            Self::Interior => 5,
            Self::Border => 2,
            Self::Corner => 3,
        }
    }
}

/// 网格单元
///
/// `trans[k]` 对应 `stencil[k + 1]` 所在的面。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// 单元编号
    pub id: usize,
    /// 单元类型
    pub kind: CellType,
    /// 模板，自身在首位
    pub stencil: Vec<usize>,
    /// 面传导率（面积 / 中心距离）
    pub trans: Vec<f64>,
    /// 中心
    pub center: Point,
    /// x 方向尺寸
    pub hx: f64,
    /// y 方向尺寸
    pub hy: f64,
    /// 层厚
    pub hz: f64,
    /// 体积，虚拟单元为 0
    pub volume: f64,
}

impl Cell {
    /// 是否为内部单元
    #[inline]
    pub fn is_interior(&self) -> bool {
        self.kind == CellType::Interior
    }

    /// 邻居及其面传导率
    pub fn faces(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.stencil[1..].iter().copied().zip(self.trans.iter().copied())
    }
}
