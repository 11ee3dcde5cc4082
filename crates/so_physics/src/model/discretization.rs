// crates/so_physics/src/model/discretization.rs

//! 有限体积离散
//!
//! 对内部单元 i：
//!
//! $$ (L h)_i = \frac{1}{V_i} \sum_{faces} T (h_{nb} - h_i) + \nabla<Y>_i \cdot \nabla h_i $$
//!
//! 梯度取同一坐标轴上 (负侧, 正侧) 两个邻居的中心差分。
//! 所有算子对标量类型泛型，同一段代码既求残差也求 Jacobian。

use so_grid::{Axis, StructuredGrid};

use crate::numerics::autodiff::Scalar;
use crate::numerics::linear_algebra::CsrPattern;

/// 沿一个坐标轴的中心差分
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisPair {
    /// 负侧邻居
    pub minus: usize,
    /// 正侧邻居
    pub plus: usize,
    /// 两中心距离的倒数
    pub inv_span: f64,
}

/// 离散几何：网格、稀疏模式与差分模板
#[derive(Debug, Clone)]
pub struct Discretization {
    grid: StructuredGrid,
    pattern: CsrPattern,
    pairs: Vec<Option<[AxisPair; 2]>>,
    weights: Vec<f64>,
    inv_volume: Vec<f64>,
}

impl Discretization {
    /// 由网格构造
    pub fn new(grid: StructuredGrid) -> Self {
        let pattern = CsrPattern::from_rows(grid.cells().iter().map(|c| c.stencil.iter().copied()));
        let pairs = grid
            .cells()
            .iter()
            .map(|c| {
                let pair = |axis: Axis| {
                    grid.neighbour_pair(c.id, axis).map(|(minus, plus)| AxisPair {
                        minus,
                        plus,
                        inv_span: 1.0 / grid.offset(minus, plus, axis),
                    })
                };
                match (pair(Axis::X), pair(Axis::Y)) {
                    (Some(x), Some(y)) => Some([x, y]),
                    _ => None,
                }
            })
            .collect();
        let weights = grid.cells().iter().map(|c| c.volume).collect();
        let inv_volume = grid
            .cells()
            .iter()
            .map(|c| if c.volume > 0.0 { 1.0 / c.volume } else { 0.0 })
            .collect();

        Self {
            grid,
            pattern,
            pairs,
            weights,
            inv_volume,
        }
    }

    /// 网格
    #[inline]
    pub fn grid(&self) -> &StructuredGrid {
        &self.grid
    }

    /// Jacobian 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 单元数（含边界环）
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// 体积权重，边界环为 0
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// 内部单元的 [x, y] 差分模板，边界环为 `None`
    #[inline]
    pub fn pairs(&self, cell: usize) -> Option<&[AxisPair; 2]> {
        self.pairs[cell].as_ref()
    }

    /// 是否为内部单元
    #[inline]
    pub fn is_interior(&self, cell: usize) -> bool {
        self.pairs[cell].is_some()
    }

    /// 1/V
    #[inline]
    pub fn inv_volume(&self, cell: usize) -> f64 {
        self.inv_volume[cell]
    }

    /// 体积加权平均
    pub fn volume_average(&self, values: &[f64]) -> f64 {
        let total: f64 = self.weights.iter().sum();
        if total > 0.0 {
            values.iter().zip(&self.weights).map(|(v, w)| v * w).sum::<f64>() / total
        } else {
            0.0
        }
    }

    /// 梯度 [∂x, ∂y]，按单元取值函数计算
    #[inline]
    pub fn gradient_with(&self, cell: usize, value: impl Fn(usize) -> f64) -> [f64; 2] {
        match &self.pairs[cell] {
            Some(p) => [
                (value(p[0].plus) - value(p[0].minus)) * p[0].inv_span,
                (value(p[1].plus) - value(p[1].minus)) * p[1].inv_span,
            ],
            None => [0.0, 0.0],
        }
    }

    /// 梯度
    #[inline]
    pub fn gradient(&self, cell: usize, values: &[f64]) -> [f64; 2] {
        self.gradient_with(cell, |j| values[j])
    }

    /// ∇x · g
    #[inline]
    pub fn gradient_dot<D: Scalar>(&self, cell: usize, x: &[D], g: [f64; 2]) -> D {
        let mut acc = x[cell] * 0.0;
        if let Some(p) = &self.pairs[cell] {
            for (pair, gk) in p.iter().zip(g) {
                if gk != 0.0 {
                    acc += (x[pair.plus] - x[pair.minus]) * (pair.inv_span * gk);
                }
            }
        }
        acc
    }

    /// (L x)_cell，`grad_y` 为该单元的 ∇<Y>
    pub fn laplacian<D: Scalar>(&self, cell: usize, x: &[D], grad_y: [f64; 2]) -> D {
        let inv_v = self.inv_volume[cell];
        let mut acc = self.gradient_dot(cell, x, grad_y);
        for (nb, t) in self.grid.cell(cell).faces() {
            acc += (x[nb] - x[cell]) * (t * inv_v);
        }
        acc
    }

    /// (L v)_cell，v 由取值函数给出
    pub fn laplacian_with(&self, cell: usize, value: impl Fn(usize) -> f64, grad_y: [f64; 2]) -> f64 {
        let inv_v = self.inv_volume[cell];
        let g = self.gradient_with(cell, &value);
        let here = value(cell);
        let flux: f64 = self
            .grid
            .cell(cell)
            .faces()
            .map(|(nb, t)| (value(nb) - here) * t * inv_v)
            .sum();
        flux + g[0] * grad_y[0] + g[1] * grad_y[1]
    }
}
