// crates/so_physics/src/numerics/autodiff/tape.rs

//! 列着色 Jacobian 组装
//!
//! 两列若出现在同一行中就互相冲突。贪心着色后，同色列没有公共行，
//! 可以在一次 `Dual64` 扫描中同时播种：行 i 的对偶部分恰好是
//! 该行中唯一一个该颜色列的偏导数。
//!
//! 五点模板的着色数通常在 9 到 13 之间，与网格规模无关。

use num_dual::Dual64;
use rayon::prelude::*;

use super::DifferentiableResidual;
use crate::numerics::linear_algebra::{CsrMatrix, CsrPattern};

/// 按固定稀疏模式组装 Jacobian
#[derive(Debug, Clone)]
pub struct JacobianBuilder {
    pattern: CsrPattern,
    colors: Vec<usize>,
    n_colors: usize,
}

impl JacobianBuilder {
    /// 对稀疏模式做贪心列着色
    pub fn new(pattern: &CsrPattern) -> Self {
        let n_cols = pattern.n_cols();

        // 列 → 出现该列的行
        let mut col_rows: Vec<Vec<usize>> = vec![Vec::new(); n_cols];
        for row in 0..pattern.n_rows() {
            for &col in pattern.row_indices(row) {
                col_rows[col].push(row);
            }
        }

        const UNSET: usize = usize::MAX;
        let mut colors = vec![UNSET; n_cols];
        let mut forbidden: Vec<usize> = Vec::new();
        let mut n_colors = 0;

        for col in 0..n_cols {
            // forbidden[c] == col 表示颜色 c 已被冲突列占用
            for &row in &col_rows[col] {
                for &other in pattern.row_indices(row) {
                    let c = colors[other];
                    if c != UNSET {
                        forbidden[c] = col;
                    }
                }
            }
            let color = (0..n_colors).find(|&c| forbidden[c] != col).unwrap_or(n_colors);
            if color == n_colors {
                n_colors += 1;
                forbidden.push(UNSET);
            }
            colors[col] = color;
        }

        log::debug!("Jacobian 着色: {} 列, {} 种颜色", n_cols, n_colors);

        Self {
            pattern: pattern.clone(),
            colors,
            n_colors,
        }
    }

    /// 颜色数
    pub fn n_colors(&self) -> usize {
        self.n_colors
    }

    /// 稀疏模式
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 列颜色
    pub fn colors(&self) -> &[usize] {
        &self.colors
    }

    /// 仅求残差
    pub fn residual<R: DifferentiableResidual>(&self, residual: &R, x: &[f64]) -> Vec<f64> {
        (0..self.pattern.n_rows())
            .into_par_iter()
            .map(|row| residual.evaluate(row, x))
            .collect()
    }

    /// 在 x 处求残差与 Jacobian
    pub fn evaluate<R: DifferentiableResidual>(&self, residual: &R, x: &[f64]) -> (Vec<f64>, CsrMatrix) {
        debug_assert_eq!(residual.pattern(), &self.pattern, "残差模式与着色模式不一致");
        let n_rows = self.pattern.n_rows();
        let mut jacobian = CsrMatrix::zeros(self.pattern.clone());
        let mut values = vec![0.0; n_rows];

        for color in 0..self.n_colors {
            let seeded: Vec<Dual64> = x
                .iter()
                .zip(&self.colors)
                .map(|(&xi, &c)| Dual64::new(xi, if c == color { 1.0 } else { 0.0 }))
                .collect();

            let duals: Vec<Dual64> = (0..n_rows)
                .into_par_iter()
                .map(|row| residual.evaluate(row, &seeded))
                .collect();

            if color == 0 {
                values.iter_mut().zip(&duals).for_each(|(v, d)| *v = d.re);
            }

            for (row, d) in duals.iter().enumerate() {
                let start = self.pattern.row_ptr()[row];
                let cols = self.pattern.row_indices(row);
                if let Some(local) = cols.iter().position(|&c| self.colors[c] == color) {
                    jacobian.values_mut()[start + local] = d.eps;
                }
            }
        }

        (values, jacobian)
    }
}
