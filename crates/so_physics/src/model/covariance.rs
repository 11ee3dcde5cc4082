// crates/so_physics/src/model/covariance.rs

//! 对数渗透率的先验与条件化
//!
//! 记 `Y = ln(k/μ)`，其涨落 `f = Y - <Y>` 服从指数型协方差：
//!
//! $$ C_f(x, y) = \sigma_f^2 \exp(-|x - y| / l_f) $$
//!
//! 均值为常数加可选的线性趋势。若给出实测渗透率，则用简单 Kriging
//! 对均值与协方差做条件化：
//!
//! $$ <Y>_c(x) = <Y>(x) + c_x^T C^{-1} (Y_m - <Y>_m) $$
//! $$ C_c(x, y) = C_f(x, y) - c_x^T C^{-1} c_y $$
//!
//! 实测单元的方差严格为零，其行列被置零。

use nalgebra::{DMatrix, DVector};
use so_foundation::{SoError, SoResult};
use so_grid::StructuredGrid;

use crate::numerics::linear_algebra::DenseMatrix;

/// 先验参数（均为无量纲量）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorParams {
    /// ln(k/μ) 的基准值
    pub log_mobility: f64,
    /// ln k 的线性趋势 [gx, gy]（每单位无量纲长度）
    pub trend: [f64; 2],
    /// 标准差 σ_f
    pub sigma: f64,
    /// 相关长度
    pub corr_len: f64,
}

/// 对数渗透率场：均值、协方差与逐点方差
#[derive(Debug, Clone, Default)]
pub struct LogPermeability {
    mean: Vec<f64>,
    cov: Option<DenseMatrix>,
    variance: Vec<f64>,
    conditioned: Vec<bool>,
}

impl LogPermeability {
    /// 由先验参数构造（覆盖含边界环的全部单元）
    pub fn prior(grid: &StructuredGrid, params: &PriorParams) -> Self {
        let cells = grid.cells();
        let n = cells.len();
        let mean = cells
            .iter()
            .map(|c| params.log_mobility + params.trend[0] * c.center.x + params.trend[1] * c.center.y)
            .collect();

        let var = params.sigma * params.sigma;
        let cov = if var > 0.0 {
            Some(DenseMatrix::from_fn(n, |i, j| {
                var * (-cells[i].center.distance(&cells[j].center) / params.corr_len).exp()
            }))
        } else {
            None
        };

        Self {
            mean,
            cov,
            variance: vec![var; n],
            conditioned: vec![false; n],
        }
    }

    /// 以实测值 `(单元, ln(k/μ))` 条件化
    ///
    /// 测点协方差矩阵不可逆时返回配置错误；零方差先验下任何实测都会触发该错误。
    pub fn condition(mut self, measurements: &[(usize, f64)]) -> SoResult<Self> {
        if measurements.is_empty() {
            return Ok(self);
        }
        let singular = || {
            SoError::invalid_config(
                "conditions",
                format!("{} 个测点", measurements.len()),
                "测点协方差矩阵奇异，无法条件化",
            )
        };
        let cov = self.cov.as_ref().ok_or_else(singular)?;
        let n = cov.dim();
        let m = measurements.len();

        let c = DMatrix::from_fn(m, m, |a, b| cov.get(measurements[a].0, measurements[b].0));
        let c_inv = c.try_inverse().ok_or_else(singular)?;

        // cm[a][x] = Cf(m_a, x)，weights = C⁻¹ · cm
        let cm = DMatrix::from_fn(m, n, |a, x| cov.get(measurements[a].0, x));
        let weights = &c_inv * &cm;
        let residual = DVector::from_iterator(
            m,
            measurements.iter().map(|&(cell, y)| y - self.mean[cell]),
        );

        for x in 0..n {
            self.mean[x] += weights.column(x).dot(&residual);
        }

        let mut conditioned = DenseMatrix::from_fn(n, |x, y| {
            cov.get(x, y) - cm.column(x).dot(&weights.column(y))
        });
        for &(cell, y) in measurements {
            self.mean[cell] = y;
            self.conditioned[cell] = true;
            for other in 0..n {
                conditioned.set(cell, other, 0.0);
                conditioned.set(other, cell, 0.0);
            }
        }

        self.variance = (0..n).map(|x| conditioned.get(x, x).max(0.0)).collect();
        self.cov = Some(conditioned);
        Ok(self)
    }

    /// 单元数
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// 均值 <Y>
    #[inline]
    pub fn mean(&self, cell: usize) -> f64 {
        self.mean[cell]
    }

    /// 几何平均流度 KG = exp(<Y>)
    #[inline]
    pub fn kg(&self, cell: usize) -> f64 {
        self.mean[cell].exp()
    }

    /// 逐点方差 σ²
    #[inline]
    pub fn variance(&self, cell: usize) -> f64 {
        self.variance[cell]
    }

    /// 协方差 Cf(x, y)
    #[inline]
    pub fn cov(&self, x: usize, y: usize) -> f64 {
        self.cov.as_ref().map_or(0.0, |c| c.get(x, y))
    }

    /// 协方差第 x 行，零方差时为 `None`
    #[inline]
    pub fn cov_row(&self, x: usize) -> Option<&[f64]> {
        self.cov.as_ref().map(|c| c.row(x))
    }

    /// 是否为实测单元
    #[inline]
    pub fn is_conditioned(&self, cell: usize) -> bool {
        self.conditioned[cell]
    }

    /// 是否处处零方差
    pub fn is_deterministic(&self) -> bool {
        self.cov.is_none()
    }
}
