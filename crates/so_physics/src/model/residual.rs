// crates/so_physics/src/model/residual.rs

//! 四个场的离散残差
//!
//! 记 `S = φ(β_sk + β_oil)`，`KG = exp(<Y>)`，单元 i 的储存系数 `s_i = S/KG_i`。
//! 内部单元：
//!
//! | 场 | 残差 |
//! |---|---|
//! | `p0` | `s (h - h⁻)/Δt - L h - src + W (h - pwf)` |
//! | `Cfp[r]` | `s (C - C⁻)/Δt - L C + W C - [∇Cf(r,·)·∇h0 + Cf(r,·) R0]` |
//! | `p2` | `s (h - h⁻)/Δt - L h + W h - D2` |
//! | `Cp_k[x]` | `s (C - C⁻)/Δt - L C + W C - [∇c·∇h0 + c R0]`, `c(y) = Cfp_k[y][x]` |
//!
//! 其中 `R0 = s ∂h0/∂t - src`，D2 为二阶修正的驱动项（见 [`second_order_drive`]）。
//! 边界环单元为 Dirichlet：`p0` 取 `h - p_out`，其余场取 `h`。

use crate::model::discretization::Discretization;
use crate::model::well::{Well, WellControl};
use crate::numerics::autodiff::{DifferentiableResidual, Scalar};
use crate::numerics::linear_algebra::{CsrPattern, DenseMatrix};

/// 单元系数，`initialize_state` 后只读
#[derive(Debug, Clone, Default)]
pub struct CellCoefficients {
    /// KG = exp(<Y>)
    pub kg: Vec<f64>,
    /// S / KG
    pub storage: Vec<f64>,
    /// ∇<Y>
    pub grad_y: Vec<[f64; 2]>,
    /// ∇σ²
    pub grad_var: Vec<[f64; 2]>,
    /// σ²
    pub variance: Vec<f64>,
    /// 单元所在井的编号
    pub well_at: Vec<Option<usize>>,
}

/// 单元上的井项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WellTerm {
    /// 定产量源 q/(V·KG)
    pub source: f64,
    /// 定压耦合 W
    pub coupling: f64,
    /// 定压目标
    pub pwf: f64,
}

impl WellTerm {
    const NONE: WellTerm = WellTerm {
        source: 0.0,
        coupling: 0.0,
        pwf: 0.0,
    };
}

/// 所有残差共享的只读上下文
#[derive(Clone, Copy)]
pub struct ResidualContext<'a> {
    /// 离散几何
    pub disc: &'a Discretization,
    /// 单元系数
    pub coeffs: &'a CellCoefficients,
    /// 井
    pub wells: &'a [Well],
    /// 时间步长（无量纲）
    pub dt: f64,
}

impl<'a> ResidualContext<'a> {
    /// 单元上的井项
    #[inline]
    pub fn well_term(&self, cell: usize) -> WellTerm {
        match self.coeffs.well_at[cell] {
            Some(w) => {
                let well = &self.wells[w];
                let v = 1.0 / self.disc.inv_volume(cell);
                WellTerm {
                    source: well.rate_source(v, self.coeffs.kg[cell]),
                    coupling: well.coupling(v),
                    pwf: match well.control() {
                        WellControl::Pressure(p) => p,
                        WellControl::Rate(_) => 0.0,
                    },
                }
            }
            None => WellTerm::NONE,
        }
    }

    /// 井在残差中的贡献
    ///
    /// 平均压力取 `-src + W(h - pwf)`，涨落场只保留 `W h`：定产量井的
    /// 随机部分已并入 R0 驱动，实测井的 Cf 为零，该部分自然消失。
    #[inline]
    pub fn source_term<D: Scalar>(&self, cell: usize, field: FieldKind, x: &[D]) -> D {
        let well = self.well_term(cell);
        match field {
            FieldKind::Mean => (x[cell] - well.pwf) * well.coupling - well.source,
            _ => x[cell] * well.coupling,
        }
    }

    /// 储存与扩散部分 s (x - x⁻)/Δt - L x
    #[inline]
    fn accumulation<D: Scalar>(&self, cell: usize, x: &[D], prev: f64) -> D {
        let s = self.coeffs.storage[cell] / self.dt;
        (x[cell] - prev) * s - self.disc.laplacian(cell, x, self.coeffs.grad_y[cell])
    }
}

/// 场类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 平均压力 p0
    Mean,
    /// 互协方差 Cfp
    CrossCovariance,
    /// 二阶修正 p2
    SecondOrder,
    /// 自协方差 Cp
    Covariance,
}

impl FieldKind {
    /// 场名称，用于日志与错误
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mean => "p0",
            Self::CrossCovariance => "Cfp",
            Self::SecondOrder => "p2",
            Self::Covariance => "Cp",
        }
    }
}

// =============================================================================
// 一阶驱动量
// =============================================================================

/// 由收敛的 `p0` 导出的驱动量：∇h0 与 R0
#[derive(Debug, Clone, Default)]
pub struct MeanDrive {
    /// ∇h0
    pub grad_h0: Vec<[f64; 2]>,
    /// R0 = s ∂h0/∂t - src
    pub r0: Vec<f64>,
}

impl MeanDrive {
    /// 由 p0 的两层计算
    pub fn compute(ctx: &ResidualContext<'_>, prev: &[f64], next: &[f64]) -> Self {
        let n = ctx.disc.len();
        let mut grad_h0 = vec![[0.0; 2]; n];
        let mut r0 = vec![0.0; n];
        for cell in 0..n {
            if !ctx.disc.is_interior(cell) {
                continue;
            }
            grad_h0[cell] = ctx.disc.gradient(cell, next);
            r0[cell] = ctx.coeffs.storage[cell] * (next[cell] - prev[cell]) / ctx.dt
                - ctx.well_term(cell).source;
        }
        Self { grad_h0, r0 }
    }

    /// 一阶驱动 ∇c·∇h0 + c·R0，c 由取值函数给出
    #[inline]
    pub fn first_order(&self, disc: &Discretization, cell: usize, c: impl Fn(usize) -> f64) -> f64 {
        let g = disc.gradient_with(cell, &c);
        let gh = self.grad_h0[cell];
        g[0] * gh[0] + g[1] * gh[1] + c(cell) * self.r0[cell]
    }
}

/// 二阶修正的驱动项
///
/// `D2 = M + (L Cfp[x][·])(x) + ½∇σ²·∇h0 + ½σ² R0 - W Cfp[x][x]`，
/// M 为 Cfp 的离散混合导数
/// `Σ_axes (Cfp[+][+] - Cfp[+][-] - Cfp[-][+] + Cfp[-][-]) / Δ²`。
pub fn second_order_drive(ctx: &ResidualContext<'_>, drive: &MeanDrive, cfp: &DenseMatrix) -> Vec<f64> {
    (0..ctx.disc.len())
        .map(|x| {
            let Some(pairs) = ctx.disc.pairs(x) else {
                return 0.0;
            };
            let mixed: f64 = pairs
                .iter()
                .map(|p| {
                    (cfp.get(p.plus, p.plus) - cfp.get(p.plus, p.minus) - cfp.get(p.minus, p.plus)
                        + cfp.get(p.minus, p.minus))
                        * p.inv_span
                        * p.inv_span
                })
                .sum();
            let row = cfp.row(x);
            let lc = ctx.disc.laplacian_with(x, |y| row[y], ctx.coeffs.grad_y[x]);
            let gv = ctx.coeffs.grad_var[x];
            let gh = drive.grad_h0[x];
            let var = ctx.coeffs.variance[x];
            let w = ctx.well_term(x).coupling;
            mixed + lc + 0.5 * (gv[0] * gh[0] + gv[1] * gh[1]) + 0.5 * var * drive.r0[x] - w * cfp.get(x, x)
        })
        .collect()
}

// =============================================================================
// 残差
// =============================================================================

/// 平均压力 p0
pub struct MeanPressureResidual<'a> {
    /// 上下文
    pub ctx: ResidualContext<'a>,
    /// 上一时间步
    pub prev: &'a [f64],
    /// 边界压力
    pub p_out: f64,
}

impl DifferentiableResidual for MeanPressureResidual<'_> {
    fn pattern(&self) -> &CsrPattern {
        self.ctx.disc.pattern()
    }

    fn evaluate<D: Scalar>(&self, row: usize, x: &[D]) -> D {
        if !self.ctx.disc.is_interior(row) {
            return x[row] - self.p_out;
        }
        self.ctx.accumulation(row, x, self.prev[row]) + self.ctx.source_term(row, FieldKind::Mean, x)
    }
}

/// 压力-对数渗透率互协方差 Cfp 的第 `source` 行
pub struct CrossCovarianceResidual<'a> {
    /// 上下文
    pub ctx: ResidualContext<'a>,
    /// 一阶驱动
    pub drive: &'a MeanDrive,
    /// 条件协方差 Cf 的第 source 行，零方差时为 `None`
    pub cf_row: Option<&'a [f64]>,
    /// 上一时间步的同一行
    pub prev: &'a [f64],
}

impl DifferentiableResidual for CrossCovarianceResidual<'_> {
    fn pattern(&self) -> &CsrPattern {
        self.ctx.disc.pattern()
    }

    fn evaluate<D: Scalar>(&self, row: usize, x: &[D]) -> D {
        if !self.ctx.disc.is_interior(row) {
            return x[row];
        }
        let forcing = match self.cf_row {
            Some(cf) => self.drive.first_order(self.ctx.disc, row, |y| cf[y]),
            None => 0.0,
        };
        self.ctx.accumulation(row, x, self.prev[row])
            + self.ctx.source_term(row, FieldKind::CrossCovariance, x)
            - forcing
    }
}

/// 二阶压力修正 p2
pub struct SecondOrderResidual<'a> {
    /// 上下文
    pub ctx: ResidualContext<'a>,
    /// 上一时间步
    pub prev: &'a [f64],
    /// 驱动项 D2
    pub forcing: &'a [f64],
}

impl DifferentiableResidual for SecondOrderResidual<'_> {
    fn pattern(&self) -> &CsrPattern {
        self.ctx.disc.pattern()
    }

    fn evaluate<D: Scalar>(&self, row: usize, x: &[D]) -> D {
        if !self.ctx.disc.is_interior(row) {
            return x[row];
        }
        self.ctx.accumulation(row, x, self.prev[row])
            + self.ctx.source_term(row, FieldKind::SecondOrder, x)
            - self.forcing[row]
    }
}

/// 压力自协方差 Cp 的一行
///
/// 驱动 `c(y) = cfp[y][source]`。时滞槽位沿 y 推进时 `cfp` 取槽位快照；
/// 同时刻槽位的转置半步取当前 Cfp。
pub struct CovarianceResidual<'a> {
    /// 上下文
    pub ctx: ResidualContext<'a>,
    /// 一阶驱动
    pub drive: &'a MeanDrive,
    /// 驱动所用的 Cfp
    pub cfp: &'a DenseMatrix,
    /// 行对应的源单元
    pub source: usize,
    /// 上一时间步的同一行
    pub prev: &'a [f64],
}

impl DifferentiableResidual for CovarianceResidual<'_> {
    fn pattern(&self) -> &CsrPattern {
        self.ctx.disc.pattern()
    }

    fn evaluate<D: Scalar>(&self, row: usize, x: &[D]) -> D {
        if !self.ctx.disc.is_interior(row) {
            return x[row];
        }
        let forcing = self
            .drive
            .first_order(self.ctx.disc, row, |y| self.cfp.get(y, self.source));
        self.ctx.accumulation(row, x, self.prev[row])
            + self.ctx.source_term(row, FieldKind::Covariance, x)
            - forcing
    }
}

/// 线性残差的右端项 b = -R(0)
pub fn linear_rhs<R: DifferentiableResidual>(residual: &R, zeros: &[f64], out: &mut [f64]) {
    for (row, b) in out.iter_mut().enumerate() {
        *b = -residual.evaluate(row, zeros);
    }
}
