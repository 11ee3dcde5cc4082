// crates/so_physics/src/engine/covariance_solver.rs

//! 线性场 Cfp 与 Cp 的直接求解
//!
//! 两个场的算子相同：`A = s/Δt - L + W`，由 Cfp 残差的 AD Jacobian 得到。
//! 每个时间步只做一次稀疏 LU 分解，缓存在 [`FactorizationCache`] 中，
//! 所有行（Cfp 的 N 行、Cp 每个槽位的 N 行）共享只读分解，用 rayon 并行回代。
//!
//! # Cp 历史推进
//!
//! 槽位 k 保存 `Cp_k[x][y] = Cov(p(x, t_k), p(y, t))`。第 n 步：
//!
//! 1. 每个槽位沿 y 推进一步，驱动取该槽位自己的 Cfp 快照。
//!    简化阶段只推进最新槽位，更早的槽位冻结。
//! 2. 推进后的最新槽位 C1 转置，沿 x 再推进一步，驱动取当前 Cfp，
//!    得到同时刻协方差后对称化，作为新槽位入队。

use std::sync::Arc;

use rayon::prelude::*;
use so_foundation::{SoError, SoResult};

use crate::model::fields::CovarianceSlot;
use crate::model::residual::{linear_rhs, CovarianceResidual, FieldKind, ResidualContext, MeanDrive};
use crate::model::state::{CovarianceProblem, CrossCovarianceProblem};
use crate::numerics::autodiff::{DifferentiableResidual, JacobianBuilder};
use crate::numerics::linear_algebra::{CsrPattern, DenseMatrix, SparseLu};

// =============================================================================
// 分解缓存
// =============================================================================

/// 分解缓存，键为 (稀疏模式指纹, 系数代数)
#[derive(Debug, Default)]
pub struct FactorizationCache {
    key: Option<(u64, u64)>,
    lu: Option<Arc<SparseLu>>,
    hits: usize,
    misses: usize,
}

impl FactorizationCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取或重新分解
    pub fn get_or_factorize(
        &mut self,
        fingerprint: u64,
        generation: u64,
        factorize: impl FnOnce() -> SoResult<SparseLu>,
    ) -> SoResult<Arc<SparseLu>> {
        let key = (fingerprint, generation);
        if let (Some(cached), Some(lu)) = (self.key, &self.lu) {
            if cached == key {
                self.hits += 1;
                return Ok(Arc::clone(lu));
            }
        }
        self.misses += 1;
        let lu = Arc::new(factorize()?);
        self.key = Some(key);
        self.lu = Some(Arc::clone(&lu));
        Ok(lu)
    }

    /// (命中, 未命中)
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

/// Cp 历史推进的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryReport {
    /// 沿 y 推进的槽位数
    pub advanced_slots: usize,
    /// 对称化前的最大非对称量
    pub asymmetry: f64,
    /// 被淘汰槽位的时间步序号
    pub evicted_step: Option<usize>,
}

// =============================================================================
// 求解器
// =============================================================================

/// Cfp 与 Cp 的求解器
pub struct CovarianceSolver {
    jacobian: JacobianBuilder,
    cache: FactorizationCache,
    fingerprint: u64,
    generation: u64,
    zeros: Vec<f64>,
}

impl CovarianceSolver {
    /// 由稀疏模式构造
    pub fn new(pattern: &CsrPattern) -> Self {
        Self {
            jacobian: JacobianBuilder::new(pattern),
            cache: FactorizationCache::new(),
            fingerprint: pattern.fingerprint(),
            generation: 0,
            zeros: vec![0.0; pattern.n_rows()],
        }
    }

    /// 新时间步开始：系数（Δt、井边界条件）可能已变化
    pub fn begin_step(&mut self) {
        self.generation += 1;
    }

    /// 分解缓存
    pub fn cache(&self) -> &FactorizationCache {
        &self.cache
    }

    fn factorization<R: DifferentiableResidual>(
        &mut self,
        operator: &R,
        step: usize,
    ) -> SoResult<Arc<SparseLu>> {
        let (jacobian, zeros) = (&self.jacobian, &self.zeros);
        self.cache.get_or_factorize(self.fingerprint, self.generation, || {
            let (_, a) = jacobian.evaluate(operator, zeros);
            log::debug!("第 {} 步重新分解协方差算子 (n = {})", step, a.n_rows());
            SparseLu::factorize(&a).map_err(|e| e.into_error(FieldKind::CrossCovariance.name(), step))
        })
    }

    /// 求解本步的 Cfp，结果写入 next
    pub fn solve_cross_covariance(&mut self, problem: CrossCovarianceProblem<'_>, step: usize) -> SoResult<()> {
        let (rows, next) = problem.split();
        let lu = self.factorization(&rows.residual(0), step)?;
        let zeros = &self.zeros;

        next.par_rows_mut().try_for_each(|(source, out)| {
            linear_rhs(&rows.residual(source), zeros, out);
            lu.solve_in_place(out);
            check_row(FieldKind::CrossCovariance, step, out)
        })
    }

    /// 推进 Cp 历史并追加本步的同时刻槽位
    pub fn solve_covariance_history(
        &mut self,
        problem: CovarianceProblem<'_>,
        step: usize,
        time: f64,
    ) -> SoResult<HistoryReport> {
        let CovarianceProblem {
            ctx,
            drive,
            cfp_now,
            p0_now,
            controls,
            history,
            simple_after,
        } = problem;

        // 算子与 Cfp 相同，驱动行任取
        let blank = vec![0.0; ctx.disc.len()];
        let operator = CovarianceResidual {
            ctx,
            drive,
            cfp: cfp_now,
            source: 0,
            prev: &blank,
        };
        let lu = self.factorization(&operator, step)?;
        let zeros = &self.zeros;

        let simple = step > simple_after;
        let newest = history.len().saturating_sub(1);
        let mut advanced_slots = 0;
        for (k, slot) in history.iter_mut().enumerate() {
            if simple && k != newest {
                continue;
            }
            let snapshot = Arc::clone(&slot.cfp);
            let prev = slot.cp.clone();
            advance_rows(ctx, drive, &snapshot, &prev, &lu, zeros, step, &mut slot.cp)?;
            advanced_slots += 1;
        }

        let mut equal_time = DenseMatrix::zeros(ctx.disc.len());
        if let Some(c1) = history.newest() {
            let transposed = c1.cp.transpose();
            advance_rows(ctx, drive, cfp_now, &transposed, &lu, zeros, step, &mut equal_time)?;
        }
        let asymmetry = equal_time.max_asymmetry();
        log::debug!("第 {} 步 Cp 对称化前最大非对称量 {:.3e}", step, asymmetry);
        equal_time.symmetrize();

        let evicted = history.push(CovarianceSlot {
            step,
            time,
            cp: equal_time,
            cfp: Arc::new(cfp_now.clone()),
            p0: Arc::new(p0_now.to_vec()),
            controls,
        });
        if let Some(old) = &evicted {
            log::trace!("淘汰第 {} 步的 Cp 槽位", old.step);
        }

        Ok(HistoryReport {
            advanced_slots,
            asymmetry,
            evicted_step: evicted.map(|s| s.step),
        })
    }
}

/// 对 out 的每个内部行 x 解一行 Cp，边界环行为零
#[allow(clippy::too_many_arguments)]
fn advance_rows(
    ctx: ResidualContext<'_>,
    drive: &MeanDrive,
    cfp: &DenseMatrix,
    prev: &DenseMatrix,
    lu: &SparseLu,
    zeros: &[f64],
    step: usize,
    out: &mut DenseMatrix,
) -> SoResult<()> {
    out.par_rows_mut().try_for_each(|(x, row)| {
        if !ctx.disc.is_interior(x) {
            row.fill(0.0);
            return Ok(());
        }
        let residual = CovarianceResidual {
            ctx,
            drive,
            cfp,
            source: x,
            prev: prev.row(x),
        };
        linear_rhs(&residual, zeros, row);
        lu.solve_in_place(row);
        check_row(FieldKind::Covariance, step, row)
    })
}

fn check_row(field: FieldKind, step: usize, row: &[f64]) -> SoResult<()> {
    match row.iter().position(|v| !v.is_finite()) {
        Some(cell) => Err(SoError::blow_up(field.name(), step, cell, row[cell])),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear_algebra::CsrBuilder;

    fn lu(value: f64) -> SoResult<SparseLu> {
        let mut b = CsrBuilder::new_square(2);
        b.set(0, 0, value);
        b.set(1, 1, value);
        SparseLu::factorize(&b.build()).map_err(|e| e.into_error("test", 0))
    }

    #[test]
    fn test_cache_reuses_within_generation() {
        let mut cache = FactorizationCache::new();
        let a = cache.get_or_factorize(7, 1, || lu(2.0)).unwrap();
        let b = cache.get_or_factorize(7, 1, || lu(3.0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats(), (1, 1));

        let c = cache.get_or_factorize(7, 2, || lu(3.0)).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        let x = c.solve(&[3.0, 6.0]);
        assert!((x[0] - 1.0).abs() < 1e-14 && (x[1] - 2.0).abs() < 1e-14);
    }

    #[test]
    fn test_cache_propagates_singular() {
        let mut cache = FactorizationCache::new();
        let err = cache.get_or_factorize(1, 1, || lu(0.0)).unwrap_err();
        assert!(err.is_numerical());
        assert_eq!(cache.stats(), (0, 1));
    }
}
