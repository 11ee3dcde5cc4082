// crates/so_physics/src/engine/newton.rs

//! p0 与 p2 的 Newton 迭代
//!
//! 每次迭代：
//!
//! 1. next → iteration
//! 2. 着色前向 AD 得到残差与 Jacobian
//! 3. ILU(0) 预条件 BiCGStab 求 `J δ = -R`，不收敛时退回稀疏 LU
//! 4. next += δ
//! 5. 最大相对增量 < 1e-4 且体积平均变化 < 1e-7 时收敛
//!
//! 相对增量对 p0 逐单元取 `max_i |δ_i / x_i|`；p2 在零附近，
//! 逐单元比值没有意义，改用 `max|δ| / max|x|`。
//!
//! 迭代次数耗尽不是错误，由调用方记录为 `Diverged`；
//! 残差或增量出现 NaN/Inf 是致命错误。

use serde::{Deserialize, Serialize};
use so_foundation::{SoError, SoResult};

use crate::model::residual::FieldKind;
use crate::model::state::NewtonProblem;
use crate::numerics::autodiff::{DifferentiableResidual, JacobianBuilder};
use crate::numerics::linear_algebra::{
    axpy, first_non_finite, norm_inf, BiCgStabSolver, CsrMatrix, CsrPattern, Ilu0Preconditioner,
    IterativeSolver, Preconditioner, SolverConfig, SparseLu,
};

/// Newton 迭代参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewtonConfig {
    /// 最大迭代次数
    pub max_iterations: usize,
    /// 最大相对增量容差
    pub increment_tol: f64,
    /// 体积平均变化容差
    pub average_tol: f64,
    /// 线性求解器参数
    pub linear: SolverConfig,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            increment_tol: 1e-4,
            average_tol: 1e-7,
            linear: SolverConfig::default(),
        }
    }
}

/// 一次 Newton 求解的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonReport {
    /// 场
    pub field: FieldKind,
    /// 迭代次数
    pub iterations: usize,
    /// 是否收敛
    pub converged: bool,
    /// 最后一次的最大相对增量
    pub increment: f64,
    /// 最后一次的体积平均变化
    pub average_change: f64,
    /// 退回直接法的次数
    pub direct_fallbacks: usize,
}

/// Newton 求解器，着色在构造时计算一次
pub struct NewtonSolver {
    config: NewtonConfig,
    jacobian: JacobianBuilder,
    linear: BiCgStabSolver,
    rhs: Vec<f64>,
    delta: Vec<f64>,
}

impl NewtonSolver {
    /// 由稀疏模式构造
    pub fn new(pattern: &CsrPattern, config: NewtonConfig) -> Self {
        let n = pattern.n_rows();
        Self {
            linear: BiCgStabSolver::new(config.linear.clone()),
            jacobian: JacobianBuilder::new(pattern),
            config,
            rhs: vec![0.0; n],
            delta: vec![0.0; n],
        }
    }

    /// 参数
    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    /// 迭代求解一个场
    ///
    /// # 参数
    ///
    /// - `field`: 场类别，用于日志与错误
    /// - `step`: 时间步序号
    /// - `time`: 步末时刻（无量纲），用于日志
    /// - `problem`: 残差与可写的两层
    pub fn solve<R: DifferentiableResidual>(
        &mut self,
        field: FieldKind,
        step: usize,
        time: f64,
        problem: NewtonProblem<'_, R>,
    ) -> SoResult<NewtonReport> {
        let NewtonProblem {
            residual,
            layers,
            weights,
        } = problem;
        SoError::check_size(field.name(), self.rhs.len(), layers.next.len())?;

        let total: f64 = weights.iter().sum();
        let average = |v: &[f64]| {
            if total > 0.0 {
                v.iter().zip(weights).map(|(a, w)| a * w).sum::<f64>() / total
            } else {
                0.0
            }
        };

        let mut report = NewtonReport {
            field,
            iterations: 0,
            converged: false,
            increment: f64::INFINITY,
            average_change: f64::INFINITY,
            direct_fallbacks: 0,
        };

        for iteration in 1..=self.config.max_iterations {
            layers.iter.copy_from_slice(layers.next);

            let (r, jac) = self.jacobian.evaluate(&residual, layers.next);
            if let Some((cell, value)) = first_non_finite(&r) {
                return Err(SoError::blow_up(field.name(), step, cell, value));
            }
            for (b, ri) in self.rhs.iter_mut().zip(&r) {
                *b = -ri;
            }

            if !self.solve_linear(&jac, field, step)? {
                report.direct_fallbacks += 1;
            }
            if let Some((cell, value)) = first_non_finite(&self.delta) {
                return Err(SoError::blow_up(field.name(), step, cell, value));
            }

            axpy(1.0, &self.delta, layers.next);

            report.iterations = iteration;
            report.increment = relative_increment(field, &self.delta, layers.next);
            report.average_change = (average(&*layers.next) - average(&*layers.iter)).abs();
            log::trace!(
                "{} 第 {} 次迭代: 相对增量 {:.3e}, 平均变化 {:.3e}",
                field.name(),
                iteration,
                report.increment,
                report.average_change
            );

            if report.increment < self.config.increment_tol
                && report.average_change < self.config.average_tol
            {
                report.converged = true;
                break;
            }
        }

        if report.converged {
            log::debug!("{} 在 {} 次迭代后收敛", field.name(), report.iterations);
        } else {
            log::warn!(
                "第 {} 步 (t = {:.6}) {} 未收敛: {} 次迭代, 相对增量 {:.3e}, 平均变化 {:.3e}",
                step,
                time,
                field.name(),
                report.iterations,
                report.increment,
                report.average_change
            );
        }
        Ok(report)
    }

    /// 求 δ，迭代法收敛返回 true，退回直接法返回 false
    fn solve_linear(&mut self, jac: &CsrMatrix, field: FieldKind, step: usize) -> SoResult<bool> {
        self.delta.fill(0.0);
        let precond = Ilu0Preconditioner::new(jac);
        let result = self.linear.solve(jac, &self.rhs, &mut self.delta, &precond);
        if result.is_converged() {
            return Ok(true);
        }

        log::warn!(
            "{} {}+{} 未收敛（{} 次迭代，相对残差 {:.3e}），改用稀疏 LU",
            field.name(),
            self.linear.name(),
            precond.name(),
            result.iterations,
            result.relative_residual()
        );
        let lu = SparseLu::factorize(jac).map_err(|e| e.into_error(field.name(), step))?;
        self.delta.copy_from_slice(&self.rhs);
        lu.solve_in_place(&mut self.delta);
        Ok(false)
    }
}

/// 最大相对增量
fn relative_increment(field: FieldKind, delta: &[f64], x: &[f64]) -> f64 {
    match field {
        FieldKind::Mean => delta
            .iter()
            .zip(x)
            .map(|(d, v)| d.abs() / v.abs().max(1e-12))
            .fold(0.0, f64::max),
        _ => norm_inf(delta) / norm_inf(x).max(1e-12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fields::ScalarField;
    use crate::numerics::autodiff::Scalar;
    use approx::assert_relative_eq;

    /// x_i² - (i + 1) = 0，对角模式
    struct Roots {
        pattern: CsrPattern,
    }

    impl DifferentiableResidual for Roots {
        fn pattern(&self) -> &CsrPattern {
            &self.pattern
        }

        fn evaluate<D: Scalar>(&self, row: usize, x: &[D]) -> D {
            x[row] * x[row] - (row + 1) as f64
        }
    }

    /// x_i = NaN 的残差
    struct Broken {
        pattern: CsrPattern,
    }

    impl DifferentiableResidual for Broken {
        fn pattern(&self) -> &CsrPattern {
            &self.pattern
        }

        fn evaluate<D: Scalar>(&self, row: usize, x: &[D]) -> D {
            x[row] - f64::NAN
        }
    }

    fn diagonal(n: usize) -> CsrPattern {
        CsrPattern::from_rows((0..n).map(|i| std::iter::once(i)))
    }

    #[test]
    fn test_newton_converges_to_square_roots() {
        let pattern = diagonal(3);
        let mut solver = NewtonSolver::new(&pattern, NewtonConfig::default());
        let mut field = ScalarField::new(3, 1.0);
        let weights = vec![1.0; 3];
        let (_, layers) = field.split_mut();
        let report = solver
            .solve(
                FieldKind::Mean,
                1,
                0.5,
                NewtonProblem {
                    residual: Roots { pattern: pattern.clone() },
                    layers,
                    weights: &weights,
                },
            )
            .unwrap();
        assert!(report.converged);
        assert!(report.iterations <= 10);
        for (i, x) in field.next().iter().enumerate() {
            assert_relative_eq!(*x, ((i + 1) as f64).sqrt(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_iteration_budget_is_not_an_error() {
        let pattern = diagonal(2);
        let config = NewtonConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let mut solver = NewtonSolver::new(&pattern, config);
        let mut field = ScalarField::new(2, 10.0);
        let weights = vec![1.0; 2];
        let (_, layers) = field.split_mut();
        let report = solver
            .solve(
                FieldKind::SecondOrder,
                3,
                1.5,
                NewtonProblem {
                    residual: Roots { pattern: pattern.clone() },
                    layers,
                    weights: &weights,
                },
            )
            .unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn test_mean_increment_is_per_cell() {
        let delta = [0.1, 0.01];
        let x = [10.0, 0.02];
        assert_relative_eq!(relative_increment(FieldKind::Mean, &delta, &x), 0.5);
        assert_relative_eq!(relative_increment(FieldKind::SecondOrder, &delta, &x), 0.01);
    }

    #[test]
    fn test_nan_residual_is_fatal() {
        let pattern = diagonal(2);
        let mut solver = NewtonSolver::new(&pattern, NewtonConfig::default());
        let mut field = ScalarField::new(2, 0.0);
        let weights = vec![1.0; 2];
        let (_, layers) = field.split_mut();
        let err = solver
            .solve(
                FieldKind::Mean,
                7,
                2.0,
                NewtonProblem {
                    residual: Broken { pattern: pattern.clone() },
                    layers,
                    weights: &weights,
                },
            )
            .unwrap_err();
        assert!(err.is_numerical());
    }
}
