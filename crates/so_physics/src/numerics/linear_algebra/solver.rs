// crates/so_physics/src/numerics/linear_algebra/solver.rs

//! 迭代求解器
//!
//! Newton 增量方程 `J δ = -R` 由右预条件 BiCGStab 求解。Jacobian 含
//! `∇<Y>·∇h` 的一阶项与定压井耦合，不对称，因此不使用 CG。
//!
//! 求解结果以 [`SolverResult`] 报告，不作为错误返回；调用方在未收敛时
//! 回退到稀疏 LU 直接分解。

use serde::{Deserialize, Serialize};

use super::csr::CsrMatrix;
use super::preconditioner::Preconditioner;
use super::vector_ops::{axpy, copy, dot, norm2};

/// 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 相对容差
    pub rtol: f64,
    /// 绝对容差
    pub atol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-14,
            max_iter: 500,
        }
    }
}

impl SolverConfig {
    /// 创建配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }
}

/// 求解状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 残差增长超过阈值
    Diverged,
    /// 内积退化
    Stagnated,
}

/// 求解结果
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// 状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: f64,
    /// 初始残差范数
    pub initial_residual_norm: f64,
}

impl SolverResult {
    /// 是否收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// 相对残差
    pub fn relative_residual(&self) -> f64 {
        if self.initial_residual_norm > 0.0 {
            self.residual_norm / self.initial_residual_norm
        } else {
            0.0
        }
    }

    fn finish(status: SolverStatus, iterations: usize, residual: f64, initial: f64) -> Self {
        Self {
            status,
            iterations,
            residual_norm: residual,
            initial_residual_norm: initial,
        }
    }
}

/// 迭代求解器 trait
pub trait IterativeSolver {
    /// 求解 A x = b，x 为初值并返回解
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult;

    /// 名称
    fn name(&self) -> &'static str;
}

/// BiCGStab 求解器
pub struct BiCgStabSolver {
    config: SolverConfig,
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    z: Vec<f64>,
}

impl BiCgStabSolver {
    /// 创建求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            z: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            for buf in [
                &mut self.r,
                &mut self.r0,
                &mut self.p,
                &mut self.v,
                &mut self.s,
                &mut self.t,
                &mut self.z,
            ] {
                *buf = vec![0.0; n];
            }
        }
    }
}

impl IterativeSolver for BiCgStabSolver {
    fn solve<P: Preconditioner>(
        &mut self,
        matrix: &CsrMatrix,
        b: &[f64],
        x: &mut [f64],
        precond: &P,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let stag_tol = 1e-30;
        let div_factor = 1e6;

        // r = b - A x
        matrix.mul_vec(x, &mut self.r);
        for (ri, bi) in self.r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }

        let initial_norm = norm2(&self.r);
        if initial_norm < self.config.atol {
            return SolverResult::finish(SolverStatus::Converged, 0, initial_norm, initial_norm);
        }

        copy(&self.r, &mut self.r0);
        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        self.v.fill(0.0);
        self.p.fill(0.0);

        for iter in 0..self.config.max_iter {
            let rho = dot(&self.r0, &self.r);
            if rho.abs() < stag_tol {
                let res = norm2(&self.r);
                return SolverResult::finish(SolverStatus::Stagnated, iter, res, initial_norm);
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            // p = r + beta (p - omega v)
            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            precond.apply(&self.p, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < stag_tol {
                let res = norm2(&self.r);
                return SolverResult::finish(SolverStatus::Stagnated, iter, res, initial_norm);
            }
            alpha = rho / r0v;

            // s = r - alpha v
            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if s_norm < self.config.atol {
                axpy(alpha, &self.z, x);
                return SolverResult::finish(SolverStatus::Converged, iter + 1, s_norm, initial_norm);
            }

            // x += alpha M⁻¹p，此时 z 仍为 M⁻¹p
            axpy(alpha, &self.z, x);

            precond.apply(&self.s, &mut self.z);
            matrix.mul_vec(&self.z, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt.abs() < stag_tol {
                1.0
            } else {
                dot(&self.t, &self.s) / tt
            };
            if omega.abs() < stag_tol {
                return SolverResult::finish(SolverStatus::Stagnated, iter + 1, s_norm, initial_norm);
            }

            axpy(omega, &self.z, x);

            // r = s - omega t
            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res_norm = norm2(&self.r);
            log::trace!("BiCGStab 第 {} 次迭代: 残差 {:.6e}", iter + 1, res_norm);

            if res_norm < self.config.atol || res_norm < self.config.rtol * initial_norm {
                return SolverResult::finish(SolverStatus::Converged, iter + 1, res_norm, initial_norm);
            }
            if !res_norm.is_finite() || res_norm > initial_norm * div_factor {
                return SolverResult::finish(SolverStatus::Diverged, iter + 1, res_norm, initial_norm);
            }
        }

        SolverResult::finish(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        )
    }

    fn name(&self) -> &'static str {
        "BiCGStab"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear_algebra::csr::CsrBuilder;
    use crate::numerics::linear_algebra::preconditioner::Ilu0Preconditioner;

    /// 不做预条件
    struct Identity;

    impl Preconditioner for Identity {
        fn apply(&self, r: &[f64], z: &mut [f64]) {
            z.copy_from_slice(r);
        }

        fn name(&self) -> &'static str {
            "identity"
        }
    }

    fn create_nonsymmetric_matrix(n: usize) -> CsrMatrix {
        // 对流扩散型三对角矩阵
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 4.0);
            if i > 0 {
                builder.set(i, i - 1, -1.5);
            }
            if i + 1 < n {
                builder.set(i, i + 1, -0.5);
            }
        }
        builder.build()
    }

    #[test]
    fn test_bicgstab_simple() {
        let matrix = create_nonsymmetric_matrix(20);
        let x_true: Vec<f64> = (0..20).map(|i| (i as f64 * 0.3).cos()).collect();
        let mut b = vec![0.0; 20];
        matrix.mul_vec(&x_true, &mut b);

        let mut x = vec![0.0; 20];
        let mut solver = BiCgStabSolver::new(SolverConfig::new(1e-12, 200));
        let result = solver.solve(&matrix, &b, &mut x, &Identity);

        assert!(result.is_converged(), "BiCGStab 未收敛: {:?}", result);
        for (xi, ti) in x.iter().zip(&x_true) {
            assert!((xi - ti).abs() < 1e-8);
        }
    }

    #[test]
    fn test_bicgstab_with_ilu0() {
        let matrix = create_nonsymmetric_matrix(50);
        let b = vec![1.0; 50];
        let mut x = vec![0.0; 50];
        let mut solver = BiCgStabSolver::new(SolverConfig::default());
        let precond = Ilu0Preconditioner::new(&matrix);
        let result = solver.solve(&matrix, &b, &mut x, &precond);
        assert!(result.is_converged());
        // 三对角矩阵上 ILU(0) 即精确分解
        assert!(result.iterations <= 2);
    }

    #[test]
    fn test_zero_rhs_returns_zero() {
        let matrix = create_nonsymmetric_matrix(10);
        let b = vec![0.0; 10];
        let mut x = vec![0.0; 10];
        let mut solver = BiCgStabSolver::new(SolverConfig::default());
        let result = solver.solve(&matrix, &b, &mut x, &Identity);
        assert!(result.is_converged());
        assert_eq!(result.iterations, 0);
        assert!(x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_solver_result() {
        let result = SolverResult::finish(SolverStatus::MaxIterationsReached, 10, 1e-3, 1.0);
        assert!(!result.is_converged());
        assert!((result.relative_residual() - 1e-3).abs() < 1e-15);
    }
}
