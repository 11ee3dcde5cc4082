// crates/so_physics/src/numerics/mod.rs

//! 数值方法模块
//!
//! 包含：
//! - linear_algebra/ - 稀疏与稠密线性代数 (CSR, ILU(0), BiCGStab, 稀疏 LU)
//! - autodiff/ - 前向模式自动微分 Jacobian (列着色)

pub mod autodiff;
pub mod linear_algebra;

pub use autodiff::{DifferentiableResidual, JacobianBuilder, Scalar};

pub use linear_algebra::{
    // 矩阵
    CsrBuilder,
    CsrMatrix,
    CsrPattern,
    DenseMatrix,
    // 预条件器
    Ilu0Preconditioner,
    Preconditioner,
    // 求解器
    BiCgStabSolver,
    IterativeSolver,
    SolverConfig,
    SolverResult,
    SolverStatus,
    SparseLu,
};
