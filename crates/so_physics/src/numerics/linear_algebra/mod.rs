// crates/so_physics/src/numerics/linear_algebra/mod.rs

//! 线性代数模块
//!
//! - `csr`: 压缩稀疏行矩阵，模式与值分离
//! - `preconditioner`: ILU(0) 预条件器
//! - `solver`: BiCGStab 迭代求解器
//! - `sparse_lu`: faer 稀疏 LU，Newton 的直接法后备与协方差共享分解
//! - `dense`: 协方差用的行优先稠密矩阵
//! - `vector_ops`: 向量运算

pub mod csr;
pub mod dense;
pub mod preconditioner;
pub mod solver;
pub mod sparse_lu;
pub mod vector_ops;

pub use csr::{CsrBuilder, CsrMatrix, CsrPattern};
pub use dense::DenseMatrix;
pub use preconditioner::{Ilu0Preconditioner, Preconditioner};
pub use solver::{BiCgStabSolver, IterativeSolver, SolverConfig, SolverResult, SolverStatus};
pub use sparse_lu::{FactorizeError, SparseLu};
pub use vector_ops::{axpy, copy, dot, first_non_finite, norm2, norm_inf};
