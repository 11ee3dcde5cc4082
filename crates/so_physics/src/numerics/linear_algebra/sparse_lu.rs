// crates/so_physics/src/numerics/linear_algebra/sparse_lu.rs

//! 稀疏直接求解
//!
//! 对 [`CsrMatrix`] 做 faer 的超节点稀疏 LU（部分选主元）。分解结果只读，
//! 可以被任意多个右端项并发共享，每次求解各自分配工作区。
//!
//! faer 只报告结构奇异；数值奇异（零主元）会在回代时产生 NaN/Inf，
//! 因此分解后用 `A·1` 做一次试解，出现非有限值即视为奇异。

use faer::prelude::SpSolver;
use faer::sparse::linalg::solvers::Lu;
use faer::sparse::{LuError, SparseColMat};
use so_foundation::SoError;

use super::csr::CsrMatrix;
use super::vector_ops::first_non_finite;

/// 分解失败
#[derive(Debug, Clone, PartialEq)]
pub enum FactorizeError {
    /// 矩阵构造失败
    Structure(String),
    /// 奇异：结构奇异的列，或试解中第一个非有限值所在的单元
    Singular {
        /// 单元（行）
        cell: usize,
        /// 试解值，结构奇异时为 0
        value: f64,
    },
}

impl FactorizeError {
    /// 附上阶段与时间步，转换为 [`SoError`]
    pub fn into_error(self, phase: &'static str, step: usize) -> SoError {
        match self {
            Self::Structure(message) => SoError::internal(format!("{} 分解失败: {}", phase, message)),
            Self::Singular { cell, value } => SoError::singular(phase, step, cell, cell, value),
        }
    }
}

/// 稀疏 LU 分解结果
pub struct SparseLu {
    n: usize,
    lu: Lu<usize, f64>,
}

impl std::fmt::Debug for SparseLu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseLu").field("n", &self.n).finish_non_exhaustive()
    }
}

impl SparseLu {
    /// 分解方阵
    pub fn factorize(matrix: &CsrMatrix) -> Result<Self, FactorizeError> {
        let n = matrix.n_rows();
        let triplets: Vec<(usize, usize, f64)> = (0..n)
            .flat_map(|i| matrix.row(i).map(move |(j, v)| (i, j, v)))
            .collect();
        let a = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
            .map_err(|e| FactorizeError::Structure(format!("{:?}", e)))?;
        let lu = a.sp_lu().map_err(|e| match e {
            LuError::SymbolicSingular(cell) => FactorizeError::Singular { cell, value: 0.0 },
            other => FactorizeError::Structure(format!("{:?}", other)),
        })?;
        let factorized = Self { n, lu };

        let mut trial = vec![0.0; n];
        matrix.mul_vec(&vec![1.0; n], &mut trial);
        factorized.solve_in_place(&mut trial);
        if let Some((cell, value)) = first_non_finite(&trial) {
            return Err(FactorizeError::Singular { cell, value });
        }
        Ok(factorized)
    }

    /// 矩阵阶数
    pub fn dim(&self) -> usize {
        self.n
    }

    /// 原地求解 A x = b，`b` 输入右端项、输出解
    pub fn solve_in_place(&self, b: &mut [f64]) {
        debug_assert_eq!(b.len(), self.n, "右端项长度必须等于矩阵阶数");
        let n = self.n;
        self.lu
            .solve_in_place(faer::mat::from_column_major_slice_mut::<f64>(b, n, 1));
    }

    /// 求解并返回新向量
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let mut x = b.to_vec();
        self.solve_in_place(&mut x);
        x
    }
}
