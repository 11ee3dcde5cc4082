// crates/so_physics/src/numerics/autodiff/mod.rs

//! 前向模式自动微分
//!
//! 每个场的残差只实现一次，对标量类型泛型：以 `f64` 求值得到残差，
//! 以 `Dual64` 求值得到 Jacobian 的一列组合。稀疏结构由网格模板固定，
//! [`JacobianBuilder`] 对其做一次列着色，之后每次组装只需
//! 「颜色数」次残差扫描。

pub mod tape;

pub use tape::JacobianBuilder;

use crate::numerics::linear_algebra::CsrPattern;

/// 残差计算使用的标量类型
///
/// 对 `f64` 与 `num_dual::Dual64` 都成立。
pub trait Scalar: num_dual::DualNum<f64> + Copy + Send + Sync + 'static {}

impl<T: num_dual::DualNum<f64> + Copy + Send + Sync + 'static> Scalar for T {}

/// 可微残差
///
/// `evaluate(row, x)` 只允许读取 `x` 中位于 `pattern().row_indices(row)` 的分量。
pub trait DifferentiableResidual: Sync {
    /// Jacobian 稀疏模式
    fn pattern(&self) -> &CsrPattern;

    /// 第 row 个方程在试探向量 x 处的残差
    fn evaluate<D: Scalar>(&self, row: usize, x: &[D]) -> D;

    /// 方程个数
    fn len(&self) -> usize {
        self.pattern().n_rows()
    }

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
