// crates/so_physics/src/numerics/linear_algebra/vector_ops.rs

//! 向量运算
//!
//! 迭代求解器与 Newton 收敛判据使用的基本向量运算。

/// 向量点积
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "向量长度必须相等");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// 向量 2-范数
#[inline]
pub fn norm2(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// 向量无穷范数
#[inline]
pub fn norm_inf(a: &[f64]) -> f64 {
    a.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}

/// y = a*x + y
///
/// # 参数
///
/// - `a`: 标量系数
/// - `x`: 输入向量
/// - `y`: 输入输出向量
#[inline]
pub fn axpy(a: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len(), "向量长度必须相等");
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}

/// 复制 src 到 dst
#[inline]
pub fn copy(src: &[f64], dst: &mut [f64]) {
    dst.copy_from_slice(src);
}

/// 第一个非有限元素的位置与值
pub fn first_non_finite(a: &[f64]) -> Option<(usize, f64)> {
    a.iter().copied().enumerate().find(|(_, v)| !v.is_finite())
}
