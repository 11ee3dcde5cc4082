// crates/so_physics/src/numerics/linear_algebra/dense.rs

//! 稠密方阵
//!
//! 协方差场 `Cf`、`Cfp` 与 `Cp` 每个都是 N×N 稠密矩阵，按行优先存储，
//! 每一行对应一个源单元，可以用 rayon 按行并行写入。

use rayon::prelude::*;

/// 行优先稠密方阵
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// 全零矩阵
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// 由元素函数构造
    pub fn from_fn(n: usize, f: impl Fn(usize, usize) -> f64 + Sync) -> Self {
        let mut m = Self::zeros(n);
        m.par_rows_mut().for_each(|(i, row)| {
            for (j, v) in row.iter_mut().enumerate() {
                *v = f(i, j);
            }
        });
        m
    }

    /// 阶数
    #[inline]
    pub fn dim(&self) -> usize {
        self.n
    }

    /// 取元素
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// 设元素
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
    }

    /// 第 i 行
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// 并行遍历 (行号, 可变行)
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = (usize, &mut [f64])> {
        let n = self.n.max(1);
        self.data.par_chunks_mut(n).enumerate()
    }

    /// 清零
    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// 转置
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.n, |i, j| self.get(j, i))
    }

    /// 就地对称化 (A + Aᵀ)/2
    pub fn symmetrize(&mut self) {
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                let avg = 0.5 * (self.get(i, j) + self.get(j, i));
                self.set(i, j, avg);
                self.set(j, i, avg);
            }
        }
    }

    /// 最大非对称量 max |A_ij - A_ji|
    pub fn max_asymmetry(&self) -> f64 {
        (0..self.n)
            .flat_map(|i| ((i + 1)..self.n).map(move |j| (i, j)))
            .map(|(i, j)| (self.get(i, j) - self.get(j, i)).abs())
            .fold(0.0, f64::max)
    }

    /// 最大绝对值
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    /// 是否全为零
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|v| *v == 0.0)
    }

    /// 第一个非有限元素 (行, 列, 值)
    pub fn first_non_finite(&self) -> Option<(usize, usize, f64)> {
        self.data
            .iter()
            .position(|v| !v.is_finite())
            .map(|idx| (idx / self.n, idx % self.n, self.data[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_and_transpose() {
        let m = DenseMatrix::from_fn(3, |i, j| (i * 3 + j) as f64);
        assert_eq!(m.get(1, 2), 5.0);
        let t = m.transpose();
        assert_eq!(t.get(2, 1), 5.0);
        assert_eq!(m.row(2), &[6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_symmetrize() {
        let mut m = DenseMatrix::from_fn(3, |i, j| if i < j { 2.0 } else { 0.0 });
        assert_eq!(m.max_asymmetry(), 2.0);
        m.symmetrize();
        assert_eq!(m.max_asymmetry(), 0.0);
        assert_eq!(m.get(0, 1), 1.0);
    }

    #[test]
    fn test_par_rows_mut() {
        let mut m = DenseMatrix::zeros(4);
        m.par_rows_mut().for_each(|(i, row)| row[i] = 1.0);
        assert_eq!(m.get(3, 3), 1.0);
        assert_eq!(m.max_abs(), 1.0);
        assert!(!m.is_zero());
        m.fill_zero();
        assert!(m.is_zero());
    }

    #[test]
    fn test_first_non_finite() {
        let mut m = DenseMatrix::zeros(3);
        assert!(m.first_non_finite().is_none());
        m.set(2, 1, f64::NAN);
        let (i, j, _) = m.first_non_finite().unwrap();
        assert_eq!((i, j), (2, 1));
    }
}
