// crates/so_physics/src/numerics/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 有限体积模板决定的稀疏结构在整个模拟过程中不变，因此模式 [`CsrPattern`]
//! 与值分离：模式由网格模板构造一次，之后每次 Jacobian 组装只改写值数组。
//!
//! # 格式说明
//!
//! - `row_ptr`: 行指针，长度 n_rows + 1
//! - `col_idx`: 列索引，每行内升序
//! - `values`: 非零元值
//!
//! # 使用示例
//!
//! ```
//! use so_physics::numerics::linear_algebra::CsrBuilder;
//!
//! let mut builder = CsrBuilder::new_square(3);
//! builder.set(0, 0, 4.0);
//! builder.set(0, 1, -1.0);
//! builder.set(1, 0, -1.0);
//! builder.set(1, 1, 4.0);
//! builder.set(1, 2, -1.0);
//! builder.set(2, 1, -1.0);
//! builder.set(2, 2, 4.0);
//! let matrix = builder.build();
//!
//! let x = vec![1.0, 2.0, 3.0];
//! let mut y = vec![0.0; 3];
//! matrix.mul_vec(&x, &mut y);
//! assert_eq!(y, vec![2.0, 4.0, 10.0]);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

// =============================================================================
// 稀疏模式
// =============================================================================

/// CSR 矩阵的稀疏模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 由每行的列集合构造方阵模式
    ///
    /// 每行的列索引会被排序去重，这样模板中自身在首位的约定不影响存储顺序。
    pub fn from_rows<I, R>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = usize>,
    {
        let mut row_ptr = vec![0];
        let mut col_idx = Vec::new();
        for row in rows {
            let mut cols: Vec<usize> = row.into_iter().collect();
            cols.sort_unstable();
            cols.dedup();
            col_idx.extend_from_slice(&cols);
            row_ptr.push(col_idx.len());
        }
        let n = row_ptr.len() - 1;
        Self {
            n_rows: n,
            n_cols: n,
            row_ptr,
            col_idx,
        }
    }

    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 获取行指针切片
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 获取列索引切片
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 获取第 row 行的非零元列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// 查找 (row, col) 对应的值索引
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }

    /// 最大的 |row - col|，即半带宽
    pub fn half_bandwidth(&self) -> usize {
        (0..self.n_rows)
            .flat_map(|row| self.row_indices(row).iter().map(move |&c| c.abs_diff(row)))
            .max()
            .unwrap_or(0)
    }

    /// 模式指纹，用于分解缓存的键
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.n_rows.hash(&mut hasher);
        self.n_cols.hash(&mut hasher);
        self.row_ptr.hash(&mut hasher);
        self.col_idx.hash(&mut hasher);
        hasher.finish()
    }
}

// =============================================================================
// CSR 矩阵主体
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    pattern: CsrPattern,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 以给定模式创建全零矩阵
    pub fn zeros(pattern: CsrPattern) -> Self {
        let nnz = pattern.nnz();
        Self {
            pattern,
            values: vec![0.0; nnz],
        }
    }

    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows()
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols()
    }

    /// 获取稀疏模式引用
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 获取值切片
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 获取可变值切片
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// 获取 (row, col) 位置的值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 第 row 行的 (列索引, 值)
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.pattern.row_ptr[row];
        let end = self.pattern.row_ptr[row + 1];
        self.pattern.col_idx[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter().copied())
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            *out = self.row(row).map(|(col, v)| v * x[col]).sum();
        }
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器
///
/// 逐元素设置，按列有序存储。用于测试与小矩阵。
pub struct CsrBuilder {
    n: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    /// 创建 n×n 构建器
    pub fn new_square(n: usize) -> Self {
        assert!(n > 0, "阶数必须大于 0");
        Self {
            n,
            rows: vec![BTreeMap::new(); n],
        }
    }

    /// 设置 (row, col) 的值（覆盖）
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n && col < self.n, "({}, {}) 超出 {}×{}", row, col, self.n, self.n);
        self.rows[row].insert(col, value);
    }

    /// 构建 CSR 矩阵
    pub fn build(self) -> CsrMatrix {
        let pattern = CsrPattern::from_rows(self.rows.iter().map(|r| r.keys().copied().collect::<Vec<_>>()));
        let values = self.rows.into_iter().flat_map(|r| r.into_values()).collect();
        CsrMatrix { pattern, values }
    }
}

// =============================================================================
// 测试
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn poisson_1d(n: usize) -> CsrMatrix {
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 2.0);
            if i > 0 {
                builder.set(i, i - 1, -1.0);
            }
            if i + 1 < n {
                builder.set(i, i + 1, -1.0);
            }
        }
        builder.build()
    }

    #[test]
    fn test_pattern_from_rows_sorts_stencil() {
        // 模板自身在首位，存储时按列排序
        let pattern = CsrPattern::from_rows(vec![vec![0, 1], vec![1, 0, 2], vec![2, 1]]);
        assert_eq!(pattern.row_indices(1), &[0, 1, 2]);
        assert_eq!(pattern.find_index(1, 2), Some(4));
        assert_eq!(pattern.find_index(0, 2), None);
        assert_eq!(pattern.half_bandwidth(), 1);
    }

    #[test]
    fn test_fingerprint_distinguishes_patterns() {
        let a = CsrPattern::from_rows(vec![vec![0, 1], vec![0, 1]]);
        let b = CsrPattern::from_rows(vec![vec![0], vec![1]]);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_builder_and_mul() {
        let m = poisson_1d(5);
        let x = vec![1.0; 5];
        let mut y = vec![0.0; 5];
        m.mul_vec(&x, &mut y);
        assert_eq!(y, vec![1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(m.get(2, 1), -1.0);
        assert_eq!(m.get(0, 4), 0.0);
        assert_eq!(m.get(3, 3), 2.0);
    }
}
