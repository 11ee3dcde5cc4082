// crates/so_physics/src/model/fields.rs

//! 场状态
//!
//! - [`ScalarField`]: `p0`、`p2`，三层 (previous, iteration, next)，供 Newton 迭代
//! - [`LinearField`]: `Cfp`，两层 (previous, next)，线性方程直接求解
//! - [`CovarianceHistory`]: `Cp` 的历史槽位，容量固定，满后淘汰最旧的槽位

use std::collections::VecDeque;
use std::sync::Arc;

use crate::model::well::WellControl;
use crate::numerics::linear_algebra::DenseMatrix;

/// Newton 迭代时可写的两层
pub struct NewtonLayers<'a> {
    /// 本次迭代起点
    pub iter: &'a mut [f64],
    /// 候选解
    pub next: &'a mut [f64],
}

/// 三层标量场
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    prev: Vec<f64>,
    iter: Vec<f64>,
    next: Vec<f64>,
}

impl ScalarField {
    /// 以常数初始化
    pub fn new(n: usize, value: f64) -> Self {
        Self {
            prev: vec![value; n],
            iter: vec![value; n],
            next: vec![value; n],
        }
    }

    /// 已提交的上一时间步
    #[inline]
    pub fn prev(&self) -> &[f64] {
        &self.prev
    }

    /// 当前迭代起点
    #[inline]
    pub fn iter(&self) -> &[f64] {
        &self.iter
    }

    /// 候选解
    #[inline]
    pub fn next(&self) -> &[f64] {
        &self.next
    }

    /// 拆分为只读的 previous 与可写的 Newton 两层
    pub fn split_mut(&mut self) -> (&[f64], NewtonLayers<'_>) {
        (
            &self.prev,
            NewtonLayers {
                iter: &mut self.iter,
                next: &mut self.next,
            },
        )
    }

    /// 时间步收敛后提升 next → iteration → previous
    pub fn commit(&mut self) {
        self.prev.copy_from_slice(&self.next);
        self.iter.copy_from_slice(&self.next);
    }
}

/// 两层线性场
#[derive(Debug, Clone, PartialEq)]
pub struct LinearField {
    prev: DenseMatrix,
    next: DenseMatrix,
}

impl LinearField {
    /// 全零
    pub fn zeros(n: usize) -> Self {
        Self {
            prev: DenseMatrix::zeros(n),
            next: DenseMatrix::zeros(n),
        }
    }

    /// 已提交的上一时间步
    #[inline]
    pub fn prev(&self) -> &DenseMatrix {
        &self.prev
    }

    /// 本时间步的解
    #[inline]
    pub fn next(&self) -> &DenseMatrix {
        &self.next
    }

    /// 拆分为 (previous, 可写 next)
    pub fn split_mut(&mut self) -> (&DenseMatrix, &mut DenseMatrix) {
        (&self.prev, &mut self.next)
    }

    /// 提交
    pub fn commit(&mut self) {
        self.prev.clone_from(&self.next);
    }
}

/// 一个协方差历史槽位
///
/// `cp[x][y] = Cov(p(x, t_k), p(y, t))`，t_k 为槽位创建时刻，t 为当前时刻。
/// 槽位同时保存 t_k 时刻的 `Cfp`、`p0` 与井的边界条件，供时滞项与
/// 井量协方差使用。
#[derive(Debug, Clone)]
pub struct CovarianceSlot {
    /// 创建时的时间步序号
    pub step: usize,
    /// 创建时刻（无量纲）
    pub time: f64,
    /// 协方差矩阵
    pub cp: DenseMatrix,
    /// t_k 时刻的 Cfp
    pub cfp: Arc<DenseMatrix>,
    /// t_k 时刻的 p0
    pub p0: Arc<Vec<f64>>,
    /// t_k 时刻各井的边界条件
    pub controls: Vec<WellControl>,
}

/// 协方差历史
#[derive(Debug, Clone)]
pub struct CovarianceHistory {
    slots: VecDeque<CovarianceSlot>,
    capacity: usize,
}

impl CovarianceHistory {
    /// 创建空历史，容量至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// 追加槽位，超出容量时返回被淘汰的最旧槽位
    pub fn push(&mut self, slot: CovarianceSlot) -> Option<CovarianceSlot> {
        self.slots.push_back(slot);
        if self.slots.len() > self.capacity {
            self.slots.pop_front()
        } else {
            None
        }
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 槽位数
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 第 k 个槽位（0 为最旧）
    pub fn get(&self, k: usize) -> Option<&CovarianceSlot> {
        self.slots.get(k)
    }

    /// 最新槽位，即同时刻协方差
    pub fn newest(&self) -> Option<&CovarianceSlot> {
        self.slots.back()
    }

    /// 遍历（从旧到新）
    pub fn iter(&self) -> impl Iterator<Item = &CovarianceSlot> {
        self.slots.iter()
    }

    /// 可变遍历（从旧到新）
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CovarianceSlot> {
        self.slots.iter_mut()
    }
}
