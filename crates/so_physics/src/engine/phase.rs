// crates/so_physics/src/engine/phase.rs

//! 单步状态机
//!
//! ```text
//! Advancing → SolvingMean → SolvingCrossCovariance → SolvingSecondOrder
//!           → SolvingCovarianceHistory → Committed
//! ```
//!
//! `p0` 或 `p2` 的 Newton 迭代耗尽次数时本步标记为 `Diverged`，仍然提交。

use std::fmt;

/// 时间步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepPhase {
    /// 确定步长与时段
    Advancing,
    /// 求解 p0
    SolvingMean,
    /// 求解 Cfp
    SolvingCrossCovariance,
    /// 求解 p2
    SolvingSecondOrder,
    /// 推进 Cp 历史
    SolvingCovarianceHistory,
    /// 已提交
    Committed,
    /// Newton 未收敛，已按最后迭代值提交
    Diverged,
}

impl StepPhase {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Diverged)
    }

    /// 下一个阶段，终态返回自身
    pub fn next(self) -> Self {
        match self {
            Self::Advancing => Self::SolvingMean,
            Self::SolvingMean => Self::SolvingCrossCovariance,
            Self::SolvingCrossCovariance => Self::SolvingSecondOrder,
            Self::SolvingSecondOrder => Self::SolvingCovarianceHistory,
            Self::SolvingCovarianceHistory => Self::Committed,
            terminal => terminal,
        }
    }

    /// 名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Advancing => "advancing",
            Self::SolvingMean => "solving p0",
            Self::SolvingCrossCovariance => "solving Cfp",
            Self::SolvingSecondOrder => "solving p2",
            Self::SolvingCovarianceHistory => "solving Cp",
            Self::Committed => "committed",
            Self::Diverged => "diverged",
        }
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let mut phase = StepPhase::Advancing;
        let mut visited = vec![phase];
        while !phase.is_terminal() {
            phase = phase.next();
            visited.push(phase);
        }
        assert_eq!(visited.len(), 6);
        assert_eq!(phase, StepPhase::Committed);
        assert_eq!(StepPhase::Diverged.next(), StepPhase::Diverged);
    }
}
