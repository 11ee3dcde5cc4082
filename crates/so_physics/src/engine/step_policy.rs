// crates/so_physics/src/engine/step_policy.rs

//! 时间步长策略
//!
//! 策略只给出下一个候选步长；上下限与时段边界的截断由积分器完成。

use so_config::StepPolicyConfig;

use crate::engine::phase::StepPhase;

/// 上一步的结果，供策略调整步长
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepFeedback {
    /// 上一步长
    pub dt: f64,
    /// p0 与 p2 Newton 迭代次数的较大者
    pub newton_iterations: usize,
    /// 终态
    pub outcome: StepPhase,
}

/// 步长策略
pub trait StepSizePolicy: Send + Sync {
    /// 策略名称
    fn name(&self) -> &'static str;

    /// 下一个候选步长
    fn next(&mut self, feedback: &StepFeedback) -> f64;
}

/// 几何增长：每步乘以固定因子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricGrowth {
    factor: f64,
}

impl GeometricGrowth {
    /// 创建
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl StepSizePolicy for GeometricGrowth {
    fn name(&self) -> &'static str {
        "geometric"
    }

    fn next(&mut self, feedback: &StepFeedback) -> f64 {
        if feedback.outcome == StepPhase::Diverged {
            log::warn!(
                "上一步 Newton 未收敛（{} 次迭代），步长仍按 ×{} 增长",
                feedback.newton_iterations,
                self.factor
            );
        }
        feedback.dt * self.factor
    }
}

/// 按 Newton 迭代次数增减
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationAdaptive {
    factor: f64,
    target: usize,
}

impl IterationAdaptive {
    /// 创建
    pub fn new(factor: f64, target: usize) -> Self {
        Self {
            factor,
            target: target.max(1),
        }
    }
}

impl StepSizePolicy for IterationAdaptive {
    fn name(&self) -> &'static str {
        "iteration_adaptive"
    }

    fn next(&mut self, feedback: &StepFeedback) -> f64 {
        if feedback.outcome == StepPhase::Diverged {
            return feedback.dt / self.factor;
        }
        match feedback.newton_iterations.cmp(&self.target) {
            std::cmp::Ordering::Less => feedback.dt * self.factor,
            std::cmp::Ordering::Equal => feedback.dt,
            std::cmp::Ordering::Greater => feedback.dt / self.factor,
        }
    }
}

/// 由配置构造策略
pub fn policy_from_config(config: &StepPolicyConfig) -> Box<dyn StepSizePolicy> {
    match *config {
        StepPolicyConfig::Geometric { factor } => Box::new(GeometricGrowth::new(factor)),
        StepPolicyConfig::IterationAdaptive {
            factor,
            target_iterations,
        } => Box::new(IterationAdaptive::new(factor, target_iterations)),
    }
}
