// crates/so_physics/src/engine/mod.rs

//! 时间推进引擎
//!
//! # 模块结构
//!
//! - `phase` - 单步状态机
//! - `step_policy` - 步长策略
//! - `newton` - p0 / p2 的 Newton 迭代
//! - `covariance_solver` - Cfp / Cp 的共享分解直接求解
//! - `integrator` - 外层时间循环与观察者

pub mod covariance_solver;
pub mod integrator;
pub mod newton;
pub mod phase;
pub mod step_policy;

// 重导出常用类型
pub use covariance_solver::{CovarianceSolver, FactorizationCache, HistoryReport};
pub use integrator::{Integrator, NoopObserver, RunSummary, StepObserver, StepReport};
pub use newton::{NewtonConfig, NewtonReport, NewtonSolver};
pub use phase::StepPhase;
pub use step_policy::{
    policy_from_config, GeometricGrowth, IterationAdaptive, StepFeedback, StepSizePolicy,
};
