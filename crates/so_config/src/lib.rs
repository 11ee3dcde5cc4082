// crates/so_config/src/lib.rs

//! StochOil Config Layer
//!
//! 配置层，描述一次矩方程模拟所需的全部输入。
//!
//! # 模块概览
//!
//! - [`properties`]: `Properties` 顶层配置（网格、时间步、物性、协方差）
//! - [`well`]: 井与分段制度配置
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! so_cli      ─> 读取 JSON，调用 validate
//! so_physics  ─> configure(properties) 后不再修改配置
//! so_config   ─> Properties (本层)
//! so_foundation
//! ```
//!
//! 配置中的物理量使用工程单位（bar、mD、cP、m³/日、秒），
//! 无量纲化由模型在 `configure` 中完成。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod properties;
pub mod well;

// 重导出核心类型
pub use error::ConfigError;
pub use properties::{
    CovarianceConfig, GridConfig, Measurement, OilConfig, Properties, ScalingConfig,
    SkeletonConfig, StepPolicyConfig, TimeConfig,
};
pub use well::{ControlKind, PeriodConfig, WellConfig};
