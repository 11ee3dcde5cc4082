// crates/so_physics/src/lib.rs

//! StochOil Physics Layer
//!
//! 单相弱可压缩渗流的矩方程求解：对数渗透率为高斯随机场时，
//! 同时推进平均压力 `p0`、二阶修正 `p2`、压力与对数渗透率的互协方差 `Cfp`
//! 以及压力自协方差 `Cp` 的历史。
//!
//! # 模块概览
//!
//! - [`numerics`]: CSR/稠密矩阵、ILU(0)+BiCGStab、稀疏 LU、着色前向 AD
//! - [`model`]: [`MomentModel`]，物性无量纲化、先验与条件化、井、残差、派生量
//! - [`engine`]: Newton 迭代、协方差求解、步长策略与时间循环
//!
//! # 层级架构
//!
//! ```text
//! so_cli      ─> Integrator::run + 时间序列输出
//! so_physics  ─> engine ─> model ─> numerics (本层)
//! so_grid     ─> 带边界环的结构网格
//! so_config   ─> Properties
//! so_foundation
//! ```
//!
//! # 示例
//!
//! ```no_run
//! use so_config::Properties;
//! use so_physics::prelude::*;
//!
//! let props = Properties::from_file("properties.json").unwrap();
//! let mut model = MomentModel::configure(&props).unwrap();
//! model.initialize_state().unwrap();
//! let mut integrator = Integrator::new(model).unwrap();
//! let summary = integrator.run(&mut NoopObserver).unwrap();
//! println!("{} 步", summary.steps);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod model;
pub mod numerics;

pub use engine::{Integrator, StepObserver, StepPhase};
pub use model::MomentModel;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::engine::{
        Integrator, NewtonConfig, NoopObserver, RunSummary, StepObserver, StepPhase, StepReport,
        StepSizePolicy,
    };
    pub use crate::model::{MomentModel, WellControl, WellReport};
    pub use so_foundation::{SoError, SoResult};
}
