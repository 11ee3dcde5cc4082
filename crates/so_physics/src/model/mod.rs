// crates/so_physics/src/model/mod.rs

//! 矩方程状态模型
//!
//! # 模块
//!
//! - [`covariance`]: 对数渗透率先验与 Kriging 条件化
//! - [`discretization`]: 有限体积算子（梯度、L 算子）
//! - [`well`]: Peaceman 井与分段边界条件
//! - [`fields`]: 三层标量场、两层线性场与 Cp 历史
//! - [`residual`]: 四个场的残差
//! - [`state`]: [`MomentModel`]
//! - [`derived`]: 井量、渗透率与流量统计

pub mod covariance;
pub mod derived;
pub mod discretization;
pub mod fields;
pub mod residual;
pub mod state;
pub mod well;

pub use covariance::{LogPermeability, PriorParams};
pub use derived::{FluxStat, PermeabilityStat, PressureStat, WellReport};
pub use discretization::{AxisPair, Discretization};
pub use fields::{CovarianceHistory, CovarianceSlot, LinearField, NewtonLayers, ScalarField};
pub use residual::{
    linear_rhs, CellCoefficients, CovarianceResidual, CrossCovarianceResidual, FieldKind,
    MeanDrive, MeanPressureResidual, ResidualContext, SecondOrderResidual,
};
pub use state::{
    CovarianceProblem, CrossCovarianceProblem, CrossCovarianceRows, MomentModel, NewtonProblem,
    PhysicalParams,
};
pub use well::{Well, WellControl};
