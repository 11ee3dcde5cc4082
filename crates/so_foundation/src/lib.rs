// crates/so_foundation/src/lib.rs

//! StochOil Foundation Layer
//!
//! 基础层，提供整个项目共享的最小抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `SoError` / `SoResult`
//! - [`units`]: 物理单位常量与换算（bar、mD、cP、日）
//! - [`scaling`]: 无量纲化参考量及其往返换算
//!
//! # 示例
//!
//! ```
//! use so_foundation::{scaling::Scaling, units};
//!
//! let scaling = Scaling::new(100.0 * units::BAR_TO_PA, 100.0, 3600.0).unwrap();
//! let p = scaling.pressure_to_dimensionless(50.0 * units::BAR_TO_PA);
//! assert!((p - 0.5).abs() < 1e-15);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod scaling;
pub mod units;

// 重导出常用类型
pub use error::{SoError, SoResult};
pub use scaling::Scaling;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{SoError, SoResult};
    pub use crate::scaling::Scaling;
    pub use crate::units;
}
