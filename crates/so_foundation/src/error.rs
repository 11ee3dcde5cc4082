// crates/so_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `SoError` 枚举和 `SoResult` 类型别名。
//!
//! # 错误分类
//!
//! 1. **配置错误**: 参数无效或彼此矛盾，在时间推进开始前即报告
//! 2. **数值奇异**: 共享分解遇到零主元，终止运行并给出时间步与单元
//! 3. **数值爆炸**: 残差或解中出现 NaN/Inf，终止运行
//! 4. **物理量越界**: 如非正的传导率，在配置或首次组装时报告
//!
//! Newton 迭代次数耗尽不是错误，由求解器以 `Diverged` 状态记录。
//!
//! # 示例
//!
//! ```
//! use so_foundation::error::{SoError, SoResult};
//!
//! fn read_config() -> SoResult<()> {
//!     Err(SoError::config("参考压力必须为正"))
//! }
//! assert!(read_config().is_err());
//! ```

use thiserror::Error;

/// 统一结果类型
pub type SoResult<T> = Result<T, SoError>;

/// StochOil 错误类型
#[derive(Error, Debug)]
pub enum SoError {
    // ========================================================================
    // IO 相关错误
    // ========================================================================
    /// IO 错误
    #[error("IO 错误: {message}")]
    Io {
        /// 出错的操作
        message: String,
        /// 底层错误
        #[source]
        source: Option<std::io::Error>,
    },

    // ========================================================================
    // 配置与输入错误
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 物理量超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 无效网格
    #[error("无效的网格: {message}")]
    InvalidGrid {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // 数值错误
    // ========================================================================
    /// 共享分解遇到零主元
    #[error("矩阵奇异: 阶段 {phase}, 时间步 {step}, 行 {row} (单元 {cell}), 主元 {pivot:e}")]
    Singular {
        /// 所在求解阶段
        phase: &'static str,
        /// 时间步序号
        step: usize,
        /// 出错的矩阵行
        row: usize,
        /// 对应的网格单元
        cell: usize,
        /// 主元值
        pivot: f64,
    },

    /// 残差或解出现 NaN/Inf
    #[error("数值爆炸: 场 {field}, 时间步 {step}, 单元 {cell}, 值 {value}")]
    NumericalBlowUp {
        /// 场名称
        field: &'static str,
        /// 时间步序号
        step: usize,
        /// 出错单元
        cell: usize,
        /// 非有限值
        value: f64,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl SoError {
    /// 带底层 IO 错误
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 无效网格
    pub fn invalid_grid(message: impl Into<String>) -> Self {
        Self::InvalidGrid {
            message: message.into(),
        }
    }

    /// 零主元
    pub fn singular(phase: &'static str, step: usize, row: usize, cell: usize, pivot: f64) -> Self {
        Self::Singular {
            phase,
            step,
            row,
            cell,
            pivot,
        }
    }

    /// 非有限值
    pub fn blow_up(field: &'static str, step: usize, cell: usize, value: f64) -> Self {
        Self::NumericalBlowUp {
            field,
            step,
            cell,
            value,
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 是否为致命的数值错误
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::Singular { .. } | Self::NumericalBlowUp { .. })
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl SoError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> SoResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查值严格为正且有限
    #[inline]
    pub fn check_positive(field: &'static str, value: f64) -> SoResult<()> {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(Self::out_of_range(field, value, f64::MIN_POSITIVE, f64::MAX))
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> SoResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for SoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SoError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_singular_names_step_and_cell() {
        let err = SoError::singular("Cfp", 7, 12, 12, 0.0);
        let msg = err.to_string();
        assert!(msg.contains("时间步 7"));
        assert!(msg.contains("单元 12"));
        assert!(err.is_numerical());
    }

    #[test]
    fn test_blow_up_is_numerical() {
        let err = SoError::blow_up("p0", 3, 5, f64::NAN);
        assert!(err.is_numerical());
        assert!(!SoError::config("x").is_numerical());
    }

    #[test]
    fn test_check_positive() {
        assert!(SoError::check_positive("perm", 1.0).is_ok());
        assert!(SoError::check_positive("perm", 0.0).is_err());
        assert!(SoError::check_positive("perm", -1.0).is_err());
        assert!(SoError::check_positive("perm", f64::INFINITY).is_err());
    }

    #[test]
    fn test_check_size_and_index() {
        assert!(SoError::check_size("p0", 10, 10).is_ok());
        assert!(SoError::check_size("p0", 10, 5).is_err());
        assert!(SoError::check_index("Cell", 5, 10).is_ok());
        assert!(SoError::check_index("Cell", 10, 10).is_err());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let so_err: SoError = io_err.into();
        assert!(matches!(so_err, SoError::Io { .. }));
    }
}
