// crates/so_config/src/error.rs

//! 配置层错误类型

use so_foundation::SoError;

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 无效值
    #[error("无效值 '{key}': {value} - {reason}")]
    InvalidValue {
        /// 配置键
        key: String,
        /// 配置值
        value: String,
        /// 原因
        reason: String,
    },

    /// 缺失配置
    #[error("缺失配置: {0}")]
    Missing(String),
}

impl ConfigError {
    /// 构造无效值错误
    pub fn invalid(key: impl Into<String>, value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for SoError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => SoError::io_with_source("读取配置失败", e),
            ConfigError::InvalidValue { key, value, reason } => {
                SoError::invalid_config(key, value, reason)
            }
            other => SoError::config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("grid.num_x", 0, "必须为正");
        assert!(err.to_string().contains("grid.num_x"));
    }

    #[test]
    fn test_into_so_error() {
        let err: SoError = ConfigError::invalid("skeleton.perm", -1.0, "必须为正").into();
        assert!(matches!(err, SoError::InvalidConfig { .. }));
        let err: SoError = ConfigError::Missing("wells".into()).into();
        assert!(matches!(err, SoError::Config { .. }));
    }
}
