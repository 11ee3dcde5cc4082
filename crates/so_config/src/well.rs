// crates/so_config/src/well.rs

//! 井配置
//!
//! 每口井位于一个内部单元，按时段给出边界条件：定产量或定井底压力。
//! 所有井共享同一组时段长度，时段切换时积分器把时间步重置为最小值。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 时段控制方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// 定产量 [m³/日]，正值为注入
    Rate,
    /// 定井底压力 [bar]
    Pressure,
}

/// 单个时段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodConfig {
    /// 时段长度 [s]
    pub duration: f64,
    /// 控制方式
    pub control: ControlKind,
    /// 目标值（产量 m³/日 或压力 bar）
    pub value: f64,
}

/// 井配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellConfig {
    /// 内部单元 x 索引（从 0 开始，不含边界环）
    pub ix: usize,
    /// 内部单元 y 索引
    pub iy: usize,
    /// 井筒半径 [m]
    #[serde(default = "default_rw")]
    pub rw: f64,
    /// 时段制度
    pub periods: Vec<PeriodConfig>,
}

fn default_rw() -> f64 { 0.1 }

impl WellConfig {
    /// 定产量单时段井
    pub fn rate(ix: usize, iy: usize, rate: f64, duration: f64) -> Self {
        Self {
            ix,
            iy,
            rw: default_rw(),
            periods: vec![PeriodConfig {
                duration,
                control: ControlKind::Rate,
                value: rate,
            }],
        }
    }

    /// 定压单时段井
    pub fn pressure(ix: usize, iy: usize, pwf: f64, duration: f64) -> Self {
        Self {
            ix,
            iy,
            rw: default_rw(),
            periods: vec![PeriodConfig {
                duration,
                control: ControlKind::Pressure,
                value: pwf,
            }],
        }
    }

    /// 各时段的累计结束时刻 [s]
    pub fn period_ends(&self) -> Vec<f64> {
        self.periods
            .iter()
            .scan(0.0, |t, p| {
                *t += p.duration;
                Some(*t)
            })
            .collect()
    }

    /// 检查单井配置
    pub(crate) fn validate(&self, index: usize, num_x: usize, num_y: usize) -> Result<(), ConfigError> {
        let key = |field: &str| format!("wells[{}].{}", index, field);

        if self.ix >= num_x || self.iy >= num_y {
            return Err(ConfigError::invalid(
                key("ix/iy"),
                format!("({}, {})", self.ix, self.iy),
                format!("井必须位于内部单元 {}x{} 之内", num_x, num_y),
            ));
        }
        if !(self.rw > 0.0) {
            return Err(ConfigError::invalid(key("rw"), self.rw, "井筒半径必须为正"));
        }
        if self.periods.is_empty() {
            return Err(ConfigError::Missing(key("periods")));
        }
        for (i, period) in self.periods.iter().enumerate() {
            if !(period.duration > 0.0) {
                return Err(ConfigError::invalid(
                    key(&format!("periods[{}].duration", i)),
                    period.duration,
                    "时段长度必须为正",
                ));
            }
            if !period.value.is_finite() {
                return Err(ConfigError::invalid(
                    key(&format!("periods[{}].value", i)),
                    period.value,
                    "目标值必须有限",
                ));
            }
            if period.control == ControlKind::Pressure && !(period.value > 0.0) {
                return Err(ConfigError::invalid(
                    key(&format!("periods[{}].value", i)),
                    period.value,
                    "井底压力必须为正",
                ));
            }
        }
        Ok(())
    }
}
