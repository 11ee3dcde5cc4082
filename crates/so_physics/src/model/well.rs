// crates/so_physics/src/model/well.rs

//! 井模型
//!
//! Peaceman 等效半径 `r_eq = 0.28·sqrt(hx² + hy²)/2`，几何因子
//! `G = 2π·hz / ln(r_eq / rw)`，井指数 `WI = G·k_w`。
//! 定压井在方程中贡献 `W(h - pwf)`，其中 `W = G/V`：
//! 井的流度与单元流度相同，除以 KG 后相互抵消。

use std::f64::consts::PI;

use so_config::{ControlKind, WellConfig};
use so_foundation::{units, Scaling, SoError, SoResult};

/// 当前时段的边界条件（无量纲）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WellControl {
    /// 定产量，正值为注入
    Rate(f64),
    /// 定井底压力
    Pressure(f64),
}

impl WellControl {
    /// 是否为定压
    pub fn is_pressure(&self) -> bool {
        matches!(self, Self::Pressure(_))
    }

    /// 目标值
    pub fn value(&self) -> f64 {
        match *self {
            Self::Rate(q) | Self::Pressure(q) => q,
        }
    }
}

/// 一口井
#[derive(Debug, Clone)]
pub struct Well {
    cell: usize,
    ix: usize,
    iy: usize,
    rw: f64,
    r_eq: f64,
    geometric_factor: f64,
    schedule: Vec<WellControl>,
    active: WellControl,
    well_index: f64,
    conditioned: bool,
}

impl Well {
    /// 由配置构造（几何量已无量纲化）
    ///
    /// # 参数
    ///
    /// - `config`: 井配置
    /// - `cell`: 所在单元编号
    /// - `spacing`: 无量纲单元尺寸 (hx, hy, hz)
    /// - `scaling`: 参考量
    pub fn from_config(
        config: &WellConfig,
        cell: usize,
        spacing: (f64, f64, f64),
        scaling: &Scaling,
    ) -> SoResult<Self> {
        let (hx, hy, hz) = spacing;
        let rw = scaling.length_to_dimensionless(config.rw);
        let r_eq = 0.28 * (hx * hx + hy * hy).sqrt() / 2.0;
        if !(rw > 0.0 && rw < r_eq) {
            return Err(SoError::invalid_config(
                format!("wells({}, {}).rw", config.ix, config.iy),
                config.rw.to_string(),
                "井筒半径必须位于 (0, r_eq)",
            ));
        }

        let schedule: Vec<WellControl> = config
            .periods
            .iter()
            .map(|p| match p.control {
                ControlKind::Rate => WellControl::Rate(
                    scaling.rate_to_dimensionless(units::per_day_to_per_second(p.value)),
                ),
                ControlKind::Pressure => WellControl::Pressure(
                    scaling.pressure_to_dimensionless(units::bar_to_pa(p.value)),
                ),
            })
            .collect();
        let active = *schedule
            .first()
            .ok_or_else(|| SoError::config(format!("井 ({}, {}) 没有时段", config.ix, config.iy)))?;

        Ok(Self {
            cell,
            ix: config.ix,
            iy: config.iy,
            rw,
            r_eq,
            geometric_factor: 2.0 * PI * hz / (r_eq / rw).ln(),
            schedule,
            active,
            well_index: 0.0,
            conditioned: false,
        })
    }

    /// 所在单元
    #[inline]
    pub fn cell(&self) -> usize {
        self.cell
    }

    /// 内部单元索引 (ix, iy)
    pub fn location(&self) -> (usize, usize) {
        (self.ix, self.iy)
    }

    /// 井筒半径（无量纲）
    pub fn rw(&self) -> f64 {
        self.rw
    }

    /// Peaceman 等效半径（无量纲）
    pub fn equivalent_radius(&self) -> f64 {
        self.r_eq
    }

    /// 几何因子 G
    #[inline]
    pub fn geometric_factor(&self) -> f64 {
        self.geometric_factor
    }

    /// 井指数 WI = G·k_w
    pub fn well_index(&self) -> f64 {
        self.well_index
    }

    /// 是否位于实测单元
    pub fn is_conditioning(&self) -> bool {
        self.conditioned
    }

    /// 当前边界条件
    #[inline]
    pub fn control(&self) -> WellControl {
        self.active
    }

    /// 按井所在单元的有效流度设置井指数
    pub(crate) fn set_effective_mobility(&mut self, mobility: f64, conditioned: bool) {
        self.well_index = self.geometric_factor * mobility;
        self.conditioned = conditioned;
    }

    /// 切换到第 period 个时段，超出范围时沿用最后一个时段
    pub(crate) fn activate(&mut self, period: usize) {
        if let Some(control) = self.schedule.get(period).or_else(|| self.schedule.last()) {
            self.active = *control;
        }
    }

    /// 定压井耦合系数 W = G/V
    #[inline]
    pub fn coupling(&self, volume: f64) -> f64 {
        match self.active {
            WellControl::Pressure(_) => self.geometric_factor / volume,
            WellControl::Rate(_) => 0.0,
        }
    }

    /// 定产量井源项 q/(V·KG)
    #[inline]
    pub fn rate_source(&self, volume: f64, kg: f64) -> f64 {
        match self.active {
            WellControl::Rate(q) => q / (volume * kg),
            WellControl::Pressure(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use so_config::PeriodConfig;

    fn scaling() -> Scaling {
        Scaling::new(1e7, 100.0, 3600.0).unwrap()
    }

    #[test]
    fn test_peaceman_geometry() {
        let config = WellConfig::rate(2, 2, 50.0, 3600.0);
        let well = Well::from_config(&config, 24, (1.0, 1.0, 0.01), &scaling()).unwrap();
        let r_eq = 0.28 * 2.0_f64.sqrt() / 2.0;
        assert_relative_eq!(well.equivalent_radius(), r_eq);
        assert_relative_eq!(well.rw(), 0.001);
        assert_relative_eq!(well.geometric_factor(), 2.0 * PI * 0.01 / (r_eq / 0.001).ln());
    }

    #[test]
    fn test_rate_scaled_to_dimensionless() {
        let config = WellConfig::rate(0, 0, 86.4, 3600.0);
        let well = Well::from_config(&config, 7, (1.0, 1.0, 1.0), &scaling()).unwrap();
        // 86.4 m³/日 = 1e-3 m³/s，q_dim = 1e6/3600
        assert_relative_eq!(well.control().value(), 1e-3 * 3600.0 / 1e6, epsilon = 1e-15);
        assert_relative_eq!(well.rate_source(2.0, 0.5), well.control().value());
        assert_eq!(well.coupling(1.0), 0.0);
    }

    #[test]
    fn test_activate_switches_control() {
        let mut config = WellConfig::rate(0, 0, 10.0, 3600.0);
        config.periods.push(PeriodConfig {
            duration: 3600.0,
            control: ControlKind::Pressure,
            value: 50.0,
        });
        let mut well = Well::from_config(&config, 7, (1.0, 1.0, 1.0), &scaling()).unwrap();
        assert!(!well.control().is_pressure());
        well.activate(1);
        assert!(well.control().is_pressure());
        assert_relative_eq!(well.control().value(), 0.5);
        assert!(well.coupling(2.0) > 0.0);
        assert_eq!(well.rate_source(1.0, 1.0), 0.0);
    }

    #[test]
    fn test_rejects_large_wellbore() {
        let mut config = WellConfig::rate(0, 0, 10.0, 3600.0);
        config.rw = 30.0;
        assert!(Well::from_config(&config, 7, (1.0, 1.0, 1.0), &scaling()).is_err());
    }
}
