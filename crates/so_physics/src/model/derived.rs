// crates/so_physics/src/model/derived.rs

//! 派生量：井产量/井底压力及其方差、渗透率场、流量与压力统计
//!
//! 记井所在单元为 w，`Δp = pwf - p0(w)`，`a = q/(G·KG(w))`，σ² 取 w 处的方差。
//! 对数正态修正因子为 `e^{σ²/2}`。
//!
//! 所有函数都是模型的纯函数，不缓存任何结果。

use so_foundation::{units, SoError, SoResult};
use so_grid::Axis;

use crate::model::state::MomentModel;
use crate::model::well::WellControl;

/// 一口井在当前时刻的统计量（工程单位）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WellReport {
    /// 内部单元 x 索引
    pub ix: usize,
    /// 内部单元 y 索引
    pub iy: usize,
    /// 是否定压
    pub pressure_controlled: bool,
    /// 产量 [m³/日]，正值为注入
    pub rate: f64,
    /// 产量标准差 [m³/日]
    pub rate_std: f64,
    /// 质量流量 [kg/日]
    pub mass_rate: f64,
    /// 井底压力 [bar]
    pub pwf: f64,
    /// 井底压力标准差 [bar]
    pub pwf_std: f64,
}

/// 单元渗透率统计 [mD]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermeabilityStat {
    /// 单元编号
    pub cell: usize,
    /// 均值 μ·exp(<Y>)
    pub mean: f64,
    /// 方差
    pub variance: f64,
    /// 标准差
    pub std: f64,
}

/// 单元沿某轴的流量统计 [m³/日]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxStat {
    /// 单元编号
    pub cell: usize,
    /// 坐标轴
    pub axis: Axis,
    /// 零阶流量 q0
    pub mean: f64,
    /// 二阶修正
    pub correction: f64,
    /// 方差 [(m³/日)²]
    pub variance: f64,
}

/// 单元压力统计 [bar]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureStat {
    /// 单元编号
    pub cell: usize,
    /// 平均压力 p0 + p2
    pub mean: f64,
    /// 方差 [bar²]
    pub variance: f64,
    /// 标准差
    pub std: f64,
}

fn std_of(variance: f64) -> f64 {
    if variance > 0.0 {
        variance.sqrt()
    } else {
        0.0
    }
}

impl MomentModel {
    fn well_checked(&self, well: usize) -> SoResult<usize> {
        SoError::check_index("well", well, self.wells().len())?;
        Ok(self.wells()[well].cell())
    }

    /// G·KG(w)
    fn well_conductance(&self, well: usize) -> f64 {
        let w = &self.wells()[well];
        w.geometric_factor() * self.coefficients().kg[w.cell()]
    }

    // =========================================================================
    // 井量（无量纲）
    // =========================================================================

    /// 当前产量
    ///
    /// 定产量井返回目标值；定压井为 `G·KG·[e^{σ²/2}Δp - p2 - Cfp[w][w]]`。
    pub fn get_rate(&self, well: usize) -> SoResult<f64> {
        let c = self.well_checked(well)?;
        Ok(match self.wells()[well].control() {
            WellControl::Rate(q) => q,
            WellControl::Pressure(pwf) => {
                let var = self.coefficients().variance[c];
                let dp = pwf - self.p0().next()[c];
                self.well_conductance(well)
                    * ((0.5 * var).exp() * dp - self.p2().next()[c] - self.cfp().next().get(c, c))
            }
        })
    }

    /// 当前井底压力
    ///
    /// 定压井返回目标值；定产量井为 `p0 + p2 + a·e^{σ²/2}`。
    pub fn get_pwf(&self, well: usize) -> SoResult<f64> {
        let c = self.well_checked(well)?;
        Ok(match self.wells()[well].control() {
            WellControl::Pressure(pwf) => pwf,
            WellControl::Rate(q) => {
                let var = self.coefficients().variance[c];
                let a = q / self.well_conductance(well);
                self.p0().next()[c] + self.p2().next()[c] + a * (0.5 * var).exp()
            }
        })
    }

    /// 第 slot 个历史时刻与当前时刻的产量协方差
    ///
    /// 两个时刻都定压时为
    /// `(G KG)²[σ²Δp_kΔp_n - Δp_k·Cfp_n[w][w] - Δp_n·Cfp_k[w][w] + Cp_k[w][w]]`，否则为 0。
    pub fn get_rate_covariance(&self, well: usize, slot: usize) -> SoResult<f64> {
        let c = self.well_checked(well)?;
        let history = self.history();
        let s = history
            .get(slot)
            .ok_or_else(|| SoError::index_out_of_bounds("history", slot, history.len()))?;
        let (then, now) = (s.controls[well], self.wells()[well].control());
        let (WellControl::Pressure(pk), WellControl::Pressure(pn)) = (then, now) else {
            return Ok(0.0);
        };
        let var = self.coefficients().variance[c];
        let dpk = pk - s.p0[c];
        let dpn = pn - self.p0().next()[c];
        let g = self.well_conductance(well);
        Ok(g * g
            * (var * dpk * dpn - dpk * self.cfp().next().get(c, c) - dpn * s.cfp.get(c, c)
                + s.cp.get(c, c)))
    }

    /// 第 slot 个历史时刻与当前时刻的井底压力协方差
    ///
    /// 两个时刻都定产量时为
    /// `Cp_k[w][w] - a_k·Cfp_n[w][w] - a_n·Cfp_k[w][w] + a_k a_n σ²`，否则为 0。
    pub fn get_pwf_covariance(&self, well: usize, slot: usize) -> SoResult<f64> {
        let c = self.well_checked(well)?;
        let history = self.history();
        let s = history
            .get(slot)
            .ok_or_else(|| SoError::index_out_of_bounds("history", slot, history.len()))?;
        let (then, now) = (s.controls[well], self.wells()[well].control());
        let (WellControl::Rate(qk), WellControl::Rate(qn)) = (then, now) else {
            return Ok(0.0);
        };
        let var = self.coefficients().variance[c];
        let g = self.well_conductance(well);
        let (ak, an) = (qk / g, qn / g);
        Ok(s.cp.get(c, c) - ak * self.cfp().next().get(c, c) - an * s.cfp.get(c, c) + ak * an * var)
    }

    /// 当前产量方差
    pub fn get_rate_variance(&self, well: usize) -> SoResult<f64> {
        self.get_rate_covariance(well, self.newest_slot()?)
    }

    /// 当前井底压力方差
    pub fn get_pwf_variance(&self, well: usize) -> SoResult<f64> {
        self.get_pwf_covariance(well, self.newest_slot()?)
    }

    fn newest_slot(&self) -> SoResult<usize> {
        self.history()
            .len()
            .checked_sub(1)
            .ok_or_else(|| SoError::internal("协方差历史为空，模型尚未初始化"))
    }

    /// 所有井的当前统计量（工程单位）
    pub fn well_reports(&self) -> SoResult<Vec<WellReport>> {
        let scaling = self.scaling();
        let per_day = |q: f64| units::per_second_to_per_day(scaling.rate_to_physical(q));
        let bar = |p: f64| units::pa_to_bar(scaling.pressure_to_physical(p));

        (0..self.wells().len())
            .map(|w| {
                let (ix, iy) = self.wells()[w].location();
                let rate = per_day(self.get_rate(w)?);
                let rate_std = per_day(std_of(self.get_rate_variance(w)?));
                let pwf_std = bar(std_of(self.get_pwf_variance(w)?));
                Ok(WellReport {
                    ix,
                    iy,
                    pressure_controlled: self.wells()[w].control().is_pressure(),
                    rate,
                    rate_std,
                    mass_rate: self.params().rho_stc * rate,
                    pwf: bar(self.get_pwf(w)?),
                    pwf_std,
                })
            })
            .collect()
    }

    // =========================================================================
    // 场统计
    // =========================================================================

    /// 内部单元渗透率均值与方差 [mD]
    pub fn permeability_field(&self) -> Vec<PermeabilityStat> {
        let scaling = self.scaling();
        let visc = self.params().visc;
        let coeffs = self.coefficients();
        self.grid()
            .interior_ids()
            .map(|cell| {
                let k = units::m2_to_milli_darcy(scaling.permeability_to_physical(visc * coeffs.kg[cell]));
                let variance = (coeffs.variance[cell].exp() - 1.0) * k * k;
                PermeabilityStat {
                    cell,
                    mean: k,
                    variance,
                    std: std_of(variance),
                }
            })
            .collect()
    }

    /// 内部单元沿两个坐标轴的流量统计
    ///
    /// `J = -∂p0`，`dCfp = ∂_y Cfp[x][y]|_{y=x}`，∂²Cp 取同时刻 Cp 的混合差分：
    ///
    /// - `q0 = KG·J·A`
    /// - 修正 `-KG(∂p2 + dCfp)A + q0·σ²/2`
    /// - 方差 `KG²A²(J²σ² - 2J·dCfp + ∂²Cp)`
    pub fn flux_statistics(&self) -> Vec<FluxStat> {
        let scaling = self.scaling();
        let per_day = |q: f64| units::per_second_to_per_day(scaling.rate_to_physical(q));
        let per_day2 = units::per_second_to_per_day(1.0).powi(2);
        let coeffs = self.coefficients();
        let p0 = self.p0().next();
        let p2 = self.p2().next();
        let cfp = self.cfp().next();
        let cp = self.history().newest().map(|s| &s.cp);
        let disc = self.discretization();

        let mut stats = Vec::new();
        for cell in self.grid().interior_ids() {
            let Some(pairs) = disc.pairs(cell) else {
                continue;
            };
            let geom = self.grid().cell(cell);
            for (pair, axis) in pairs.iter().zip([Axis::X, Axis::Y]) {
                let area = match axis {
                    Axis::X => geom.hy * geom.hz,
                    Axis::Y => geom.hx * geom.hz,
                };
                let d = |v: &[f64]| (v[pair.plus] - v[pair.minus]) * pair.inv_span;
                let j = -d(p0);
                let d_cfp = (cfp.get(cell, pair.plus) - cfp.get(cell, pair.minus)) * pair.inv_span;
                let d2_cp = cp.map_or(0.0, |m| {
                    (m.get(pair.plus, pair.plus) - m.get(pair.plus, pair.minus) - m.get(pair.minus, pair.plus)
                        + m.get(pair.minus, pair.minus))
                        * pair.inv_span
                        * pair.inv_span
                });
                let kg = coeffs.kg[cell];
                let var = coeffs.variance[cell];
                let q0 = kg * j * area;
                let correction = -kg * (d(p2) + d_cfp) * area + 0.5 * q0 * var;
                let variance = kg * kg * area * area * (j * j * var - 2.0 * j * d_cfp + d2_cp);
                stats.push(FluxStat {
                    cell,
                    axis,
                    mean: per_day(q0),
                    correction: per_day(correction),
                    variance: scaling.rate_variance_to_physical(variance) * per_day2,
                });
            }
        }
        stats
    }

    /// 内部单元压力均值与方差 [bar]
    pub fn pressure_statistics(&self) -> Vec<PressureStat> {
        let scaling = self.scaling();
        let p0 = self.p0().next();
        let p2 = self.p2().next();
        let cp = self.history().newest().map(|s| &s.cp);
        let bar2 = units::pa_to_bar(1.0).powi(2);
        self.grid()
            .interior_ids()
            .map(|cell| {
                let var = cp.map_or(0.0, |m| m.get(cell, cell));
                let variance = scaling.pressure_variance_to_physical(var) * bar2;
                PressureStat {
                    cell,
                    mean: units::pa_to_bar(scaling.pressure_to_physical(p0[cell] + p2[cell])),
                    variance,
                    std: std_of(variance),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use so_config::{Properties, WellConfig};

    fn model(well: WellConfig, sigma: f64) -> MomentModel {
        let mut props = Properties::default();
        props.grid.num_x = 5;
        props.grid.num_y = 5;
        props.covariance.sigma_f = sigma;
        props.wells = vec![well];
        let mut m = MomentModel::configure(&props).unwrap();
        m.initialize_state().unwrap();
        m
    }

    #[test]
    fn test_rate_well_reports_prescribed_rate() {
        let m = model(WellConfig::rate(2, 2, 50.0, 36_000.0), 0.2);
        let report = m.well_reports().unwrap();
        assert_relative_eq!(report[0].rate, 50.0, epsilon = 1e-9);
        assert_eq!(report[0].rate_std, 0.0);
        assert_relative_eq!(report[0].mass_rate, 50.0 * 887.261, epsilon = 1e-6);
        assert!(!report[0].pressure_controlled);
        // 初始时刻 Cp、Cfp 为零，井底压力标准差只来自 a²σ²
        assert!(report[0].pwf_std > 0.0);
        assert!(report[0].pwf > 100.0);
    }

    #[test]
    fn test_pressure_well_rate_sign() {
        let m = model(WellConfig::pressure(2, 2, 120.0, 36_000.0), 0.0);
        // 井底压力高于地层压力：注入，产量为正
        assert!(m.get_rate(0).unwrap() > 0.0);
        assert_relative_eq!(m.get_pwf(0).unwrap(), 1.2);
        assert_eq!(m.get_pwf_variance(0).unwrap(), 0.0);
        assert_eq!(m.get_rate_variance(0).unwrap(), 0.0);
    }

    #[test]
    fn test_unknown_well_is_error() {
        let m = model(WellConfig::rate(2, 2, 50.0, 36_000.0), 0.1);
        assert!(m.get_rate(3).is_err());
        assert!(m.get_rate_covariance(0, 5).is_err());
    }

    #[test]
    fn test_uniform_permeability_field() {
        let m = model(WellConfig::rate(2, 2, 50.0, 36_000.0), 0.0);
        let field = m.permeability_field();
        assert_eq!(field.len(), 25);
        for stat in &field {
            assert_relative_eq!(stat.mean, 100.0, epsilon = 1e-9);
            assert_eq!(stat.std, 0.0);
        }
    }

    #[test]
    fn test_permeability_variance_is_lognormal() {
        let m = model(WellConfig::rate(2, 2, 50.0, 36_000.0), 0.3);
        let stat = m.permeability_field()[0];
        assert_relative_eq!(stat.variance, (0.09_f64.exp() - 1.0) * 1e4, epsilon = 1e-6);
    }

    #[test]
    fn test_initial_flux_and_pressure_statistics_vanish() {
        let m = model(WellConfig::rate(2, 2, 50.0, 36_000.0), 0.2);
        let flux = m.flux_statistics();
        assert_eq!(flux.len(), 50);
        assert!(flux.iter().all(|f| f.mean == 0.0 && f.variance == 0.0));
        let pressure = m.pressure_statistics();
        assert!(pressure.iter().all(|p| p.std == 0.0));
        assert_relative_eq!(pressure[0].mean, 100.0, epsilon = 1e-9);
    }
}
