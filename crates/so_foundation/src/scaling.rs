// crates/so_foundation/src/scaling.rs

//! 无量纲化参考量
//!
//! 所有存储的场均为无量纲量。参考量：
//!
//! - 压力 `p_dim`：初始油藏压力 [Pa]
//! - 长度 `r_dim` [m]
//! - 时间 `t_dim` [s]
//! - 流量 `q_dim = r_dim³ / t_dim` [m³/s]
//!
//! 每个 `*_to_dimensionless` 都有精确的逆变换 `*_to_physical`。

use serde::{Deserialize, Serialize};

use crate::error::{SoError, SoResult};

/// 无量纲化参考量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    p_dim: f64,
    r_dim: f64,
    t_dim: f64,
    q_dim: f64,
}

impl Scaling {
    /// 创建参考量
    ///
    /// 参考压力、长度或时间非正时返回配置错误。
    pub fn new(p_dim: f64, r_dim: f64, t_dim: f64) -> SoResult<Self> {
        if !(p_dim > 0.0 && p_dim.is_finite()) {
            return Err(SoError::invalid_config(
                "p_dim",
                p_dim.to_string(),
                "参考压力必须为正",
            ));
        }
        SoError::check_positive("r_dim", r_dim)?;
        SoError::check_positive("t_dim", t_dim)?;
        Ok(Self {
            p_dim,
            r_dim,
            t_dim,
            q_dim: r_dim * r_dim * r_dim / t_dim,
        })
    }

    /// 参考压力 [Pa]
    pub fn p_dim(&self) -> f64 {
        self.p_dim
    }

    /// 参考长度 [m]
    pub fn r_dim(&self) -> f64 {
        self.r_dim
    }

    /// 参考时间 [s]
    pub fn t_dim(&self) -> f64 {
        self.t_dim
    }

    /// 参考流量 [m³/s]
    pub fn q_dim(&self) -> f64 {
        self.q_dim
    }

    // 压力

    /// Pa → 无量纲
    #[inline]
    pub fn pressure_to_dimensionless(&self, p: f64) -> f64 {
        p / self.p_dim
    }

    /// 无量纲 → Pa
    #[inline]
    pub fn pressure_to_physical(&self, p: f64) -> f64 {
        p * self.p_dim
    }

    /// 无量纲压力方差 → Pa²
    #[inline]
    pub fn pressure_variance_to_physical(&self, var: f64) -> f64 {
        var * self.p_dim * self.p_dim
    }

    // 长度与时间

    /// m → 无量纲
    #[inline]
    pub fn length_to_dimensionless(&self, x: f64) -> f64 {
        x / self.r_dim
    }

    /// 无量纲 → m
    #[inline]
    pub fn length_to_physical(&self, x: f64) -> f64 {
        x * self.r_dim
    }

    /// s → 无量纲
    #[inline]
    pub fn time_to_dimensionless(&self, t: f64) -> f64 {
        t / self.t_dim
    }

    /// 无量纲 → s
    #[inline]
    pub fn time_to_physical(&self, t: f64) -> f64 {
        t * self.t_dim
    }

    // 流量

    /// m³/s → 无量纲
    #[inline]
    pub fn rate_to_dimensionless(&self, q: f64) -> f64 {
        q / self.q_dim
    }

    /// 无量纲 → m³/s
    #[inline]
    pub fn rate_to_physical(&self, q: f64) -> f64 {
        q * self.q_dim
    }

    /// 流量方差 → (m³/s)²
    #[inline]
    pub fn rate_variance_to_physical(&self, var: f64) -> f64 {
        var * self.q_dim * self.q_dim
    }

    // 物性

    /// 渗透率 m² → 无量纲
    #[inline]
    pub fn permeability_to_dimensionless(&self, k: f64) -> f64 {
        k / (self.r_dim * self.r_dim)
    }

    /// 渗透率 无量纲 → m²
    #[inline]
    pub fn permeability_to_physical(&self, k: f64) -> f64 {
        k * self.r_dim * self.r_dim
    }

    /// 粘度 Pa·s → 无量纲
    #[inline]
    pub fn viscosity_to_dimensionless(&self, mu: f64) -> f64 {
        mu / (self.p_dim * self.t_dim)
    }

    /// 粘度 无量纲 → Pa·s
    #[inline]
    pub fn viscosity_to_physical(&self, mu: f64) -> f64 {
        mu * self.p_dim * self.t_dim
    }

    /// 压缩系数 1/Pa → 无量纲
    #[inline]
    pub fn compressibility_to_dimensionless(&self, beta: f64) -> f64 {
        beta * self.p_dim
    }

    /// 压缩系数 无量纲 → 1/Pa
    #[inline]
    pub fn compressibility_to_physical(&self, beta: f64) -> f64 {
        beta / self.p_dim
    }

    /// 密度 kg/m³ → 无量纲
    #[inline]
    pub fn density_to_dimensionless(&self, rho: f64) -> f64 {
        rho / (self.p_dim * self.t_dim * self.t_dim / (self.r_dim * self.r_dim))
    }

    /// 密度 无量纲 → kg/m³
    #[inline]
    pub fn density_to_physical(&self, rho: f64) -> f64 {
        rho * (self.p_dim * self.t_dim * self.t_dim / (self.r_dim * self.r_dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units;
    use approx::assert_relative_eq;

    fn reference() -> Scaling {
        Scaling::new(100.0 * units::BAR_TO_PA, 100.0, 3600.0).unwrap()
    }

    #[test]
    fn test_rejects_non_positive_reference_pressure() {
        assert!(Scaling::new(0.0, 100.0, 3600.0).is_err());
        assert!(Scaling::new(-1.0, 100.0, 3600.0).is_err());
        assert!(Scaling::new(f64::NAN, 100.0, 3600.0).is_err());
    }

    #[test]
    fn test_q_dim() {
        let s = reference();
        assert_relative_eq!(s.q_dim(), 1.0e6 / 3600.0, max_relative = 1e-15);
    }

    #[test]
    fn test_round_trips() {
        let s = reference();
        let p = 87.5 * units::BAR_TO_PA;
        assert_relative_eq!(s.pressure_to_physical(s.pressure_to_dimensionless(p)), p, max_relative = 1e-15);

        let k = units::milli_darcy_to_m2(100.0);
        assert_relative_eq!(s.permeability_to_physical(s.permeability_to_dimensionless(k)), k, max_relative = 1e-15);

        let mu = units::cp_to_pa_s(1.0);
        assert_relative_eq!(s.viscosity_to_physical(s.viscosity_to_dimensionless(mu)), mu, max_relative = 1e-15);

        let q = units::per_day_to_per_second(50.0);
        assert_relative_eq!(s.rate_to_physical(s.rate_to_dimensionless(q)), q, max_relative = 1e-15);

        assert_relative_eq!(s.time_to_physical(s.time_to_dimensionless(1000.0)), 1000.0, max_relative = 1e-15);
        assert_relative_eq!(s.length_to_physical(s.length_to_dimensionless(0.1)), 0.1, max_relative = 1e-15);
        assert_relative_eq!(
            s.compressibility_to_physical(s.compressibility_to_dimensionless(4e-10)),
            4e-10,
            max_relative = 1e-15
        );
        assert_relative_eq!(s.density_to_physical(s.density_to_dimensionless(887.261)), 887.261, max_relative = 1e-14);
    }
}
