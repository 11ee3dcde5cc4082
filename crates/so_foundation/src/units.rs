// crates/so_foundation/src/units.rs

//! 物理单位常量与换算
//!
//! 配置文件使用油藏工程习惯单位（bar、mD、cP、m³/日），
//! 内部计算统一使用 SI 单位后再无量纲化。

/// 1 bar 对应的帕斯卡数
pub const BAR_TO_PA: f64 = 1.0e5;

/// 1 mD 对应的平方米数
pub const MILLI_DARCY_TO_M2: f64 = 9.869_233e-16;

/// 1 cP 对应的 Pa·s 数
pub const CP_TO_PA_S: f64 = 1.0e-3;

/// 一天的秒数
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// 一小时的秒数
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

/// bar → Pa
#[inline]
pub fn bar_to_pa(p: f64) -> f64 {
    p * BAR_TO_PA
}

/// Pa → bar
#[inline]
pub fn pa_to_bar(p: f64) -> f64 {
    p / BAR_TO_PA
}

/// mD → m²
#[inline]
pub fn milli_darcy_to_m2(k: f64) -> f64 {
    k * MILLI_DARCY_TO_M2
}

/// m² → mD
#[inline]
pub fn m2_to_milli_darcy(k: f64) -> f64 {
    k / MILLI_DARCY_TO_M2
}

/// cP → Pa·s
#[inline]
pub fn cp_to_pa_s(mu: f64) -> f64 {
    mu * CP_TO_PA_S
}

/// m³/日 → m³/s
#[inline]
pub fn per_day_to_per_second(q: f64) -> f64 {
    q / SECONDS_PER_DAY
}

/// m³/s → m³/日
#[inline]
pub fn per_second_to_per_day(q: f64) -> f64 {
    q * SECONDS_PER_DAY
}
