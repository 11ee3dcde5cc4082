// crates/so_config/src/properties.rs

//! Properties - 模拟配置
//!
//! 定义矩方程模拟的全部输入参数。默认值对应参考算例：
//! 100×100 个 100 m 单元、初始压力 100 bar、渗透率 100 mD、
//! 中心一口 50 m³/日 注入井持续 100 小时。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::well::WellConfig;

/// 模拟配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Properties {
    /// 网格
    #[serde(default)]
    pub grid: GridConfig,

    /// 无量纲化参考量
    #[serde(default)]
    pub scaling: ScalingConfig,

    /// 时间步控制
    #[serde(default)]
    pub time: TimeConfig,

    /// 岩石骨架物性
    #[serde(default)]
    pub skeleton: SkeletonConfig,

    /// 流体物性
    #[serde(default)]
    pub oil: OilConfig,

    /// 对数渗透率先验协方差
    #[serde(default)]
    pub covariance: CovarianceConfig,

    /// 渗透率实测值（条件化点）
    #[serde(default)]
    pub conditions: Vec<Measurement>,

    /// 井列表
    #[serde(default = "default_wells")]
    pub wells: Vec<WellConfig>,
}

fn default_wells() -> Vec<WellConfig> {
    let grid = GridConfig::default();
    vec![WellConfig::rate(grid.num_x / 2, grid.num_y / 2, 50.0, 100.0 * 3600.0)]
}

/// 网格配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// x 方向内部单元数
    #[serde(default = "default_num")]
    pub num_x: usize,
    /// y 方向内部单元数
    #[serde(default = "default_num")]
    pub num_y: usize,
    /// x 方向单元尺寸 [m]
    #[serde(default = "default_h")]
    pub hx: f64,
    /// y 方向单元尺寸 [m]
    #[serde(default = "default_h")]
    pub hy: f64,
    /// 层厚 [m]
    #[serde(default = "default_hz")]
    pub hz: f64,
}

fn default_num() -> usize { 100 }
fn default_h() -> f64 { 100.0 }
fn default_hz() -> f64 { 1.0 }

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            num_x: default_num(),
            num_y: default_num(),
            hx: default_h(),
            hy: default_h(),
            hz: default_hz(),
        }
    }
}

/// 无量纲化参考量（参考压力取初始压力）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// 参考长度 [m]
    #[serde(default = "default_h")]
    pub r_dim: f64,
    /// 参考时间 [s]
    #[serde(default = "default_t_dim")]
    pub t_dim: f64,
}

fn default_t_dim() -> f64 { 3600.0 }

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            r_dim: default_h(),
            t_dim: default_t_dim(),
        }
    }
}

/// 时间步控制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// 初始时间步 [s]
    #[serde(default = "default_ht")]
    pub ht: f64,
    /// 最小时间步 [s]
    #[serde(default = "default_ht")]
    pub ht_min: f64,
    /// 最大时间步 [s]
    #[serde(default = "default_ht_max")]
    pub ht_max: f64,
    /// 步长策略
    #[serde(default)]
    pub step_policy: StepPolicyConfig,
}

fn default_ht() -> f64 { 1000.0 }
fn default_ht_max() -> f64 { 1.0e6 }

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            ht: default_ht(),
            ht_min: default_ht(),
            ht_max: default_ht_max(),
            step_policy: StepPolicyConfig::default(),
        }
    }
}

/// 步长策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepPolicyConfig {
    /// 每步按固定因子增长
    Geometric {
        /// 增长因子，范围 [1.5, 2]
        factor: f64,
    },
    /// 按上一步 Newton 迭代次数增减
    IterationAdaptive {
        /// 增减因子，范围 [1.5, 2]
        factor: f64,
        /// 目标迭代次数
        target_iterations: usize,
    },
}

impl Default for StepPolicyConfig {
    fn default() -> Self {
        Self::Geometric { factor: 2.0 }
    }
}

impl StepPolicyConfig {
    /// 增减因子
    pub fn factor(&self) -> f64 {
        match *self {
            Self::Geometric { factor } | Self::IterationAdaptive { factor, .. } => factor,
        }
    }
}

/// 岩石骨架物性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonConfig {
    /// 孔隙度
    #[serde(default = "default_porosity")]
    pub porosity: f64,
    /// 初始压力 [bar]
    #[serde(default = "default_pressure")]
    pub p_init: f64,
    /// 外边界压力 [bar]
    #[serde(default = "default_pressure")]
    pub p_out: f64,
    /// 骨架压缩系数 [1/Pa]
    #[serde(default = "default_beta_sk")]
    pub beta: f64,
    /// 平均渗透率（几何平均） [mD]
    #[serde(default = "default_perm")]
    pub perm: f64,
    /// ln k 的线性趋势 [1/m]，`[gx, gy]`
    #[serde(default)]
    pub perm_grd: [f64; 2],
}

fn default_porosity() -> f64 { 0.1 }
fn default_pressure() -> f64 { 100.0 }
fn default_beta_sk() -> f64 { 4.0e-10 }
fn default_perm() -> f64 { 100.0 }

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            porosity: default_porosity(),
            p_init: default_pressure(),
            p_out: default_pressure(),
            beta: default_beta_sk(),
            perm: default_perm(),
            perm_grd: [0.0, 0.0],
        }
    }
}

/// 流体物性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OilConfig {
    /// 粘度 [cP]
    #[serde(default = "default_visc")]
    pub visc: f64,
    /// 地面密度 [kg/m³]
    #[serde(default = "default_rho_stc")]
    pub rho_stc: f64,
    /// 流体压缩系数 [1/Pa]
    #[serde(default = "default_beta_oil")]
    pub beta: f64,
}

fn default_visc() -> f64 { 1.0 }
fn default_rho_stc() -> f64 { 887.261 }
fn default_beta_oil() -> f64 { 1.0e-9 }

impl Default for OilConfig {
    fn default() -> Self {
        Self {
            visc: default_visc(),
            rho_stc: default_rho_stc(),
            beta: default_beta_oil(),
        }
    }
}

/// 对数渗透率先验协方差与协方差历史
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovarianceConfig {
    /// ln k 标准差
    #[serde(default = "default_sigma_f")]
    pub sigma_f: f64,
    /// 相关长度 [m]
    #[serde(default = "default_l_f")]
    pub l_f: f64,
    /// 保留的 Cp 历史步数
    #[serde(default = "default_possible_steps")]
    pub possible_steps_num: usize,
    /// 超过该步数后只重算最新的 Cp
    #[serde(default = "default_simple_approx")]
    pub start_time_simple_approx: usize,
}

fn default_sigma_f() -> f64 { 0.1 }
fn default_l_f() -> f64 { 200.0 }
fn default_possible_steps() -> usize { 10 }
fn default_simple_approx() -> usize { 3 }

impl Default for CovarianceConfig {
    fn default() -> Self {
        Self {
            sigma_f: default_sigma_f(),
            l_f: default_l_f(),
            possible_steps_num: default_possible_steps(),
            start_time_simple_approx: default_simple_approx(),
        }
    }
}

/// 渗透率实测值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// 内部单元 x 索引
    pub ix: usize,
    /// 内部单元 y 索引
    pub iy: usize,
    /// 实测渗透率 [mD]
    pub perm: f64,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            scaling: ScalingConfig::default(),
            time: TimeConfig::default(),
            skeleton: SkeletonConfig::default(),
            oil: OilConfig::default(),
            covariance: CovarianceConfig::default(),
            conditions: Vec::new(),
            wells: default_wells(),
        }
    }
}

fn positive(key: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, value, "必须为正且有限"))
    }
}

impl Properties {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json(&content)
    }

    /// 从 JSON 字符串加载配置
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let props: Properties =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        props.validate()?;
        Ok(props)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 模拟总时长 [s]，即所有时段长度之和
    pub fn horizon(&self) -> f64 {
        self.wells
            .first()
            .map(|w| w.periods.iter().map(|p| p.duration).sum())
            .unwrap_or(0.0)
    }

    /// 单元总数（含边界环）
    pub fn cell_count(&self) -> usize {
        (self.grid.num_x + 2) * (self.grid.num_y + 2)
    }

    /// Peaceman 等效半径 [m]
    pub fn peaceman_radius(&self) -> f64 {
        0.28 * (self.grid.hx * self.grid.hx + self.grid.hy * self.grid.hy).sqrt() / 2.0
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 网格
        if self.grid.num_x == 0 || self.grid.num_y == 0 {
            return Err(ConfigError::invalid(
                "grid.num_x/num_y",
                format!("{}x{}", self.grid.num_x, self.grid.num_y),
                "单元数必须为正",
            ));
        }
        positive("grid.hx", self.grid.hx)?;
        positive("grid.hy", self.grid.hy)?;
        positive("grid.hz", self.grid.hz)?;
        positive("scaling.r_dim", self.scaling.r_dim)?;
        positive("scaling.t_dim", self.scaling.t_dim)?;

        // 时间步
        positive("time.ht_min", self.time.ht_min)?;
        positive("time.ht_max", self.time.ht_max)?;
        if self.time.ht_min > self.time.ht_max {
            return Err(ConfigError::invalid(
                "time.ht_min",
                self.time.ht_min,
                format!("不能大于 ht_max = {}", self.time.ht_max),
            ));
        }
        if self.time.ht < self.time.ht_min || self.time.ht > self.time.ht_max {
            return Err(ConfigError::invalid(
                "time.ht",
                self.time.ht,
                "初始时间步必须位于 [ht_min, ht_max]",
            ));
        }
        let factor = self.time.step_policy.factor();
        if !(1.5..=2.0).contains(&factor) {
            return Err(ConfigError::invalid(
                "time.step_policy.factor",
                factor,
                "增长因子必须在 [1.5, 2] 范围内",
            ));
        }

        // 物性
        if !(self.skeleton.porosity > 0.0 && self.skeleton.porosity <= 1.0) {
            return Err(ConfigError::invalid(
                "skeleton.porosity",
                self.skeleton.porosity,
                "孔隙度必须在 (0, 1] 范围内",
            ));
        }
        positive("skeleton.p_init", self.skeleton.p_init)?;
        positive("skeleton.p_out", self.skeleton.p_out)?;
        positive("skeleton.perm", self.skeleton.perm)?;
        if self.skeleton.beta < 0.0 || self.oil.beta < 0.0 {
            return Err(ConfigError::invalid(
                "skeleton.beta/oil.beta",
                format!("{}/{}", self.skeleton.beta, self.oil.beta),
                "压缩系数不能为负",
            ));
        }
        if self.skeleton.beta + self.oil.beta <= 0.0 {
            return Err(ConfigError::invalid(
                "skeleton.beta/oil.beta",
                0.0,
                "总压缩系数必须为正",
            ));
        }
        if !self.skeleton.perm_grd.iter().all(|g| g.is_finite()) {
            return Err(ConfigError::invalid(
                "skeleton.perm_grd",
                format!("{:?}", self.skeleton.perm_grd),
                "趋势必须有限",
            ));
        }
        positive("oil.visc", self.oil.visc)?;
        positive("oil.rho_stc", self.oil.rho_stc)?;

        // 协方差
        if !(self.covariance.sigma_f >= 0.0 && self.covariance.sigma_f.is_finite()) {
            return Err(ConfigError::invalid(
                "covariance.sigma_f",
                self.covariance.sigma_f,
                "标准差不能为负",
            ));
        }
        if self.covariance.sigma_f > 0.0 {
            positive("covariance.l_f", self.covariance.l_f)?;
        }
        if self.covariance.possible_steps_num == 0 {
            return Err(ConfigError::invalid(
                "covariance.possible_steps_num",
                0,
                "至少保留一个协方差历史步",
            ));
        }

        // 条件化点
        let mut seen = HashSet::new();
        for (i, m) in self.conditions.iter().enumerate() {
            if m.ix >= self.grid.num_x || m.iy >= self.grid.num_y {
                return Err(ConfigError::invalid(
                    format!("conditions[{}]", i),
                    format!("({}, {})", m.ix, m.iy),
                    "实测点必须位于内部单元之内",
                ));
            }
            positive(&format!("conditions[{}].perm", i), m.perm)?;
            if !seen.insert((m.ix, m.iy)) {
                return Err(ConfigError::invalid(
                    format!("conditions[{}]", i),
                    format!("({}, {})", m.ix, m.iy),
                    "同一单元不能有两个实测值",
                ));
            }
        }

        // 井
        let first = self.wells.first().ok_or_else(|| ConfigError::Missing("wells".into()))?;
        let r_eq = self.peaceman_radius();
        let mut occupied = HashSet::new();
        for (i, well) in self.wells.iter().enumerate() {
            well.validate(i, self.grid.num_x, self.grid.num_y)?;
            if !occupied.insert((well.ix, well.iy)) {
                return Err(ConfigError::invalid(
                    format!("wells[{}]", i),
                    format!("({}, {})", well.ix, well.iy),
                    "同一单元不能有两口井",
                ));
            }
            if well.rw >= r_eq {
                return Err(ConfigError::invalid(
                    format!("wells[{}].rw", i),
                    well.rw,
                    format!("井筒半径必须小于 Peaceman 等效半径 {:.4} m", r_eq),
                ));
            }
            let same_schedule = well.periods.len() == first.periods.len()
                && well
                    .periods
                    .iter()
                    .zip(&first.periods)
                    .all(|(a, b)| (a.duration - b.duration).abs() <= 1e-9 * b.duration);
            if !same_schedule {
                return Err(ConfigError::invalid(
                    format!("wells[{}].periods", i),
                    well.periods.len(),
                    "所有井必须使用相同的时段长度",
                ));
            }
        }

        Ok(())
    }
}
