// crates/so_physics/src/model/state.rs

//! 矩方程状态模型
//!
//! [`MomentModel`] 持有无量纲物性、先验协方差、井以及四个场，
//! 只提供物理方程求值，不涉及 Newton 迭代或线性代数。
//!
//! # 生命周期
//!
//! 1. [`MomentModel::configure`]: 校验配置并无量纲化
//! 2. [`MomentModel::initialize_state`]: 先验/条件化、井指数、场清零
//! 3. 每个时间步由积分器按 `p0 → Cfp → p2 → Cp` 的顺序取出各场的求解问题，
//!    最后 [`MomentModel::commit_step`]

use std::sync::Arc;

use so_config::{Properties, StepPolicyConfig};
use so_foundation::{units, Scaling, SoError, SoResult};
use so_grid::StructuredGrid;

use crate::model::covariance::{LogPermeability, PriorParams};
use crate::model::discretization::Discretization;
use crate::model::fields::{
    CovarianceHistory, CovarianceSlot, LinearField, NewtonLayers, ScalarField,
};
use crate::model::residual::{
    second_order_drive, CellCoefficients, CovarianceResidual, CrossCovarianceResidual, MeanDrive,
    MeanPressureResidual, ResidualContext, SecondOrderResidual,
};
use crate::model::well::{Well, WellControl};
use crate::numerics::autodiff::{DifferentiableResidual, Scalar};
use crate::numerics::linear_algebra::DenseMatrix;

/// 无量纲物理与数值参数
#[derive(Debug, Clone)]
pub struct PhysicalParams {
    /// 储存系数 S = φ(β_sk + β_oil)
    pub storage: f64,
    /// ln(k/μ) 基准值
    pub log_mobility: f64,
    /// 粘度
    pub visc: f64,
    /// 地面密度 [kg/m³]，仅用于输出质量流量
    pub rho_stc: f64,
    /// 初始压力
    pub p_init: f64,
    /// 边界压力
    pub p_out: f64,
    /// ln k 的线性趋势
    pub trend: [f64; 2],
    /// 对数渗透率标准差
    pub sigma: f64,
    /// 相关长度
    pub corr_len: f64,
    /// 初始时间步
    pub ht: f64,
    /// 最小时间步
    pub ht_min: f64,
    /// 最大时间步
    pub ht_max: f64,
    /// 时间步策略
    pub step_policy: StepPolicyConfig,
    /// 时段累计结束时刻
    pub period_ends: Vec<f64>,
    /// Cp 历史槽位数
    pub possible_steps_num: usize,
    /// 超过该步数后只重算最新槽位
    pub start_time_simple_approx: usize,
}

/// 一个 Newton 求解问题：残差与可写的两层
pub struct NewtonProblem<'a, R> {
    /// 残差
    pub residual: R,
    /// iteration / next 两层
    pub layers: NewtonLayers<'a>,
    /// 体积权重
    pub weights: &'a [f64],
}

/// Cfp 求解问题
pub struct CrossCovarianceProblem<'a> {
    ctx: ResidualContext<'a>,
    drive: &'a MeanDrive,
    perm: &'a LogPermeability,
    prev: &'a DenseMatrix,
    /// 待写入的 Cfp
    pub next: &'a mut DenseMatrix,
}

impl<'a> CrossCovarianceProblem<'a> {
    /// 拆分为只读的残差工厂（任一行的 Jacobian 都相同）与可写矩阵
    pub fn split(self) -> (CrossCovarianceRows<'a>, &'a mut DenseMatrix) {
        (
            CrossCovarianceRows {
                ctx: self.ctx,
                drive: self.drive,
                perm: self.perm,
                prev: self.prev,
            },
            self.next,
        )
    }
}

/// 按行构造 Cfp 残差，可在线程间共享
#[derive(Clone, Copy)]
pub struct CrossCovarianceRows<'a> {
    ctx: ResidualContext<'a>,
    drive: &'a MeanDrive,
    perm: &'a LogPermeability,
    prev: &'a DenseMatrix,
}

impl<'a> CrossCovarianceRows<'a> {
    /// 第 source 行的残差
    pub fn residual(&self, source: usize) -> CrossCovarianceResidual<'a> {
        CrossCovarianceResidual {
            ctx: self.ctx,
            drive: self.drive,
            cf_row: self.perm.cov_row(source),
            prev: self.prev.row(source),
        }
    }
}

/// Cp 求解问题
pub struct CovarianceProblem<'a> {
    /// 上下文
    pub ctx: ResidualContext<'a>,
    /// 一阶驱动
    pub drive: &'a MeanDrive,
    /// 当前 Cfp
    pub cfp_now: &'a DenseMatrix,
    /// 当前 p0
    pub p0_now: &'a [f64],
    /// 当前各井边界条件
    pub controls: Vec<WellControl>,
    /// 历史
    pub history: &'a mut CovarianceHistory,
    /// 超过该步数后只推进最新槽位
    pub simple_after: usize,
}

/// 矩方程模型
#[derive(Debug, Clone)]
pub struct MomentModel {
    disc: Discretization,
    scaling: Scaling,
    params: PhysicalParams,
    measurements: Vec<(usize, f64)>,
    wells: Vec<Well>,
    perm: LogPermeability,
    coeffs: CellCoefficients,
    p0: ScalarField,
    p2: ScalarField,
    cfp: LinearField,
    history: CovarianceHistory,
    drive: MeanDrive,
    second_drive: Vec<f64>,
    period: usize,
    initialized: bool,
}

impl MomentModel {
    /// 校验配置并无量纲化
    ///
    /// 参考压力取初始压力；参考压力非正或网格参数不一致时返回配置错误。
    pub fn configure(props: &Properties) -> SoResult<Self> {
        props.validate()?;

        let scaling = Scaling::new(
            units::bar_to_pa(props.skeleton.p_init),
            props.scaling.r_dim,
            props.scaling.t_dim,
        )?;
        let len = |x: f64| scaling.length_to_dimensionless(x);
        let time = |t: f64| scaling.time_to_dimensionless(t);
        let pressure = |p: f64| scaling.pressure_to_dimensionless(units::bar_to_pa(p));
        let mobility = |k_md: f64, visc: f64| {
            scaling.permeability_to_dimensionless(units::milli_darcy_to_m2(k_md)) / visc
        };

        let grid = StructuredGrid::new(
            props.grid.num_x,
            props.grid.num_y,
            len(props.grid.hx),
            len(props.grid.hy),
            len(props.grid.hz),
        )?;

        let visc = scaling.viscosity_to_dimensionless(units::cp_to_pa_s(props.oil.visc));
        let storage = props.skeleton.porosity
            * (scaling.compressibility_to_dimensionless(props.skeleton.beta)
                + scaling.compressibility_to_dimensionless(props.oil.beta));
        SoError::check_positive("storage", storage)?;
        let log_mobility = mobility(props.skeleton.perm, visc).ln();
        if !log_mobility.is_finite() {
            return Err(SoError::invalid_config(
                "skeleton.perm",
                props.skeleton.perm.to_string(),
                "流度无量纲化后不是有限值",
            ));
        }

        let measurements = props
            .conditions
            .iter()
            .map(|m| (grid.interior_id(m.ix, m.iy), mobility(m.perm, visc).ln()))
            .collect();

        let wells = props
            .wells
            .iter()
            .map(|w| Well::from_config(w, grid.interior_id(w.ix, w.iy), grid.spacing(), &scaling))
            .collect::<SoResult<Vec<_>>>()?;

        let period_ends = props
            .wells
            .first()
            .map(|w| w.period_ends().into_iter().map(time).collect())
            .unwrap_or_default();

        // 趋势按每米给出，换算到每单位无量纲长度
        let trend = [
            props.skeleton.perm_grd[0] * scaling.r_dim(),
            props.skeleton.perm_grd[1] * scaling.r_dim(),
        ];

        let params = PhysicalParams {
            storage,
            log_mobility,
            visc,
            rho_stc: props.oil.rho_stc,
            p_init: pressure(props.skeleton.p_init),
            p_out: pressure(props.skeleton.p_out),
            trend,
            sigma: props.covariance.sigma_f,
            corr_len: len(props.covariance.l_f),
            ht: time(props.time.ht),
            ht_min: time(props.time.ht_min),
            ht_max: time(props.time.ht_max),
            step_policy: props.time.step_policy,
            period_ends,
            possible_steps_num: props.covariance.possible_steps_num,
            start_time_simple_approx: props.covariance.start_time_simple_approx,
        };

        let n = grid.len();
        log::info!(
            "模型配置完成: {}x{} 内部单元, 共 {} 个单元, {} 口井, {} 个实测点",
            props.grid.num_x,
            props.grid.num_y,
            n,
            wells.len(),
            props.conditions.len()
        );

        Ok(Self {
            disc: Discretization::new(grid),
            scaling,
            history: CovarianceHistory::new(params.possible_steps_num),
            params,
            measurements,
            wells,
            perm: LogPermeability::default(),
            coeffs: CellCoefficients::default(),
            p0: ScalarField::new(0, 0.0),
            p2: ScalarField::new(0, 0.0),
            cfp: LinearField::zeros(0),
            drive: MeanDrive::default(),
            second_drive: Vec::new(),
            period: 0,
            initialized: false,
        })
    }

    /// 初始化场、先验协方差与井指数
    ///
    /// 重复调用得到完全相同的初始状态。
    pub fn initialize_state(&mut self) -> SoResult<()> {
        let grid = self.disc.grid();
        let n = grid.len();

        let prior = PriorParams {
            log_mobility: self.params.log_mobility,
            trend: self.params.trend,
            sigma: self.params.sigma,
            corr_len: self.params.corr_len,
        };
        let perm = LogPermeability::prior(grid, &prior).condition(&self.measurements)?;

        let kg: Vec<f64> = (0..n).map(|i| perm.kg(i)).collect();
        let storage: Vec<f64> = kg.iter().map(|k| self.params.storage / k).collect();
        if let Some(i) = storage.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(SoError::out_of_range("storage", storage[i], f64::MIN_POSITIVE, f64::MAX));
        }
        let variance: Vec<f64> = (0..n).map(|i| perm.variance(i)).collect();
        let grad_y = (0..n).map(|i| self.disc.gradient_with(i, |j| perm.mean(j))).collect();
        let grad_var = (0..n).map(|i| self.disc.gradient(i, &variance)).collect();

        let mut well_at = vec![None; n];
        for (w, well) in self.wells.iter_mut().enumerate() {
            well_at[well.cell()] = Some(w);
            well.set_effective_mobility(perm.kg(well.cell()), perm.is_conditioned(well.cell()));
        }

        self.coeffs = CellCoefficients {
            kg,
            storage,
            grad_y,
            grad_var,
            variance,
            well_at,
        };
        self.perm = perm;
        self.p0 = ScalarField::new(n, self.params.p_init);
        self.p2 = ScalarField::new(n, 0.0);
        self.cfp = LinearField::zeros(n);
        self.drive = MeanDrive::default();
        self.second_drive = vec![0.0; n];
        self.history = CovarianceHistory::new(self.params.possible_steps_num);
        self.set_active_period(0);

        self.history.push(CovarianceSlot {
            step: 0,
            time: 0.0,
            cp: DenseMatrix::zeros(n),
            cfp: Arc::new(DenseMatrix::zeros(n)),
            p0: Arc::new(self.p0.next().to_vec()),
            controls: self.controls(),
        });
        self.initialized = true;

        log::debug!(
            "初始化完成: σ² 最大值 {:.4e}, 井指数 {:?}",
            self.coeffs.variance.iter().fold(0.0_f64, |m, v| m.max(*v)),
            self.wells.iter().map(|w| w.well_index()).collect::<Vec<_>>()
        );
        Ok(())
    }

    /// 为所有井启用第 period 个时段的边界条件
    pub fn set_active_period(&mut self, period: usize) {
        for well in &mut self.wells {
            well.activate(period);
        }
        self.period = period;
        log::info!("进入第 {} 个时段", period + 1);
    }

    // =========================================================================
    // 访问器
    // =========================================================================

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 离散几何
    pub fn discretization(&self) -> &Discretization {
        &self.disc
    }

    /// 网格
    pub fn grid(&self) -> &StructuredGrid {
        self.disc.grid()
    }

    /// 参考量
    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    /// 参数
    pub fn params(&self) -> &PhysicalParams {
        &self.params
    }

    /// 井
    pub fn wells(&self) -> &[Well] {
        &self.wells
    }

    /// 对数渗透率场
    pub fn permeability(&self) -> &LogPermeability {
        &self.perm
    }

    /// 单元系数
    pub fn coefficients(&self) -> &CellCoefficients {
        &self.coeffs
    }

    /// 平均压力
    pub fn p0(&self) -> &ScalarField {
        &self.p0
    }

    /// 二阶修正
    pub fn p2(&self) -> &ScalarField {
        &self.p2
    }

    /// 互协方差
    pub fn cfp(&self) -> &LinearField {
        &self.cfp
    }

    /// 自协方差历史
    pub fn history(&self) -> &CovarianceHistory {
        &self.history
    }

    /// 当前时段
    pub fn period(&self) -> usize {
        self.period
    }

    /// 模拟总时长（无量纲）
    pub fn horizon(&self) -> f64 {
        self.params.period_ends.last().copied().unwrap_or(0.0)
    }

    /// 各井当前边界条件
    pub fn controls(&self) -> Vec<WellControl> {
        self.wells.iter().map(|w| w.control()).collect()
    }

    /// 残差上下文
    pub fn context(&self, dt: f64) -> ResidualContext<'_> {
        ResidualContext {
            disc: &self.disc,
            coeffs: &self.coeffs,
            wells: &self.wells,
            dt,
        }
    }

    // =========================================================================
    // 单元残差
    // =========================================================================

    /// 平均压力在 cell 处的残差
    pub fn residual_mean_pressure<D: Scalar>(&self, cell: usize, x: &[D], dt: f64) -> D {
        MeanPressureResidual {
            ctx: self.context(dt),
            prev: self.p0.prev(),
            p_out: self.params.p_out,
        }
        .evaluate(cell, x)
    }

    /// Cfp 第 source 行在 cell 处的残差
    pub fn residual_cross_covariance<D: Scalar>(&self, cell: usize, source: usize, x: &[D], dt: f64) -> D {
        CrossCovarianceResidual {
            ctx: self.context(dt),
            drive: &self.drive,
            cf_row: self.perm.cov_row(source),
            prev: self.cfp.prev().row(source),
        }
        .evaluate(cell, x)
    }

    /// p2 在 cell 处的残差
    pub fn residual_second_order<D: Scalar>(&self, cell: usize, x: &[D], dt: f64) -> D {
        SecondOrderResidual {
            ctx: self.context(dt),
            prev: self.p2.prev(),
            forcing: &self.second_drive,
        }
        .evaluate(cell, x)
    }

    /// 第 slot 个历史槽位第 source 行在 cell 处的残差（沿 y 推进一步）
    pub fn residual_covariance<D: Scalar>(
        &self,
        cell: usize,
        source: usize,
        slot: usize,
        x: &[D],
        dt: f64,
    ) -> SoResult<D> {
        let s = self
            .history
            .get(slot)
            .ok_or_else(|| SoError::index_out_of_bounds("history", slot, self.history.len()))?;
        Ok(CovarianceResidual {
            ctx: self.context(dt),
            drive: &self.drive,
            cfp: &s.cfp,
            source,
            prev: s.cp.row(source),
        }
        .evaluate(cell, x))
    }

    // =========================================================================
    // 每个时间步的求解问题
    // =========================================================================

    /// p0 的 Newton 问题
    pub fn mean_pressure_problem(&mut self, dt: f64) -> NewtonProblem<'_, MeanPressureResidual<'_>> {
        let ctx = ResidualContext {
            disc: &self.disc,
            coeffs: &self.coeffs,
            wells: &self.wells,
            dt,
        };
        let (prev, layers) = self.p0.split_mut();
        NewtonProblem {
            residual: MeanPressureResidual {
                ctx,
                prev,
                p_out: self.params.p_out,
            },
            layers,
            weights: self.disc.weights(),
        }
    }

    /// p0 收敛后计算一阶驱动量
    pub fn prepare_mean_drive(&mut self, dt: f64) {
        let drive = MeanDrive::compute(&self.context(dt), self.p0.prev(), self.p0.next());
        self.drive = drive;
    }

    /// Cfp 求解问题
    pub fn cross_covariance_problem(&mut self, dt: f64) -> CrossCovarianceProblem<'_> {
        let ctx = ResidualContext {
            disc: &self.disc,
            coeffs: &self.coeffs,
            wells: &self.wells,
            dt,
        };
        let (prev, next) = self.cfp.split_mut();
        CrossCovarianceProblem {
            ctx,
            drive: &self.drive,
            perm: &self.perm,
            prev,
            next,
        }
    }

    /// Cfp 求解后计算 p2 驱动项
    pub fn prepare_second_order_drive(&mut self, dt: f64) {
        let forcing = second_order_drive(&self.context(dt), &self.drive, self.cfp.next());
        self.second_drive = forcing;
    }

    /// p2 的 Newton 问题
    pub fn second_order_problem(&mut self, dt: f64) -> NewtonProblem<'_, SecondOrderResidual<'_>> {
        let ctx = ResidualContext {
            disc: &self.disc,
            coeffs: &self.coeffs,
            wells: &self.wells,
            dt,
        };
        let (prev, layers) = self.p2.split_mut();
        NewtonProblem {
            residual: SecondOrderResidual {
                ctx,
                prev,
                forcing: &self.second_drive,
            },
            layers,
            weights: self.disc.weights(),
        }
    }

    /// Cp 求解问题
    pub fn covariance_problem(&mut self, dt: f64) -> CovarianceProblem<'_> {
        let controls = self.controls();
        CovarianceProblem {
            ctx: ResidualContext {
                disc: &self.disc,
                coeffs: &self.coeffs,
                wells: &self.wells,
                dt,
            },
            drive: &self.drive,
            cfp_now: self.cfp.next(),
            p0_now: self.p0.next(),
            controls,
            history: &mut self.history,
            simple_after: self.params.start_time_simple_approx,
        }
    }

    /// 提交时间步：next 提升为 previous
    pub fn commit_step(&mut self) {
        self.p0.commit();
        self.p2.commit();
        self.cfp.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use so_config::WellConfig;

    fn small_props(sigma: f64) -> Properties {
        let mut props = Properties::default();
        props.grid.num_x = 5;
        props.grid.num_y = 5;
        props.covariance.sigma_f = sigma;
        props.wells = vec![WellConfig::rate(2, 2, 50.0, 36_000.0)];
        props
    }

    #[test]
    fn test_configure_scales_reference_pressure() {
        let model = MomentModel::configure(&small_props(0.1)).unwrap();
        assert_relative_eq!(model.params().p_init, 1.0);
        assert_relative_eq!(model.scaling().p_dim(), 1e7);
        assert_relative_eq!(model.horizon(), 10.0);
        assert!(!model.is_initialized());
    }

    #[test]
    fn test_configure_rejects_bad_reference_pressure() {
        let mut props = small_props(0.1);
        props.skeleton.p_init = 0.0;
        assert!(MomentModel::configure(&props).is_err());
    }

    #[test]
    fn test_initialize_sets_fields() {
        let mut model = MomentModel::configure(&small_props(0.2)).unwrap();
        model.initialize_state().unwrap();
        let n = model.grid().len();
        assert!(model.p0().next().iter().all(|p| *p == 1.0));
        assert!(model.p2().next().iter().all(|p| *p == 0.0));
        assert!(model.cfp().next().is_zero());
        assert_eq!(model.history().len(), 1);
        assert_eq!(model.coefficients().kg.len(), n);
        assert!(model.wells()[0].well_index() > 0.0);
        assert_relative_eq!(model.coefficients().variance[7], 0.04, epsilon = 1e-14);
    }

    #[test]
    fn test_uniform_state_has_zero_mean_residual() {
        let mut props = small_props(0.0);
        props.wells = vec![WellConfig::rate(2, 2, 0.0, 36_000.0)];
        let mut model = MomentModel::configure(&props).unwrap();
        model.initialize_state().unwrap();
        let x = model.p0().next().to_vec();
        for cell in model.grid().interior_ids() {
            assert_eq!(model.residual_mean_pressure(cell, &x, 0.1), 0.0);
        }
    }

    #[test]
    fn test_injection_residual_sign() {
        let mut model = MomentModel::configure(&small_props(0.0)).unwrap();
        model.initialize_state().unwrap();
        let x = model.p0().next().to_vec();
        let well_cell = model.wells()[0].cell();
        // 注入井在初始均匀场上的残差为 -src < 0
        assert!(model.residual_mean_pressure(well_cell, &x, 0.1) < 0.0);
    }

    #[test]
    fn test_conditioning_well() {
        let mut props = small_props(0.3);
        props.conditions = vec![so_config::Measurement { ix: 2, iy: 2, perm: 150.0 }];
        let mut model = MomentModel::configure(&props).unwrap();
        model.initialize_state().unwrap();
        let well = &model.wells()[0];
        assert!(well.is_conditioning());
        assert_eq!(model.coefficients().variance[well.cell()], 0.0);
        let kg = model.coefficients().kg[well.cell()];
        assert_relative_eq!(well.well_index(), well.geometric_factor() * kg);
    }
}
