// crates/so_physics/tests/moment_scenarios.rs

//! 矩方程场景测试
//!
//! - 5x5 注入井单步
//! - 零方差退化为确定性求解
//! - 同时刻 Cp 的对称性
//! - 无源均匀场的残差
//! - 闲置井的稳态平均压力
//! - Cp 历史淘汰与简化阶段

use approx::assert_relative_eq;
use so_config::{ControlKind, Measurement, PeriodConfig, Properties, WellConfig};
use so_foundation::units;
use so_physics::engine::{Integrator, NoopObserver, StepPhase};
use so_physics::model::MomentModel;

// =============================================================================
// 辅助函数
// =============================================================================

fn grid_5x5(sigma: f64) -> Properties {
    let mut props = Properties::default();
    props.grid.num_x = 5;
    props.grid.num_y = 5;
    props.skeleton.perm = 100.0;
    props.skeleton.porosity = 0.1;
    props.covariance.sigma_f = sigma;
    props.wells = vec![WellConfig::rate(2, 2, 50.0, 10.0 * 3600.0)];
    props
}

fn integrator(props: &Properties) -> Integrator {
    let mut model = MomentModel::configure(props).unwrap();
    model.initialize_state().unwrap();
    Integrator::new(model).unwrap()
}

// =============================================================================
// 单步注入
// =============================================================================

/// 注入抬高井点压力，零方差下 Cfp 严格为零
#[test]
fn test_injection_raises_well_pressure() {
    let props = grid_5x5(0.0);
    let mut integrator = integrator(&props);
    let report = integrator.advance().unwrap();
    assert_eq!(report.outcome, StepPhase::Committed);

    let model = integrator.model();
    let well = model.wells()[0].cell();
    let boundary = model.grid().id_of(0, 3);
    let p0 = model.p0().next();
    assert!(p0[well] > p0[boundary]);
    assert_relative_eq!(p0[boundary], 1.0);
    for cell in model.grid().interior_ids() {
        assert!(p0[cell] >= 1.0, "注入不应使任何单元压力下降");
    }
    assert!(model.cfp().next().is_zero());
}

/// 注入井的压力随距离衰减
#[test]
fn test_injection_pressure_decays_from_well() {
    let props = grid_5x5(0.0);
    let mut integrator = integrator(&props);
    integrator.advance().unwrap();

    let model = integrator.model();
    let grid = model.grid();
    let p0 = model.p0().next();
    let centre = p0[grid.interior_id(2, 2)];
    let near = p0[grid.interior_id(3, 2)];
    let far = p0[grid.interior_id(4, 2)];
    assert!(centre > near && near > far);
    // 均匀各向同性网格上的对称性
    assert_relative_eq!(near, p0[grid.interior_id(1, 2)], max_relative = 1e-8);
    assert_relative_eq!(near, p0[grid.interior_id(2, 3)], max_relative = 1e-8);
}

// =============================================================================
// 零方差退化
// =============================================================================

/// σ_f = 0 时 Cfp、p2、Cp 在所有时刻恒为零，包括切换到定压时段之后
#[test]
fn test_zero_variance_degenerates_to_deterministic() {
    let mut props = grid_5x5(0.0);
    props.wells[0].periods.push(PeriodConfig {
        duration: 5.0 * 3600.0,
        control: ControlKind::Pressure,
        value: 90.0,
    });

    let mut integrator = integrator(&props);
    while !integrator.is_finished() {
        integrator.advance().unwrap();
        let model = integrator.model();
        assert!(model.cfp().next().is_zero());
        assert!(model.p2().next().iter().all(|v| *v == 0.0));
        assert!(model.history().iter().all(|slot| slot.cp.is_zero()));
        assert_eq!(model.get_rate_variance(0).unwrap(), 0.0);
        assert_eq!(model.get_pwf_variance(0).unwrap(), 0.0);
    }
    assert_eq!(integrator.model().period(), 1);
    assert!(integrator.model().get_rate(0).unwrap() < 0.0, "定压 90 bar 时应为采出");
}

// =============================================================================
// 对称性
// =============================================================================

/// 第一步的同时刻 Cp 在对称化之前就已（数值上）对称且对角非负
#[test]
fn test_equal_time_covariance_is_symmetric() {
    let props = grid_5x5(0.5);
    let mut integrator = integrator(&props);

    let first = integrator.advance().unwrap();
    let cp = &integrator.model().history().newest().unwrap().cp;
    let scale = cp.max_abs();
    assert!(scale > 0.0);
    assert!(first.history.asymmetry <= 1e-8 * scale);
    assert_eq!(cp.max_asymmetry(), 0.0);

    let model = integrator.model();
    for cell in model.grid().interior_ids() {
        assert!(cp.get(cell, cell) >= -1e-12 * scale);
    }
    assert!(cp.get(model.wells()[0].cell(), model.wells()[0].cell()) > 0.0);

    // 之后的步对称化后仍严格对称
    integrator.advance().unwrap();
    let cp = &integrator.model().history().newest().unwrap().cp;
    assert_eq!(cp.max_asymmetry(), 0.0);
    assert!(cp.first_non_finite().is_none());
}

/// 实测单元的 Cfp 行恒为零
#[test]
fn test_conditioned_cell_has_no_cross_covariance() {
    let mut props = grid_5x5(0.4);
    props.conditions = vec![Measurement {
        ix: 2,
        iy: 2,
        perm: 80.0,
    }];
    let mut integrator = integrator(&props);
    integrator.advance().unwrap();

    let model = integrator.model();
    let well = model.wells()[0].cell();
    assert!(model.wells()[0].is_conditioning());
    assert!(model.cfp().next().row(well).iter().all(|v| *v == 0.0));
    assert!(model.cfp().next().max_abs() > 0.0);
}

// =============================================================================
// 残差与稳态
// =============================================================================

/// 无源、均匀渗透率、初始压力等于边界压力：收敛后所有内部残差为零
#[test]
fn test_uniform_state_residual_vanishes() {
    let mut props = grid_5x5(0.0);
    props.wells = vec![WellConfig::rate(2, 2, 0.0, 3600.0)];
    let mut integrator = integrator(&props);
    let report = integrator.advance().unwrap();

    let model = integrator.model();
    let x = model.p0().next().to_vec();
    for cell in model.grid().interior_ids() {
        assert_relative_eq!(model.residual_mean_pressure(cell, &x, report.dt), 0.0, epsilon = 1e-12);
        assert_relative_eq!(x[cell], 1.0, epsilon = 1e-12);
    }
}

/// 闲置井、初始压力高于边界压力：稳态时体积平均压力等于边界压力
#[test]
fn test_steady_state_average_matches_boundary() {
    let mut props = grid_5x5(0.0);
    props.grid.hx = 10.0;
    props.grid.hy = 10.0;
    props.skeleton.p_init = 120.0;
    props.skeleton.p_out = 100.0;
    props.wells = vec![WellConfig::rate(2, 2, 0.0, 100.0 * 3600.0)];

    let mut integrator = integrator(&props);
    let summary = integrator.run(&mut NoopObserver).unwrap();
    assert_eq!(summary.diverged, 0);

    let model = integrator.model();
    let average = model.discretization().volume_average(model.p0().next());
    let average_bar = units::pa_to_bar(model.scaling().pressure_to_physical(average));
    assert_relative_eq!(average_bar, 100.0, epsilon = 1e-5);
}

// =============================================================================
// Cp 历史
// =============================================================================

/// 历史容量满后淘汰最旧的槽位
#[test]
fn test_history_keeps_newest_slots() {
    let mut props = grid_5x5(0.3);
    props.covariance.possible_steps_num = 2;
    props.covariance.start_time_simple_approx = 10;
    let mut integrator = integrator(&props);

    let mut evicted = Vec::new();
    for _ in 0..4 {
        let report = integrator.advance().unwrap();
        evicted.extend(report.history.evicted_step);
    }
    let history = integrator.model().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history.get(0).map(|s| s.step), Some(3));
    assert_eq!(history.newest().map(|s| s.step), Some(4));
    assert_eq!(evicted, vec![0, 1, 2]);
}

/// 简化阶段只推进最新槽位
#[test]
fn test_simple_approximation_freezes_lag_slots() {
    let mut props = grid_5x5(0.3);
    props.covariance.possible_steps_num = 5;
    props.covariance.start_time_simple_approx = 2;
    let mut integrator = integrator(&props);

    let advanced: Vec<usize> = (0..4)
        .map(|_| integrator.advance().unwrap().history.advanced_slots)
        .collect();
    assert_eq!(advanced, vec![1, 2, 1, 1]);

    // 冻结的槽位在之后的步中不再变化
    let slot_of = |integrator: &Integrator, step: usize| {
        integrator
            .model()
            .history()
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.cp.clone())
    };
    let frozen = slot_of(&integrator, 1).unwrap();
    integrator.advance().unwrap();
    assert_eq!(slot_of(&integrator, 1), Some(frozen));
}

/// 井的派生量在运行过程中保持有限，且方差非负
#[test]
fn test_well_reports_stay_finite() {
    let props = grid_5x5(0.3);
    let mut integrator = integrator(&props);
    for _ in 0..3 {
        integrator.advance().unwrap();
    }
    let reports = integrator.model().well_reports().unwrap();
    assert_relative_eq!(reports[0].rate, 50.0, epsilon = 1e-9);
    assert!(reports[0].pwf.is_finite() && reports[0].pwf > 100.0);
    assert!(reports[0].pwf_std.is_finite() && reports[0].pwf_std > 0.0);

    let flux = integrator.model().flux_statistics();
    assert!(flux.iter().all(|f| f.mean.is_finite() && f.variance.is_finite()));
}
