// crates/so_physics/tests/residual_consistency.rs

//! 残差一致性测试
//!
//! 先用积分器推进两步，使历史中有非零的时滞槽位；再手动执行第三步的
//! 各个阶段，检查模型逐单元残差在求得的解上为零。

use so_config::{Properties, WellConfig};
use so_physics::engine::{CovarianceSolver, Integrator, NewtonConfig, NewtonSolver};
use so_physics::model::{FieldKind, MomentModel};

const STEP: usize = 3;
const TIME: f64 = 1.0;

// =============================================================================
// 辅助函数
// =============================================================================

fn props() -> Properties {
    let mut props = Properties::default();
    props.grid.num_x = 5;
    props.grid.num_y = 4;
    props.covariance.sigma_f = 0.4;
    props.covariance.l_f = 200.0;
    props.covariance.possible_steps_num = 6;
    props.covariance.start_time_simple_approx = 20;
    props.wells = vec![WellConfig::rate(2, 1, 50.0, 10.0 * 3600.0)];
    props
}

fn warmed_model() -> MomentModel {
    let mut model = MomentModel::configure(&props()).unwrap();
    model.initialize_state().unwrap();
    let mut integrator = Integrator::new(model).unwrap();
    integrator.advance().unwrap();
    integrator.advance().unwrap();
    integrator.into_model()
}

fn solve_mean(model: &mut MomentModel, dt: f64) {
    let mut newton = NewtonSolver::new(model.discretization().pattern(), NewtonConfig::default());
    let report = newton
        .solve(FieldKind::Mean, STEP, TIME, model.mean_pressure_problem(dt))
        .unwrap();
    assert!(report.converged);
    model.prepare_mean_drive(dt);
}

fn solve_cross(model: &mut MomentModel, dt: f64) -> CovarianceSolver {
    let mut solver = CovarianceSolver::new(model.discretization().pattern());
    solver.begin_step();
    solver
        .solve_cross_covariance(model.cross_covariance_problem(dt), STEP)
        .unwrap();
    model.prepare_second_order_drive(dt);
    solver
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |m, v| m.max(v.abs()))
}

// =============================================================================
// Cfp
// =============================================================================

/// Cfp 每一行在直接求解后满足逐单元残差
#[test]
fn test_cross_covariance_residual_vanishes_at_solution() {
    let mut model = warmed_model();
    let dt = model.params().ht;
    solve_mean(&mut model, dt);
    solve_cross(&mut model, dt);

    let grid = model.grid();
    let zeros = vec![0.0; grid.len()];
    let sources = [model.wells()[0].cell(), grid.interior_id(0, 0), grid.interior_id(4, 3)];
    for source in sources {
        let x = model.cfp().next().row(source).to_vec();
        let scale = max_abs(
            grid.interior_ids()
                .map(|cell| model.residual_cross_covariance(cell, source, &zeros, dt)),
        );
        assert!(scale > 0.0);
        for cell in grid.interior_ids() {
            let r = model.residual_cross_covariance(cell, source, &x, dt);
            assert!(r.abs() <= 1e-9 * scale, "源 {} 单元 {}: 残差 {:e}", source, cell, r);
        }
    }
}

// =============================================================================
// p2
// =============================================================================

/// p2 的 Newton 收敛后逐单元残差为零
#[test]
fn test_second_order_residual_vanishes_at_solution() {
    let mut model = warmed_model();
    let dt = model.params().ht;
    solve_mean(&mut model, dt);
    solve_cross(&mut model, dt);

    let mut newton = NewtonSolver::new(model.discretization().pattern(), NewtonConfig::default());
    let report = newton
        .solve(FieldKind::SecondOrder, STEP, TIME, model.second_order_problem(dt))
        .unwrap();
    assert!(report.converged);

    let zeros = vec![0.0; model.grid().len()];
    let x = model.p2().next().to_vec();
    let scale = max_abs(
        model
            .grid()
            .interior_ids()
            .map(|cell| model.residual_second_order(cell, &zeros, dt)),
    );
    assert!(scale > 0.0);
    for cell in model.grid().interior_ids() {
        let r = model.residual_second_order(cell, &x, dt);
        assert!(r.abs() <= 1e-7 * scale, "单元 {}: 残差 {:e}", cell, r);
    }
}

// =============================================================================
// Cp
// =============================================================================

/// 时滞槽位推进一步后满足逐单元残差；越界槽位返回错误
#[test]
fn test_lag_slot_covariance_residual_vanishes_at_solution() {
    let mut model = warmed_model();
    let dt = model.params().ht;
    solve_mean(&mut model, dt);
    let mut solver = solve_cross(&mut model, dt);

    // 残差以推进前的槽位为上一时间步
    let before = model.clone();
    let report = solver
        .solve_covariance_history(model.covariance_problem(dt), STEP, TIME)
        .unwrap();
    assert_eq!(report.evicted_step, None);

    let slot = 1;
    assert_eq!(before.history().get(slot).map(|s| s.step), Some(1));
    let advanced = &model.history().get(slot).unwrap().cp;
    assert_ne!(advanced, &before.history().get(slot).unwrap().cp);

    let grid = before.grid();
    let zeros = vec![0.0; grid.len()];
    for source in [before.wells()[0].cell(), grid.interior_id(1, 2)] {
        let x = advanced.row(source).to_vec();
        let scale = max_abs(
            grid.interior_ids()
                .map(|cell| before.residual_covariance(cell, source, slot, &zeros, dt).unwrap()),
        );
        assert!(scale > 0.0);
        for cell in grid.interior_ids() {
            let r = before.residual_covariance(cell, source, slot, &x, dt).unwrap();
            assert!(r.abs() <= 1e-9 * scale, "源 {} 单元 {}: 残差 {:e}", source, cell, r);
        }
    }

    let len = before.history().len();
    let well = before.wells()[0].cell();
    let err = before.residual_covariance(well, well, len, &zeros, dt).unwrap_err();
    assert!(err.to_string().contains("history"));
}
