// crates/so_physics/src/engine/integrator.rs

//! 时间积分器
//!
//! 外层时间循环：快照 → 确定步长 → 按 `p0 → Cfp → p2 → Cp` 求解 → 提交。
//!
//! # 步长
//!
//! - 跨过时段边界时步长重置为 `ht_min`，并切换井的边界条件
//! - 其余情况由 [`StepSizePolicy`] 给出，截断到 `[ht_min, ht_max]`
//! - 步长不越过当前时段的结束时刻，也不越过模拟终点
//!
//! # 失败语义
//!
//! NaN/Inf 与奇异分解直接返回错误，终止本次运行；
//! Newton 未收敛只记为 [`StepPhase::Diverged`]，本步照常提交。

use std::time::{Duration, Instant};

use so_foundation::{SoError, SoResult};

use crate::engine::covariance_solver::{CovarianceSolver, HistoryReport};
use crate::engine::newton::{NewtonConfig, NewtonReport, NewtonSolver};
use crate::engine::phase::StepPhase;
use crate::engine::step_policy::{policy_from_config, StepFeedback, StepSizePolicy};
use crate::model::residual::FieldKind;
use crate::model::state::MomentModel;

/// 一个已提交时间步的记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 时间步序号（从 1 开始）
    pub step: usize,
    /// 步末时刻（无量纲）
    pub time: f64,
    /// 步长（无量纲）
    pub dt: f64,
    /// 时段
    pub period: usize,
    /// 终态
    pub outcome: StepPhase,
    /// p0 的 Newton 结果
    pub mean: NewtonReport,
    /// p2 的 Newton 结果
    pub second_order: NewtonReport,
    /// Cp 历史推进结果
    pub history: HistoryReport,
}

impl StepReport {
    /// 两个 Newton 求解中较多的迭代次数
    pub fn newton_iterations(&self) -> usize {
        self.mean.iterations.max(self.second_order.iterations)
    }
}

/// 一次运行的汇总
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// 时间步数
    pub steps: usize,
    /// Newton 未收敛的步数
    pub diverged: usize,
    /// 结束时刻（无量纲）
    pub final_time: f64,
    /// 墙钟时间
    pub wall_time: Duration,
}

/// 时间步观察者
pub trait StepObserver {
    /// 每步之前与最后一步之后调用，`model` 为已提交的状态
    fn on_snapshot(&mut self, model: &MomentModel, time: f64, step: usize) -> SoResult<()>;

    /// 每步提交之后调用
    fn on_step(&mut self, _report: &StepReport) {}
}

/// 不做任何事的观察者
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_snapshot(&mut self, _model: &MomentModel, _time: f64, _step: usize) -> SoResult<()> {
        Ok(())
    }
}

/// 时间积分器
pub struct Integrator {
    model: MomentModel,
    mean: NewtonSolver,
    second_order: NewtonSolver,
    covariance: CovarianceSolver,
    policy: Box<dyn StepSizePolicy>,
    time: f64,
    step: usize,
    horizon: f64,
    phase: StepPhase,
    last: Option<StepFeedback>,
}

impl Integrator {
    /// 以默认 Newton 参数创建，模型必须已初始化
    pub fn new(model: MomentModel) -> SoResult<Self> {
        Self::with_config(model, NewtonConfig::default())
    }

    /// 指定 Newton 参数创建
    pub fn with_config(model: MomentModel, newton: NewtonConfig) -> SoResult<Self> {
        if !model.is_initialized() {
            return Err(SoError::internal("模型尚未调用 initialize_state"));
        }
        let pattern = model.discretization().pattern();
        let policy = policy_from_config(&model.params().step_policy);
        log::info!(
            "积分器: 步长策略 {}, Newton 最多 {} 次迭代, 模拟终点 {:.4}",
            policy.name(),
            newton.max_iterations,
            model.horizon()
        );
        Ok(Self {
            mean: NewtonSolver::new(pattern, newton.clone()),
            second_order: NewtonSolver::new(pattern, newton),
            covariance: CovarianceSolver::new(pattern),
            policy,
            time: 0.0,
            step: 0,
            horizon: model.horizon(),
            phase: StepPhase::Committed,
            last: None,
            model,
        })
    }

    /// 提前结束模拟（无量纲时刻），不超过所有时段之和
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon.min(self.model.horizon());
        self
    }

    /// 模型
    pub fn model(&self) -> &MomentModel {
        &self.model
    }

    /// 取回模型
    pub fn into_model(self) -> MomentModel {
        self.model
    }

    /// 当前时刻
    pub fn time(&self) -> f64 {
        self.time
    }

    /// 已完成的时间步数
    pub fn step(&self) -> usize {
        self.step
    }

    /// 模拟终点
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// 当前阶段；出错时停留在出错的阶段
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// 分解缓存的 (命中, 未命中)
    pub fn factorization_stats(&self) -> (usize, usize) {
        self.covariance.cache().stats()
    }

    fn tolerance(&self) -> f64 {
        1e-9 * self.horizon.abs().max(1.0)
    }

    /// 是否已到终点
    pub fn is_finished(&self) -> bool {
        self.time >= self.horizon - self.tolerance()
    }

    /// 确定本步步长与步末时刻，必要时切换时段
    fn choose_step(&mut self) -> (f64, f64) {
        let tol = self.tolerance();
        let params = self.model.params();
        let (ht, ht_min, ht_max) = (params.ht, params.ht_min, params.ht_max);
        let ends = params.period_ends.clone();

        let period = self.model.period();
        let period_end = ends.get(period).copied().unwrap_or(self.horizon);
        let mut dt = if self.time >= period_end - tol && period + 1 < ends.len() {
            self.model.set_active_period(period + 1);
            ht_min
        } else {
            match &self.last {
                Some(feedback) => self.policy.next(feedback),
                None => ht,
            }
        };
        dt = dt.clamp(ht_min, ht_max);

        let end = ends
            .get(self.model.period())
            .copied()
            .unwrap_or(self.horizon)
            .min(self.horizon);
        if self.time + dt >= end - tol {
            (end - self.time, end)
        } else {
            (dt, self.time + dt)
        }
    }

    /// 推进一个时间步
    pub fn advance(&mut self) -> SoResult<StepReport> {
        self.phase = StepPhase::Advancing;
        let (dt, new_time) = self.choose_step();
        if !(dt > 0.0) {
            return Err(SoError::internal(format!(
                "时间步长非正: t = {}, dt = {}",
                self.time, dt
            )));
        }
        let step = self.step + 1;

        self.phase = StepPhase::SolvingMean;
        let mean = self
            .mean
            .solve(FieldKind::Mean, step, new_time, self.model.mean_pressure_problem(dt))?;
        self.model.prepare_mean_drive(dt);

        self.phase = StepPhase::SolvingCrossCovariance;
        self.covariance.begin_step();
        self.covariance
            .solve_cross_covariance(self.model.cross_covariance_problem(dt), step)?;
        self.model.prepare_second_order_drive(dt);

        self.phase = StepPhase::SolvingSecondOrder;
        let second_order =
            self.second_order
                .solve(FieldKind::SecondOrder, step, new_time, self.model.second_order_problem(dt))?;

        self.phase = StepPhase::SolvingCovarianceHistory;
        let history =
            self.covariance
                .solve_covariance_history(self.model.covariance_problem(dt), step, new_time)?;

        self.model.commit_step();
        self.phase = if mean.converged && second_order.converged {
            StepPhase::Committed
        } else {
            StepPhase::Diverged
        };
        self.time = new_time;
        self.step = step;

        let report = StepReport {
            step,
            time: new_time,
            dt,
            period: self.model.period(),
            outcome: self.phase,
            mean,
            second_order,
            history,
        };
        self.last = Some(StepFeedback {
            dt,
            newton_iterations: report.newton_iterations(),
            outcome: self.phase,
        });

        log::info!(
            "第 {} 步: t = {:.6}, dt = {:.3e}, 时段 {}, Newton {}/{}, {}",
            step,
            new_time,
            dt,
            report.period + 1,
            mean.iterations,
            second_order.iterations,
            self.phase
        );
        Ok(report)
    }

    /// 运行到终点
    pub fn run<O: StepObserver>(&mut self, observer: &mut O) -> SoResult<RunSummary> {
        let start = Instant::now();
        let mut steps = 0;
        let mut diverged = 0;

        while !self.is_finished() {
            observer.on_snapshot(&self.model, self.time, self.step)?;
            let report = self.advance()?;
            observer.on_step(&report);
            steps += 1;
            if report.outcome == StepPhase::Diverged {
                diverged += 1;
            }
        }
        observer.on_snapshot(&self.model, self.time, self.step)?;

        let summary = RunSummary {
            steps,
            diverged,
            final_time: self.time,
            wall_time: start.elapsed(),
        };
        let (hits, misses) = self.factorization_stats();
        log::info!(
            "模拟结束: {} 步, {} 步未收敛, t = {:.6}, 用时 {:.2?}, 分解复用 {}/{}",
            summary.steps,
            summary.diverged,
            summary.final_time,
            summary.wall_time,
            hits,
            hits + misses
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use so_config::{ControlKind, PeriodConfig, Properties, WellConfig};

    fn model(well: WellConfig) -> MomentModel {
        let mut props = Properties::default();
        props.grid.num_x = 3;
        props.grid.num_y = 3;
        props.covariance.sigma_f = 0.0;
        props.wells = vec![well];
        let mut m = MomentModel::configure(&props).unwrap();
        m.initialize_state().unwrap();
        m
    }

    struct Counter {
        snapshots: Vec<(f64, usize)>,
        steps: usize,
    }

    impl StepObserver for Counter {
        fn on_snapshot(&mut self, _model: &MomentModel, time: f64, step: usize) -> SoResult<()> {
            self.snapshots.push((time, step));
            Ok(())
        }

        fn on_step(&mut self, _report: &StepReport) {
            self.steps += 1;
        }
    }

    #[test]
    fn test_requires_initialized_model() {
        let props = Properties::default();
        let m = MomentModel::configure(&props).unwrap();
        assert!(Integrator::new(m).is_err());
    }

    #[test]
    fn test_first_step_uses_initial_dt() {
        let mut integrator = Integrator::new(model(WellConfig::rate(1, 1, 10.0, 36_000.0))).unwrap();
        let report = integrator.advance().unwrap();
        assert_eq!(report.step, 1);
        assert!((report.dt - 1000.0 / 3600.0).abs() < 1e-12);
        assert!(report.outcome.is_terminal());
    }

    #[test]
    fn test_lands_on_period_boundaries() {
        let mut well = WellConfig::rate(1, 1, 10.0, 3600.0);
        well.periods.push(PeriodConfig {
            duration: 3600.0,
            control: ControlKind::Rate,
            value: 0.0,
        });
        let mut integrator = Integrator::new(model(well)).unwrap();
        let mut observer = Counter {
            snapshots: Vec::new(),
            steps: 0,
        };
        let summary = integrator.run(&mut observer).unwrap();

        assert!((summary.final_time - 2.0).abs() < 1e-9);
        assert_eq!(observer.steps, summary.steps);
        assert_eq!(observer.snapshots.len(), summary.steps + 1);
        // 第一时段的终点必定是某个快照时刻
        assert!(observer.snapshots.iter().any(|(t, _)| (t - 1.0).abs() < 1e-9));
        assert_eq!(integrator.model().period(), 1);
    }

    #[test]
    fn test_custom_horizon() {
        let integrator = Integrator::new(model(WellConfig::rate(1, 1, 10.0, 36_000.0)))
            .unwrap()
            .with_horizon(0.5);
        let mut integrator = integrator;
        let summary = integrator.run(&mut NoopObserver).unwrap();
        assert!((summary.final_time - 0.5).abs() < 1e-9);
    }
}
