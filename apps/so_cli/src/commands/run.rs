// apps/so_cli/src/commands/run.rs

//! 运行模拟命令

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use so_config::Properties;
use so_physics::engine::Integrator;
use so_physics::MomentModel;
use tracing::{info, warn};

use crate::output::WellSeriesWriter;

/// 运行模拟参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径（缺省时使用默认配置）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出目录
    #[arg(short, long, default_value = "snaps")]
    pub output: PathBuf,

    /// 模拟时长 [小时]，缺省为所有时段之和
    #[arg(long)]
    pub horizon: Option<f64>,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== StochOil 模拟启动 ===");

    let props = match &args.config {
        Some(path) => Properties::from_file(path)
            .with_context(|| format!("无法加载配置 {}", path.display()))?,
        None => {
            warn!("未指定配置文件，使用默认配置");
            Properties::default()
        }
    };
    info!(
        "网格 {}x{}, 井 {} 口, σ_f = {}, l_f = {} m",
        props.grid.num_x,
        props.grid.num_y,
        props.wells.len(),
        props.covariance.sigma_f,
        props.covariance.l_f
    );

    let mut model = MomentModel::configure(&props).context("模型配置失败")?;
    model.initialize_state().context("初始化失败")?;
    let scaling = *model.scaling();

    let mut integrator = Integrator::new(model)?;
    if let Some(hours) = args.horizon {
        integrator = integrator.with_horizon(scaling.time_to_dimensionless(hours * 3600.0));
    }
    info!(
        "模拟时长 {:.3} h",
        scaling.time_to_physical(integrator.horizon()) / 3600.0
    );

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("无法创建输出目录 {}", args.output.display()))?;
    let mut writer = WellSeriesWriter::create(&args.output)?;

    let summary = integrator.run(&mut writer)?;
    let rows = writer.rows();
    writer.finish()?;

    info!("=== 模拟完成 ===");
    info!("总步数: {}", summary.steps);
    if summary.diverged > 0 {
        warn!("{} 步 Newton 未收敛", summary.diverged);
    }
    info!("计算时间: {:.2} s", summary.wall_time.as_secs_f64());
    info!("输出 {} 行到 {}", rows, args.output.display());

    Ok(())
}
