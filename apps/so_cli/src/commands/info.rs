// apps/so_cli/src/commands/info.rs

//! 信息显示命令

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use so_config::Properties;
use so_physics::MomentModel;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 配置文件路径，给出时显示无量纲化参考量
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== StochOil 信息 ===");
    print_system_info();

    if args.defaults || args.config.is_none() {
        println!();
        print_default_config()?;
    }

    if let Some(path) = &args.config {
        println!();
        let props = Properties::from_file(path)
            .with_context(|| format!("无法加载配置 {}", path.display()))?;
        print_model_summary(&props)?;
    }

    Ok(())
}

fn print_system_info() {
    println!("=== 系统信息 ===");
    println!("StochOil CLI 版本: {}", env!("CARGO_PKG_VERSION"));
    println!("目标平台: {}", std::env::consts::ARCH);
    println!("操作系统: {}", std::env::consts::OS);
}

fn print_default_config() -> Result<()> {
    println!("=== 默认配置 ===");
    println!("{}", serde_json::to_string_pretty(&Properties::default())?);
    Ok(())
}

fn print_model_summary(props: &Properties) -> Result<()> {
    let model = MomentModel::configure(props)?;
    let scaling = model.scaling();
    let params = model.params();

    println!("=== 无量纲化 ===");
    println!("p_dim = {:.6e} Pa", scaling.p_dim());
    println!("r_dim = {} m", scaling.r_dim());
    println!("t_dim = {} s", scaling.t_dim());
    println!("q_dim = {:.6e} m³/s", scaling.q_dim());
    println!("储存系数 S = {:.6e}", params.storage);
    println!("ln(k/μ) = {:.6}", params.log_mobility);
    let ends: Vec<f64> = params
        .period_ends
        .iter()
        .map(|t| scaling.time_to_physical(*t) / 3600.0)
        .collect();
    println!("时段结束时刻 [h]: {:?}", ends);
    println!("单元总数（含边界环）: {}", model.grid().len());
    Ok(())
}
