// apps/so_cli/src/main.rs

//! StochOil 命令行界面
//!
//! 读取 JSON 配置，运行矩方程模拟，输出井产量与井底压力的均值和标准差时间序列。

mod commands;
mod output;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// StochOil 随机单相渗流矩方程求解器命令行工具
#[derive(Parser)]
#[command(name = "so_cli")]
#[command(author = "StochOil Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Moment-equation solver for single-phase flow in random permeability", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行模拟
    Run(commands::run::RunArgs),
    /// 显示信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // try_init 同时安装 log → tracing 桥，求解库的 log 记录由此输出
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
