// apps/so_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 依次检查：JSON 格式、字段取值、模型能否完成无量纲化与条件化。

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use so_config::Properties;
use so_physics::MomentModel;
use tracing::{error, info, warn};

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== StochOil 配置验证 ===");
    let mut result = ValidationResult::default();
    validate_config(&args.config, &mut result);
    print_validation_result(&result, args.strict)
}

fn validate_config(path: &Path, result: &mut ValidationResult) {
    println!("\n检查配置文件: {}", path.display());

    if !path.exists() {
        result.add_error(format!("配置文件不存在: {}", path.display()));
        return;
    }

    let props = match Properties::from_file(path) {
        Ok(p) => p,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };
    println!("  ✓ 配置文件格式有效");

    check_advisories(&props, result);

    // 条件化需要完整的先验协方差，只有构造模型才能发现奇异测点
    match MomentModel::configure(&props).and_then(|mut m| m.initialize_state()) {
        Ok(()) => println!("  ✓ 模型初始化成功"),
        Err(e) => result.add_error(format!("模型初始化失败: {}", e)),
    }
}

fn check_advisories(props: &Properties, result: &mut ValidationResult) {
    if props.covariance.sigma_f == 0.0 {
        result.add_warning("sigma_f = 0：结果退化为确定性解");
    } else if props.covariance.sigma_f > 1.0 {
        result.add_warning(format!(
            "sigma_f = {} 较大，小扰动展开可能失效",
            props.covariance.sigma_f
        ));
    }

    let spacing = props.grid.hx.min(props.grid.hy);
    if props.covariance.l_f < spacing {
        result.add_warning(format!(
            "相关长度 {} m 小于网格步长 {} m",
            props.covariance.l_f, spacing
        ));
    }

    if props.covariance.start_time_simple_approx >= props.covariance.possible_steps_num {
        result.add_warning("start_time_simple_approx 不小于历史槽位数，简化阶段前就会淘汰槽位");
    }

    let cells = props.grid.num_x * props.grid.num_y;
    let n = props.cell_count();
    let bytes = (props.covariance.possible_steps_num + 2) * n * n * std::mem::size_of::<f64>();
    if bytes > 1 << 30 {
        result.add_warning(format!(
            "{} 个内部单元的协方差历史约需 {:.1} GiB 内存",
            cells,
            bytes as f64 / (1u64 << 30) as f64
        ));
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
        }
    }

    if result.is_ok(strict) {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("props.json");
        Properties::default().save_to_file(&path).unwrap();

        let mut result = ValidationResult::default();
        validate_config(&path, &mut result);
        assert!(result.is_ok(false), "{:?}", result.errors);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let mut result = ValidationResult::default();
        validate_config(&dir.path().join("missing.json"), &mut result);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_zero_variance_warns() {
        let mut props = Properties::default();
        props.covariance.sigma_f = 0.0;
        let mut result = ValidationResult::default();
        check_advisories(&props, &mut result);
        assert!(result.is_ok(false));
        assert!(!result.is_ok(true));
    }
}
