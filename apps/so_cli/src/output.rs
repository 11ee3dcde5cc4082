// apps/so_cli/src/output.rs

//! 井时间序列输出
//!
//! 每个快照写一行，制表符分隔：
//!
//! - `Q.dat`: 时间 [h]，然后每口井的产量与产量标准差 [m³/日]
//! - `P.dat`: 时间 [h]，然后每口井的井底压力与其标准差 [bar]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use so_foundation::{SoError, SoResult};
use so_physics::engine::{StepObserver, StepReport};
use so_physics::MomentModel;
use tracing::debug;

/// 产量与压力时间序列写出器
pub struct WellSeriesWriter<W: Write> {
    rates: W,
    pressures: W,
    rows: usize,
}

impl WellSeriesWriter<BufWriter<File>> {
    /// 在目录下创建 `Q.dat` 与 `P.dat`
    pub fn create(dir: &Path) -> SoResult<Self> {
        let open = |name: &str| {
            let path = dir.join(name);
            File::create(&path)
                .map(BufWriter::new)
                .map_err(|e| SoError::io_with_source(format!("无法创建 {}", path.display()), e))
        };
        Ok(Self::new(open("Q.dat")?, open("P.dat")?))
    }
}

impl<W: Write> WellSeriesWriter<W> {
    /// 由两个输出流构造
    pub fn new(rates: W, pressures: W) -> Self {
        Self {
            rates,
            pressures,
            rows: 0,
        }
    }

    /// 已写出的行数
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 刷新并取回两个输出流
    pub fn finish(mut self) -> SoResult<(W, W)> {
        self.flush()?;
        Ok((self.rates, self.pressures))
    }

    fn flush(&mut self) -> SoResult<()> {
        self.rates
            .flush()
            .and_then(|_| self.pressures.flush())
            .map_err(|e| SoError::io_with_source("刷新时间序列失败", e))
    }

    fn write_row(&mut self, model: &MomentModel, time: f64) -> std::io::Result<()> {
        let hours = model.scaling().time_to_physical(time) / 3600.0;
        let reports = model
            .well_reports()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

        write!(self.rates, "{}", hours)?;
        write!(self.pressures, "{}", hours)?;
        for r in &reports {
            write!(self.rates, "\t{}\t{}", r.rate, r.rate_std)?;
            write!(self.pressures, "\t{}\t{}", r.pwf, r.pwf_std)?;
        }
        writeln!(self.rates)?;
        writeln!(self.pressures)
    }
}

impl<W: Write> StepObserver for WellSeriesWriter<W> {
    fn on_snapshot(&mut self, model: &MomentModel, time: f64, step: usize) -> SoResult<()> {
        self.write_row(model, time)
            .map_err(|e| SoError::io_with_source(format!("第 {} 步写出时间序列失败", step), e))?;
        self.rows += 1;
        Ok(())
    }

    fn on_step(&mut self, report: &StepReport) {
        debug!(
            "第 {} 步完成: 时段 {}, Newton {} 次",
            report.step,
            report.period,
            report.newton_iterations()
        );
    }
}
