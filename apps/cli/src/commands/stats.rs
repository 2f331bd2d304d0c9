//! 时间序列统计

use anyhow::{Context, Result};
use clap::Args;
use pendant_sdk::prelude::*;
use pendant_sdk::tools::{DEFAULT_EQUILIBRIUM_WINDOW, SeriesStatistics, read_time_series};
use std::path::PathBuf;

/// 统计命令参数
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// 时间序列 CSV
    pub series: PathBuf,

    /// 平衡表面张力取末尾多少个采样
    #[arg(short, long, default_value_t = DEFAULT_EQUILIBRIUM_WINDOW)]
    pub window: usize,
}

impl StatsCommand {
    pub fn execute(&self) -> Result<()> {
        let series = read_time_series(&self.series)
            .with_context(|| format!("failed to read {}", self.series.display()))?;
        let Some(stats) = SeriesStatistics::from_series(&series) else {
            println!("⚠️ {} 没有采样", self.series.display());
            return Ok(());
        };

        println!("📊 {}", self.series.display());
        println!("  采样数: {}", stats.count);
        println!("  时长:   {:.1} s", stats.duration_s);
        println!("  平均:   {:.2} mN/m", stats.mean);
        println!("  标准差: {:.2} mN/m", stats.std_dev);
        println!("  范围:   {:.2} ~ {:.2} mN/m", stats.min, stats.max);
        if let Some(st) = equilibrium_surface_tension(&series, self.window) {
            println!("  平衡表面张力（末 {} 个）: {:.2} mN/m", self.window, st);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pendant_sdk::tools::write_time_series;

    #[test]
    fn test_stats_of_written_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        let samples: Vec<Sample> = (0..10)
            .map(|i| Sample::new(i as f64, 70.0 - i as f64))
            .collect();
        write_time_series(&path, &TimeSeries::from(samples)).unwrap();

        let cmd = StatsCommand { series: path, window: 3 };
        cmd.execute().unwrap();
    }

    #[test]
    fn test_stats_missing_file() {
        let cmd = StatsCommand {
            series: PathBuf::from("/nonexistent/series.csv"),
            window: 3,
        };
        assert!(cmd.execute().is_err());
    }
}
