//! # 统计工具
//!
//! 平衡表面张力与时间序列的描述统计

use pendant_protocol::TimeSeries;
use serde::{Deserialize, Serialize};
use tracing::info;

/// 计算平衡表面张力时取的末尾采样数
pub const DEFAULT_EQUILIBRIUM_WINDOW: usize = 100;

/// 平衡表面张力：末尾 `window` 个采样的平均值
///
/// 采样不足 `window` 个时对全部采样取平均并记录日志；空序列返回 `None`。
pub fn equilibrium_surface_tension(series: &TimeSeries, window: usize) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let samples = series.samples();
    let tail = if samples.len() > window {
        &samples[samples.len() - window..]
    } else {
        info!(
            "Less than {} samples measured ({}), averaging all of them",
            window,
            samples.len()
        );
        samples
    };
    let sum: f64 = tail.iter().map(|s| s.surface_tension).sum();
    Some(sum / tail.len() as f64)
}

/// 时间序列统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStatistics {
    /// 采样数
    pub count: usize,

    /// 平均表面张力（mN/m）
    pub mean: f64,

    pub min: f64,

    pub max: f64,

    /// 标准差（总体）
    pub std_dev: f64,

    /// 首末采样的时间跨度（秒）
    pub duration_s: f64,
}

impl SeriesStatistics {
    /// 空序列返回 `None`
    pub fn from_series(series: &TimeSeries) -> Option<Self> {
        let samples = series.samples();
        let first = samples.first()?;
        let last = samples.last()?;

        let count = samples.len();
        let mean = samples.iter().map(|s| s.surface_tension).sum::<f64>() / count as f64;
        let variance = samples
            .iter()
            .map(|s| (s.surface_tension - mean).powi(2))
            .sum::<f64>()
            / count as f64;
        let (min, max) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.surface_tension), hi.max(s.surface_tension))
        });

        Some(Self {
            count,
            mean,
            min,
            max,
            std_dev: variance.sqrt(),
            duration_s: last.elapsed_s - first.elapsed_s,
        })
    }
}
