//! 相机流水线性能指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 相机流水线实时指标
#[derive(Debug, Default)]
pub struct CameraMetrics {
    /// 采集到的总帧数
    pub frames_grabbed: AtomicU64,

    /// 取帧超时次数（每次都会终止视频流）
    pub grab_timeouts: AtomicU64,

    /// 其他设备错误次数
    pub device_errors: AtomicU64,

    /// 分析成功的帧数
    pub frames_analyzed: AtomicU64,

    /// 分析失败的帧数（几何错误，正常现象，例如液滴尚未形成）
    pub analysis_failures: AtomicU64,

    pub frames_saved: AtomicU64,

    pub save_failures: AtomicU64,
}

impl CameraMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_grabbed: self.frames_grabbed.load(Ordering::Relaxed),
            grab_timeouts: self.grab_timeouts.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            analysis_failures: self.analysis_failures.load(Ordering::Relaxed),
            frames_saved: self.frames_saved.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_grabbed: u64,
    pub grab_timeouts: u64,
    pub device_errors: u64,
    pub frames_analyzed: u64,
    pub analysis_failures: u64,
    pub frames_saved: u64,
    pub save_failures: u64,
}

impl MetricsSnapshot {
    /// 分析成功率（0.0 ~ 1.0），没有分析过任何帧时返回 `None`
    pub fn analysis_success_rate(&self) -> Option<f64> {
        let total = self.frames_analyzed + self.analysis_failures;
        (total > 0).then(|| self.frames_analyzed as f64 / total as f64)
    }
}
