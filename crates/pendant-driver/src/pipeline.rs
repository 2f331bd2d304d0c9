//! 采集线程与处理线程的主循环

use crate::error::DriverError;
use crate::metrics::CameraMetrics;
use crate::sink::FrameSink;
use crate::state::CameraContext;
use crossbeam_channel::Sender;
use pendant_analysis::FrameAnalyzer;
use pendant_hal::{CameraDevice, CameraError};
use pendant_protocol::Sample;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// 流水线配置
///
/// # Example
///
/// ```
/// use pendant_driver::PipelineConfig;
///
/// let config = PipelineConfig {
///     grab_timeout_ms: 5000,
///     save_interval_ms: 1000,
///     idle_sleep_ms: 10,
///     join_timeout_ms: 6000,
/// };
/// assert_eq!(config, PipelineConfig::default());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 取帧超时（毫秒），超时即视为相机故障
    pub grab_timeout_ms: u64,
    /// 快照存盘间隔（毫秒）
    pub save_interval_ms: u64,
    /// 处理线程每轮的空闲休眠（毫秒）
    pub idle_sleep_ms: u64,
    /// 停止线程时的最长等待（毫秒），不能小于取帧超时
    pub join_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grab_timeout_ms: 5000,
            save_interval_ms: 1000,
            idle_sleep_ms: 10,
            join_timeout_ms: 6000,
        }
    }
}

impl PipelineConfig {
    /// 采集线程可能阻塞一个完整的取帧超时，join 等待必须覆盖它
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.grab_timeout_ms == 0 {
            return Err(DriverError::InvalidConfig("grab timeout must be > 0".into()));
        }
        if self.join_timeout_ms < self.grab_timeout_ms {
            return Err(DriverError::InvalidConfig(format!(
                "join timeout ({} ms) shorter than grab timeout ({} ms)",
                self.join_timeout_ms, self.grab_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn grab_timeout(&self) -> Duration {
        Duration::from_millis(self.grab_timeout_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// 采集线程主循环
///
/// 相机只在本线程内被访问。取帧超时或设备错误对视频流是致命的：
/// 记录故障、清除 `streaming` 标志并退出。返回设备以便所有者重新启动视频流。
pub(crate) fn grab_loop(
    mut device: Box<dyn CameraDevice>,
    ctx: Arc<CameraContext>,
    config: PipelineConfig,
    streaming: Arc<AtomicBool>,
    metrics: Arc<CameraMetrics>,
) -> Box<dyn CameraDevice> {
    let timeout = config.grab_timeout();
    debug!("Grab thread started on {}", device.name());

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !streaming.load(Ordering::Acquire) {
            trace!("Grab thread: streaming flag is false, exiting");
            break;
        }

        match device.grab_next_frame(timeout) {
            Ok(image) => {
                ctx.publish_frame(image);
                metrics.frames_grabbed.fetch_add(1, Ordering::Relaxed);
            },
            Err(CameraError::Timeout(after)) => {
                metrics.grab_timeouts.fetch_add(1, Ordering::Relaxed);
                error!("Frame grab timed out after {:?}, stopping stream", after);
                ctx.set_fault(format!("frame grab timed out after {after:?}"));
                streaming.store(false, Ordering::Release);
                break;
            },
            Err(e) => {
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                error!("Camera error: {}, stopping stream", e);
                ctx.set_fault(e.to_string());
                streaming.store(false, Ordering::Release);
                break;
            },
        }
    }

    device
}

/// 处理线程的输入
pub(crate) struct ProcessJob {
    pub well_id: String,
    /// 采集开始时刻（采样时间的原点）
    pub started: Instant,
    pub analyzer: Arc<dyn FrameAnalyzer>,
    pub sink: Arc<dyn FrameSink>,
    pub samples: Sender<Sample>,
}

/// 处理线程主循环
///
/// 每个新帧只分析一次，采集开始前拍到的帧（例如上一个孔残留的帧）不分析；
/// 约每 `save_interval` 存一张快照。
/// 分析成功发送采样并更新标注图像，失败则清空标注图像（视频流回退到原始帧）。
pub(crate) fn process_loop(
    job: ProcessJob,
    ctx: Arc<CameraContext>,
    config: PipelineConfig,
    capturing: Arc<AtomicBool>,
    metrics: Arc<CameraMetrics>,
) {
    let save_interval = config.save_interval();
    let idle = config.idle_sleep();
    let mut last_seq: Option<u64> = None;
    let mut last_save: Option<Instant> = None;
    let mut last_st: Option<f64> = None;

    debug!("Process thread started for {}", job.well_id);

    loop {
        if !capturing.load(Ordering::Acquire) {
            trace!("Process thread: capturing flag is false, exiting");
            break;
        }

        let frame = match ctx.latest_frame.load_full() {
            Some(frame) if last_seq != Some(frame.seq) && frame.captured_at >= job.started => {
                frame
            },
            _ => {
                spin_sleep::sleep(idle);
                continue;
            },
        };
        last_seq = Some(frame.seq);

        if last_save.is_none_or(|t| t.elapsed() >= save_interval) {
            match job.sink.save(&job.well_id, &frame, last_st) {
                Ok(()) => {
                    metrics.frames_saved.fetch_add(1, Ordering::Relaxed);
                },
                Err(e) => {
                    metrics.save_failures.fetch_add(1, Ordering::Relaxed);
                    warn!("Failed to save snapshot for {}: {}", job.well_id, e);
                },
            }
            last_save = Some(Instant::now());
        }

        match job.analyzer.analyze(&frame.image) {
            Ok(analysis) => {
                metrics.frames_analyzed.fetch_add(1, Ordering::Relaxed);
                let elapsed = job.started.elapsed().as_secs_f64();
                last_st = Some(analysis.surface_tension);
                ctx.latest_analysis.store(Some(Arc::new(analysis.annotated)));
                if job
                    .samples
                    .send(Sample::new(elapsed, analysis.surface_tension))
                    .is_err()
                {
                    warn!("Sample receiver dropped, stopping process thread");
                    break;
                }
            },
            Err(e) => {
                metrics.analysis_failures.fetch_add(1, Ordering::Relaxed);
                trace!("Frame {} not analyzable: {}", frame.seq, e);
                ctx.latest_analysis.store(None);
            },
        }

        spin_sleep::sleep(idle);
    }
}
