//! 悬滴相机（对外 API）

use crate::error::DriverError;
use crate::feed::FeedHandle;
use crate::metrics::{CameraMetrics, MetricsSnapshot};
use crate::pipeline::{PipelineConfig, ProcessJob, grab_loop, process_loop};
use crate::sink::{FrameSink, NullSink};
use crate::state::CameraContext;
use crossbeam_channel::Receiver;
use pendant_analysis::FrameAnalyzer;
use pendant_hal::CameraDevice;
use pendant_protocol::{Sample, TimeSeries};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{Span, error, info, warn};

/// 带超时的 join
///
/// 超时返回原句柄，线程的返回值（例如相机设备）可以稍后再回收。
trait JoinTimeout: Sized {
    type Output;

    fn join_timeout(self, timeout: Duration) -> Result<std::thread::Result<Self::Output>, Self>;
}

impl<T> JoinTimeout for JoinHandle<T> {
    type Output = T;

    fn join_timeout(self, timeout: Duration) -> Result<std::thread::Result<T>, Self> {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return Err(self);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(self.join())
    }
}

/// 悬滴相机
///
/// 拥有相机设备、采集线程和处理线程。视频流（采集）与测量（处理）分别启停：
///
/// ```text
/// start_stream ─► initialize_measurement(well) ─► start_capture ─► ... ─► stop_capture ─► stop_stream
/// ```
///
/// 时间序列由处理线程通过通道发送，在 [`time_series`](Self::time_series) 时汇总。
pub struct PendantDropCamera {
    device: Option<Box<dyn CameraDevice>>,
    analyzer: Arc<dyn FrameAnalyzer>,
    sink: Arc<dyn FrameSink>,
    config: PipelineConfig,
    ctx: Arc<CameraContext>,
    metrics: Arc<CameraMetrics>,
    streaming: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    grab_thread: Option<JoinHandle<Box<dyn CameraDevice>>>,
    process_thread: Option<JoinHandle<()>>,
    /// 每次采集新建，旧处理线程的发送端随之失效
    sample_rx: Receiver<Sample>,
    series: TimeSeries,
    well_id: Option<String>,
    span: Span,
}

impl PendantDropCamera {
    /// 创建相机（不启动任何线程）
    ///
    /// 默认不保存快照（[`NullSink`]），默认配置见 [`PipelineConfig`]。
    pub fn new(device: impl CameraDevice + 'static, analyzer: Arc<dyn FrameAnalyzer>) -> Self {
        let (_, sample_rx) = crossbeam_channel::unbounded();
        Self {
            device: Some(Box::new(device)),
            analyzer,
            sink: Arc::new(NullSink),
            config: PipelineConfig::default(),
            ctx: Arc::new(CameraContext::new()),
            metrics: Arc::new(CameraMetrics::new()),
            streaming: Arc::new(AtomicBool::new(false)),
            capturing: Arc::new(AtomicBool::new(false)),
            grab_thread: None,
            process_thread: None,
            sample_rx,
            series: TimeSeries::new(),
            well_id: None,
            span: tracing::info_span!("camera"),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 使用外部传入的日志 span，两个工作线程也在该 span 下记录日志
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 启动视频流（已在运行时直接返回）
    ///
    /// 上一次的采集线程还阻塞在取帧中时返回 [`DriverError::DeviceUnavailable`]，
    /// 稍后重试即可。
    pub fn start_stream(&mut self) -> Result<(), DriverError> {
        let span = self.span.clone();
        let _guard = span.enter();
        if self.is_streaming() {
            return Ok(());
        }
        self.config.validate()?;
        // 上一次视频流可能因故障退出或停止时未能及时退出，先回收设备
        self.reap_grab_thread();

        let device = self.device.take().ok_or(DriverError::DeviceUnavailable)?;
        self.ctx.clear_fault();
        self.streaming.store(true, Ordering::Release);

        let ctx = self.ctx.clone();
        let config = self.config.clone();
        let streaming = self.streaming.clone();
        let metrics = self.metrics.clone();
        let span = self.span.clone();
        let handle = std::thread::Builder::new()
            .name("pendant-grab".into())
            .spawn(move || span.in_scope(|| grab_loop(device, ctx, config, streaming, metrics)));
        match handle {
            Ok(handle) => {
                self.grab_thread = Some(handle);
                info!("Camera stream started");
                Ok(())
            },
            Err(e) => {
                // 设备已随闭包丢失
                self.streaming.store(false, Ordering::Release);
                error!("Failed to spawn grab thread: {}", e);
                Err(DriverError::Io(e))
            },
        }
    }

    /// 停止视频流并回收相机设备
    ///
    /// 最新帧寄存器被清空，下一次测量不会看到这次视频流的画面。
    pub fn stop_stream(&mut self) {
        let span = self.span.clone();
        let _guard = span.enter();
        self.streaming.store(false, Ordering::Release);
        if self.grab_thread.is_some() {
            self.reap_grab_thread();
            info!("Camera stream stopped");
        }
        self.ctx.latest_frame.store(None);
        self.ctx.latest_analysis.store(None);
    }

    fn reap_grab_thread(&mut self) {
        let Some(handle) = self.grab_thread.take() else {
            return;
        };
        let join_timeout = self.config.join_timeout();
        match handle.join_timeout(join_timeout) {
            Ok(Ok(device)) => self.device = Some(device),
            Ok(Err(_panic)) => error!("Grab thread panicked, camera device lost"),
            Err(handle) => {
                // 保留句柄，下次启动时再回收设备
                warn!(
                    "Grab thread still blocked after {:?}, device will be reclaimed later",
                    join_timeout
                );
                self.grab_thread = Some(handle);
            },
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    /// 视频流故障原因（硬件超时等），视频流正常时为 `None`
    pub fn stream_fault(&self) -> Option<String> {
        self.ctx.fault_reason()
    }

    /// 开始新的测量：清空时间序列、记录孔位
    ///
    /// 采集进行中调用返回 [`DriverError::CaptureActive`]。
    pub fn initialize_measurement(&mut self, well_id: impl Into<String>) -> Result<(), DriverError> {
        let span = self.span.clone();
        let _guard = span.enter();
        if self.is_capturing() {
            return Err(DriverError::CaptureActive);
        }
        // 丢弃上一次测量残留在通道里的采样
        while self.sample_rx.try_recv().is_ok() {}
        self.series.clear();
        self.ctx.latest_analysis.store(None);
        let well_id = well_id.into();
        info!("Measurement initialized for {}", well_id);
        self.well_id = Some(well_id);
        Ok(())
    }

    /// 启动处理线程（已在运行时直接返回）
    pub fn start_capture(&mut self) -> Result<(), DriverError> {
        let span = self.span.clone();
        let _guard = span.enter();
        let well_id = self.well_id.clone().ok_or(DriverError::NotInitialized)?;
        if self.is_capturing() {
            warn!("Capture already running for {}", well_id);
            return Ok(());
        }
        // 处理线程可能因为通道关闭而提前退出
        self.reap_process_thread();
        self.drain_samples();

        // 新的停止标志和通道：没能及时退出的旧处理线程不会再写入这次采集
        let (sample_tx, sample_rx) = crossbeam_channel::unbounded();
        self.sample_rx = sample_rx;
        self.capturing = Arc::new(AtomicBool::new(true));
        let job = ProcessJob {
            well_id: well_id.clone(),
            started: Instant::now(),
            analyzer: self.analyzer.clone(),
            sink: self.sink.clone(),
            samples: sample_tx,
        };
        let ctx = self.ctx.clone();
        let config = self.config.clone();
        let capturing = self.capturing.clone();
        let metrics = self.metrics.clone();
        let span = self.span.clone();
        let handle = std::thread::Builder::new()
            .name("pendant-process".into())
            .spawn(move || span.in_scope(|| process_loop(job, ctx, config, capturing, metrics)));
        match handle {
            Ok(handle) => {
                self.process_thread = Some(handle);
                info!("Capture started for {}", well_id);
                Ok(())
            },
            Err(e) => {
                self.capturing.store(false, Ordering::Release);
                error!("Failed to spawn process thread: {}", e);
                Err(DriverError::Io(e))
            },
        }
    }

    /// 停止处理线程；已产生的采样保留在时间序列中
    pub fn stop_capture(&mut self) {
        let span = self.span.clone();
        let _guard = span.enter();
        self.capturing.store(false, Ordering::Release);
        if self.process_thread.is_some() {
            self.reap_process_thread();
            self.drain_samples();
            info!(
                "Capture stopped for {} ({} samples)",
                self.well_id.as_deref().unwrap_or("?"),
                self.series.len()
            );
        }
    }

    fn reap_process_thread(&mut self) {
        let Some(handle) = self.process_thread.take() else {
            return;
        };
        let join_timeout = self.config.join_timeout();
        match handle.join_timeout(join_timeout) {
            Ok(Ok(())) => {},
            Ok(Err(_panic)) => error!("Process thread panicked"),
            // 分离：它的停止标志已清除，通道在下次采集时被替换
            Err(_handle) => warn!(
                "Process thread still running after {:?}, detaching it",
                join_timeout
            ),
        }
    }

    fn drain_samples(&mut self) {
        self.series.extend(self.sample_rx.try_iter());
    }

    /// 当前测量的时间序列（先汇总通道中的新采样）
    pub fn time_series(&mut self) -> &TimeSeries {
        self.drain_samples();
        &self.series
    }

    /// 最近一个采样
    pub fn last_sample(&mut self) -> Option<Sample> {
        self.drain_samples();
        self.series.last().copied()
    }

    /// 取走时间序列（内部序列被清空）
    pub fn take_time_series(&mut self) -> TimeSeries {
        self.drain_samples();
        std::mem::take(&mut self.series)
    }

    pub fn well_id(&self) -> Option<&str> {
        self.well_id.as_deref()
    }

    /// 视频流句柄
    pub fn feed(&self) -> FeedHandle {
        FeedHandle::new(self.ctx.clone())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for PendantDropCamera {
    fn drop(&mut self) {
        self.stop_capture();
        self.stop_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pendant_analysis::{AnalysisError, DropAnalysis};
    use pendant_hal::RgbImage;
    use pendant_hal::mock::MockCamera;
    use pendant_protocol::DropGeometry;
    use pendant_hal::CameraError;
    use std::sync::atomic::{AtomicU8, AtomicUsize};

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            grab_timeout_ms: 200,
            save_interval_ms: 20,
            idle_sleep_ms: 1,
            join_timeout_ms: 1000,
        }
    }

    fn constant_analyzer(st: f64) -> Arc<dyn FrameAnalyzer> {
        Arc::new(move |img: &RgbImage| -> Result<DropAnalysis, AnalysisError> {
            Ok(DropAnalysis {
                geometry: DropGeometry {
                    de_px: 100.0,
                    ds_px: 70.0,
                    shape_factor: 0.7,
                },
                surface_tension: st,
                annotated: img.clone(),
            })
        })
    }

    fn failing_analyzer() -> Arc<dyn FrameAnalyzer> {
        Arc::new(|_: &RgbImage| -> Result<DropAnalysis, AnalysisError> {
            Err(AnalysisError::NoContour)
        })
    }

    /// 表面张力取图像左上角像素的红色分量，用于区分帧来源
    fn pixel_analyzer() -> Arc<dyn FrameAnalyzer> {
        Arc::new(|img: &RgbImage| -> Result<DropAnalysis, AnalysisError> {
            Ok(DropAnalysis {
                geometry: DropGeometry {
                    de_px: 100.0,
                    ds_px: 70.0,
                    shape_factor: 0.7,
                },
                surface_tension: f64::from(img.get_pixel(0, 0)[0]),
                annotated: img.clone(),
            })
        })
    }

    /// 不理会超时、每次取帧都阻塞固定时长的设备
    struct StuckCamera {
        block: Duration,
    }

    impl CameraDevice for StuckCamera {
        fn grab_next_frame(&mut self, _timeout: Duration) -> Result<RgbImage, CameraError> {
            std::thread::sleep(self.block);
            Ok(RgbImage::new(8, 8))
        }
    }

    fn camera() -> MockCamera {
        MockCamera::constant(RgbImage::new(8, 8)).with_frame_interval(Duration::from_millis(2))
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_stream_publishes_frames_and_restarts() {
        let mut cam =
            PendantDropCamera::new(camera(), constant_analyzer(70.0)).with_config(fast_config());
        let feed = cam.feed();
        cam.start_stream().unwrap();
        assert!(cam.is_streaming());
        assert!(wait_until(Duration::from_secs(2), || feed.current_image().is_some()));

        cam.stop_stream();
        assert!(!cam.is_streaming());
        let grabbed = cam.metrics().frames_grabbed;
        assert!(grabbed > 0);

        // 设备已归还，可以再次启动
        cam.start_stream().unwrap();
        assert!(wait_until(Duration::from_secs(2), || cam.metrics().frames_grabbed > grabbed));
        cam.stop_stream();
    }

    #[test]
    fn test_capture_requires_initialization() {
        let mut cam = PendantDropCamera::new(camera(), constant_analyzer(70.0));
        assert!(matches!(cam.start_capture(), Err(DriverError::NotInitialized)));
    }

    #[test]
    fn test_capture_produces_time_series() {
        let mut cam =
            PendantDropCamera::new(camera(), constant_analyzer(71.5)).with_config(fast_config());
        cam.start_stream().unwrap();
        cam.initialize_measurement("2A1").unwrap();
        cam.start_capture().unwrap();
        assert!(matches!(
            cam.initialize_measurement("2A2"),
            Err(DriverError::CaptureActive)
        ));

        assert!(wait_until(Duration::from_secs(2), || cam.time_series().len() >= 3));
        cam.stop_capture();
        cam.stop_stream();

        let series = cam.time_series().clone();
        assert!(series.iter().all(|s| s.surface_tension == 71.5));
        let times: Vec<f64> = series.iter().map(|s| s.elapsed_s).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(cam.metrics().frames_analyzed >= 3);

        // 重新初始化清空序列
        cam.initialize_measurement("2A2").unwrap();
        assert!(cam.time_series().is_empty());
        assert_eq!(cam.well_id(), Some("2A2"));
    }

    #[test]
    fn test_analysis_failure_clears_annotated_image() {
        let mut cam =
            PendantDropCamera::new(camera(), failing_analyzer()).with_config(fast_config());
        let feed = cam.feed();
        cam.ctx
            .latest_analysis
            .store(Some(Arc::new(RgbImage::from_pixel(8, 8, image::Rgb([0, 255, 0])))));
        cam.start_stream().unwrap();
        cam.initialize_measurement("2A1").unwrap();
        cam.start_capture().unwrap();

        assert!(wait_until(Duration::from_secs(2), || cam.metrics().analysis_failures > 0));
        // 回退到原始帧（全黑）
        assert_eq!(feed.current_image().unwrap().get_pixel(0, 0), &image::Rgb([0, 0, 0]));
        cam.stop_capture();
        assert!(cam.time_series().is_empty());
    }

    #[test]
    fn test_each_frame_analyzed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let analyzer: Arc<dyn FrameAnalyzer> =
            Arc::new(move |img: &RgbImage| -> Result<DropAnalysis, AnalysisError> {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(DropAnalysis {
                    geometry: DropGeometry {
                        de_px: 1.0,
                        ds_px: 0.5,
                        shape_factor: 0.5,
                    },
                    surface_tension: 50.0,
                    annotated: img.clone(),
                })
            });
        let slow = MockCamera::constant(RgbImage::new(8, 8))
            .with_frame_interval(Duration::from_millis(40));
        let mut cam = PendantDropCamera::new(slow, analyzer).with_config(fast_config());
        cam.start_stream().unwrap();
        cam.initialize_measurement("2A1").unwrap();
        cam.start_capture().unwrap();
        std::thread::sleep(Duration::from_millis(300));
        cam.stop_capture();
        cam.stop_stream();

        let grabbed = cam.metrics().frames_grabbed as usize;
        assert!(calls.load(Ordering::Relaxed) <= grabbed);
    }

    #[test]
    fn test_grab_timeout_faults_stream() {
        let flaky = MockCamera::constant(RgbImage::new(8, 8))
            .with_frame_interval(Duration::ZERO)
            .with_timeout_after(3);
        let mut cam =
            PendantDropCamera::new(flaky, constant_analyzer(70.0)).with_config(fast_config());
        cam.start_stream().unwrap();

        assert!(wait_until(Duration::from_secs(2), || !cam.is_streaming()));
        assert!(cam.stream_fault().unwrap().contains("timed out"));
        assert_eq!(cam.metrics().grab_timeouts, 1);

        // 故障后可以重新启动（设备被回收）
        cam.start_stream().unwrap();
        assert!(cam.stream_fault().is_none() || !cam.is_streaming());
        cam.stop_stream();
    }

    #[test]
    fn test_snapshots_saved_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(crate::DirectorySink::new(dir.path()));
        let mut cam = PendantDropCamera::new(camera(), constant_analyzer(65.0))
            .with_config(fast_config())
            .with_sink(sink);
        cam.start_stream().unwrap();
        cam.initialize_measurement("3B2").unwrap();
        cam.start_capture().unwrap();
        assert!(wait_until(Duration::from_secs(2), || cam.metrics().frames_saved >= 2));
        cam.stop_capture();
        cam.stop_stream();

        let count = std::fs::read_dir(dir.path().join("3B2")).unwrap().count();
        assert!(count >= 1);
    }

    #[test]
    fn test_second_capture_ignores_previous_stream() {
        let shade = Arc::new(AtomicU8::new(40));
        let source = shade.clone();
        let device = MockCamera::new(move |_| {
            RgbImage::from_pixel(8, 8, image::Rgb([source.load(Ordering::Relaxed), 0, 0]))
        })
        .with_frame_interval(Duration::from_millis(60));
        let mut cam = PendantDropCamera::new(device, pixel_analyzer()).with_config(fast_config());

        cam.start_stream().unwrap();
        cam.initialize_measurement("2A1").unwrap();
        cam.start_capture().unwrap();
        assert!(wait_until(Duration::from_secs(2), || !cam.time_series().is_empty()));
        cam.stop_capture();
        cam.stop_stream();
        assert!(cam.feed().current_image().is_none());
        assert!(cam.time_series().iter().all(|s| s.surface_tension == 40.0));

        // 第二个孔：新视频流的每一帧都是 60
        shade.store(60, Ordering::Relaxed);
        cam.start_stream().unwrap();
        cam.initialize_measurement("2A2").unwrap();
        cam.start_capture().unwrap();
        assert!(wait_until(Duration::from_secs(2), || !cam.time_series().is_empty()));
        cam.stop_capture();
        cam.stop_stream();

        let series = cam.time_series();
        assert!(series.iter().all(|s| s.surface_tension == 60.0));
        assert!(series.iter().all(|s| s.elapsed_s >= 0.0));
    }

    #[test]
    fn test_capture_skips_frames_grabbed_before_start() {
        // 像素值就是帧序号
        let device = MockCamera::new(|index| {
            RgbImage::from_pixel(8, 8, image::Rgb([(index % 256) as u8, 0, 0]))
        })
        .with_frame_interval(Duration::from_millis(30));
        let mut cam = PendantDropCamera::new(device, pixel_analyzer()).with_config(fast_config());
        cam.start_stream().unwrap();
        assert!(wait_until(Duration::from_secs(2), || cam.metrics().frames_grabbed >= 3));

        let grabbed_before = cam.metrics().frames_grabbed as f64;
        cam.initialize_measurement("2A1").unwrap();
        cam.start_capture().unwrap();
        assert!(wait_until(Duration::from_secs(2), || !cam.time_series().is_empty()));
        cam.stop_capture();
        cam.stop_stream();

        assert!(cam.time_series().iter().all(|s| s.surface_tension >= grabbed_before));
    }

    #[test]
    fn test_blocked_grab_keeps_device_recoverable() {
        let device = StuckCamera {
            block: Duration::from_millis(600),
        };
        let config = PipelineConfig {
            grab_timeout_ms: 100,
            save_interval_ms: 20,
            idle_sleep_ms: 1,
            join_timeout_ms: 150,
        };
        let mut cam = PendantDropCamera::new(device, constant_analyzer(70.0)).with_config(config);
        cam.start_stream().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        // 采集线程还卡在取帧里：停止时等不到它，句柄被保留
        cam.stop_stream();
        assert!(!cam.is_streaming());
        assert!(cam.grab_thread.is_some());
        assert!(matches!(cam.start_stream(), Err(DriverError::DeviceUnavailable)));
        assert!(!cam.is_streaming());

        // 取帧返回后线程退出，设备被回收
        std::thread::sleep(Duration::from_millis(400));
        cam.start_stream().unwrap();
        assert!(cam.is_streaming());
    }

    #[test]
    fn test_invalid_config_rejected_on_start() {
        let config = PipelineConfig {
            grab_timeout_ms: 1000,
            join_timeout_ms: 300,
            ..fast_config()
        };
        let mut cam = PendantDropCamera::new(camera(), constant_analyzer(70.0)).with_config(config);
        assert!(matches!(cam.start_stream(), Err(DriverError::InvalidConfig(_))));
        assert!(!cam.is_streaming());
    }
}
