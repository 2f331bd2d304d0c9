//! 相机流水线演示
//!
//! 合成悬滴相机 → 采集线程 → 分析线程，定时打印最新表面张力，结束时导出 JPEG 快照。

use super::{AnalyzerArgs, SyntheticArgs, install_ctrlc};
use anyhow::Result;
use clap::Args;
use pendant_sdk::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// 视频流命令参数
#[derive(Args, Debug)]
pub struct StreamCommand {
    /// 运行时长（秒），Ctrl-C 提前结束
    #[arg(short, long, default_value_t = 10.0)]
    pub duration: f64,

    /// 最新标注帧的 JPEG 快照
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// 每隔一段时间保存标注帧的目录
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    #[command(flatten)]
    pub analyzer: AnalyzerArgs,

    #[command(flatten)]
    pub synthetic: SyntheticArgs,
}

impl StreamCommand {
    pub fn execute(&self) -> Result<()> {
        let running = install_ctrlc()?;
        let analyzer = Arc::new(self.analyzer.analyzer()?);
        let mut camera = PendantDropCamera::new(self.synthetic.camera(), analyzer);
        if let Some(dir) = &self.frames_dir {
            camera = camera.with_sink(Arc::new(DirectorySink::new(dir)));
        }

        camera.start_stream()?;
        camera.initialize_measurement("stream")?;
        camera.start_capture()?;
        println!("▶ 视频流运行中（{:.0} s，Ctrl-C 停止）", self.duration);

        let start = Instant::now();
        let duration = Duration::from_secs_f64(self.duration.max(0.0));
        while running.load(Ordering::SeqCst) && start.elapsed() < duration {
            std::thread::sleep(Duration::from_secs(1));
            if let Some(reason) = camera.stream_fault() {
                println!("❌ 视频流故障: {reason}");
                break;
            }
            match camera.last_sample() {
                Some(sample) => println!(
                    "  t = {:>6.1} s  γ = {:.2} mN/m",
                    sample.elapsed_s, sample.surface_tension
                ),
                None => println!("  等待分析结果..."),
            }
        }

        camera.stop_capture();
        if let Some(path) = &self.snapshot {
            match camera.feed().jpeg()? {
                Some(jpeg) => {
                    std::fs::write(path, jpeg)?;
                    println!("💾 快照已保存: {}", path.display());
                },
                None => println!("⚠️ 没有可用的帧"),
            }
        }
        camera.stop_stream();

        let series = camera.take_time_series();
        let metrics = camera.metrics();
        println!("📊 采样 {} 个", series.len());
        println!(
            "  帧: 采集 {} / 分析成功 {} / 失败 {} / 保存 {}",
            metrics.frames_grabbed,
            metrics.frames_analyzed,
            metrics.analysis_failures,
            metrics.frames_saved
        );
        if let Some(rate) = metrics.analysis_success_rate() {
            println!("  分析成功率: {:.1}%", rate * 100.0);
        }
        Ok(())
    }
}
