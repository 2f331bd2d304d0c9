//! CLI 命令模块

pub mod analyze;
pub mod calibrate;
pub mod layout;
pub mod simulate;
pub mod stats;
pub mod stream;

pub use analyze::AnalyzeCommand;
pub use calibrate::CalibrateCommand;
pub use layout::LayoutCommand;
pub use simulate::SimulateCommand;
pub use stats::StatsCommand;
pub use stream::StreamCommand;

use anyhow::{Context, Result};
use clap::Args;
use pendant_sdk::analysis::synthetic::SyntheticDrop;
use pendant_sdk::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 分析器参数（多个命令共用）
#[derive(Args, Debug, Clone, Default)]
pub struct AnalyzerArgs {
    /// 实验配置文件，读取其中的 `[analyzer]`
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 像素尺寸（mm/px，覆盖配置）
    #[arg(long)]
    pub scale: Option<f64>,

    /// 液体密度（g/mL，覆盖配置）
    #[arg(long)]
    pub density: Option<f64>,
}

impl AnalyzerArgs {
    /// 配置文件 + 命令行覆盖
    pub fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        let mut config = match &self.config {
            Some(path) => load_experiment(path)?.analyzer,
            None => AnalyzerConfig::default(),
        };
        if let Some(scale) = self.scale {
            config.scale_mm_per_px = scale;
        }
        if let Some(density) = self.density {
            config.density_g_per_ml = density;
        }
        Ok(config)
    }

    pub fn analyzer(&self) -> Result<DropShapeAnalyzer> {
        Ok(DropShapeAnalyzer::new(self.analyzer_config()?)?)
    }
}

pub fn load_experiment(path: &Path) -> Result<ExperimentConfig> {
    ExperimentConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

pub fn load_image(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(image.to_rgb8())
}

/// 合成悬滴相机参数
#[derive(Args, Debug, Clone)]
pub struct SyntheticArgs {
    /// 液滴水平半径（像素）
    #[arg(long, default_value_t = 80.0)]
    pub radius: f64,

    /// 竖直半径 / 水平半径
    #[arg(long, default_value_t = 1.15)]
    pub elongation: f64,

    /// 帧间隔（毫秒）
    #[arg(long, default_value_t = 50)]
    pub frame_ms: u64,
}

impl Default for SyntheticArgs {
    fn default() -> Self {
        Self {
            radius: 80.0,
            elongation: 1.15,
            frame_ms: 50,
        }
    }
}

impl SyntheticArgs {
    pub fn camera(&self) -> pendant_sdk::hal::mock::MockCamera {
        let drop = SyntheticDrop {
            radius: self.radius,
            elongation: self.elongation,
            ..SyntheticDrop::default()
        };
        pendant_sdk::hal::mock::MockCamera::constant(drop.render())
            .with_frame_interval(std::time::Duration::from_millis(self.frame_ms))
    }
}

/// Ctrl-C 后置为 `false`
pub fn install_ctrlc() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        println!("\n收到退出信号，正在停止...");
    })?;
    Ok(running)
}
