//! 像素尺寸标定

use super::{AnalyzerArgs, load_image};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// 标定命令参数
#[derive(Args, Debug)]
pub struct CalibrateCommand {
    /// 带针头的图像
    pub image: PathBuf,

    /// 针头外径（mm）
    #[arg(short, long)]
    pub needle_diameter: f64,

    #[command(flatten)]
    pub analyzer: AnalyzerArgs,
}

impl CalibrateCommand {
    pub fn execute(&self) -> Result<()> {
        let analyzer = self.analyzer.analyzer()?;
        let image = load_image(&self.image)?;
        let scale = analyzer.calibrate_scale(&image, self.needle_diameter)?;

        println!("📏 针头外径: {} mm", self.needle_diameter);
        println!("  像素尺寸: {scale:.6} mm/px");
        println!();
        println!("[analyzer]");
        println!("scale_mm_per_px = {scale:.6}");
        Ok(())
    }
}
