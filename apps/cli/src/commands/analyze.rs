//! 单张图像分析

use super::{AnalyzerArgs, load_image};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// 分析命令参数
#[derive(Args, Debug)]
pub struct AnalyzeCommand {
    /// 悬滴图像（PNG / JPEG）
    pub image: PathBuf,

    #[command(flatten)]
    pub analyzer: AnalyzerArgs,

    /// 保存标注图像
    #[arg(short, long)]
    pub annotated: Option<PathBuf>,
}

impl AnalyzeCommand {
    pub fn execute(&self) -> Result<()> {
        let analyzer = self.analyzer.analyzer()?;
        let image = load_image(&self.image)?;
        let analysis = analyzer.analyze_image(&image)?;

        let scale = analyzer.config().scale_mm_per_px;
        let geometry = &analysis.geometry;
        println!("📷 {}", self.image.display());
        println!("  De: {:.0} px ({:.3} mm)", geometry.de_px, geometry.de_px * scale);
        println!("  Ds: {:.0} px ({:.3} mm)", geometry.ds_px, geometry.ds_px * scale);
        println!("  S:  {:.4}", geometry.shape_factor);
        println!("  γ:  {:.2} mN/m", analysis.surface_tension);

        if let Some(path) = &self.annotated {
            analysis.annotated.save(path)?;
            println!("💾 标注图像已保存: {}", path.display());
        }
        Ok(())
    }
}
