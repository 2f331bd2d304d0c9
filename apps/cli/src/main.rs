//! # Pendant CLI
//!
//! 悬滴表面张力测量的命令行工具。
//!
//! ```bash
//! # 分析单张图像
//! pendant-cli analyze drop.png --scale 0.0105 --annotated out.png
//!
//! # 由针头外径标定像素尺寸
//! pendant-cli calibrate needle.png --needle-diameter 0.51
//!
//! # 检查甲板布局
//! pendant-cli layout layout.toml
//!
//! # 无硬件的完整实验（mock 机器人 + 合成悬滴）
//! pendant-cli simulate --config experiment.toml --dilute 2A:SDS:6:100
//!
//! # 查看时间序列
//! pendant-cli stats out/data/2A1/dynamic_surface_tension.csv
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{
    AnalyzeCommand, CalibrateCommand, LayoutCommand, SimulateCommand, StatsCommand, StreamCommand,
};

/// Pendant CLI - 悬滴表面张力测量命令行工具
#[derive(Parser, Debug)]
#[command(name = "pendant-cli")]
#[command(about = "Command-line interface for automated pendant-drop tensiometry", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 分析一张悬滴图像
    Analyze {
        #[command(flatten)]
        args: AnalyzeCommand,
    },

    /// 标定像素尺寸
    Calibrate {
        #[command(flatten)]
        args: CalibrateCommand,
    },

    /// 检查甲板布局文件
    Layout {
        #[command(flatten)]
        args: LayoutCommand,
    },

    /// 模拟完整实验
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 运行相机流水线并导出快照
    Stream {
        #[command(flatten)]
        args: StreamCommand,
    },

    /// 时间序列统计
    Stats {
        #[command(flatten)]
        args: StatsCommand,
    },
}

fn main() -> Result<()> {
    pendant_sdk::init_logger_with("pendant_cli=info,pendant_control=info,warn");

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { args } => args.execute(),
        Commands::Calibrate { args } => args.execute(),
        Commands::Layout { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
        Commands::Stream { args } => args.execute(),
        Commands::Stats { args } => args.execute(),
    }
}
