//! # Pendant Analysis
//!
//! 悬滴形状分析：从液滴轮廓图像计算表面张力（纯函数，无硬件依赖）。
//!
//! ## 方法
//!
//! 选面法（selected plane）：测量液滴最大赤道直径 `De`，以及距顶点 `De`
//! 高度处的直径 `Ds`，形状因子 `S = Ds / De`。经验函数 `1/H(S)` 把形状因子
//! 换算成无量纲修正，表面张力为
//!
//! ```text
//! γ = ρ · g · (De · scale)² · 1/H(S)
//! ```
//!
//! 其中 ρ 单位 g/mL，scale 单位 mm/px，结果单位 mN/m。
//!
//! ## 模块
//!
//! - `shape_factor`: `1/H(S)` 分段经验公式
//! - `analyzer`: 图像处理流水线（模糊、边缘、轮廓、测量）
//! - `synthetic`: 合成悬滴图像（测试与仿真用）

pub mod analyzer;
pub mod shape_factor;
pub mod synthetic;

pub use analyzer::{AnalyzerConfig, DropAnalysis, DropShapeAnalyzer, FrameAnalyzer};
pub use shape_factor::{inverse_h, surface_tension};

use thiserror::Error;

/// 标准重力加速度（m/s²）
pub const GRAVITY: f64 = 9.80665;

/// 形状分析错误（只影响当前帧，不影响后续帧）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Image is empty")]
    EmptyImage,

    /// 图像中没有可用轮廓
    #[error("No drop contour found")]
    NoContour,

    /// 液滴高度不足一个 De，无法取选面
    #[error("Drop too short for selected plane: height {height_px} px, De {de_px} px")]
    DropTooShort { height_px: u32, de_px: u32 },

    /// 选面处找不到两侧轮廓
    #[error("Could not locate both sides of the drop at the selected plane")]
    NeckNotFound,

    /// 形状因子超出经验公式的有效范围 (0.3, 1.0)
    #[error("Shape factor {0:.4} out of bounds (0.3, 1.0)")]
    ShapeFactorOutOfBounds(f64),

    #[error("Invalid analyzer configuration: {0}")]
    InvalidConfig(String),
}
