//! `1/H(S)` 经验公式
//!
//! 六段拟合，系数来自悬滴法的标准校准表，必须逐位保留。

use crate::{AnalysisError, GRAVITY};

/// 一段拟合：`a / S^b + Σ poly[i] · S^(n-i)`（`poly` 按降幂排列）
struct Segment {
    upper: f64,
    a: f64,
    b: f64,
    poly: &'static [f64],
}

const SEGMENTS: [Segment; 6] = [
    Segment {
        upper: 0.4,
        a: 0.34074,
        b: 2.52303,
        poly: &[123.9495, -72.82991, 0.01320, -3.38210, 5.52969, -1.07260],
    },
    Segment {
        upper: 0.46,
        a: 0.32720,
        b: 2.56651,
        poly: &[-0.97553, 0.84059, -0.18069],
    },
    Segment {
        upper: 0.59,
        a: 0.31968,
        b: 2.59725,
        poly: &[-0.46898, 0.50059, -0.13261],
    },
    Segment {
        upper: 0.68,
        a: 0.31522,
        b: 2.62435,
        poly: &[-0.11714, 0.15756, -0.05285],
    },
    Segment {
        upper: 0.9,
        a: 0.31345,
        b: 2.64267,
        poly: &[-0.09155, 0.14701, -0.05877],
    },
    Segment {
        upper: 1.0,
        a: 0.30715,
        b: 2.84636,
        poly: &[-0.69116, 1.08315, -0.18341, -0.20970],
    },
];

const S_MIN: f64 = 0.3;
const S_MAX: f64 = 1.0;

/// 计算 `1/H(S)`
///
/// 分段区间为 `[0.3, 0.4]`、`(0.4, 0.46]`、`(0.46, 0.59]`、`(0.59, 0.68]`、
/// `(0.68, 0.9]`、`(0.9, 1.0]`，区间外返回 [`AnalysisError::ShapeFactorOutOfBounds`]。
pub fn inverse_h(s: f64) -> Result<f64, AnalysisError> {
    if !(S_MIN..=S_MAX).contains(&s) {
        return Err(AnalysisError::ShapeFactorOutOfBounds(s));
    }
    let segment = SEGMENTS
        .iter()
        .find(|seg| s <= seg.upper)
        .ok_or(AnalysisError::ShapeFactorOutOfBounds(s))?;
    // Horner
    let poly = segment.poly.iter().fold(0.0, |acc, c| acc * s + c);
    Ok(segment.a / s.powf(segment.b) + poly)
}

/// 表面张力（mN/m）
///
/// - `de_px`: 赤道直径（像素）
/// - `shape_factor`: S = Ds / De，必须严格位于 (0.3, 1.0)
/// - `density_g_per_ml`: 液体与空气的密度差
/// - `scale_mm_per_px`: 像素尺寸
pub fn surface_tension(
    de_px: f64,
    shape_factor: f64,
    density_g_per_ml: f64,
    scale_mm_per_px: f64,
) -> Result<f64, AnalysisError> {
    if shape_factor <= S_MIN || shape_factor >= S_MAX || !shape_factor.is_finite() {
        return Err(AnalysisError::ShapeFactorOutOfBounds(shape_factor));
    }
    let inv_h = inverse_h(shape_factor)?;
    let de_mm = de_px * scale_mm_per_px;
    Ok(density_g_per_ml * GRAVITY * de_mm * de_mm * inv_h)
}
