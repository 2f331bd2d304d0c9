//! 液滴体积建议
//!
//! 表面张力越低，能稳定悬挂的液滴越小。根据已测结果外推下一个浓度的表面张力，
//! 再线性映射到液滴体积。

use crate::recording::ResultRecord;
use pendant_protocol::Concentration;

/// 没有历史结果时的预测值（mN/m）
const DEFAULT_PREDICTION: f64 = 35.0;

/// 纯水的表面张力上限（mN/m）
const WATER_SURFACE_TENSION: f64 = 72.0;

/// 体积映射的两个锚点：(表面张力, 液滴体积 µL)
const LOW_ANCHOR: (f64, f64) = (33.0, 6.0);
const HIGH_ANCHOR: (f64, f64) = (72.0, 13.0);

/// 数值浓度：纯溶剂按 0 处理，未知浓度无法参与外推
fn numeric(concentration: Concentration) -> Option<f64> {
    match concentration {
        Concentration::Quantified(c) => Some(c),
        Concentration::Pure => Some(0.0),
        Concentration::Unknown => None,
    }
}

/// 预测 `next_concentration` 下的表面张力
///
/// - 无历史: 35 mN/m
/// - 一条: 沿用该值
/// - 多条: 用最后两条结果的斜率线性外推（浓度相同或未知时沿用最后一条）
///
/// 结果不超过纯水的 72 mN/m。
pub fn predict_surface_tension(results: &[ResultRecord], next_concentration: f64) -> f64 {
    let predicted = match results {
        [] => DEFAULT_PREDICTION,
        [only] => only.surface_tension_eq,
        [.., previous, last] => {
            match (numeric(previous.concentration), numeric(last.concentration)) {
                (Some(c_prev), Some(c_last)) if (c_last - c_prev).abs() > f64::EPSILON => {
                    let gradient =
                        (last.surface_tension_eq - previous.surface_tension_eq) / (c_last - c_prev);
                    gradient * (next_concentration - c_last) + last.surface_tension_eq
                },
                _ => last.surface_tension_eq,
            }
        },
    };
    predicted.min(WATER_SURFACE_TENSION)
}

/// 表面张力 → 液滴体积（µL）的线性映射
pub fn volume_for_surface_tension(surface_tension: f64) -> f64 {
    let (st_low, v_low) = LOW_ANCHOR;
    let (st_high, v_high) = HIGH_ANCHOR;
    v_low + (v_high - v_low) / (st_high - st_low) * (surface_tension - st_low)
}

/// 建议下一个孔的液滴体积
pub fn suggest_drop_volume(results: &[ResultRecord], next_concentration: f64) -> f64 {
    volume_for_surface_tension(predict_surface_tension(results, next_concentration))
}
