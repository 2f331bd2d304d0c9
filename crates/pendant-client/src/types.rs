//! 移液器相关类型

use pendant_protocol::Offset;
use std::fmt;
use std::str::FromStr;

/// 移液器型号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PipetteModel {
    /// 单通道 20 µL（形成液滴用）
    P20SingleGen2,
    /// 单通道 1000 µL（配液用）
    P1000SingleGen2,
}

impl PipetteModel {
    pub fn max_volume_ul(&self) -> f64 {
        match self {
            PipetteModel::P20SingleGen2 => 20.0,
            PipetteModel::P1000SingleGen2 => 1000.0,
        }
    }

    /// 安装位置的机械偏差补偿（mm）
    pub fn default_offset(&self) -> Offset {
        match self {
            PipetteModel::P20SingleGen2 => Offset::new(-1.2, 0.6, 0.0),
            PipetteModel::P1000SingleGen2 => Offset::new(-0.4, 1.0, 0.0),
        }
    }

    /// 默认流速（µL/s）
    pub fn default_flow_rate_ul_s(&self) -> f64 {
        match self {
            PipetteModel::P20SingleGen2 => 7.56,
            PipetteModel::P1000SingleGen2 => 274.7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipetteModel::P20SingleGen2 => "p20_single_gen2",
            PipetteModel::P1000SingleGen2 => "p1000_single_gen2",
        }
    }
}

impl fmt::Display for PipetteModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PipetteModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p20_single_gen2" => Ok(PipetteModel::P20SingleGen2),
            "p1000_single_gen2" => Ok(PipetteModel::P1000SingleGen2),
            other => Err(format!("unrecognised pipette model '{other}'")),
        }
    }
}

/// 枪头状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipState {
    Empty,
    /// `clean == false` 表示不同溶液接触过枪头且尚未清洗
    Tipped { clean: bool },
}

impl TipState {
    pub fn has_tip(&self) -> bool {
        matches!(self, TipState::Tipped { .. })
    }
}

/// 空气隔断的排出位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirGapTarget {
    /// 液滴台（形成悬滴之前）
    DropStage,
    LastSource,
    LastDestination,
}

/// 混匀参数：吸打 `repeats` 次，每次 `volume_ul`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MixSpec {
    pub volume_ul: f64,
    pub repeats: u32,
}

impl MixSpec {
    pub fn new(volume_ul: f64, repeats: u32) -> Self {
        Self { volume_ul, repeats }
    }
}

/// 单次吸液/分液的附加参数
///
/// `depth_offset_mm` 叠加在液面深度上（负值更深）；`flow_rate_ul_s` 为 `None` 时使用型号默认流速。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stroke {
    pub depth_offset_mm: f64,
    pub flow_rate_ul_s: Option<f64>,
}

impl Stroke {
    pub fn at_depth(depth_offset_mm: f64) -> Self {
        Self {
            depth_offset_mm,
            flow_rate_ul_s: None,
        }
    }

    pub fn with_flow_rate(mut self, flow_rate_ul_s: f64) -> Self {
        self.flow_rate_ul_s = Some(flow_rate_ul_s);
        self
    }
}

/// 移液器运动参数
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipetteSettings {
    /// 吸空气时枪头在液面之上的高度（mm）
    pub air_gap_clearance_mm: f64,
    /// 吸/排空气的流速（µL/s）
    pub air_gap_flow_rate_ul_s: f64,
    /// 海绵清洗的擦拭次数
    pub scrub_count: u32,
    /// 擦拭时插入海绵的深度（相对孔顶部，负值向下）
    pub scrub_depth_mm: f64,
    /// 贴壁与擦拭的移动速度（mm/s）
    pub wall_speed_mm_s: f64,
}

impl Default for PipetteSettings {
    fn default() -> Self {
        Self {
            air_gap_clearance_mm: 5.0,
            air_gap_flow_rate_ul_s: 2.0,
            scrub_count: 3,
            scrub_depth_mm: -8.0,
            wall_speed_mm_s: 50.0,
        }
    }
}
