//! 容器几何
//!
//! 液面高度只由几何常量和当前体积决定（纯函数）。体积单位 µL = mm³。

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 15 mL 离心管：内径、死体积（µL）、底部锥形段等效高度
const FALCON_15: TubeConstants = TubeConstants {
    diameter_mm: 15.25,
    dead_volume_ul: 1000.0,
    bottom_mm: 15.0,
};

/// 50 mL 离心管
const FALCON_50: TubeConstants = TubeConstants {
    diameter_mm: 28.0,
    dead_volume_ul: 5000.0,
    bottom_mm: 21.0,
};

const GLASS_VIAL_DIAMETER_MM: f64 = 18.0;
const PLATE_WELL_DIAMETER_MM: f64 = 6.96;

/// Eppendorf 管：上部直径、锥底直径、锥段高度
const EPPENDORF_DIAMETER_MM: f64 = 10.0;
const EPPENDORF_TIP_DIAMETER_MM: f64 = 2.0;
const EPPENDORF_CONE_HEIGHT_MM: f64 = 18.6;
const EPPENDORF_TIP_CLEARANCE_MM: f64 = 3.0;

struct TubeConstants {
    diameter_mm: f64,
    dead_volume_ul: f64,
    bottom_mm: f64,
}

/// 容器几何类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    FalconTube15,
    FalconTube50,
    Eppendorf,
    GlassVial,
    PlateWell,
    /// 液滴台：液滴悬挂在枪头上，台本身不储液
    DropStage,
    /// 光源支架
    LightHolder,
    /// 废液桶
    Trash,
}

impl Geometry {
    /// 给定体积下的液面高度（mm，从容器底部算起），不会小于 0
    pub fn height_mm(&self, volume_ul: f64) -> f64 {
        let volume_ul = volume_ul.max(0.0);
        let height = match self {
            Geometry::FalconTube15 => tube_height(&FALCON_15, volume_ul),
            Geometry::FalconTube50 => tube_height(&FALCON_50, volume_ul),
            Geometry::GlassVial => volume_ul / circle_area(GLASS_VIAL_DIAMETER_MM) - 1.0,
            Geometry::PlateWell => volume_ul / circle_area(PLATE_WELL_DIAMETER_MM),
            Geometry::Eppendorf => eppendorf_height(volume_ul),
            Geometry::DropStage | Geometry::LightHolder | Geometry::Trash => 0.0,
        };
        height.max(0.0)
    }

    /// 直通工位：吸液/分液不改变体积，只记录液体身份
    pub fn is_pass_through(&self) -> bool {
        matches!(
            self,
            Geometry::DropStage | Geometry::LightHolder | Geometry::Trash
        )
    }
}

fn circle_area(diameter_mm: f64) -> f64 {
    PI * (diameter_mm / 2.0).powi(2)
}

fn tube_height(tube: &TubeConstants, volume_ul: f64) -> f64 {
    (volume_ul - tube.dead_volume_ul) / circle_area(tube.diameter_mm) + tube.bottom_mm
}

fn eppendorf_height(volume_ul: f64) -> f64 {
    let d = EPPENDORF_DIAMETER_MM;
    let d2 = EPPENDORF_TIP_DIAMETER_MM;
    let cone_factor = d * d + d * d2 + d2 * d2;
    let cone_volume = PI * EPPENDORF_CONE_HEIGHT_MM * cone_factor / 12.0;
    if volume_ul < cone_volume {
        12.0 * volume_ul / (PI * cone_factor) - EPPENDORF_TIP_CLEARANCE_MM
    } else {
        (volume_ul - cone_volume) / circle_area(d) + EPPENDORF_CONE_HEIGHT_MM
            - EPPENDORF_TIP_CLEARANCE_MM
    }
}
