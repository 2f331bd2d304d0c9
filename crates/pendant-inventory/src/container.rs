//! 液体容器

use crate::InventoryError;
use crate::geometry::Geometry;
use pendant_protocol::{Concentration, Contents, WellId, WellLocation};
use tracing::{Span, info, warn};

/// 体积比较容差（µL）
const VOLUME_EPSILON: f64 = 1e-9;

/// 液体容器接口
///
/// 吸液/分液是唯一的修改入口。违反体积约束时返回错误并记录日志，状态不变。
pub trait LiquidContainer {
    /// 孔位 ID（甲板位置 + 孔名）
    fn well_id(&self) -> &WellId;

    /// 机器人坐标系中的位置
    fn location(&self) -> WellLocation;

    fn geometry(&self) -> Geometry;

    fn volume_ul(&self) -> f64;

    fn max_volume_ul(&self) -> f64;

    /// 当前液面高度（mm，从底部算起）
    fn height_mm(&self) -> f64;

    /// 孔深（mm）
    fn depth_mm(&self) -> f64;

    /// 孔径（mm）
    fn well_diameter_mm(&self) -> f64;

    fn contents(&self) -> &Contents;

    /// 检查能否吸取 `volume_ul`，不修改状态
    fn check_aspirate(&self, volume_ul: f64) -> Result<(), InventoryError>;

    /// 检查能否注入 `volume_ul`，不修改状态
    fn check_dispense(&self, volume_ul: f64) -> Result<(), InventoryError>;

    fn aspirate(&mut self, volume_ul: f64) -> Result<(), InventoryError>;

    /// 注入 `volume_ul` 的 `source` 液体，并按混合规则更新浓度
    fn dispense(&mut self, volume_ul: f64, source: &Contents) -> Result<(), InventoryError>;

    /// 液面相对孔顶部的深度（负值在孔口以下），再加上 `offset_mm`
    fn liquid_depth_mm(&self, offset_mm: f64) -> f64 {
        self.height_mm() - self.depth_mm() + offset_mm
    }
}

/// 按几何类型区分的容器
#[derive(Debug, Clone)]
pub struct Container {
    well_id: WellId,
    labware_id: String,
    labware_name: String,
    geometry: Geometry,
    max_volume_ul: f64,
    depth_mm: f64,
    well_diameter_mm: f64,
    volume_ul: f64,
    height_mm: f64,
    contents: Contents,
    span: Span,
}

impl Container {
    /// 创建空容器
    pub fn new(
        well_id: WellId,
        labware_id: impl Into<String>,
        labware_name: impl Into<String>,
        geometry: Geometry,
        max_volume_ul: f64,
        depth_mm: f64,
        well_diameter_mm: f64,
    ) -> Self {
        let span = tracing::info_span!("container", well = %well_id);
        Self {
            well_id,
            labware_id: labware_id.into(),
            labware_name: labware_name.into(),
            geometry,
            max_volume_ul,
            depth_mm,
            well_diameter_mm,
            volume_ul: 0.0,
            height_mm: geometry.height_mm(0.0),
            contents: Contents::empty(),
            span,
        }
    }

    /// 设置初始液体（布局加载时使用，不经过混合规则）
    pub fn with_initial(
        mut self,
        contents: Contents,
        volume_ul: f64,
    ) -> Result<Self, InventoryError> {
        if volume_ul < 0.0 {
            return Err(InventoryError::NegativeVolume(volume_ul));
        }
        if volume_ul > self.max_volume_ul + VOLUME_EPSILON {
            return Err(InventoryError::Overflow {
                well: self.well_id.to_string(),
                requested: volume_ul,
                free: self.max_volume_ul,
            });
        }
        if !self.geometry.is_pass_through() {
            self.volume_ul = volume_ul;
            self.height_mm = self.geometry.height_mm(volume_ul);
        }
        self.contents = contents;
        Ok(self)
    }

    /// 使用外部传入的日志 span（默认是 `container{well=..}`）
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn labware_id(&self) -> &str {
        &self.labware_id
    }

    pub fn labware_name(&self) -> &str {
        &self.labware_name
    }

    pub fn free_volume_ul(&self) -> f64 {
        (self.max_volume_ul - self.volume_ul).max(0.0)
    }

    fn set_volume(&mut self, volume_ul: f64) {
        self.volume_ul = volume_ul.clamp(0.0, self.max_volume_ul);
        self.height_mm = self.geometry.height_mm(self.volume_ul);
    }

    /// 混合规则
    fn mix_in(&mut self, added_ul: f64, source: &Contents) {
        let old_ul = self.volume_ul;
        let total_ul = old_ul + added_ul;
        let destination = &self.contents;

        let mixed = if destination.is_empty() || old_ul <= VOLUME_EPSILON {
            source.clone()
        } else if total_ul <= VOLUME_EPSILON || source.is_empty() {
            // 空的来源（例如只有空气）不改变溶液
            destination.clone()
        } else if destination.same_solution(source) {
            let concentration = match (destination.concentration, source.concentration) {
                (Concentration::Quantified(c_dst), Concentration::Quantified(c_src)) => {
                    Concentration::Quantified((c_src * added_ul + c_dst * old_ul) / total_ul)
                },
                (Concentration::Pure, Concentration::Pure) => Concentration::Pure,
                _ => Concentration::Unknown,
            };
            Contents {
                solution: destination.solution.clone(),
                concentration,
            }
        } else if destination.is_water() {
            Contents {
                solution: source.solution.clone(),
                concentration: source.concentration.scaled(added_ul / total_ul),
            }
        } else if source.is_water() {
            Contents {
                solution: destination.solution.clone(),
                concentration: destination.concentration.scaled(old_ul / total_ul),
            }
        } else {
            warn!(
                "Mixing {} into {}: mixtures of different solutions are not tracked, concentration becomes unknown",
                source.label(),
                destination.label()
            );
            Contents {
                solution: destination.solution.clone(),
                concentration: Concentration::Unknown,
            }
        };
        self.contents = mixed;
    }
}

impl LiquidContainer for Container {
    fn well_id(&self) -> &WellId {
        &self.well_id
    }

    fn location(&self) -> WellLocation {
        WellLocation::new(self.labware_id.clone(), self.well_id.well.clone())
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn volume_ul(&self) -> f64 {
        self.volume_ul
    }

    fn max_volume_ul(&self) -> f64 {
        self.max_volume_ul
    }

    fn height_mm(&self) -> f64 {
        self.height_mm
    }

    fn depth_mm(&self) -> f64 {
        self.depth_mm
    }

    fn well_diameter_mm(&self) -> f64 {
        self.well_diameter_mm
    }

    fn contents(&self) -> &Contents {
        &self.contents
    }

    fn check_aspirate(&self, volume_ul: f64) -> Result<(), InventoryError> {
        if volume_ul < 0.0 {
            return Err(InventoryError::NegativeVolume(volume_ul));
        }
        if self.geometry.is_pass_through() {
            return Ok(());
        }
        if volume_ul > self.volume_ul + VOLUME_EPSILON {
            return Err(InventoryError::InsufficientVolume {
                well: self.well_id.to_string(),
                requested: volume_ul,
                available: self.volume_ul,
            });
        }
        Ok(())
    }

    fn check_dispense(&self, volume_ul: f64) -> Result<(), InventoryError> {
        if volume_ul < 0.0 {
            return Err(InventoryError::NegativeVolume(volume_ul));
        }
        if self.geometry.is_pass_through() {
            return Ok(());
        }
        if self.volume_ul + volume_ul > self.max_volume_ul + VOLUME_EPSILON {
            return Err(InventoryError::Overflow {
                well: self.well_id.to_string(),
                requested: volume_ul,
                free: self.free_volume_ul(),
            });
        }
        Ok(())
    }

    fn aspirate(&mut self, volume_ul: f64) -> Result<(), InventoryError> {
        let span = self.span.clone();
        let _guard = span.enter();
        if let Err(e) = self.check_aspirate(volume_ul) {
            tracing::error!("Aspirate rejected: {}", e);
            return Err(e);
        }
        if self.geometry.is_pass_through() {
            return Ok(());
        }
        let remaining = self.volume_ul - volume_ul;
        self.set_volume(remaining);
        info!(
            "Aspirated {:.2} uL of {}, {:.2} uL left (height {:.2} mm)",
            volume_ul,
            self.contents.label(),
            self.volume_ul,
            self.height_mm
        );
        Ok(())
    }

    fn dispense(&mut self, volume_ul: f64, source: &Contents) -> Result<(), InventoryError> {
        let span = self.span.clone();
        let _guard = span.enter();
        if let Err(e) = self.check_dispense(volume_ul) {
            tracing::error!("Dispense rejected: {}", e);
            return Err(e);
        }
        if self.geometry.is_pass_through() {
            // 只记录最近一次到达的液体
            if !source.is_empty() {
                self.contents = source.clone();
            }
            return Ok(());
        }
        self.mix_in(volume_ul, source);
        let total = self.volume_ul + volume_ul;
        self.set_volume(total);
        info!(
            "Dispensed {:.2} uL of {}, now {:.2} uL of {} at {}",
            volume_ul,
            source.label(),
            self.volume_ul,
            self.contents.label(),
            self.contents.concentration
        );
        Ok(())
    }
}
