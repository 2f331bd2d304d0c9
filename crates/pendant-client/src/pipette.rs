//! 单通道移液器

use crate::error::PipetteError;
use crate::types::{AirGapTarget, MixSpec, PipetteModel, PipetteSettings, Stroke, TipState};
use pendant_hal::{LiquidCommand, RobotApi, WellLocation};
use pendant_inventory::{Inventory, LiquidContainer, Sponge, TipRack};
use pendant_protocol::{Contents, Offset, WellId};
use std::sync::Arc;
use tracing::{Span, error, info, warn};

/// 体积比较容差（µL）
const VOLUME_EPSILON: f64 = 1e-9;

/// 贴壁时的半径系数（留出余量，避免撞壁）
const TOUCH_TIP_RADIUS_FACTOR: f64 = 0.9;

/// 贴壁深度占孔深的比例
const TOUCH_TIP_DEPTH_FACTOR: f64 = 0.05;

/// 单通道移液器
///
/// 维护枪头状态、枪头内液体（体积与溶液身份）、空气隔断体积，
/// 以及最近一次吸液来源和分液目标（用于计算空气隔断的排出深度）。
///
/// 机器人命令通过 `Arc<dyn RobotApi>` 下发；容器状态只在命令成功后更新。
pub struct Pipette {
    robot: Arc<dyn RobotApi>,
    mount: String,
    pipette_id: String,
    model: PipetteModel,
    offset: Offset,
    settings: PipetteSettings,
    tips: TipRack,
    tip_origin: Option<WellLocation>,
    state: TipState,
    volume_ul: f64,
    contents: Contents,
    air_gap_ul: f64,
    last_source: Option<WellId>,
    last_destination: Option<WellId>,
    span: Span,
}

impl Pipette {
    pub fn new(
        robot: Arc<dyn RobotApi>,
        mount: impl Into<String>,
        pipette_id: impl Into<String>,
        model: PipetteModel,
        tips: TipRack,
    ) -> Self {
        let mount = mount.into();
        let span = tracing::info_span!("pipette", mount = %mount, model = %model);
        Self {
            robot,
            mount,
            pipette_id: pipette_id.into(),
            model,
            offset: model.default_offset(),
            settings: PipetteSettings::default(),
            tips,
            tip_origin: None,
            state: TipState::Empty,
            volume_ul: 0.0,
            contents: Contents::empty(),
            air_gap_ul: 0.0,
            last_source: None,
            last_destination: None,
            span,
        }
    }

    pub fn with_settings(mut self, settings: PipetteSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 覆盖型号默认的安装偏差
    pub fn with_offset(mut self, offset: Offset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub fn model(&self) -> PipetteModel {
        self.model
    }

    pub fn max_volume_ul(&self) -> f64 {
        self.model.max_volume_ul()
    }

    pub fn state(&self) -> TipState {
        self.state
    }

    pub fn has_tip(&self) -> bool {
        self.state.has_tip()
    }

    /// 无枪头时视为 clean
    pub fn is_clean(&self) -> bool {
        !matches!(self.state, TipState::Tipped { clean: false })
    }

    /// 枪头内液体体积（不含空气）
    pub fn volume_ul(&self) -> f64 {
        self.volume_ul
    }

    pub fn air_gap_ul(&self) -> f64 {
        self.air_gap_ul
    }

    /// 还能吸入的体积
    pub fn free_volume_ul(&self) -> f64 {
        (self.max_volume_ul() - self.volume_ul - self.air_gap_ul).max(0.0)
    }

    /// 最近接触枪头的液体
    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    pub fn last_source(&self) -> Option<&WellId> {
        self.last_source.as_ref()
    }

    pub fn last_destination(&self) -> Option<&WellId> {
        self.last_destination.as_ref()
    }

    pub fn tips_remaining(&self) -> usize {
        self.tips.remaining()
    }

    fn reject<T>(&self, err: PipetteError) -> Result<T, PipetteError> {
        let _guard = self.span.enter();
        error!("{}", err);
        Err(err)
    }

    fn require_tip(&self) -> Result<(), PipetteError> {
        if self.has_tip() {
            Ok(())
        } else {
            self.reject(PipetteError::NoTip {
                mount: self.mount.clone(),
            })
        }
    }

    fn flow_rate(&self, stroke: &Stroke) -> f64 {
        stroke
            .flow_rate_ul_s
            .unwrap_or_else(|| self.model.default_flow_rate_ul_s())
    }

    fn liquid_command(
        &self,
        location: WellLocation,
        volume_ul: f64,
        depth_mm: f64,
        flow_rate_ul_s: f64,
    ) -> LiquidCommand {
        LiquidCommand {
            pipette_id: self.pipette_id.clone(),
            location,
            volume_ul,
            depth_mm,
            flow_rate_ul_s,
            offset: self.offset,
        }
    }

    /// 从枪头盒取下一个枪头
    ///
    /// 枪头盒索引在下发命令前推进：命令失败时跳过该孔位。
    pub fn pick_up_tip(&mut self) -> Result<(), PipetteError> {
        if self.has_tip() {
            return self.reject(PipetteError::TipAlreadyAttached {
                mount: self.mount.clone(),
            });
        }
        let Some(location) = self.tips.take_next() else {
            return self.reject(PipetteError::TipRackExhausted(
                self.tips.labware_id().to_string(),
            ));
        };

        self.robot
            .pick_up_tip(&self.pipette_id, &location, self.offset)?;

        let _guard = self.span.enter();
        info!("Picked up tip from {}", location);
        self.state = TipState::Tipped { clean: true };
        self.tip_origin = Some(location);
        Ok(())
    }

    /// 丢弃枪头到垃圾桶
    pub fn drop_tip(&mut self) -> Result<(), PipetteError> {
        self.require_tip()?;
        self.robot.drop_tip(&self.pipette_id, None, Offset::ZERO)?;

        self.clear_tip();
        let _guard = self.span.enter();
        info!("Dropped tip into trash");
        Ok(())
    }

    /// 把枪头放回取出它的孔位
    pub fn return_tip(&mut self) -> Result<(), PipetteError> {
        self.require_tip()?;
        let Some(origin) = self.tip_origin.clone() else {
            return self.reject(PipetteError::MissingReference("tip origin"));
        };
        self.robot
            .drop_tip(&self.pipette_id, Some(&origin), self.offset)?;

        self.clear_tip();
        let _guard = self.span.enter();
        info!("Returned tip to {}", origin);
        Ok(())
    }

    fn clear_tip(&mut self) {
        let _guard = self.span.enter();
        if self.volume_ul > VOLUME_EPSILON {
            warn!("Tip discarded while holding {:.2} uL", self.volume_ul);
        }
        self.state = TipState::Empty;
        self.volume_ul = 0.0;
        self.air_gap_ul = 0.0;
        self.contents = Contents::empty();
        self.tip_origin = None;
    }

    /// 从 `source` 吸液
    ///
    /// 深度为液面深度 `height - depth` 加上 `stroke.depth_offset_mm`。
    /// 容量不足或来源体积不足时不下发命令，返回错误。
    pub fn aspirate<C>(
        &mut self,
        volume_ul: f64,
        source: &mut C,
        stroke: Stroke,
    ) -> Result<(), PipetteError>
    where
        C: LiquidContainer + ?Sized,
    {
        self.require_tip()?;
        if volume_ul > self.free_volume_ul() + VOLUME_EPSILON {
            return self.reject(PipetteError::Overcapacity {
                requested: volume_ul,
                held: self.volume_ul + self.air_gap_ul,
                max: self.max_volume_ul(),
            });
        }
        if let Err(e) = source.check_aspirate(volume_ul) {
            return self.reject(e.into());
        }

        let _guard = self.span.enter();
        if !self.is_clean() {
            warn!("Tip is not clean, aspirating from {} anyway", source.well_id());
        }

        let depth_mm = source.liquid_depth_mm(stroke.depth_offset_mm);
        let command = self.liquid_command(
            source.location(),
            volume_ul,
            depth_mm,
            self.flow_rate(&stroke),
        );
        self.robot.aspirate(&command)?;
        source.aspirate(volume_ul)?;

        if !self.contents.is_empty() && !self.contents.same_solution(source.contents()) {
            self.state = TipState::Tipped { clean: false };
        }
        self.contents = source.contents().clone();
        self.volume_ul += volume_ul;
        self.last_source = Some(source.well_id().clone());
        info!(
            "Aspirated {:.2} uL of {} from {}",
            volume_ul,
            self.contents.label(),
            source.well_id()
        );
        Ok(())
    }

    /// 向 `destination` 分液
    ///
    /// 枪头内体积不足只记录警告，按实际持有的体积记账。
    pub fn dispense<C>(
        &mut self,
        volume_ul: f64,
        destination: &mut C,
        stroke: Stroke,
    ) -> Result<(), PipetteError>
    where
        C: LiquidContainer + ?Sized,
    {
        self.require_tip()?;
        let delivered_ul = volume_ul.min(self.volume_ul);
        if let Err(e) = destination.check_dispense(delivered_ul.max(0.0)) {
            return self.reject(e.into());
        }

        let _guard = self.span.enter();
        if volume_ul > self.volume_ul + VOLUME_EPSILON {
            warn!(
                "Dispensing {:.2} uL into {} but tip holds only {:.2} uL",
                volume_ul,
                destination.well_id(),
                self.volume_ul
            );
        }

        let depth_mm = destination.liquid_depth_mm(stroke.depth_offset_mm);
        let command = self.liquid_command(
            destination.location(),
            volume_ul,
            depth_mm,
            self.flow_rate(&stroke),
        );
        self.robot.dispense(&command)?;
        if delivered_ul > VOLUME_EPSILON && !self.contents.is_empty() {
            destination.dispense(delivered_ul, &self.contents)?;
        }

        self.volume_ul = (self.volume_ul - delivered_ul).max(0.0);
        self.last_destination = Some(destination.well_id().clone());
        info!("Dispensed {:.2} uL into {}", volume_ul, destination.well_id());
        Ok(())
    }

    /// 在容器内吸打混匀
    pub fn mix<C>(&mut self, container: &mut C, mix: MixSpec) -> Result<(), PipetteError>
    where
        C: LiquidContainer + ?Sized,
    {
        for _ in 0..mix.repeats {
            self.aspirate(mix.volume_ul, &mut *container, Stroke::default())?;
            self.dispense(mix.volume_ul, &mut *container, Stroke::default())?;
        }
        let _guard = self.span.enter();
        info!(
            "Mixed {} ({:.2} uL x {})",
            container.well_id(),
            mix.volume_ul,
            mix.repeats
        );
        Ok(())
    }

    /// 移动到孔位顶部（在安装偏差上再叠加 `offset`）
    pub fn move_to<C>(&self, container: &C, offset: Offset) -> Result<(), PipetteError>
    where
        C: LiquidContainer + ?Sized,
    {
        self.robot.move_to_well(
            &self.pipette_id,
            &container.location(),
            0.0,
            self.offset.add(offset),
            None,
        )?;
        Ok(())
    }

    /// 贴壁：在孔口略下方依次碰触孔壁四个方向，去掉枪头外侧挂液
    pub fn touch_tip<C>(&self, container: &C, repeats: u32) -> Result<(), PipetteError>
    where
        C: LiquidContainer + ?Sized,
    {
        self.require_tip()?;
        let location = container.location();
        let depth_mm = -TOUCH_TIP_DEPTH_FACTOR * container.depth_mm();
        let radius = TOUCH_TIP_RADIUS_FACTOR * container.well_diameter_mm() / 2.0;
        let speed = Some(self.settings.wall_speed_mm_s);
        let directions = [
            Offset::new(-radius, 0.0, 0.0),
            Offset::new(radius, 0.0, 0.0),
            Offset::new(0.0, -radius, 0.0),
            Offset::new(0.0, radius, 0.0),
        ];

        self.robot
            .move_to_well(&self.pipette_id, &location, depth_mm, self.offset, None)?;
        for _ in 0..repeats {
            for direction in directions {
                self.robot.move_to_well(
                    &self.pipette_id,
                    &location,
                    depth_mm,
                    self.offset.add(direction),
                    speed,
                )?;
                self.robot
                    .move_to_well(&self.pipette_id, &location, depth_mm, self.offset, speed)?;
            }
        }
        let _guard = self.span.enter();
        info!("Touched tip in {} ({} times)", container.well_id(), repeats);
        Ok(())
    }

    /// 在上一次吸液来源的液面之上吸入空气，防止移动途中滴液
    pub fn air_gap(&mut self, inventory: &Inventory, volume_ul: f64) -> Result<(), PipetteError> {
        self.require_tip()?;
        let Some(source_id) = self.last_source.clone() else {
            return self.reject(PipetteError::MissingReference("last source"));
        };
        if volume_ul > self.free_volume_ul() + VOLUME_EPSILON {
            return self.reject(PipetteError::Overcapacity {
                requested: volume_ul,
                held: self.volume_ul + self.air_gap_ul,
                max: self.max_volume_ul(),
            });
        }
        let source = inventory.get(&source_id)?;

        let depth_mm = source.liquid_depth_mm(self.settings.air_gap_clearance_mm);
        let command = self.liquid_command(
            source.location(),
            volume_ul,
            depth_mm,
            self.settings.air_gap_flow_rate_ul_s,
        );
        self.robot.aspirate(&command)?;

        self.air_gap_ul += volume_ul;
        let _guard = self.span.enter();
        info!("Air gap of {:.2} uL taken above {}", volume_ul, source_id);
        Ok(())
    }

    /// 在目标位置排出空气隔断
    pub fn remove_air_gap(
        &mut self,
        inventory: &Inventory,
        target: AirGapTarget,
    ) -> Result<(), PipetteError> {
        self.require_tip()?;
        if self.air_gap_ul <= VOLUME_EPSILON {
            let _guard = self.span.enter();
            warn!("No air gap to remove");
            return Ok(());
        }
        let target_id = match target {
            AirGapTarget::DropStage => inventory.drop_stage_id()?.clone(),
            AirGapTarget::LastSource => match &self.last_source {
                Some(id) => id.clone(),
                None => return self.reject(PipetteError::MissingReference("last source")),
            },
            AirGapTarget::LastDestination => match &self.last_destination {
                Some(id) => id.clone(),
                None => return self.reject(PipetteError::MissingReference("last destination")),
            },
        };
        let container = inventory.get(&target_id)?;

        let depth_mm = container.liquid_depth_mm(self.settings.air_gap_clearance_mm);
        let command = self.liquid_command(
            container.location(),
            self.air_gap_ul,
            depth_mm,
            self.settings.air_gap_flow_rate_ul_s,
        );
        self.robot.dispense(&command)?;

        let _guard = self.span.enter();
        info!("Removed air gap of {:.2} uL at {}", self.air_gap_ul, target_id);
        self.air_gap_ul = 0.0;
        Ok(())
    }

    /// 在海绵当前孔位擦拭枪头，然后海绵切换到下一个孔
    pub fn clean_tip(&mut self, sponge: &mut Sponge) -> Result<(), PipetteError> {
        self.require_tip()?;
        let location = sponge.current_well();
        let speed = Some(self.settings.wall_speed_mm_s);

        self.robot
            .move_to_well(&self.pipette_id, &location, 0.0, self.offset, None)?;
        for _ in 0..self.settings.scrub_count {
            self.robot.move_to_well(
                &self.pipette_id,
                &location,
                self.settings.scrub_depth_mm,
                self.offset,
                speed,
            )?;
            self.robot
                .move_to_well(&self.pipette_id, &location, 0.0, self.offset, speed)?;
        }
        sponge.advance();

        self.state = TipState::Tipped { clean: true };
        let _guard = self.span.enter();
        info!("Cleaned tip on sponge {}", location);
        Ok(())
    }

    /// 转移液体，超过容量时分多次完成；可选在目标孔混匀
    pub fn transfer(
        &mut self,
        inventory: &mut Inventory,
        volume_ul: f64,
        source: &WellId,
        destination: &WellId,
        mix_after: Option<MixSpec>,
    ) -> Result<(), PipetteError> {
        self.require_tip()?;
        let chunk_ul = self.free_volume_ul();
        if chunk_ul <= VOLUME_EPSILON {
            return self.reject(PipetteError::Overcapacity {
                requested: volume_ul,
                held: self.volume_ul + self.air_gap_ul,
                max: self.max_volume_ul(),
            });
        }
        {
            let _guard = self.span.enter();
            info!(
                "Transferring {:.2} uL from {} to {}",
                volume_ul, source, destination
            );
        }

        let mut remaining_ul = volume_ul;
        while remaining_ul > VOLUME_EPSILON {
            let step_ul = remaining_ul.min(chunk_ul);
            self.aspirate(step_ul, inventory.get_mut(source)?, Stroke::default())?;
            self.dispense(step_ul, inventory.get_mut(destination)?, Stroke::default())?;
            remaining_ul -= step_ul;
        }

        if let Some(mix) = mix_after {
            let mix = MixSpec::new(mix.volume_ul.min(chunk_ul), mix.repeats);
            self.mix(inventory.get_mut(destination)?, mix)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipette")
            .field("mount", &self.mount)
            .field("model", &self.model)
            .field("state", &self.state)
            .field("volume_ul", &self.volume_ul)
            .field("air_gap_ul", &self.air_gap_ul)
            .field("contents", &self.contents)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pendant_hal::RobotError;
    use pendant_hal::mock::{CommandKind, MockRobot, RobotCommand};
    use pendant_inventory::Layout;
    use pendant_protocol::Concentration;
    use std::time::Duration;

    pub(crate) const LAYOUT: &str = r#"
[[labware]]
id = "plate"
name = "corning_96_wellplate_360ul_flat"
location = 2
geometry = "plate_well"
max_volume_ul = 360.0
depth_mm = 10.67
well_diameter_mm = 6.96

[[labware]]
id = "tubes"
name = "opentrons_15_tuberack_falcon_15ml"
location = 3
geometry = "falcon_tube15"
max_volume_ul = 15000.0
depth_mm = 117.5
well_diameter_mm = 15.25

[[labware]]
id = "stage"
name = "drop_stage"
location = 9
geometry = "drop_stage"
depth_mm = 40.0

[[labware]]
id = "trash"
name = "fixed_trash"
location = 12
geometry = "trash"

[[containers]]
labware = "tubes"
well = "A1"
solution = "water"
concentration = "pure"
volume_ul = 12000.0

[[containers]]
labware = "tubes"
well = "A2"
solution = "SDS"
concentration = { quantified = 10.0 }
volume_ul = 5000.0

[[tip_racks]]
mount = "left"
labware_id = "tips_20"

[[tip_racks]]
mount = "right"
labware_id = "tips_1000"
wells = ["A1", "B1", "C1"]

[sponge]
labware_id = "sponge"
wells = ["A1", "A2"]
"#;

    pub(crate) fn setup(mount: &str, model: PipetteModel) -> (Arc<MockRobot>, Inventory, Pipette) {
        let layout = Layout::from_toml_str(LAYOUT).unwrap();
        let mut inventory = Inventory::from_layout(&layout).unwrap();
        let robot = Arc::new(MockRobot::new());
        let tips = inventory.take_tip_rack(mount).unwrap();
        let pipette = Pipette::new(robot.clone(), mount, format!("{mount}-id"), model, tips);
        (robot, inventory, pipette)
    }

    fn id(s: &str) -> WellId {
        s.parse().unwrap()
    }

    #[test]
    fn test_tip_state_machine() {
        let (robot, _inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);
        assert_eq!(pipette.state(), TipState::Empty);
        assert!(matches!(pipette.drop_tip(), Err(PipetteError::NoTip { .. })));

        pipette.pick_up_tip().unwrap();
        assert_eq!(pipette.state(), TipState::Tipped { clean: true });
        assert!(matches!(
            pipette.pick_up_tip(),
            Err(PipetteError::TipAlreadyAttached { .. })
        ));

        pipette.return_tip().unwrap();
        assert!(!pipette.has_tip());
        let commands = robot.commands();
        assert_eq!(
            commands.last(),
            Some(&RobotCommand::DropTip {
                pipette_id: "right-id".into(),
                location: Some(WellLocation::new("tips_1000", "A1")),
                offset: PipetteModel::P1000SingleGen2.default_offset(),
            })
        );

        // 3 个枪头：A1 已用，B1、C1 可用
        pipette.pick_up_tip().unwrap();
        pipette.drop_tip().unwrap();
        pipette.pick_up_tip().unwrap();
        pipette.drop_tip().unwrap();
        assert!(matches!(
            pipette.pick_up_tip(),
            Err(PipetteError::TipRackExhausted(_))
        ));
        assert_eq!(robot.count(CommandKind::PickUpTip), 3);
    }

    #[test]
    fn test_tip_drop_offsets() {
        let (robot, _inventory, pipette) = setup("right", PipetteModel::P1000SingleGen2);
        let offset = Offset {
            x: 0.5,
            y: -0.3,
            z: 1.2,
        };
        let mut pipette = pipette.with_offset(offset);

        // 退回枪头盒沿用取枪头时的偏移
        pipette.pick_up_tip().unwrap();
        pipette.return_tip().unwrap();
        let Some(RobotCommand::DropTip {
            location,
            offset: recorded,
            ..
        }) = robot.commands().last().cloned()
        else {
            panic!("last command is not a tip drop");
        };
        assert_eq!(location, Some(WellLocation::new("tips_1000", "A1")));
        assert_eq!(recorded, offset);

        // 垃圾桶不带偏移
        pipette.pick_up_tip().unwrap();
        pipette.drop_tip().unwrap();
        assert_eq!(
            robot.commands().last(),
            Some(&RobotCommand::DropTip {
                pipette_id: "right-id".into(),
                location: None,
                offset: Offset::ZERO,
            })
        );
    }

    #[test]
    fn test_aspirate_requires_tip_and_capacity() {
        let (robot, mut inventory, mut pipette) = setup("left", PipetteModel::P20SingleGen2);
        let water = inventory.get_mut(&id("3A1")).unwrap();
        assert!(matches!(
            pipette.aspirate(5.0, water, Stroke::default()),
            Err(PipetteError::NoTip { .. })
        ));

        pipette.pick_up_tip().unwrap();
        let water = inventory.get_mut(&id("3A1")).unwrap();
        pipette.aspirate(15.0, water, Stroke::default()).unwrap();
        assert!(matches!(
            pipette.aspirate(10.0, water, Stroke::default()),
            Err(PipetteError::Overcapacity { .. })
        ));
        assert_relative_eq!(water.volume_ul(), 12000.0 - 15.0);
        assert_relative_eq!(pipette.volume_ul(), 15.0);
        assert_eq!(robot.count(CommandKind::Aspirate), 1);
    }

    #[test]
    fn test_aspirate_depth_follows_liquid_level() {
        let (robot, mut inventory, mut pipette) = setup("left", PipetteModel::P20SingleGen2);
        pipette.pick_up_tip().unwrap();
        let water = inventory.get_mut(&id("3A1")).unwrap();
        let expected = water.height_mm() - water.depth_mm() - 2.0;
        pipette
            .aspirate(10.0, water, Stroke::at_depth(-2.0).with_flow_rate(5.0))
            .unwrap();

        let Some(RobotCommand::Aspirate(command)) = robot.commands().last().cloned() else {
            panic!("expected an aspirate command");
        };
        assert_relative_eq!(command.depth_mm, expected);
        assert_eq!(command.flow_rate_ul_s, 5.0);
        assert_eq!(command.offset, PipetteModel::P20SingleGen2.default_offset());
        assert_eq!(command.location, WellLocation::new("tubes", "A1"));
    }

    #[test]
    fn test_insufficient_source_is_rejected_without_command() {
        let (robot, mut inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);
        pipette.pick_up_tip().unwrap();
        let empty_well = inventory.get_mut(&id("2A1")).unwrap();
        assert!(matches!(
            pipette.aspirate(50.0, empty_well, Stroke::default()),
            Err(PipetteError::Inventory(_))
        ));
        assert_eq!(robot.count(CommandKind::Aspirate), 0);
        assert_eq!(pipette.volume_ul(), 0.0);
    }

    #[test]
    fn test_aspirate_then_dispense_back_restores_source() {
        let (_robot, mut inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);
        pipette.pick_up_tip().unwrap();
        let sds = inventory.get_mut(&id("3A2")).unwrap();
        pipette.aspirate(500.0, sds, Stroke::default()).unwrap();
        pipette.dispense(500.0, sds, Stroke::default()).unwrap();

        assert_relative_eq!(sds.volume_ul(), 5000.0);
        assert_eq!(sds.contents().concentration, Concentration::Quantified(10.0));
        assert_eq!(pipette.volume_ul(), 0.0);
    }

    #[test]
    fn test_dispense_more_than_held_only_warns() {
        let (robot, mut inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);
        pipette.pick_up_tip().unwrap();
        pipette
            .aspirate(50.0, inventory.get_mut(&id("3A1")).unwrap(), Stroke::default())
            .unwrap();
        pipette
            .dispense(80.0, inventory.get_mut(&id("2A1")).unwrap(), Stroke::default())
            .unwrap();

        assert_eq!(robot.count(CommandKind::Dispense), 1);
        assert_relative_eq!(inventory.get(&id("2A1")).unwrap().volume_ul(), 50.0);
        assert_eq!(pipette.volume_ul(), 0.0);
    }

    #[test]
    fn test_dirty_flag_and_cleaning() {
        let (_robot, mut inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);
        pipette.pick_up_tip().unwrap();
        pipette
            .transfer(&mut inventory, 100.0, &id("3A1"), &id("2A1"), None)
            .unwrap();
        assert!(pipette.is_clean());

        pipette
            .aspirate(100.0, inventory.get_mut(&id("3A2")).unwrap(), Stroke::default())
            .unwrap();
        assert!(!pipette.is_clean());
        assert_eq!(pipette.state(), TipState::Tipped { clean: false });

        let sponge = inventory.sponge_mut().unwrap();
        pipette.clean_tip(sponge).unwrap();
        assert!(pipette.is_clean());
        assert_eq!(sponge.current_well(), WellLocation::new("sponge", "A2"));
        assert_eq!(sponge.uses(), 1);
        // 清洗不影响枪头内液体
        assert_relative_eq!(pipette.volume_ul(), 100.0);
    }

    #[test]
    fn test_clean_tip_scrub_count() {
        let (robot, mut inventory, mut pipette) = setup("left", PipetteModel::P20SingleGen2);
        pipette.pick_up_tip().unwrap();
        pipette.clean_tip(inventory.sponge_mut().unwrap()).unwrap();
        // 移动到海绵 + 每次擦拭下/上各一次
        let scrubs = PipetteSettings::default().scrub_count as usize;
        assert_eq!(robot.count_at(CommandKind::MoveTo, "sponge"), 1 + 2 * scrubs);
    }

    #[test]
    fn test_air_gap_round_trip() {
        let (robot, mut inventory, mut pipette) = setup("left", PipetteModel::P20SingleGen2);
        pipette.pick_up_tip().unwrap();
        assert!(matches!(
            pipette.air_gap(&inventory, 5.0),
            Err(PipetteError::MissingReference("last source"))
        ));

        pipette
            .aspirate(15.0, inventory.get_mut(&id("3A2")).unwrap(), Stroke::default())
            .unwrap();
        // 15 + 5 = 20，刚好满
        pipette.air_gap(&inventory, 5.0).unwrap();
        assert_relative_eq!(pipette.air_gap_ul(), 5.0);
        assert_relative_eq!(pipette.free_volume_ul(), 0.0);
        // 空气不改变来源体积
        assert_relative_eq!(inventory.get(&id("3A2")).unwrap().volume_ul(), 5000.0 - 15.0);

        let Some(RobotCommand::Aspirate(command)) = robot.commands().last().cloned() else {
            panic!("expected an aspirate command");
        };
        let source = inventory.get(&id("3A2")).unwrap();
        assert_relative_eq!(
            command.depth_mm,
            source.height_mm() - source.depth_mm() + PipetteSettings::default().air_gap_clearance_mm
        );
        assert_eq!(command.flow_rate_ul_s, PipetteSettings::default().air_gap_flow_rate_ul_s);

        pipette
            .remove_air_gap(&inventory, AirGapTarget::DropStage)
            .unwrap();
        assert_eq!(pipette.air_gap_ul(), 0.0);
        assert_eq!(robot.count_at(CommandKind::Dispense, "stage"), 1);
        assert_relative_eq!(pipette.volume_ul(), 15.0);
    }

    #[test]
    fn test_touch_tip_moves() {
        let (robot, inventory, mut pipette) = setup("left", PipetteModel::P20SingleGen2);
        pipette.pick_up_tip().unwrap();
        pipette.touch_tip(inventory.get(&id("2A1")).unwrap(), 2).unwrap();
        assert_eq!(robot.count_at(CommandKind::MoveTo, "plate"), 1 + 2 * 4 * 2);
    }

    #[test]
    fn test_transfer_splits_by_capacity() {
        let (robot, mut inventory, mut pipette) = setup("left", PipetteModel::P20SingleGen2);
        pipette.pick_up_tip().unwrap();
        pipette
            .transfer(
                &mut inventory,
                50.0,
                &id("3A1"),
                &id("2A1"),
                Some(MixSpec::new(10.0, 2)),
            )
            .unwrap();
        // 20 + 20 + 10
        assert_eq!(robot.count_at(CommandKind::Aspirate, "tubes"), 3);
        assert_eq!(robot.count_at(CommandKind::Dispense, "plate"), 3 + 2);
        assert_relative_eq!(inventory.get(&id("2A1")).unwrap().volume_ul(), 50.0);
        assert_eq!(
            inventory.get(&id("2A1")).unwrap().contents().concentration,
            Concentration::Pure
        );
    }

    #[test]
    fn test_robot_failure_leaves_state_unchanged() {
        let (robot, mut inventory, mut pipette) = setup("right", PipetteModel::P1000SingleGen2);
        pipette.pick_up_tip().unwrap();
        robot.fail_next(
            CommandKind::Aspirate,
            RobotError::Timeout {
                command: "aspirate".into(),
                after: Duration::from_secs(30),
            },
        );
        let err = pipette
            .aspirate(100.0, inventory.get_mut(&id("3A1")).unwrap(), Stroke::default())
            .unwrap_err();
        assert!(err.is_hardware_fault());
        assert_relative_eq!(inventory.get(&id("3A1")).unwrap().volume_ul(), 12000.0);
        assert_eq!(pipette.volume_ul(), 0.0);
        assert!(pipette.last_source().is_none());
    }
}
