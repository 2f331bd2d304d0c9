//! 液体处理机器人命令接口

use crate::RobotError;
pub use pendant_protocol::WellLocation;
use pendant_protocol::Offset;
use std::time::Duration;

/// 吸液 / 分液命令
///
/// `depth_mm` 以孔顶部为原点，负值表示孔口以下。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LiquidCommand {
    pub pipette_id: String,
    pub location: WellLocation,
    pub volume_ul: f64,
    pub depth_mm: f64,
    pub flow_rate_ul_s: f64,
    pub offset: Offset,
}

/// 远程命令 API
///
/// 所有命令都是同步的：返回时动作已经完成。
/// 实现者需要自行处理内部可变性（`&self`），以便在多个组件间共享 `Arc<dyn RobotApi>`。
pub trait RobotApi: Send + Sync {
    /// 在指定孔位取枪头
    fn pick_up_tip(
        &self,
        pipette_id: &str,
        location: &WellLocation,
        offset: Offset,
    ) -> Result<(), RobotError>;

    /// 丢弃枪头
    ///
    /// `location == None` 时丢入默认垃圾桶，否则放回指定孔位（退枪头）。
    /// `offset` 是相对孔位的偏移，与取枪头时一致。
    fn drop_tip(
        &self,
        pipette_id: &str,
        location: Option<&WellLocation>,
        offset: Offset,
    ) -> Result<(), RobotError>;

    fn aspirate(&self, command: &LiquidCommand) -> Result<(), RobotError>;

    fn dispense(&self, command: &LiquidCommand) -> Result<(), RobotError>;

    /// 移动到孔位（`depth_mm` 同样以孔顶部为原点）
    fn move_to_well(
        &self,
        pipette_id: &str,
        location: &WellLocation,
        depth_mm: f64,
        offset: Offset,
        speed_mm_s: Option<f64>,
    ) -> Result<(), RobotError>;

    /// 机器人侧等待
    fn delay(&self, duration: Duration) -> Result<(), RobotError>;
}

impl<T: RobotApi + ?Sized> RobotApi for std::sync::Arc<T> {
    fn pick_up_tip(
        &self,
        pipette_id: &str,
        location: &WellLocation,
        offset: Offset,
    ) -> Result<(), RobotError> {
        (**self).pick_up_tip(pipette_id, location, offset)
    }

    fn drop_tip(
        &self,
        pipette_id: &str,
        location: Option<&WellLocation>,
        offset: Offset,
    ) -> Result<(), RobotError> {
        (**self).drop_tip(pipette_id, location, offset)
    }

    fn aspirate(&self, command: &LiquidCommand) -> Result<(), RobotError> {
        (**self).aspirate(command)
    }

    fn dispense(&self, command: &LiquidCommand) -> Result<(), RobotError> {
        (**self).dispense(command)
    }

    fn move_to_well(
        &self,
        pipette_id: &str,
        location: &WellLocation,
        depth_mm: f64,
        offset: Offset,
        speed_mm_s: Option<f64>,
    ) -> Result<(), RobotError> {
        (**self).move_to_well(pipette_id, location, depth_mm, offset, speed_mm_s)
    }

    fn delay(&self, duration: Duration) -> Result<(), RobotError> {
        (**self).delay(duration)
    }
}
