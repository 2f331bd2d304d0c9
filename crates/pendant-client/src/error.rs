//! 移液器错误类型

use pendant_hal::RobotError;
use pendant_inventory::InventoryError;
use thiserror::Error;

/// 移液器错误
#[derive(Error, Debug)]
pub enum PipetteError {
    /// 操作需要枪头，但当前没有
    #[error("{mount} pipette has no tip attached")]
    NoTip { mount: String },

    #[error("{mount} pipette already has a tip attached")]
    TipAlreadyAttached { mount: String },

    /// 枪头盒已用完
    #[error("Tip rack {0} is exhausted")]
    TipRackExhausted(String),

    /// 吸液后会超过移液器容量（含空气隔断）
    #[error("Aspirating {requested:.2} uL exceeds capacity: holding {held:.2} uL of {max:.2} uL")]
    Overcapacity { requested: f64, held: f64, max: f64 },

    /// 缺少操作需要的参照孔位（如上一次吸液的来源）
    #[error("No {0} recorded for this pipette")]
    MissingReference(&'static str),

    #[error("Invalid dilution plan: {0}")]
    InvalidPlan(String),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Robot error: {0}")]
    Robot(#[from] RobotError),
}

impl PipetteError {
    /// 是否为硬件故障（机器人命令失败或超时）
    pub fn is_hardware_fault(&self) -> bool {
        matches!(self, PipetteError::Robot(_))
    }
}
