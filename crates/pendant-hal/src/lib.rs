//! # Pendant HAL
//!
//! 外部设备抽象层：液体处理机器人的命令接口与相机设备接口。
//!
//! 两者都被视为不透明设备，只通过窄接口（trait）访问：
//!
//! - [`RobotApi`]: 远程命令 API（取枪头、吸液、分液、移动、等待）
//! - [`CameraDevice`]: 带超时的阻塞取帧
//!
//! 启用 `mock` feature 后提供 [`mock::MockRobot`] 和 [`mock::MockCamera`]，
//! 用于测试与无硬件仿真。

use std::time::Duration;
use thiserror::Error;

pub mod camera;
pub mod robot;

#[cfg(feature = "mock")]
pub mod mock;

pub use camera::{CameraDevice, CameraError};
pub use robot::{LiquidCommand, RobotApi, WellLocation};

// 重新导出图像类型，避免上层直接依赖 image 的版本
pub use image::RgbImage;

/// 机器人命令错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RobotError {
    /// 命令在规定时间内没有完成（对当前操作是致命的）
    #[error("Robot command '{command}' timed out after {after:?}")]
    Timeout { command: String, after: Duration },

    /// 机器人拒绝执行命令（例如坐标越界、枪头状态不符）
    #[error("Robot rejected '{command}': {message}")]
    Rejected { command: String, message: String },

    /// 通信链路错误
    #[error("Robot transport error: {0}")]
    Transport(String),
}

impl RobotError {
    /// 是否为超时（硬件超时）
    pub fn is_timeout(&self) -> bool {
        matches!(self, RobotError::Timeout { .. })
    }
}
