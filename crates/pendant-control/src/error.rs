//! 控制流程错误类型

use pendant_client::PipetteError;
use pendant_driver::DriverError;
use pendant_inventory::InventoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Pipette error: {0}")]
    Pipette(#[from] PipetteError),

    #[error("Camera error: {0}")]
    Driver(#[from] DriverError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// 测量请求本身无效（不会重试）
    #[error("Invalid measurement request: {0}")]
    InvalidRequest(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// 硬件故障（机器人命令失败、相机视频流中断）
    pub fn is_hardware_fault(&self) -> bool {
        match self {
            ControlError::Pipette(e) => e.is_hardware_fault(),
            ControlError::Driver(DriverError::StreamFault(_) | DriverError::DeviceUnavailable) => {
                true
            },
            _ => false,
        }
    }
}
