//! 相机流水线错误类型定义

use thiserror::Error;

/// 相机流水线错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 开始采集前没有调用 `initialize_measurement`
    #[error("Measurement not initialized, call initialize_measurement() first")]
    NotInitialized,

    /// 采集进行中，不能重置测量
    #[error("Capture already running")]
    CaptureActive,

    /// 相机设备不可用（上一次的采集线程还没有退出，设备尚未归还）
    #[error("Camera device unavailable")]
    DeviceUnavailable,

    /// 流水线配置无效
    #[error("Invalid pipeline config: {0}")]
    InvalidConfig(String),

    /// 视频流因硬件故障停止
    #[error("Camera stream fault: {0}")]
    StreamFault(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
