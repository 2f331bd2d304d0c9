//! 相机设备接口

use image::RgbImage;
use std::time::Duration;
use thiserror::Error;

/// 相机错误
#[derive(Error, Debug)]
pub enum CameraError {
    /// 取帧超时（对视频流是致命的）
    #[error("Frame grab timed out after {0:?}")]
    Timeout(Duration),

    #[error("Camera disconnected: {0}")]
    Disconnected(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// 相机设备
///
/// 只有采集线程会调用 `grab_next_frame`，因此方法取 `&mut self`。
/// 设备在停止视频流后会被交还给所有者，可以再次启动。
pub trait CameraDevice: Send {
    /// 阻塞等待下一帧，超过 `timeout` 返回 [`CameraError::Timeout`]
    fn grab_next_frame(&mut self, timeout: Duration) -> Result<RgbImage, CameraError>;

    /// 设备名（用于日志）
    fn name(&self) -> &str {
        "camera"
    }
}

impl<T: CameraDevice + ?Sized> CameraDevice for Box<T> {
    fn grab_next_frame(&mut self, timeout: Duration) -> Result<RgbImage, CameraError> {
        (**self).grab_next_frame(timeout)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
