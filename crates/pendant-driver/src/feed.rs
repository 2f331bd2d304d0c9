//! 视频流读取

use crate::error::DriverError;
use crate::state::CameraContext;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use std::sync::Arc;

/// multipart/x-mixed-replace 的分隔头
const MJPEG_PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// 视频流句柄
///
/// 优先返回最新的标注图像，没有时回退到最新原始帧。可以跨线程克隆。
#[derive(Debug, Clone)]
pub struct FeedHandle {
    ctx: Arc<CameraContext>,
    quality: u8,
}

impl FeedHandle {
    pub(crate) fn new(ctx: Arc<CameraContext>) -> Self {
        Self { ctx, quality: 80 }
    }

    /// JPEG 质量（1-100）
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// 当前应显示的图像
    pub fn current_image(&self) -> Option<Arc<RgbImage>> {
        self.ctx
            .latest_analysis
            .load_full()
            .or_else(|| self.ctx.latest_frame.load_full().map(|f| f.image.clone()))
    }

    /// 当前图像编码为 JPEG
    pub fn jpeg(&self) -> Result<Option<Vec<u8>>, DriverError> {
        let Some(image) = self.current_image() else {
            return Ok(None);
        };
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality).encode_image(image.as_ref())?;
        Ok(Some(buf))
    }

    /// 一个 MJPEG 分段（分隔头 + JPEG + CRLF）
    pub fn mjpeg_chunk(&self) -> Result<Option<Vec<u8>>, DriverError> {
        Ok(self.jpeg()?.map(|jpeg| {
            let mut chunk = Vec::with_capacity(MJPEG_PART_HEADER.len() + jpeg.len() + 2);
            chunk.extend_from_slice(MJPEG_PART_HEADER);
            chunk.extend_from_slice(&jpeg);
            chunk.extend_from_slice(b"\r\n");
            chunk
        }))
    }
}
