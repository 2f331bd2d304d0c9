//! 共享寄存器
//!
//! 每个寄存器只有一个写者：`latest_frame` 由采集线程写，
//! `latest_analysis` 由处理线程写。读取通过 `ArcSwapOption::load_full` 无锁完成。

use arc_swap::ArcSwapOption;
use image::RgbImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 一帧图像
#[derive(Debug, Clone)]
pub struct Frame {
    /// 帧序号（单调递增，用于避免重复分析同一帧）
    pub seq: u64,
    pub image: Arc<RgbImage>,
    pub captured_at: Instant,
}

/// 相机流水线上下文
#[derive(Debug, Default)]
pub struct CameraContext {
    /// 最新原始帧
    pub latest_frame: ArcSwapOption<Frame>,
    /// 最新标注图像（分析失败时清空）
    pub latest_analysis: ArcSwapOption<RgbImage>,
    /// 视频流故障原因（采集线程因硬件错误退出时设置）
    pub fault: ArcSwapOption<String>,
    next_seq: AtomicU64,
}

impl CameraContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发布新帧
    pub(crate) fn publish_frame(&self, image: RgbImage) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.latest_frame.store(Some(Arc::new(Frame {
            seq,
            image: Arc::new(image),
            captured_at: Instant::now(),
        })));
        seq
    }

    pub(crate) fn set_fault(&self, reason: String) {
        self.fault.store(Some(Arc::new(reason)));
    }

    pub(crate) fn clear_fault(&self) {
        self.fault.store(None);
    }

    pub fn fault_reason(&self) -> Option<String> {
        self.fault.load_full().map(|reason| reason.as_ref().clone())
    }
}
