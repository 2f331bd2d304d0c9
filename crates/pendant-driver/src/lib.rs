//! # Pendant Driver
//!
//! 相机采集与分析流水线：
//!
//! - **采集线程**：阻塞取帧，写入 `latest_frame` 寄存器（唯一写者）
//! - **处理线程**：读取最新帧，定期存盘，调用分析器，
//!   通过通道把 `(elapsed, surface_tension)` 采样发给相机所有者
//! - **视频流**：单个外部消费者读取标注图像，没有时回退到原始帧
//!
//! 两个线程都通过 `AtomicBool` 标志协作退出，由所有者在有限时间内 join。
//! 共享寄存器使用 `ArcSwapOption`，读取无锁。

mod camera;
mod error;
mod feed;
mod metrics;
mod pipeline;
mod sink;
mod state;

pub use camera::PendantDropCamera;
pub use error::DriverError;
pub use feed::FeedHandle;
pub use metrics::{CameraMetrics, MetricsSnapshot};
pub use pipeline::PipelineConfig;
pub use sink::{DirectorySink, FrameSink, NullSink};
pub use state::{CameraContext, Frame};
