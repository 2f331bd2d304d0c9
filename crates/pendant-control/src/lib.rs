//! # Pendant Control
//!
//! 悬滴测量的控制流程：
//!
//! - [`DropletManager`]: 形成液滴、采集、监测有效性，失败时回收并以更小体积重试
//! - [`WellMeasurementRun`]: 逐孔测量、计算平衡表面张力并记录结果
//! - [`ExperimentConfig`]: 实验配置（TOML）
//!
//! 硬件故障和液滴无效只会让单次尝试失败，不会向上传播。

mod config;
mod error;
mod manager;
mod run;

pub use config::{DropletConfig, ExperimentConfig, PipetteMount};
pub use error::ControlError;
pub use manager::{DropletManager, DropletState, MeasurementOutcome, MeasurementStatus};
pub use run::{SERIES_FILE_NAME, WellMeasurementRun, WellRequest};
