//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use pendant_sdk::prelude::*;
//! ```

// 数据类型
pub use pendant_protocol::{
    Concentration, Contents, DropParameters, Offset, Sample, TimeSeries, WellId, WellLocation,
};

// 设备接口
pub use pendant_hal::{CameraDevice, CameraError, RgbImage, RobotApi, RobotError};

// 库存
pub use pendant_inventory::{Container, Inventory, Layout, LiquidContainer, Sponge, TipRack};

// 分析与相机
pub use pendant_analysis::{AnalyzerConfig, DropAnalysis, DropShapeAnalyzer, FrameAnalyzer};
pub use pendant_driver::{DirectorySink, FeedHandle, PendantDropCamera, PipelineConfig};

// 移液器
pub use pendant_client::{
    AirGapTarget, DilutionPlan, MixSpec, Pipette, PipetteModel, PipetteSettings, Stroke,
};

// 控制流程
pub use pendant_control::{
    DropletConfig, DropletManager, ExperimentConfig, MeasurementOutcome, MeasurementStatus,
    PipetteMount, WellMeasurementRun, WellRequest,
};

// 结果
pub use pendant_tools::{ResultRecord, ResultsLog, equilibrium_surface_tension};

// 错误类型
pub use pendant_analysis::AnalysisError;
pub use pendant_client::PipetteError;
pub use pendant_control::ControlError;
pub use pendant_driver::DriverError;
pub use pendant_inventory::InventoryError;
