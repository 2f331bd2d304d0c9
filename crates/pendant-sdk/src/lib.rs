//! Pendant SDK - 自动化悬滴表面张力测量
//!
//! 在液体处理机器人上形成悬滴、拍摄剪影，并把剪影换算成动态表面张力时间序列。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 共享数据类型（孔位、浓度、采样、时间序列）
//! - **设备层** (`hal`): 机器人命令接口与相机接口（不透明设备）
//! - **库存层** (`inventory`): 容器体积、液面高度与浓度
//! - **分析层** (`analysis`): 图像 → 表面张力的纯几何算法
//! - **驱动层** (`driver`): 相机采集与分析线程
//! - **客户端层** (`client`): 移液器状态机、空气隔断、梯度稀释
//! - **控制层** (`control`): 液滴管理器（重试与恢复）、逐孔测量
//! - **工具** (`tools`): 统计、体积建议、CSV 记录
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use pendant_sdk::prelude::*;
//!
//! pendant_sdk::init_logger();
//! let layout = Layout::load("layout.toml")?;
//! let inventory = Inventory::from_layout(&layout)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use pendant_analysis as analysis;
pub use pendant_client as client;
pub use pendant_control as control;
pub use pendant_driver as driver;
pub use pendant_hal as hal;
pub use pendant_inventory as inventory;
pub use pendant_protocol as protocol;
pub use pendant_tools as tools;

mod logging;
pub mod prelude;

pub use logging::{init_logger, init_logger_with};

// 常用入口
pub use pendant_analysis::{AnalysisError, AnalyzerConfig, DropShapeAnalyzer};
pub use pendant_client::{Pipette, PipetteError};
pub use pendant_control::{ControlError, DropletManager, ExperimentConfig, WellMeasurementRun};
pub use pendant_driver::{DriverError, PendantDropCamera};
pub use pendant_hal::{CameraDevice, RobotApi, RobotError};
pub use pendant_inventory::{Inventory, InventoryError, Layout};
