//! # Pendant Tools - 测量结果的统计与持久化
//!
//! **依赖原则**: 只依赖 `pendant-protocol`，不依赖硬件相关 crate
//!
//! ## 包含模块
//!
//! - `statistics` - 平衡表面张力与时间序列统计（纯函数）
//! - `suggestion` - 根据已有结果预测下一个液滴体积（纯函数）
//! - `recording` - 时间序列与结果表的 CSV 读写

pub mod recording;
pub mod statistics;
pub mod suggestion;

pub use recording::{ResultRecord, ResultsLog, read_time_series, write_time_series};
pub use statistics::{DEFAULT_EQUILIBRIUM_WINDOW, SeriesStatistics, equilibrium_surface_tension};
pub use suggestion::{predict_surface_tension, suggest_drop_volume, volume_for_surface_tension};
