//! # Pendant Protocol
//!
//! 悬滴法表面张力测量的共享数据类型（无硬件依赖）
//!
//! ## 模块
//!
//! - `liquid`: 溶液身份与浓度（`Concentration`、`Contents`）
//! - `measurement`: 表面张力采样、时间序列与液滴参数
//! - `deck`: 甲板坐标相关的小类型（孔位 ID、偏移量）
//!
//! ## 单位
//!
//! 所有体积均为 µL，高度与深度为 mm，表面张力为 mN/m，时间为秒。

pub mod deck;
pub mod liquid;
pub mod measurement;

pub use deck::*;
pub use liquid::*;
pub use measurement::*;

/// 协议层错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// 孔位 ID 格式错误（期望 `<location><row><column>`，如 `2A1`）
    #[error("Invalid well id: {0:?}")]
    InvalidWellId(String),
}
