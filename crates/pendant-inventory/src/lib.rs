//! # Pendant Inventory
//!
//! 甲板上液体库存的模型：每个容器的体积、液面高度、溶液与浓度。
//!
//! ## 模块
//!
//! - `geometry`: 容器几何类型与"体积 → 液面高度"的纯函数
//! - `container`: [`LiquidContainer`] trait 与按几何类型区分的 [`Container`]
//! - `stations`: 海绵清洗站与枪头盒
//! - `layout`: 从 TOML 布局文件构建整个 [`Inventory`]
//!
//! ## 不变量
//!
//! 对任意吸液/分液序列，`0 ≤ volume ≤ max_volume` 始终成立；
//! 违反约束的操作会被记录日志并拒绝，状态保持不变。

pub mod container;
pub mod geometry;
pub mod layout;
pub mod stations;

pub use container::{Container, LiquidContainer};
pub use geometry::Geometry;
pub use layout::{Inventory, LabwareSpec, Layout};
pub use stations::{Sponge, TipRack};

use thiserror::Error;

/// 库存模型错误
#[derive(Error, Debug)]
pub enum InventoryError {
    /// 吸液量超过容器当前体积
    #[error("Insufficient volume in {well}: requested {requested:.2} uL, available {available:.2} uL")]
    InsufficientVolume {
        well: String,
        requested: f64,
        available: f64,
    },

    /// 分液后会超过容器最大体积
    #[error("Overflow in {well}: requested {requested:.2} uL, free {free:.2} uL")]
    Overflow {
        well: String,
        requested: f64,
        free: f64,
    },

    #[error("Negative volume requested: {0}")]
    NegativeVolume(f64),

    #[error("Unknown well: {0}")]
    UnknownWell(String),

    #[error("Unknown labware: {0}")]
    UnknownLabware(String),

    /// 布局中缺少必须的工位（如液滴台、海绵）
    #[error("Layout has no {0}")]
    MissingStation(&'static str),

    #[error("Duplicate well in layout: {0}")]
    DuplicateWell(String),

    /// 工位没有可用孔位（海绵或枪头盒为空）
    #[error("Station '{0}' has no wells")]
    EmptyStation(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Layout parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}
