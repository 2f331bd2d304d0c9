//! # Pendant Client
//!
//! 移液器控制：枪头状态机、吸液/分液、空气隔断、枪头清洗与梯度稀释。
//!
//! # 状态机
//!
//! ```text
//! Empty ──pick_up_tip──► Tipped(clean) ⇄ aspirate/dispense ──► Tipped(dirty)
//!   ▲                                                               │
//!   └───────────────────────── drop_tip / return_tip ◄──────────────┘
//! ```
//!
//! 不同溶液先后接触同一枪头且中间没有清洗时，枪头变为 dirty；
//! [`Pipette::clean_tip`] 在海绵上清洗后恢复 clean。
//!
//! 所有机器人命令都先于状态更新执行：命令失败时移液器和容器状态保持不变。

mod dilution;
mod error;
mod pipette;
mod types;

pub use dilution::DilutionPlan;
pub use error::PipetteError;
pub use pipette::Pipette;
pub use types::{AirGapTarget, MixSpec, PipetteModel, PipetteSettings, Stroke, TipState};
