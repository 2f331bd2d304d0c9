//! Mock 设备（无硬件依赖）
//!
//! - [`MockRobot`]: 记录所有命令，可以按命令类型注入一次性故障
//! - [`MockCamera`]: 用生成函数产生帧，可以在指定帧数之后模拟取帧超时

use crate::camera::{CameraDevice, CameraError};
use crate::robot::{LiquidCommand, RobotApi, WellLocation};
use crate::RobotError;
use image::RgbImage;
use parking_lot::Mutex;
use pendant_protocol::Offset;
use std::collections::VecDeque;
use std::time::Duration;

/// 机器人命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    PickUpTip,
    DropTip,
    Aspirate,
    Dispense,
    MoveTo,
    Delay,
}

/// 已记录的机器人命令
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    PickUpTip {
        pipette_id: String,
        location: WellLocation,
        offset: Offset,
    },
    DropTip {
        pipette_id: String,
        location: Option<WellLocation>,
        offset: Offset,
    },
    Aspirate(LiquidCommand),
    Dispense(LiquidCommand),
    MoveTo {
        pipette_id: String,
        location: WellLocation,
        depth_mm: f64,
        offset: Offset,
        speed_mm_s: Option<f64>,
    },
    Delay(Duration),
}

impl RobotCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            RobotCommand::PickUpTip { .. } => CommandKind::PickUpTip,
            RobotCommand::DropTip { .. } => CommandKind::DropTip,
            RobotCommand::Aspirate(_) => CommandKind::Aspirate,
            RobotCommand::Dispense(_) => CommandKind::Dispense,
            RobotCommand::MoveTo { .. } => CommandKind::MoveTo,
            RobotCommand::Delay(_) => CommandKind::Delay,
        }
    }

    /// 命令作用的孔位（若有）
    pub fn location(&self) -> Option<&WellLocation> {
        match self {
            RobotCommand::PickUpTip { location, .. } | RobotCommand::MoveTo { location, .. } => {
                Some(location)
            },
            RobotCommand::DropTip { location, .. } => location.as_ref(),
            RobotCommand::Aspirate(cmd) | RobotCommand::Dispense(cmd) => Some(&cmd.location),
            RobotCommand::Delay(_) => None,
        }
    }
}

/// Mock 机器人
///
/// 所有命令立即成功并写入日志；`fail_next` 注入的故障在匹配的下一条命令上触发一次，
/// 触发故障的命令不会写入日志。
#[derive(Debug, Default)]
pub struct MockRobot {
    log: Mutex<Vec<RobotCommand>>,
    failures: Mutex<VecDeque<(CommandKind, RobotError)>>,
}

impl MockRobot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让下一条 `kind` 类型的命令失败
    pub fn fail_next(&self, kind: CommandKind, error: RobotError) {
        self.failures.lock().push_back((kind, error));
    }

    /// 已执行命令的快照
    pub fn commands(&self) -> Vec<RobotCommand> {
        self.log.lock().clone()
    }

    /// 某类命令的执行次数
    pub fn count(&self, kind: CommandKind) -> usize {
        self.log.lock().iter().filter(|c| c.kind() == kind).count()
    }

    /// 在指定耗材上执行过的某类命令次数
    pub fn count_at(&self, kind: CommandKind, labware_id: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|c| c.kind() == kind)
            .filter(|c| c.location().is_some_and(|l| l.labware_id == labware_id))
            .count()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }

    fn execute(&self, command: RobotCommand) -> Result<(), RobotError> {
        let kind = command.kind();
        {
            let mut failures = self.failures.lock();
            if let Some(pos) = failures.iter().position(|(k, _)| *k == kind)
                && let Some((_, error)) = failures.remove(pos)
            {
                tracing::debug!("MockRobot: injected failure on {:?}: {}", kind, error);
                return Err(error);
            }
        }
        self.log.lock().push(command);
        Ok(())
    }
}

impl RobotApi for MockRobot {
    fn pick_up_tip(
        &self,
        pipette_id: &str,
        location: &WellLocation,
        offset: Offset,
    ) -> Result<(), RobotError> {
        self.execute(RobotCommand::PickUpTip {
            pipette_id: pipette_id.to_string(),
            location: location.clone(),
            offset,
        })
    }

    fn drop_tip(
        &self,
        pipette_id: &str,
        location: Option<&WellLocation>,
        offset: Offset,
    ) -> Result<(), RobotError> {
        self.execute(RobotCommand::DropTip {
            pipette_id: pipette_id.to_string(),
            location: location.cloned(),
            offset,
        })
    }

    fn aspirate(&self, command: &LiquidCommand) -> Result<(), RobotError> {
        self.execute(RobotCommand::Aspirate(command.clone()))
    }

    fn dispense(&self, command: &LiquidCommand) -> Result<(), RobotError> {
        self.execute(RobotCommand::Dispense(command.clone()))
    }

    fn move_to_well(
        &self,
        pipette_id: &str,
        location: &WellLocation,
        depth_mm: f64,
        offset: Offset,
        speed_mm_s: Option<f64>,
    ) -> Result<(), RobotError> {
        self.execute(RobotCommand::MoveTo {
            pipette_id: pipette_id.to_string(),
            location: location.clone(),
            depth_mm,
            offset,
            speed_mm_s,
        })
    }

    fn delay(&self, duration: Duration) -> Result<(), RobotError> {
        // 不真正等待
        self.execute(RobotCommand::Delay(duration))
    }
}

type FrameGenerator = Box<dyn FnMut(u64) -> RgbImage + Send>;

/// Mock 相机
///
/// 每次取帧调用生成函数（参数为帧序号），并按 `frame_interval` 模拟曝光耗时。
pub struct MockCamera {
    generator: FrameGenerator,
    frame_interval: Duration,
    timeout_after: Option<u64>,
    grabbed: u64,
}

impl MockCamera {
    pub fn new(generator: impl FnMut(u64) -> RgbImage + Send + 'static) -> Self {
        Self {
            generator: Box::new(generator),
            frame_interval: Duration::from_millis(5),
            timeout_after: None,
            grabbed: 0,
        }
    }

    /// 始终返回同一张图像
    pub fn constant(image: RgbImage) -> Self {
        Self::new(move |_| image.clone())
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// 成功取 `frames` 帧之后，之后的每次取帧都超时
    pub fn with_timeout_after(mut self, frames: u64) -> Self {
        self.timeout_after = Some(frames);
        self
    }

    pub fn frames_grabbed(&self) -> u64 {
        self.grabbed
    }
}

impl CameraDevice for MockCamera {
    fn grab_next_frame(&mut self, timeout: Duration) -> Result<RgbImage, CameraError> {
        if let Some(limit) = self.timeout_after
            && self.grabbed >= limit
        {
            return Err(CameraError::Timeout(timeout));
        }
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval.min(timeout));
        }
        let frame = (self.generator)(self.grabbed);
        self.grabbed += 1;
        Ok(frame)
    }

    fn name(&self) -> &str {
        "mock-camera"
    }
}
