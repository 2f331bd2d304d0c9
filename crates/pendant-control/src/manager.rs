//! 液滴管理器
//!
//! 状态流转：
//!
//! ```text
//! Idle ─► Forming ─► Capturing ─► Monitoring ─┬─► Accepted
//!            ▲                                 │
//!            └──────────── RetryNeeded ◄───────┤
//!                                              └─► Exhausted
//! ```
//!
//! 每次尝试的液滴体积为 `initial - decrement × (attempt - 1)`。
//! 读数过低（或没有读数）和硬件故障都只让当前尝试失败：停止采集、把液滴收回来源、
//! 换枪头后重试。无论结果如何，退出前都会停止采集和视频流、收回液滴并丢弃枪头。

use crate::config::DropletConfig;
use crate::error::ControlError;
use pendant_client::{AirGapTarget, Pipette, PipetteError, Stroke};
use pendant_driver::{DriverError, FeedHandle, PendantDropCamera};
use pendant_hal::RobotApi;
use pendant_inventory::Inventory;
use pendant_protocol::{DropParameters, TimeSeries, WellId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Span, error, info, warn};

const VOLUME_EPSILON: f64 = 1e-9;

/// 液滴管理器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropletState {
    Idle,
    /// 取枪头、混匀、吸液、在液滴台形成液滴
    Forming,
    /// 启动视频流和处理线程
    Capturing,
    /// 按轮询间隔检查最近一个读数
    Monitoring,
    Accepted,
    RetryNeeded,
    Exhausted,
}

/// 测量结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementStatus {
    /// 液滴在整个测量时间内保持有效
    Accepted,
    /// 所有尝试都失败，结果为最长的一段时间序列
    Exhausted,
}

/// 一次测量请求的结果
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementOutcome {
    pub well_id: WellId,
    pub series: TimeSeries,
    /// 最后一次尝试的参数（`drop_count` 为尝试次数）
    pub params: DropParameters,
    pub status: MeasurementStatus,
}

impl MeasurementOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == MeasurementStatus::Accepted
    }

    /// 平衡表面张力：最后 `window` 个采样的均值
    pub fn equilibrium_surface_tension(&self, window: usize) -> Option<f64> {
        pendant_tools::equilibrium_surface_tension(&self.series, window)
    }
}

/// 单次尝试的监测结论
enum Verdict {
    Valid,
    LowReading,
}

/// 液滴管理器
///
/// 持有形成液滴的移液器和相机；库存在每次测量时借入。
pub struct DropletManager {
    robot: Arc<dyn RobotApi>,
    pipette: Pipette,
    camera: PendantDropCamera,
    config: DropletConfig,
    state: DropletState,
    /// 液滴台上悬挂的液滴体积
    drop_at_stage: Option<f64>,
    span: Span,
}

impl DropletManager {
    pub fn new(
        robot: Arc<dyn RobotApi>,
        pipette: Pipette,
        camera: PendantDropCamera,
        config: DropletConfig,
    ) -> Self {
        Self {
            robot,
            pipette,
            camera,
            config,
            state: DropletState::Idle,
            drop_at_stage: None,
            span: tracing::info_span!("droplet"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> DropletState {
        self.state
    }

    pub fn config(&self) -> &DropletConfig {
        &self.config
    }

    pub fn pipette(&self) -> &Pipette {
        &self.pipette
    }

    pub fn camera(&self) -> &PendantDropCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut PendantDropCamera {
        &mut self.camera
    }

    /// 视频流句柄
    pub fn feed(&self) -> FeedHandle {
        self.camera.feed()
    }

    fn transition(&mut self, next: DropletState) {
        let _guard = self.span.enter();
        info!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// 测量 `source` 的悬滴
    ///
    /// 只有请求本身无效时返回错误（此时不会下发任何命令）。
    /// 读数过低和硬件故障按重试处理，结果见 [`MeasurementOutcome::status`]。
    pub fn measure(
        &mut self,
        inventory: &mut Inventory,
        source: &WellId,
        params: DropParameters,
    ) -> Result<MeasurementOutcome, ControlError> {
        self.validate(inventory, source, &params)?;
        self.state = DropletState::Idle;

        let outcome = self.run_attempts(inventory, source, params);
        self.finish(inventory, source);

        let span = self.span.clone();
        let _guard = span.enter();
        info!(
            "Measurement of {} finished: {:?} after {} attempt(s), {} samples",
            source,
            outcome.status,
            outcome.params.drop_count,
            outcome.series.len()
        );
        Ok(outcome)
    }

    fn validate(
        &self,
        inventory: &Inventory,
        source: &WellId,
        params: &DropParameters,
    ) -> Result<(), ControlError> {
        let invalid = |message: String| {
            let _guard = self.span.enter();
            error!("Rejected measurement request: {}", message);
            Err(ControlError::InvalidRequest(message))
        };
        let positive = |x: f64| x.is_finite() && x > 0.0;

        if !positive(params.drop_volume_ul) {
            return invalid(format!("drop volume must be positive, got {}", params.drop_volume_ul));
        }
        if params.drop_volume_ul > self.config.tip_volume_ul + VOLUME_EPSILON {
            return invalid(format!(
                "drop volume {:.2} uL exceeds tip volume {:.2} uL",
                params.drop_volume_ul, self.config.tip_volume_ul
            ));
        }
        if self.config.tip_volume_ul + self.config.air_gap_ul
            > self.pipette.max_volume_ul() + VOLUME_EPSILON
        {
            return invalid(format!(
                "tip volume plus air gap exceeds pipette capacity {:.2} uL",
                self.pipette.max_volume_ul()
            ));
        }
        if !positive(params.flow_rate_ul_s) {
            return invalid(format!("flow rate must be positive, got {}", params.flow_rate_ul_s));
        }
        if !positive(params.max_measure_time_s) {
            return invalid(format!(
                "max measure time must be positive, got {}",
                params.max_measure_time_s
            ));
        }
        if self.config.max_retries == 0 {
            return invalid("max_retries must be at least 1".into());
        }
        if let Err(e) = inventory.get(source) {
            return invalid(e.to_string());
        }
        if let Err(e) = inventory.drop_stage_id() {
            return invalid(e.to_string());
        }
        Ok(())
    }

    fn run_attempts(
        &mut self,
        inventory: &mut Inventory,
        source: &WellId,
        initial: DropParameters,
    ) -> MeasurementOutcome {
        let span = self.span.clone();
        let mut params = initial;
        let mut best = TimeSeries::new();

        for attempt in 1..=self.config.max_retries {
            let volume_ul =
                initial.drop_volume_ul - self.config.volume_decrement_ul * f64::from(attempt - 1);
            if volume_ul <= VOLUME_EPSILON {
                let _guard = span.enter();
                warn!("Drop volume for attempt {} would be {:.2} uL, giving up", attempt, volume_ul);
                break;
            }
            params.drop_volume_ul = volume_ul;
            params.drop_count = attempt;
            {
                let _guard = span.enter();
                info!(
                    "Attempt {}/{} for {}: drop volume {:.2} uL",
                    attempt, self.config.max_retries, source, volume_ul
                );
            }

            let verdict = self.attempt(inventory, source, &params);
            self.camera.stop_capture();
            let series = self.camera.take_time_series();

            match verdict {
                Ok(Verdict::Valid) => {
                    self.transition(DropletState::Accepted);
                    return MeasurementOutcome {
                        well_id: source.clone(),
                        series,
                        params,
                        status: MeasurementStatus::Accepted,
                    };
                },
                Ok(Verdict::LowReading) => {
                    let _guard = span.enter();
                    warn!("No droplet detected for {}, will remake droplet", source);
                },
                Err(e) => {
                    let _guard = span.enter();
                    error!("Attempt {} for {} aborted: {}", attempt, source, e);
                },
            }

            if series.len() > best.len() {
                best = series;
            }
            self.transition(DropletState::RetryNeeded);
            if let Err(e) = self.retract(inventory, source) {
                let _guard = span.enter();
                error!("Failed to return drop to {}: {}", source, e);
            }
        }

        self.transition(DropletState::Exhausted);
        {
            let _guard = span.enter();
            warn!(
                "Failed to create valid droplet for {} after {} attempts",
                source, params.drop_count
            );
        }
        MeasurementOutcome {
            well_id: source.clone(),
            series: best,
            params,
            status: MeasurementStatus::Exhausted,
        }
    }

    fn attempt(
        &mut self,
        inventory: &mut Inventory,
        source: &WellId,
        params: &DropParameters,
    ) -> Result<Verdict, ControlError> {
        self.form_drop(inventory, source, params)?;

        self.transition(DropletState::Capturing);
        self.camera.start_stream()?;
        self.camera.start_capture()?;

        self.transition(DropletState::Monitoring);
        self.monitor(params)
    }

    fn form_drop(
        &mut self,
        inventory: &mut Inventory,
        source: &WellId,
        params: &DropParameters,
    ) -> Result<(), ControlError> {
        self.transition(DropletState::Forming);
        // 上一次收回失败时枪头里可能还有液体
        if self.drop_at_stage.is_some() || self.pipette.volume_ul() > VOLUME_EPSILON {
            self.retract(inventory, source)?;
        }
        if !self.pipette.has_tip() {
            self.pipette.pick_up_tip()?;
        }

        self.pipette.mix(inventory.get_mut(source)?, self.config.mix)?;
        let intake = Stroke::default().with_flow_rate(self.config.aspirate_flow_rate_ul_s);
        self.pipette
            .aspirate(self.config.tip_volume_ul, inventory.get_mut(source)?, intake)?;
        self.pipette.air_gap(inventory, self.config.air_gap_ul)?;
        self.pipette.clean_tip(inventory.sponge_mut()?)?;
        self.pipette.remove_air_gap(inventory, AirGapTarget::DropStage)?;

        self.camera.initialize_measurement(source.to_string())?;
        let stage_id = inventory.drop_stage_id()?.clone();
        let stroke =
            Stroke::at_depth(self.config.stage_depth_offset_mm).with_flow_rate(params.flow_rate_ul_s);
        self.pipette
            .dispense(params.drop_volume_ul, inventory.get_mut(&stage_id)?, stroke)?;
        self.drop_at_stage = Some(params.drop_volume_ul);

        let settle = self.config.settle();
        if !settle.is_zero() {
            self.robot.delay(settle).map_err(PipetteError::from)?;
        }
        Ok(())
    }

    fn monitor(&mut self, params: &DropParameters) -> Result<Verdict, ControlError> {
        let max_time = Duration::from_secs_f64(params.max_measure_time_s);
        let poll = self.config.poll_interval();
        let floor = self.config.validity_floor_mn_m;
        let started = Instant::now();

        loop {
            spin_sleep::sleep(poll);
            if let Some(reason) = self.camera.stream_fault() {
                return Err(DriverError::StreamFault(reason).into());
            }
            let last = self.camera.last_sample();
            if last.is_none_or(|sample| sample.surface_tension < floor) {
                let _guard = self.span.enter();
                warn!(
                    "Surface tension reading {:?} below {:.1} mN/m after {:.1} s",
                    last.map(|sample| sample.surface_tension),
                    floor,
                    started.elapsed().as_secs_f64()
                );
                self.camera.stop_capture();
                return Ok(Verdict::LowReading);
            }
            if started.elapsed() >= max_time {
                return Ok(Verdict::Valid);
            }
        }
    }

    /// 收回液滴：从液滴台吸回液滴，排出残留空气，把枪头内液体全部还给来源，然后丢弃枪头
    fn retract(&mut self, inventory: &mut Inventory, source: &WellId) -> Result<(), ControlError> {
        if !self.pipette.has_tip() {
            self.drop_at_stage = None;
            return Ok(());
        }
        if let Some(volume_ul) = self.drop_at_stage {
            let stage_id = inventory.drop_stage_id()?.clone();
            let stroke = Stroke::at_depth(self.config.stage_depth_offset_mm);
            self.pipette
                .aspirate(volume_ul, inventory.get_mut(&stage_id)?, stroke)?;
            self.drop_at_stage = None;
            let _guard = self.span.enter();
            info!("Re-aspirated the pendant drop into the tip");
        }
        if self.pipette.air_gap_ul() > VOLUME_EPSILON {
            self.pipette
                .remove_air_gap(inventory, AirGapTarget::LastSource)?;
        }
        let held_ul = self.pipette.volume_ul();
        if held_ul > VOLUME_EPSILON {
            self.pipette
                .dispense(held_ul, inventory.get_mut(source)?, Stroke::default())?;
            let _guard = self.span.enter();
            info!("Returned {:.2} uL in tip to {}", held_ul, source);
        }
        self.pipette.drop_tip()?;
        Ok(())
    }

    /// 退出清理，错误只记录日志
    fn finish(&mut self, inventory: &mut Inventory, source: &WellId) {
        self.camera.stop_capture();
        self.camera.stop_stream();
        let result = self.retract(inventory, source);

        let span = self.span.clone();
        let _guard = span.enter();
        if let Err(e) = result {
            error!("Cleanup after measuring {} failed: {}", source, e);
            if self.pipette.has_tip()
                && let Err(e) = self.pipette.drop_tip()
            {
                error!("Failed to drop tip: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for DropletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropletManager")
            .field("state", &self.state)
            .field("pipette", &self.pipette)
            .field("drop_at_stage", &self.drop_at_stage)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pendant_analysis::{AnalysisError, DropAnalysis, FrameAnalyzer};
    use pendant_client::PipetteModel;
    use pendant_driver::PipelineConfig;
    use pendant_hal::mock::{CommandKind, MockCamera, MockRobot};
    use pendant_hal::{RgbImage, RobotError};
    use pendant_inventory::{Layout, LiquidContainer};
    use pendant_protocol::DropGeometry;

    pub(crate) const LAYOUT: &str = r#"
[[labware]]
id = "tubes"
name = "opentrons_15_tuberack_falcon_15ml"
location = 3
geometry = "falcon_tube15"
max_volume_ul = 15000.0
depth_mm = 117.5
well_diameter_mm = 15.25

[[labware]]
id = "plate"
name = "corning_96_wellplate_360ul_flat"
location = 2
geometry = "plate_well"
max_volume_ul = 360.0
depth_mm = 10.67
well_diameter_mm = 6.96

[[labware]]
id = "stage"
name = "drop_stage"
location = 9
geometry = "drop_stage"
depth_mm = 40.0

[[labware]]
id = "trash"
name = "fixed_trash"
location = 12
geometry = "trash"

[[containers]]
labware = "tubes"
well = "A1"
solution = "water"
concentration = "pure"
volume_ul = 12000.0

[[containers]]
labware = "tubes"
well = "A2"
solution = "SDS"
concentration = { quantified = 10.0 }
volume_ul = 5000.0

[[containers]]
labware = "plate"
well = "A1"
solution = "SDS"
concentration = { quantified = 5.0 }
volume_ul = 200.0

[[tip_racks]]
mount = "left"
labware_id = "tips_20"

[sponge]
labware_id = "sponge"
wells = ["A1", "A2", "A3"]
"#;

    pub(crate) fn fast_pipeline() -> PipelineConfig {
        PipelineConfig {
            grab_timeout_ms: 200,
            save_interval_ms: 20,
            idle_sleep_ms: 1,
            join_timeout_ms: 1000,
        }
    }

    pub(crate) fn fast_droplet(max_retries: u32) -> DropletConfig {
        DropletConfig {
            max_retries,
            poll_interval_ms: 40,
            ..DropletConfig::default()
        }
    }

    fn reading(image: &RgbImage, surface_tension: f64) -> DropAnalysis {
        DropAnalysis {
            geometry: DropGeometry {
                de_px: 100.0,
                ds_px: 70.0,
                shape_factor: 0.7,
            },
            surface_tension,
            annotated: image.clone(),
        }
    }

    /// 在液滴被收回 `retracts` 次之前读数为 5 mN/m，之后为 45 mN/m
    pub(crate) fn low_until_retracts(
        robot: Arc<MockRobot>,
        retracts: usize,
    ) -> Arc<dyn FrameAnalyzer> {
        Arc::new(move |img: &RgbImage| -> Result<DropAnalysis, AnalysisError> {
            let st = if robot.count_at(CommandKind::Aspirate, "stage") < retracts {
                5.0
            } else {
                45.0
            };
            Ok(reading(img, st))
        })
    }

    pub(crate) fn setup_with(
        camera: MockCamera,
        config: DropletConfig,
        analyzer: impl FnOnce(Arc<MockRobot>) -> Arc<dyn FrameAnalyzer>,
    ) -> (Arc<MockRobot>, Inventory, DropletManager) {
        let layout = Layout::from_toml_str(LAYOUT).unwrap();
        let mut inventory = Inventory::from_layout(&layout).unwrap();
        let robot = Arc::new(MockRobot::new());
        let tips = inventory.take_tip_rack("left").unwrap();
        let pipette = Pipette::new(
            robot.clone(),
            "left",
            "left-id",
            PipetteModel::P20SingleGen2,
            tips,
        );
        let camera = PendantDropCamera::new(camera, analyzer(robot.clone()))
            .with_config(fast_pipeline());
        let manager = DropletManager::new(robot.clone(), pipette, camera, config);
        (robot, inventory, manager)
    }

    pub(crate) fn mock_camera() -> MockCamera {
        MockCamera::constant(RgbImage::new(8, 8)).with_frame_interval(Duration::from_millis(2))
    }

    fn setup(
        config: DropletConfig,
        analyzer: impl FnOnce(Arc<MockRobot>) -> Arc<dyn FrameAnalyzer>,
    ) -> (Arc<MockRobot>, Inventory, DropletManager) {
        setup_with(mock_camera(), config, analyzer)
    }

    fn id(s: &str) -> WellId {
        s.parse().unwrap()
    }

    fn params() -> DropParameters {
        DropParameters::new(11.0, 1.0, 0.25)
    }

    #[test]
    fn test_valid_drop_accepted_first_attempt() {
        let (robot, mut inventory, mut manager) = setup(fast_droplet(5), |robot| {
            low_until_retracts(robot, 0)
        });
        let source = id("3A2");

        let outcome = manager.measure(&mut inventory, &source, params()).unwrap();

        assert_eq!(outcome.status, MeasurementStatus::Accepted);
        assert_eq!(outcome.params.drop_count, 1);
        assert_relative_eq!(outcome.params.drop_volume_ul, 11.0);
        assert!(!outcome.series.is_empty());
        assert!(outcome.series.iter().all(|s| s.surface_tension == 45.0));
        assert_relative_eq!(outcome.equilibrium_surface_tension(100).unwrap(), 45.0);
        assert_eq!(manager.state(), DropletState::Accepted);

        // 退出清理：液滴收回、液体还给来源、枪头丢弃、视频流停止
        assert_eq!(robot.count_at(CommandKind::Aspirate, "stage"), 1);
        assert_eq!(robot.count(CommandKind::DropTip), 1);
        assert!(!manager.pipette().has_tip());
        assert!(!manager.camera().is_streaming());
        assert!(!manager.camera().is_capturing());
        assert_relative_eq!(inventory.get(&source).unwrap().volume_ul(), 5000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_drop_formation_sequence() {
        let (robot, mut inventory, mut manager) = setup(fast_droplet(5), |robot| {
            low_until_retracts(robot, 0)
        });
        manager.measure(&mut inventory, &id("3A1"), params()).unwrap();

        let kinds: Vec<CommandKind> = robot.commands().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds[0], CommandKind::PickUpTip);
        // 混匀 3 次
        assert_eq!(&kinds[1..7], &[
            CommandKind::Aspirate,
            CommandKind::Dispense,
            CommandKind::Aspirate,
            CommandKind::Dispense,
            CommandKind::Aspirate,
            CommandKind::Dispense,
        ]);
        // 吸液 + 空气隔断
        assert_eq!(&kinds[7..9], &[CommandKind::Aspirate, CommandKind::Aspirate]);
        // 空气隔断和液滴都排在液滴台
        assert_eq!(robot.count_at(CommandKind::Dispense, "stage"), 2);
        assert_eq!(inventory.sponge_mut().unwrap().uses(), 1);
    }

    #[test]
    fn test_low_reading_retries_with_smaller_drop() {
        let (robot, mut inventory, mut manager) = setup(fast_droplet(5), |robot| {
            low_until_retracts(robot, 1)
        });

        let outcome = manager.measure(&mut inventory, &id("3A2"), params()).unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(outcome.params.drop_count, 2);
        assert_relative_eq!(outcome.params.drop_volume_ul, 10.0);
        assert!(outcome.series.iter().all(|s| s.surface_tension >= 10.0));
        // 每次尝试都换新枪头
        assert_eq!(robot.count(CommandKind::PickUpTip), 2);
        assert_eq!(robot.count(CommandKind::DropTip), 2);
    }

    #[test]
    fn test_consecutive_low_readings_exhaust() {
        let (robot, mut inventory, mut manager) = setup(fast_droplet(3), |robot| {
            low_until_retracts(robot, usize::MAX)
        });

        let outcome = manager.measure(&mut inventory, &id("3A2"), params()).unwrap();

        assert_eq!(outcome.status, MeasurementStatus::Exhausted);
        assert_eq!(outcome.params.drop_count, 3);
        assert_relative_eq!(outcome.params.drop_volume_ul, 9.0);
        assert_eq!(manager.state(), DropletState::Exhausted);
        assert_eq!(robot.count_at(CommandKind::Aspirate, "stage"), 3);
        assert_eq!(robot.count(CommandKind::PickUpTip), 3);
        assert_eq!(robot.count(CommandKind::DropTip), 3);
        assert!(!manager.camera().is_streaming());
        assert_relative_eq!(
            inventory.get(&id("3A2")).unwrap().volume_ul(),
            5000.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_robot_fault_aborts_attempt_only() {
        let (robot, mut inventory, mut manager) = setup(fast_droplet(5), |robot| {
            low_until_retracts(robot, 0)
        });
        robot.fail_next(
            CommandKind::PickUpTip,
            RobotError::Timeout {
                command: "pick_up_tip".into(),
                after: Duration::from_secs(30),
            },
        );

        let outcome = manager.measure(&mut inventory, &id("3A2"), params()).unwrap();

        assert!(outcome.is_accepted());
        assert_eq!(outcome.params.drop_count, 2);
        assert_relative_eq!(outcome.params.drop_volume_ul, 10.0);
        assert!(!manager.pipette().has_tip());
    }

    #[test]
    fn test_stream_fault_aborts_attempt() {
        let camera = mock_camera().with_timeout_after(0);
        let (robot, mut inventory, mut manager) = setup_with(camera, fast_droplet(2), |robot| {
            low_until_retracts(robot, 0)
        });

        let outcome = manager.measure(&mut inventory, &id("3A1"), params()).unwrap();

        assert_eq!(outcome.status, MeasurementStatus::Exhausted);
        assert!(outcome.series.is_empty());
        assert_eq!(outcome.params.drop_count, 2);
        assert_eq!(robot.count(CommandKind::DropTip), 2);
        assert!(!manager.camera().is_streaming());
    }

    #[test]
    fn test_invalid_request_sends_no_commands() {
        let (robot, mut inventory, mut manager) = setup(fast_droplet(5), |robot| {
            low_until_retracts(robot, 0)
        });

        let zero = DropParameters::new(0.0, 1.0, 1.0);
        let err = manager.measure(&mut inventory, &id("3A1"), zero).unwrap_err();
        assert!(matches!(err, ControlError::InvalidRequest(_)));

        let too_big = DropParameters::new(16.0, 1.0, 1.0);
        assert!(manager.measure(&mut inventory, &id("3A1"), too_big).is_err());

        let unknown = manager.measure(&mut inventory, &id("5B7"), params());
        assert!(matches!(unknown, Err(ControlError::InvalidRequest(_))));

        assert!(robot.commands().is_empty());
        assert_eq!(manager.state(), DropletState::Idle);
    }

    #[test]
    fn test_volume_decrement_stops_before_zero() {
        let config = DropletConfig {
            volume_decrement_ul: 4.0,
            ..fast_droplet(5)
        };
        let (_robot, mut inventory, mut manager) = setup(config, |robot| {
            low_until_retracts(robot, usize::MAX)
        });

        let outcome = manager
            .measure(&mut inventory, &id("3A1"), DropParameters::new(10.0, 1.0, 0.2))
            .unwrap();

        // 10, 6, 2 µL；第 4 次会是 -2 µL
        assert_eq!(outcome.status, MeasurementStatus::Exhausted);
        assert_eq!(outcome.params.drop_count, 3);
        assert_relative_eq!(outcome.params.drop_volume_ul, 2.0);
    }
}
