//! 实验配置
//!
//! # 示例
//!
//! ```toml
//! name = "sds-characterization"
//! layout = "layout.toml"
//! output_dir = "experiments/sds"
//! equilibration_time_s = 60.0
//! flow_rate_ul_s = 1.0
//!
//! [analyzer]
//! density_g_per_ml = 1.0
//! scale_mm_per_px = 0.0118
//!
//! [droplet]
//! max_retries = 5
//! volume_decrement_ul = 1.0
//!
//! [drop_pipette]
//! mount = "left"
//! model = "p20_single_gen2"
//! pipette_id = "left-p20"
//! ```

use crate::error::ControlError;
use pendant_analysis::AnalyzerConfig;
use pendant_client::{MixSpec, PipetteModel, PipetteSettings};
use pendant_driver::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 液滴管理器参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropletConfig {
    /// 最多尝试次数
    pub max_retries: u32,
    /// 每次重试减少的液滴体积（µL）
    pub volume_decrement_ul: f64,
    /// 低于该读数视为没有液滴（mN/m）
    pub validity_floor_mn_m: f64,
    /// 监测轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 形成液滴前吸入枪头的液体体积（µL）
    pub tip_volume_ul: f64,
    /// 吸液前对来源的混匀
    pub mix: MixSpec,
    /// 吸取枪头液体的低流速（µL/s）
    pub aspirate_flow_rate_ul_s: f64,
    /// 空气隔断体积（µL）
    pub air_gap_ul: f64,
    /// 液滴台分液深度相对液滴台液面的偏移（mm）
    pub stage_depth_offset_mm: f64,
    /// 液滴形成后、开始采集前的机器人等待（毫秒）
    pub settle_ms: u64,
    /// 平衡表面张力的平均窗口
    pub equilibrium_window: usize,
}

impl Default for DropletConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            volume_decrement_ul: 1.0,
            validity_floor_mn_m: 10.0,
            poll_interval_ms: 1000,
            tip_volume_ul: 15.0,
            mix: MixSpec::new(15.0, 3),
            aspirate_flow_rate_ul_s: 5.0,
            air_gap_ul: 5.0,
            stage_depth_offset_mm: -23.4,
            settle_ms: 0,
            equilibrium_window: pendant_tools::DEFAULT_EQUILIBRIUM_WINDOW,
        }
    }
}

impl DropletConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// 移液器挂载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipetteMount {
    /// `left` / `right`，同时用于查找该挂载位的枪头盒
    pub mount: String,
    pub model: PipetteModel,
    /// 机器人侧的移液器 ID
    pub pipette_id: String,
}

impl PipetteMount {
    pub fn left_p20() -> Self {
        Self {
            mount: "left".into(),
            model: PipetteModel::P20SingleGen2,
            pipette_id: "left".into(),
        }
    }

    pub fn right_p1000() -> Self {
        Self {
            mount: "right".into(),
            model: PipetteModel::P1000SingleGen2,
            pipette_id: "right".into(),
        }
    }
}

/// 实验配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub name: String,
    /// 甲板布局文件（相对路径以配置文件所在目录为基准）
    pub layout: PathBuf,
    /// 快照、时间序列和结果表的输出目录
    pub output_dir: PathBuf,
    /// 每个液滴的最长测量时间（秒）
    pub equilibration_time_s: f64,
    /// 默认分液流速（µL/s）
    pub flow_rate_ul_s: f64,
    pub analyzer: AnalyzerConfig,
    pub pipeline: PipelineConfig,
    pub droplet: DropletConfig,
    pub pipette: PipetteSettings,
    /// 形成悬滴用的移液器
    pub drop_pipette: PipetteMount,
    /// 配液（梯度稀释）用的移液器
    pub dilution_pipette: Option<PipetteMount>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "experiment".into(),
            layout: PathBuf::from("layout.toml"),
            output_dir: PathBuf::from("experiments"),
            equilibration_time_s: 60.0,
            flow_rate_ul_s: 1.0,
            analyzer: AnalyzerConfig::default(),
            pipeline: PipelineConfig::default(),
            droplet: DropletConfig::default(),
            pipette: PipetteSettings::default(),
            drop_pipette: PipetteMount::left_p20(),
            dilution_pipette: Some(PipetteMount::right_p1000()),
        }
    }
}

impl ExperimentConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ControlError> {
        let config: Self = toml::from_str(s)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// 从文件加载；`layout` 和 `output_dir` 的相对路径按配置文件目录解析
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            if config.layout.is_relative() {
                config.layout = base.join(&config.layout);
            }
            if config.output_dir.is_relative() {
                config.output_dir = base.join(&config.output_dir);
            }
        }
        Ok(config)
    }

    /// 每个孔的时间序列与快照目录
    pub fn data_dir(&self) -> PathBuf {
        self.output_dir.join("data")
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join("results.csv")
    }
}
