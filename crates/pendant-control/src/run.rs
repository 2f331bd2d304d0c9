//! 逐孔测量
//!
//! 对每个孔调用液滴管理器，保存动态表面张力曲线，计算平衡表面张力并追加到结果表。
//! 请求未给出液滴体积时，根据已有结果预测。

use crate::config::ExperimentConfig;
use crate::error::ControlError;
use crate::manager::DropletManager;
use pendant_inventory::{Inventory, LiquidContainer};
use pendant_protocol::{Concentration, DropParameters, WellId};
use pendant_tools::{ResultRecord, ResultsLog, suggest_drop_volume, write_time_series};
use std::path::{Path, PathBuf};
use tracing::{Span, error, info, warn};

/// 时间序列文件名
pub const SERIES_FILE_NAME: &str = "dynamic_surface_tension.csv";

/// 单个孔的测量请求
#[derive(Debug, Clone, PartialEq)]
pub struct WellRequest {
    pub well_id: WellId,
    /// `None` 时按已有结果建议液滴体积
    pub drop_volume_ul: Option<f64>,
    pub flow_rate_ul_s: f64,
}

impl WellRequest {
    pub fn new(well_id: WellId, flow_rate_ul_s: f64) -> Self {
        Self {
            well_id,
            drop_volume_ul: None,
            flow_rate_ul_s,
        }
    }

    pub fn with_drop_volume(mut self, drop_volume_ul: f64) -> Self {
        self.drop_volume_ul = Some(drop_volume_ul);
        self
    }
}

/// 逐孔测量流程
#[derive(Debug)]
pub struct WellMeasurementRun {
    max_measure_time_s: f64,
    window: usize,
    output_dir: Option<PathBuf>,
    results: ResultsLog,
    span: Span,
}

impl WellMeasurementRun {
    /// 不写文件的测量流程
    pub fn new(max_measure_time_s: f64) -> Self {
        Self {
            max_measure_time_s,
            window: pendant_tools::DEFAULT_EQUILIBRIUM_WINDOW,
            output_dir: None,
            results: ResultsLog::new(),
            span: tracing::info_span!("well_run"),
        }
    }

    /// 按实验配置创建，结果写入 `output_dir`
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self::new(config.equilibration_time_s)
            .with_window(config.droplet.equilibrium_window)
            .with_output_dir(&config.output_dir)
            .with_span(tracing::info_span!("well_run", experiment = %config.name))
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// 时间序列写到 `<dir>/data/<well>/`，结果表写到 `<dir>/results.csv`
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 继续已有的结果表（例如中断后恢复）
    pub fn with_results(mut self, results: ResultsLog) -> Self {
        self.results = results;
        self
    }

    pub fn results(&self) -> &ResultsLog {
        &self.results
    }

    pub fn into_results(self) -> ResultsLog {
        self.results
    }

    fn series_path(&self, well_id: &WellId) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| {
            dir.join("data")
                .join(well_id.to_string())
                .join(SERIES_FILE_NAME)
        })
    }

    /// 测量一个孔
    ///
    /// 没有得到任何读数时返回 `Ok(None)`，不追加结果。
    pub fn measure_well(
        &mut self,
        manager: &mut DropletManager,
        inventory: &mut Inventory,
        request: &WellRequest,
    ) -> Result<Option<ResultRecord>, ControlError> {
        let contents = inventory
            .get(&request.well_id)
            .map_err(|e| ControlError::InvalidRequest(e.to_string()))?
            .contents()
            .clone();

        let drop_volume_ul = match request.drop_volume_ul {
            Some(volume) => volume,
            None => {
                let next_concentration = match contents.concentration {
                    Concentration::Quantified(c) => c,
                    Concentration::Pure | Concentration::Unknown => 0.0,
                };
                let suggested = suggest_drop_volume(self.results.records(), next_concentration)
                    .min(manager.config().tip_volume_ul);
                let _guard = self.span.enter();
                info!(
                    "Suggested drop volume for {}: {:.2} uL",
                    request.well_id, suggested
                );
                suggested
            },
        };

        let params = DropParameters::new(
            drop_volume_ul,
            request.flow_rate_ul_s,
            self.max_measure_time_s,
        );
        let outcome = manager.measure(inventory, &request.well_id, params)?;

        let _guard = self.span.enter();
        if outcome.series.is_empty() {
            warn!("Was not able to measure pendant drop of {}", request.well_id);
            return Ok(None);
        }
        if let Some(path) = self.series_path(&request.well_id)
            && let Err(e) = write_time_series(&path, &outcome.series)
        {
            warn!("Failed to save time series of {}: {:#}", request.well_id, e);
        }

        let Some(surface_tension) = outcome.equilibrium_surface_tension(self.window) else {
            return Ok(None);
        };
        let record = ResultRecord::new(
            request.well_id.to_string(),
            contents.label(),
            contents.concentration,
            surface_tension,
            &outcome.params,
        );
        info!(
            "{} ({}, {}): equilibrium surface tension {:.2} mN/m",
            request.well_id,
            contents.label(),
            contents.concentration,
            surface_tension
        );
        self.results.push(record.clone());
        Ok(Some(record))
    }

    /// 依次测量所有孔，最后写出结果表
    ///
    /// 单个请求无效只记录错误并跳过。
    pub fn run(
        &mut self,
        manager: &mut DropletManager,
        inventory: &mut Inventory,
        requests: &[WellRequest],
    ) -> Result<&ResultsLog, ControlError> {
        for request in requests {
            if let Err(e) = self.measure_well(manager, inventory, request) {
                let _guard = self.span.enter();
                error!("Skipping {}: {}", request.well_id, e);
            }
        }
        self.save_results()?;
        Ok(&self.results)
    }

    /// 写出 `<output_dir>/results.csv`；没有输出目录时返回 `None`
    pub fn save_results(&self) -> Result<Option<PathBuf>, ControlError> {
        let Some(dir) = &self.output_dir else {
            return Ok(None);
        };
        let path = dir.join("results.csv");
        self.results.save(&path)?;
        let _guard = self.span.enter();
        info!("Saved {} results to {}", self.results.len(), path.display());
        Ok(Some(path))
    }
}
