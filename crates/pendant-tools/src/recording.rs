//! # 测量记录
//!
//! 动态表面张力时间序列与结果表的 CSV 读写。
//! 表头与实验记录表保持一致，便于直接用表格软件打开。

use anyhow::{Context, Result};
use pendant_protocol::{Concentration, DropParameters, Sample, TimeSeries};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 时间序列 CSV 的一行
#[derive(Debug, Serialize, Deserialize)]
struct SeriesRow {
    #[serde(rename = "time (s)")]
    time_s: f64,
    #[serde(rename = "surface tension (mN/m)")]
    surface_tension: f64,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).with_context(|| format!("创建目录失败: {}", dir.display()))?;
    }
    Ok(())
}

/// 把时间序列写入 CSV（自动创建父目录）
pub fn write_time_series(path: impl AsRef<Path>, series: &TimeSeries) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("创建时间序列文件失败: {}", path.display()))?;
    for sample in series.iter() {
        writer
            .serialize(SeriesRow {
                time_s: sample.elapsed_s,
                surface_tension: sample.surface_tension,
            })
            .context("写入时间序列失败")?;
    }
    writer.flush().context("刷新缓冲区失败")?;
    Ok(())
}

/// 从 CSV 读取时间序列
pub fn read_time_series(path: impl AsRef<Path>) -> Result<TimeSeries> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("打开时间序列文件失败: {}", path.display()))?;
    let mut series = TimeSeries::new();
    for row in reader.deserialize() {
        let row: SeriesRow = row.context("解析时间序列失败")?;
        series.push(Sample::new(row.time_s, row.surface_tension));
    }
    Ok(series)
}

/// 浓度列：数值、`pure` 或 `unknown`
mod concentration_column {
    use pendant_protocol::Concentration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Concentration, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Concentration::Quantified(c) => serializer.serialize_f64(*c),
            Concentration::Pure => serializer.serialize_str("pure"),
            Concentration::Unknown => serializer.serialize_str("unknown"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Concentration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim() {
            "pure" => Ok(Concentration::Pure),
            "unknown" | "" => Ok(Concentration::Unknown),
            number => number
                .parse::<f64>()
                .map(Concentration::Quantified)
                .map_err(D::Error::custom),
        }
    }
}

/// 结果表的一行（每个孔一次测量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "well id")]
    pub well_id: String,
    pub solution: String,
    #[serde(with = "concentration_column")]
    pub concentration: Concentration,
    #[serde(rename = "surface tension eq. (mN/m)")]
    pub surface_tension_eq: f64,
    #[serde(rename = "drop count")]
    pub drop_count: u32,
    #[serde(rename = "drop volume (uL)")]
    pub drop_volume_ul: f64,
    #[serde(rename = "max measure time (s)")]
    pub max_measure_time_s: f64,
    #[serde(rename = "flow rate (uL/s)")]
    pub flow_rate_ul_s: f64,
}

impl ResultRecord {
    pub fn new(
        well_id: impl Into<String>,
        solution: impl Into<String>,
        concentration: Concentration,
        surface_tension_eq: f64,
        params: &DropParameters,
    ) -> Self {
        Self {
            well_id: well_id.into(),
            solution: solution.into(),
            concentration,
            surface_tension_eq,
            drop_count: params.drop_count,
            drop_volume_ul: params.drop_volume_ul,
            max_measure_time_s: params.max_measure_time_s,
            flow_rate_ul_s: params.flow_rate_ul_s,
        }
    }
}

/// 结果表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsLog {
    records: Vec<ResultRecord>,
}

impl ResultsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 写入 CSV（覆盖已有文件）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("创建结果文件失败: {}", path.display()))?;
        for record in &self.records {
            writer.serialize(record).context("写入结果失败")?;
        }
        writer.flush().context("刷新缓冲区失败")?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("打开结果文件失败: {}", path.display()))?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<ResultRecord>, _>>()
            .context("解析结果文件失败")?;
        Ok(Self { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_time_series_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("2A1").join("dynamic_surface_tension.csv");
        let series: TimeSeries = vec![Sample::new(0.5, 72.1), Sample::new(1.5, 71.8)].into();

        write_time_series(&path, &series).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("time (s),surface tension (mN/m)\n"));

        let loaded = read_time_series(&path).unwrap();
        assert_eq!(loaded, series);
    }

    #[test]
    fn test_results_log_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let params = DropParameters {
            drop_volume_ul: 10.0,
            flow_rate_ul_s: 1.0,
            max_measure_time_s: 60.0,
            drop_count: 2,
        };

        let mut log = ResultsLog::new();
        log.push(ResultRecord::new("2A1", "SDS", Concentration::Quantified(5.0), 45.2, &params));
        log.push(ResultRecord::new("3A1", "water", Concentration::Pure, 72.0, &params));
        log.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "well id,solution,concentration,surface tension eq. (mN/m),drop count,drop volume (uL),max measure time (s),flow rate (uL/s)"
        );
        assert!(text.contains("3A1,water,pure,72.0"));

        let loaded = ResultsLog::load(&path).unwrap();
        assert_eq!(loaded, log);
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let dir = tempdir().unwrap();
        let err = ResultsLog::load(dir.path().join("missing.csv")).unwrap_err();
        assert!(err.to_string().contains("打开结果文件失败"));
    }
}
