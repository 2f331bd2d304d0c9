//! 表面张力测量数据

/// 单个表面张力采样点
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// 自开始采集以来经过的时间（秒）
    pub elapsed_s: f64,
    /// 表面张力（mN/m）
    pub surface_tension: f64,
}

impl Sample {
    pub fn new(elapsed_s: f64, surface_tension: f64) -> Self {
        Self {
            elapsed_s,
            surface_tension,
        }
    }
}

/// 动态表面张力时间序列
///
/// 单次测量期间只追加，由 `initialize_measurement` 重置。
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSeries {
    samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// 仅表面张力列
    pub fn surface_tensions(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.surface_tension).collect()
    }
}

impl From<Vec<Sample>> for TimeSeries {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl Extend<Sample> for TimeSeries {
    fn extend<I: IntoIterator<Item = Sample>>(&mut self, iter: I) {
        self.samples.extend(iter);
    }
}

/// 单次液滴尝试的参数
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DropParameters {
    /// 液滴体积（µL）
    pub drop_volume_ul: f64,
    /// 分液流速（µL/s）
    pub flow_rate_ul_s: f64,
    /// 最长测量时间（秒）
    pub max_measure_time_s: f64,
    /// 尝试序号（从 1 开始）
    pub drop_count: u32,
}

impl DropParameters {
    pub fn new(drop_volume_ul: f64, flow_rate_ul_s: f64, max_measure_time_s: f64) -> Self {
        Self {
            drop_volume_ul,
            flow_rate_ul_s,
            max_measure_time_s,
            drop_count: 1,
        }
    }
}

/// 液滴几何量（像素）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DropGeometry {
    /// 最大赤道直径 De
    pub de_px: f64,
    /// 距顶点 De 高度处的直径 Ds
    pub ds_px: f64,
    /// 形状因子 S = Ds / De
    pub shape_factor: f64,
}
