//! 悬滴图像分析流水线
//!
//! 1. 灰度 → 高斯模糊 → Canny 边缘 → 膨胀 + 腐蚀（闭合断点）
//! 2. 取最外层轮廓中包围盒最宽者作为液滴，`De` = 包围盒宽度
//! 3. 把液滴轮廓以固定线宽重绘到空白画布上，只保留顶点以上 `De` 处之上的部分
//! 4. 在裁剪区域重新提取轮廓，取中心相距最远的两个（液滴左右两侧），
//!    `Ds` = 右侧外沿 − 左侧外沿
//! 5. `S = Ds / De` → `1/H(S)` → 表面张力

use crate::shape_factor::surface_tension;
use crate::AnalysisError;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use imageproc::point::Point;
use pendant_protocol::DropGeometry;
use serde::{Deserialize, Serialize};

const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const DS_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const ARROW_HEAD_PX: f32 = 12.0;

/// 分析器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// 液体密度（g/mL）
    pub density_g_per_ml: f64,
    /// 像素尺寸（mm/px），由针头直径校准得到
    pub scale_mm_per_px: f64,
    /// 高斯模糊 sigma（1.7 相当于 9×9 核）
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// 闭运算半径（像素）
    pub morphology_radius: u8,
    /// 重绘轮廓的线宽（像素）
    pub contour_thickness_px: u32,
    /// 校准时用于测量针头宽度的顶部条带高度（像素）
    pub needle_band_px: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            density_g_per_ml: 1.0,
            scale_mm_per_px: 0.01,
            blur_sigma: 1.7,
            canny_low: 10.0,
            canny_high: 10.0,
            morphology_radius: 1,
            contour_thickness_px: 10,
            needle_band_px: 10,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.density_g_per_ml.is_nan() || self.density_g_per_ml <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "density must be positive, got {}",
                self.density_g_per_ml
            )));
        }
        if self.scale_mm_per_px.is_nan() || self.scale_mm_per_px <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "scale must be positive, got {}",
                self.scale_mm_per_px
            )));
        }
        if self.blur_sigma.is_nan() || self.blur_sigma <= 0.0 {
            return Err(AnalysisError::InvalidConfig("blur sigma must be positive".into()));
        }
        if self.canny_high < self.canny_low {
            return Err(AnalysisError::InvalidConfig(
                "canny high threshold below low threshold".into(),
            ));
        }
        if self.contour_thickness_px == 0 {
            return Err(AnalysisError::InvalidConfig("contour thickness must be > 0".into()));
        }
        Ok(())
    }
}

/// 单帧分析结果
#[derive(Debug, Clone)]
pub struct DropAnalysis {
    pub geometry: DropGeometry,
    /// 表面张力（mN/m）
    pub surface_tension: f64,
    /// 标注了轮廓、De、Ds 的图像
    pub annotated: RgbImage,
}

/// 帧分析接口
///
/// 相机流水线通过该 trait 调用分析器；测试与标定可以替换为脚本化的实现。
pub trait FrameAnalyzer: Send + Sync {
    fn analyze(&self, image: &RgbImage) -> Result<DropAnalysis, AnalysisError>;
}

impl<F> FrameAnalyzer for F
where
    F: Fn(&RgbImage) -> Result<DropAnalysis, AnalysisError> + Send + Sync,
{
    fn analyze(&self, image: &RgbImage) -> Result<DropAnalysis, AnalysisError> {
        self(image)
    }
}

/// 轴对齐包围盒（像素，宽高包含端点）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BoundingBox {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl BoundingBox {
    fn of(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            w: max_x - min_x + 1,
            h: max_y - min_y + 1,
        })
    }

    fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.w as f64 / 2.0,
            self.y as f64 + self.h as f64 / 2.0,
        )
    }
}

/// 几何测量的中间结果
struct Measurement {
    contour: Vec<Point<i32>>,
    bbox: BoundingBox,
    /// 选面所在行（图像坐标）
    plane_y: i32,
    /// 选面处左右外沿（图像坐标）
    ds_left: i32,
    ds_right: i32,
}

impl Measurement {
    fn de(&self) -> i32 {
        self.bbox.w
    }

    fn ds(&self) -> i32 {
        self.ds_right - self.ds_left
    }
}

/// 悬滴形状分析器
#[derive(Debug, Clone)]
pub struct DropShapeAnalyzer {
    config: AnalyzerConfig,
}

impl DropShapeAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// 只测量几何量，不计算表面张力
    pub fn measure_geometry(&self, image: &RgbImage) -> Result<DropGeometry, AnalysisError> {
        let m = self.measure(image)?;
        Ok(geometry_of(&m))
    }

    /// 分析一帧：几何量 + 表面张力 + 标注图像
    pub fn analyze_image(&self, image: &RgbImage) -> Result<DropAnalysis, AnalysisError> {
        let m = self.measure(image)?;
        let geometry = geometry_of(&m);
        let surface_tension = surface_tension(
            geometry.de_px,
            geometry.shape_factor,
            self.config.density_g_per_ml,
            self.config.scale_mm_per_px,
        )?;
        tracing::trace!(
            "De = {} px, Ds = {} px, S = {:.4}, st = {:.2} mN/m",
            m.de(),
            m.ds(),
            geometry.shape_factor,
            surface_tension
        );
        Ok(DropAnalysis {
            geometry,
            surface_tension,
            annotated: annotate(image, &m),
        })
    }

    /// 由已知针头外径标定像素尺寸（mm/px）
    ///
    /// 针头宽度取液滴轮廓顶部 `needle_band_px` 行内的水平跨度。
    pub fn calibrate_scale(
        &self,
        image: &RgbImage,
        needle_diameter_mm: f64,
    ) -> Result<f64, AnalysisError> {
        if needle_diameter_mm.is_nan() || needle_diameter_mm <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "needle diameter must be positive, got {needle_diameter_mm}"
            )));
        }
        let edges = self.edge_map(image)?;
        let (contour, bbox) = widest_outer_contour(&edges)?;
        let band_end = bbox.y + self.config.needle_band_px.max(1) as i32;
        let (min_x, max_x) = contour
            .iter()
            .filter(|p| p.y < band_end)
            .fold((i32::MAX, i32::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
        if min_x > max_x {
            return Err(AnalysisError::NoContour);
        }
        let needle_px = (max_x - min_x + 1) as f64;
        Ok(needle_diameter_mm / needle_px)
    }

    fn edge_map(&self, image: &RgbImage) -> Result<GrayImage, AnalysisError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(AnalysisError::EmptyImage);
        }
        let gray = image::imageops::grayscale(image);
        let blurred = imageproc::filter::gaussian_blur_f32(&gray, self.config.blur_sigma);
        let edges = imageproc::edges::canny(&blurred, self.config.canny_low, self.config.canny_high);
        let k = self.config.morphology_radius;
        if k == 0 {
            return Ok(edges);
        }
        let dilated = imageproc::morphology::dilate(&edges, Norm::LInf, k);
        Ok(imageproc::morphology::erode(&dilated, Norm::LInf, k))
    }

    fn measure(&self, image: &RgbImage) -> Result<Measurement, AnalysisError> {
        let edges = self.edge_map(image)?;
        let (contour, bbox) = widest_outer_contour(&edges)?;
        let de = bbox.w;

        // 选面：顶点（包围盒底边）以上 De 处；裁剪区域为 [y, y + h - De)
        let crop_h = bbox.h - de;
        if crop_h <= 0 {
            return Err(AnalysisError::DropTooShort {
                height_px: bbox.h.max(0) as u32,
                de_px: de.max(0) as u32,
            });
        }

        let radius = (self.config.contour_thickness_px as i32 / 2).max(1);
        let mut canvas = GrayImage::new(bbox.w as u32, crop_h as u32);
        for p in &contour {
            draw_filled_circle_mut(&mut canvas, (p.x - bbox.x, p.y - bbox.y), radius, Luma([255u8]));
        }

        let sides: Vec<BoundingBox> = outer_contours(&canvas)
            .iter()
            .filter_map(|c| BoundingBox::of(&c.points))
            .collect();
        let (left, right) = farthest_pair(&sides).ok_or(AnalysisError::NeckNotFound)?;

        Ok(Measurement {
            plane_y: bbox.y + crop_h,
            ds_left: bbox.x + left.x,
            ds_right: bbox.x + right.x + right.w,
            contour,
            bbox,
        })
    }
}

impl FrameAnalyzer for DropShapeAnalyzer {
    fn analyze(&self, image: &RgbImage) -> Result<DropAnalysis, AnalysisError> {
        self.analyze_image(image)
    }
}

fn geometry_of(m: &Measurement) -> DropGeometry {
    let de = m.de() as f64;
    let ds = m.ds() as f64;
    DropGeometry {
        de_px: de,
        ds_px: ds,
        shape_factor: ds / de,
    }
}

/// 最外层轮廓（没有父轮廓的外边界）
fn outer_contours(image: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(image)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}

fn widest_outer_contour(
    edges: &GrayImage,
) -> Result<(Vec<Point<i32>>, BoundingBox), AnalysisError> {
    outer_contours(edges)
        .into_iter()
        .filter_map(|c| BoundingBox::of(&c.points).map(|b| (c.points, b)))
        .max_by_key(|(_, b)| b.w)
        .ok_or(AnalysisError::NoContour)
}

/// 中心相距最远的两个包围盒，按 x 排序返回 (左, 右)
fn farthest_pair(boxes: &[BoundingBox]) -> Option<(BoundingBox, BoundingBox)> {
    let mut best: Option<(f64, BoundingBox, BoundingBox)> = None;
    for (i, a) in boxes.iter().enumerate() {
        for b in &boxes[i + 1..] {
            let (ax, ay) = a.center();
            let (bx, by) = b.center();
            let d = (ax - bx).hypot(ay - by);
            if best.as_ref().is_none_or(|(bd, _, _)| d > *bd) {
                best = Some((d, *a, *b));
            }
        }
    }
    best.map(|(_, a, b)| if a.center().0 <= b.center().0 { (a, b) } else { (b, a) })
}

/// 最宽的一行（De 标注位置）
fn widest_row(m: &Measurement) -> (i32, i32, i32) {
    let mut spans = vec![(i32::MAX, i32::MIN); m.bbox.h as usize];
    for p in &m.contour {
        let row = (p.y - m.bbox.y) as usize;
        if let Some(span) = spans.get_mut(row) {
            span.0 = span.0.min(p.x);
            span.1 = span.1.max(p.x);
        }
    }
    spans
        .iter()
        .enumerate()
        .filter(|(_, (lo, hi))| lo <= hi)
        .max_by_key(|(_, (lo, hi))| hi - lo)
        .map(|(row, (lo, hi))| (m.bbox.y + row as i32, *lo, *hi))
        .unwrap_or((m.bbox.y, m.bbox.x, m.bbox.x + m.bbox.w - 1))
}

fn draw_arrow(canvas: &mut RgbImage, y: i32, x0: i32, x1: i32, color: Rgb<u8>) {
    let (y, x0, x1) = (y as f32, x0 as f32, x1 as f32);
    draw_line_segment_mut(canvas, (x0, y), (x1, y), color);
    for (tip, dir) in [(x0, 1.0f32), (x1, -1.0f32)] {
        draw_line_segment_mut(canvas, (tip, y), (tip + dir * ARROW_HEAD_PX, y - ARROW_HEAD_PX), color);
        draw_line_segment_mut(canvas, (tip, y), (tip + dir * ARROW_HEAD_PX, y + ARROW_HEAD_PX), color);
    }
}

fn annotate(image: &RgbImage, m: &Measurement) -> RgbImage {
    let mut out = image.clone();
    let (w, h) = (out.width() as i32, out.height() as i32);
    for p in &m.contour {
        if (0..w).contains(&p.x) && (0..h).contains(&p.y) {
            out.put_pixel(p.x as u32, p.y as u32, CONTOUR_COLOR);
        }
    }
    let (row, lo, hi) = widest_row(m);
    draw_arrow(&mut out, row, lo, hi, DE_COLOR);
    draw_arrow(&mut out, m.plane_y, m.ds_left, m.ds_right, DS_COLOR);
    out
}
