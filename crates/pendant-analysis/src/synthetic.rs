//! 合成悬滴图像
//!
//! 亮背景上的暗色剪影：从图像顶部伸入的针头（矩形）+ 竖直方向拉长的椭圆液滴。

use image::{Rgb, RgbImage};

/// 合成液滴参数（像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticDrop {
    pub width: u32,
    pub height: u32,
    /// 针头宽度
    pub needle_width: f64,
    /// 液滴水平半径（De ≈ 2 · radius）
    pub radius: f64,
    /// 竖直半径 / 水平半径
    pub elongation: f64,
    /// 液滴最低点的 y 坐标
    pub apex_y: f64,
    pub background: u8,
    pub foreground: u8,
}

impl Default for SyntheticDrop {
    fn default() -> Self {
        Self {
            width: 480,
            height: 480,
            needle_width: 60.0,
            radius: 80.0,
            elongation: 1.15,
            apex_y: 400.0,
            background: 230,
            foreground: 30,
        }
    }
}

impl SyntheticDrop {
    /// 理论 De（像素）
    pub fn de(&self) -> f64 {
        2.0 * self.radius
    }

    /// 理论 Ds（像素）：距顶点 De 高度处剪影的宽度
    pub fn ds(&self) -> f64 {
        let ry = self.radius * self.elongation;
        let dy = (self.de() - ry) / ry;
        let ellipse = if dy.abs() < 1.0 {
            2.0 * self.radius * (1.0 - dy * dy).sqrt()
        } else {
            0.0
        };
        ellipse.max(self.needle_width)
    }

    fn is_inside(&self, x: f64, y: f64) -> bool {
        let cx = self.width as f64 / 2.0;
        let ry = self.radius * self.elongation;
        let cy = self.apex_y - ry;
        let in_needle = (x - cx).abs() <= self.needle_width / 2.0 && y <= cy;
        let nx = (x - cx) / self.radius;
        let ny = (y - cy) / ry;
        in_needle || nx * nx + ny * ny <= 1.0
    }

    pub fn render(&self) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, Rgb([self.background; 3]));
        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_inside(x as f64 + 0.5, y as f64 + 0.5) {
                    img.put_pixel(x, y, Rgb([self.foreground; 3]));
                }
            }
        }
        img
    }
}

/// 渲染默认参数的合成液滴
pub fn render_pendant_drop(drop: &SyntheticDrop) -> RgbImage {
    drop.render()
}
