//! 字形度量与绘制
//!
//! 默认使用内置 8x8 点阵字体（每个字符前进宽度等于字号），
//! 配置 `FONT_PATH` 时改用 TrueType/OpenType 轮廓字体。

use crate::error::RenderError;
use crate::layout::Color;
use crate::raster::{blend_pixel, fill_rect};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::RgbaImage;
use std::path::Path;

pub trait Typeface: Send + Sync {
    /// 单个字符在给定字号下的前进宽度（像素）
    fn advance(&self, ch: char, size: f32) -> f32;

    /// 以 (x, y) 为左上角绘制一行文字
    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: f32, y: f32, size: f32, color: Color);

    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|ch| self.advance(ch, size)).sum()
    }
}

pub(crate) fn load(path: Option<&Path>) -> Result<Box<dyn Typeface>, RenderError> {
    match path {
        Some(path) => Ok(Box::new(OutlineFace::open(path)?)),
        None => Ok(Box::new(BitmapFace)),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BitmapFace;

impl BitmapFace {
    fn glyph(ch: char) -> [u8; 8] {
        BASIC_FONTS
            .get(ch)
            .or_else(|| LATIN_FONTS.get(ch))
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8])
    }
}

impl Typeface for BitmapFace {
    fn advance(&self, _ch: char, size: f32) -> f32 {
        size
    }

    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: f32, y: f32, size: f32, color: Color) {
        let cell = size / 8.0;
        let mut caret = x;
        for ch in text.chars() {
            for (row, bits) in Self::glyph(ch).iter().enumerate() {
                for col in 0..8 {
                    // font8x8 行内最低位在最左侧
                    if bits & (1 << col) == 0 {
                        continue;
                    }
                    let x0 = caret + col as f32 * cell;
                    let y0 = y + row as f32 * cell;
                    fill_rect(
                        canvas,
                        x0.round() as i64,
                        y0.round() as i64,
                        (x0 + cell).round() as i64,
                        (y0 + cell).round() as i64,
                        color,
                    );
                }
            }
            caret += size;
        }
    }
}

pub struct OutlineFace {
    font: FontVec,
}

impl OutlineFace {
    pub fn open(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|err| RenderError::asset(path, err))?;
        Self::from_bytes(data).map_err(|err| RenderError::asset(path, err))
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ab_glyph::InvalidFont> {
        Ok(Self {
            font: FontVec::try_from_vec(data)?,
        })
    }
}

impl Typeface for OutlineFace {
    fn advance(&self, ch: char, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        scaled.h_advance(self.font.glyph_id(ch))
    }

    fn draw(&self, canvas: &mut RgbaImage, text: &str, x: f32, y: f32, size: f32, color: Color) {
        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);
        let baseline = y + scaled.ascent();
        let mut caret = x;
        for ch in text.chars() {
            let id = self.font.glyph_id(ch);
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                blend_pixel(
                    canvas,
                    bounds.min.x as i64 + gx as i64,
                    bounds.min.y as i64 + gy as i64,
                    color,
                    coverage,
                );
            });
        }
    }
}
