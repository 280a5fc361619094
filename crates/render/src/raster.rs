use crate::code::VerificationCode;
use crate::layout::{Color, Layout, PaintCommand, Rect};
use crate::typeface::Typeface;
use crate::{PAGE_HEIGHT, PAGE_WIDTH};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};

/// 按像素密度执行绘制指令，输出不透明 RGB 栅格
pub fn rasterize(
    layout: &Layout,
    face: &dyn Typeface,
    logo: Option<&RgbaImage>,
    code: &VerificationCode,
    pixel_ratio: u32,
) -> RgbImage {
    let ratio = pixel_ratio.max(1);
    let scale = ratio as f32;
    let mut canvas = RgbaImage::from_pixel(
        PAGE_WIDTH * ratio,
        PAGE_HEIGHT * ratio,
        Rgba([255, 255, 255, 255]),
    );

    for command in &layout.commands {
        match command {
            PaintCommand::Fill { rect, color } => fill_scaled(&mut canvas, rect, scale, *color),
            PaintCommand::Stroke { rect, width, color } => {
                let w = *width;
                let edges = [
                    Rect::new(rect.x, rect.y, rect.width, w),
                    Rect::new(rect.x, rect.y + rect.height - w, rect.width, w),
                    Rect::new(rect.x, rect.y, w, rect.height),
                    Rect::new(rect.x + rect.width - w, rect.y, w, rect.height),
                ];
                for edge in &edges {
                    fill_scaled(&mut canvas, edge, scale, *color);
                }
            }
            PaintCommand::Text {
                text,
                frame,
                size,
                color,
            } => {
                let px = size * scale;
                let width = face.text_width(text, px);
                let x = frame.x * scale + (frame.width * scale - width) / 2.0;
                face.draw(&mut canvas, text, x, frame.y * scale, px, *color);
            }
            PaintCommand::Logo { frame } => {
                if let Some(logo) = logo {
                    place_logo(&mut canvas, logo, frame, scale);
                }
            }
            PaintCommand::Code { frame } => paint_code(&mut canvas, code, frame, scale),
        }
    }

    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// 等比缩放徽标并居中放入 frame
fn place_logo(canvas: &mut RgbaImage, logo: &RgbaImage, frame: &Rect, scale: f32) {
    if logo.width() == 0 || logo.height() == 0 {
        return;
    }
    let box_w = frame.width * scale;
    let box_h = frame.height * scale;
    let factor = (box_w / logo.width() as f32).min(box_h / logo.height() as f32);
    let width = ((logo.width() as f32 * factor).round() as u32).max(1);
    let height = ((logo.height() as f32 * factor).round() as u32).max(1);
    let resized = imageops::resize(logo, width, height, FilterType::Triangle);
    let x = frame.x * scale + (box_w - width as f32) / 2.0;
    let y = frame.y * scale + (box_h - height as f32) / 2.0;
    imageops::overlay(canvas, &resized, x.round() as i64, y.round() as i64);
}

/// 模块边长取整数像素，保证扫描可读
fn paint_code(canvas: &mut RgbaImage, code: &VerificationCode, frame: &Rect, scale: f32) {
    let modules = code.width();
    if modules == 0 {
        return;
    }
    let side = (frame.width * scale).floor() as i64;
    let module = (side / modules as i64).max(1);
    let offset = (side - module * modules as i64).max(0) / 2;
    let left = (frame.x * scale).round() as i64 + offset;
    let top = (frame.y * scale).round() as i64 + offset;
    for y in 0..modules {
        for x in 0..modules {
            if !code.is_dark(x, y) {
                continue;
            }
            let x0 = left + x as i64 * module;
            let y0 = top + y as i64 * module;
            fill_rect(canvas, x0, y0, x0 + module, y0 + module, [0, 0, 0]);
        }
    }
}

fn fill_scaled(canvas: &mut RgbaImage, rect: &Rect, scale: f32, color: Color) {
    let x0 = (rect.x * scale).round() as i64;
    let y0 = (rect.y * scale).round() as i64;
    // 细线至少占 1 像素
    let x1 = ((rect.x + rect.width) * scale).round().max(x0 as f32 + 1.0) as i64;
    let y1 = ((rect.y + rect.height) * scale).round().max(y0 as f32 + 1.0) as i64;
    fill_rect(canvas, x0, y0, x1, y1, color);
}

/// 填充半开区间 [x0, x1) x [y0, y1)，超出画布部分被裁剪
pub(crate) fn fill_rect(canvas: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Color) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let (x0, x1) = (x0.clamp(0, width), x1.clamp(0, width));
    let (y0, y1) = (y0.clamp(0, height), y1.clamp(0, height));
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x as u32, y as u32, Rgba([color[0], color[1], color[2], 255]));
        }
    }
}

/// 按覆盖率混合单个像素
pub(crate) fn blend_pixel(canvas: &mut RgbaImage, x: i64, y: i64, color: Color, coverage: f32) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0);
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for channel in 0..3 {
        let base = pixel.0[channel] as f32;
        pixel.0[channel] = (base + (color[channel] as f32 - base) * alpha).round() as u8;
    }
}
