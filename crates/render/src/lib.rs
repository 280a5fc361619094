//! 证书文档渲染
//!
//! 固定版式的横向 A4 证书：布局 -> 栅格快照（像素密度 >= 2）-> 单页 PDF。
//! 渲染是 CPU 密集型工作，异步入口通过 `spawn_blocking` 执行。

mod code;
mod error;
mod fit;
mod layout;
mod pdf;
mod raster;
mod typeface;

pub use code::VerificationCode;
pub use error::RenderError;
pub use fit::{NAME_MAX_FONT_SIZE, NAME_MIN_FONT_SIZE, shrink_to_fit, wrap_lines};
pub use layout::{CODE_SIZE, Color, Layout, NAME_BOX_WIDTH, PaintCommand, Rect, compose};
pub use typeface::{BitmapFace, OutlineFace, Typeface};

use bytes::Bytes;
use chrono::NaiveDate;
use image::{ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 逻辑画布宽度（A4 横向，单位 pt）
pub const PAGE_WIDTH: u32 = 842;
/// 逻辑画布高度
pub const PAGE_HEIGHT: u32 = 595;
/// 快照像素密度下限（打印清晰度要求）
pub const MIN_PIXEL_RATIO: u32 = 2;

/// 预览中尚未输入姓名时显示的占位文字
pub const NAME_PLACEHOLDER: &str = "Nombre del Participante";

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub logo_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub pixel_ratio: u32,
}

/// 证书上可见的全部字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFields {
    pub full_name: String,
    pub certification_date: NaiveDate,
    pub identifier: String,
    pub verification_url: String,
}

/// 栅格快照
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: RgbImage,
    pub pixel_ratio: u32,
    pub name_font_size: u32,
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub pdf: Bytes,
    pub raster_width: u32,
    pub raster_height: u32,
    pub name_font_size: u32,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    options: Arc<RenderOptions>,
}

impl Renderer {
    pub fn new(mut options: RenderOptions) -> Self {
        options.pixel_ratio = options.pixel_ratio.max(MIN_PIXEL_RATIO);
        Self {
            options: Arc::new(options),
        }
    }

    pub fn pixel_ratio(&self) -> u32 {
        self.options.pixel_ratio
    }

    /// 渲染完整 PDF，在阻塞线程池中执行
    pub async fn render(&self, fields: CertificateFields) -> Result<RenderedDocument, RenderError> {
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || render_document(&options, &fields))
            .await
            .map_err(|err| RenderError::Snapshot(format!("render task failed: {err}")))?
    }

    /// 生成预览 PNG（像素密度 1）
    pub async fn preview_png(&self, fields: CertificateFields) -> Result<Vec<u8>, RenderError> {
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || {
            let snapshot = take_snapshot(&options, &fields, 1)?;
            encode_png(&snapshot.image)
        })
        .await
        .map_err(|err| RenderError::Snapshot(format!("preview task failed: {err}")))?
    }

    /// 同步生成快照，供测试和阻塞上下文使用
    pub fn snapshot(&self, fields: &CertificateFields) -> Result<Snapshot, RenderError> {
        take_snapshot(&self.options, fields, self.options.pixel_ratio)
    }
}

fn render_document(
    options: &RenderOptions,
    fields: &CertificateFields,
) -> Result<RenderedDocument, RenderError> {
    let snapshot = take_snapshot(options, fields, options.pixel_ratio)?;
    let pdf = pdf::paginate(&snapshot.image, PAGE_WIDTH, PAGE_HEIGHT)?;
    debug!(
        identifier = %fields.identifier,
        width = snapshot.image.width(),
        height = snapshot.image.height(),
        bytes = pdf.len(),
        "certificate document rendered"
    );
    Ok(RenderedDocument {
        pdf: Bytes::from(pdf),
        raster_width: snapshot.image.width(),
        raster_height: snapshot.image.height(),
        name_font_size: snapshot.name_font_size,
    })
}

fn take_snapshot(
    options: &RenderOptions,
    fields: &CertificateFields,
    pixel_ratio: u32,
) -> Result<Snapshot, RenderError> {
    // 资源在渲染时加载，缺失或损坏时失败而不是静默省略
    let face = typeface::load(options.font_path.as_deref())?;
    let logo = match options.logo_path.as_deref() {
        Some(path) => Some(load_logo(path)?),
        None => None,
    };
    let code = VerificationCode::encode(&fields.verification_url)?;
    let layout = layout::compose(fields, face.as_ref());
    let image = raster::rasterize(&layout, face.as_ref(), logo.as_ref(), &code, pixel_ratio);
    Ok(Snapshot {
        image,
        pixel_ratio,
        name_font_size: layout.name_font_size,
    })
}

fn load_logo(path: &Path) -> Result<RgbaImage, RenderError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|err| RenderError::asset(path, err))
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, RenderError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| RenderError::Snapshot(format!("png encoding failed: {err}")))?;
    Ok(buffer.into_inner())
}
