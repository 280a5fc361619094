//! 证书版式
//!
//! 所有元素位于 842 x 595 逻辑画布上的固定坐标，输出为绘制指令列表，
//! 由 raster 模块按像素密度放大后执行。

use crate::CertificateFields;
use crate::fit::{NAME_MAX_FONT_SIZE, NAME_MIN_FONT_SIZE, shrink_to_fit, wrap_lines};
use crate::typeface::Typeface;

pub type Color = [u8; 3];

const PRIMARY_900: Color = [20, 40, 80];
const SLATE_800: Color = [30, 41, 59];
const SLATE_700: Color = [51, 65, 85];
const SLATE_600: Color = [71, 85, 105];
const SLATE_500: Color = [100, 116, 139];
const SLATE_400: Color = [148, 163, 184];
const SLATE_300: Color = [203, 213, 225];
const SLATE_200: Color = [226, 232, 240];
const BORDER_OUTER: Color = [204, 211, 221];
const BORDER_INNER: Color = [229, 233, 238];

/// 姓名框宽度
pub const NAME_BOX_WIDTH: f32 = 650.0;
/// 二维码边长
pub const CODE_SIZE: f32 = 80.0;

const CENTER_X: f32 = 421.0;
const BODY_WIDTH: f32 = 576.0;
const BODY_SIZE: f32 = 10.0;
const BODY_LINE_HEIGHT: f32 = 15.0;

const BODY_TEXT: &str = "Por su destacada participación y compromiso con los procesos de \
desarrollo integral, adquiriendo herramientas valiosas para el crecimiento personal y \
profesional con un enfoque profundamente humano.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 以画布中线为中心、给定宽度的文本行
    fn centered_line(width: f32, y: f32, size: f32) -> Self {
        Self::new(CENTER_X - width / 2.0, y, width, size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    Fill {
        rect: Rect,
        color: Color,
    },
    Stroke {
        rect: Rect,
        width: f32,
        color: Color,
    },
    /// 在 frame 内水平居中绘制；超出 frame 时向两侧溢出
    Text {
        text: String,
        frame: Rect,
        size: f32,
        color: Color,
    },
    Logo {
        frame: Rect,
    },
    Code {
        frame: Rect,
    },
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub commands: Vec<PaintCommand>,
    pub name_font_size: u32,
}

impl Layout {
    fn text(&mut self, text: impl Into<String>, frame: Rect, size: f32, color: Color) {
        self.commands.push(PaintCommand::Text {
            text: text.into(),
            frame,
            size,
            color,
        });
    }

    fn fill(&mut self, rect: Rect, color: Color) {
        self.commands.push(PaintCommand::Fill { rect, color });
    }

    /// 查找内容完全相同的文本指令
    pub fn find_text(&self, needle: &str) -> Option<(&Rect, f32)> {
        self.commands.iter().find_map(|command| match command {
            PaintCommand::Text {
                text, frame, size, ..
            } if text == needle => Some((frame, *size)),
            _ => None,
        })
    }
}

pub fn compose(fields: &CertificateFields, face: &dyn Typeface) -> Layout {
    let name_font_size = shrink_to_fit(
        face,
        &fields.full_name,
        NAME_BOX_WIDTH,
        NAME_MAX_FONT_SIZE,
        NAME_MIN_FONT_SIZE,
    );
    let mut layout = Layout {
        commands: Vec::with_capacity(24),
        name_font_size,
    };

    layout.commands.push(PaintCommand::Stroke {
        rect: Rect::new(16.0, 16.0, 810.0, 563.0),
        width: 2.0,
        color: BORDER_OUTER,
    });
    layout.commands.push(PaintCommand::Stroke {
        rect: Rect::new(24.0, 24.0, 794.0, 547.0),
        width: 1.0,
        color: BORDER_INNER,
    });
    layout.commands.push(PaintCommand::Logo {
        frame: Rect::new(361.0, 40.0, 120.0, 80.0),
    });

    layout.text(
        "Otorga el presente",
        Rect::centered_line(700.0, 130.0, 16.0),
        16.0,
        SLATE_500,
    );
    layout.text(
        "CERTIFICADO",
        Rect::centered_line(700.0, 156.0, 44.0),
        44.0,
        PRIMARY_900,
    );
    layout.text(
        "A FAVOR DE:",
        Rect::centered_line(700.0, 212.0, 13.0),
        13.0,
        SLATE_600,
    );

    // 姓名框：字号在绘制前确定，垂直居中于 48pt 高的框内
    let name_size = name_font_size as f32;
    let name_frame = Rect::new(96.0, 234.0 + (48.0 - name_size) / 2.0, NAME_BOX_WIDTH, name_size);
    layout.text(fields.full_name.clone(), name_frame, name_size, SLATE_800);
    layout.fill(Rect::new(96.0, 284.0, NAME_BOX_WIDTH, 2.0), SLATE_300);

    for (index, line) in wrap_lines(face, BODY_TEXT, BODY_SIZE, BODY_WIDTH)
        .into_iter()
        .enumerate()
    {
        let y = 300.0 + index as f32 * BODY_LINE_HEIGHT;
        layout.text(
            line,
            Rect::centered_line(BODY_WIDTH, y, BODY_SIZE),
            BODY_SIZE,
            SLATE_700,
        );
    }

    // 签名栏
    layout.fill(Rect::new(96.0, 470.0, 240.0, 1.0), SLATE_300);
    layout.text(
        "Dirección General",
        Rect::new(96.0, 478.0, 240.0, 12.0),
        12.0,
        SLATE_800,
    );
    layout.text(
        "Instituto Humanista",
        Rect::new(96.0, 496.0, 240.0, 9.0),
        9.0,
        SLATE_500,
    );

    // 验证二维码
    layout.commands.push(PaintCommand::Stroke {
        rect: Rect::new(CENTER_X - 48.0, 436.0, 96.0, 96.0),
        width: 1.0,
        color: SLATE_200,
    });
    layout.commands.push(PaintCommand::Code {
        frame: Rect::new(CENTER_X - CODE_SIZE / 2.0, 444.0, CODE_SIZE, CODE_SIZE),
    });
    layout.text(
        "Verificar autenticidad escaneando",
        Rect::centered_line(300.0, 538.0, 7.0),
        7.0,
        SLATE_400,
    );
    layout.text(
        fields.identifier.clone(),
        Rect::centered_line(300.0, 548.0, 6.0),
        6.0,
        SLATE_300,
    );

    // 签发日期
    layout.fill(Rect::new(506.0, 470.0, 240.0, 1.0), SLATE_300);
    layout.text(
        "Fecha de Emisión",
        Rect::new(506.0, 478.0, 240.0, 12.0),
        12.0,
        SLATE_800,
    );
    layout.text(
        fields.certification_date.format("%d/%m/%Y").to_string(),
        Rect::new(506.0, 496.0, 240.0, 11.0),
        11.0,
        SLATE_600,
    );

    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeface::BitmapFace;
    use chrono::NaiveDate;

    fn fields(name: &str) -> CertificateFields {
        CertificateFields {
            full_name: name.to_string(),
            certification_date: NaiveDate::from_ymd_opt(2023, 11, 9).unwrap(),
            identifier: "abc-123".to_string(),
            verification_url: "http://localhost/certificate/abc-123".to_string(),
        }
    }

    #[test]
    fn test_date_is_day_month_year() {
        let layout = compose(&fields("Ana"), &BitmapFace);
        assert!(layout.find_text("09/11/2023").is_some());
    }

    #[test]
    fn test_fixed_blocks_present() {
        let layout = compose(&fields("Ana"), &BitmapFace);
        for text in [
            "Otorga el presente",
            "CERTIFICADO",
            "A FAVOR DE:",
            "Dirección General",
            "Instituto Humanista",
            "Verificar autenticidad escaneando",
            "Fecha de Emisión",
            "abc-123",
        ] {
            assert!(layout.find_text(text).is_some(), "missing {text}");
        }
        assert_eq!(
            layout
                .commands
                .iter()
                .filter(|c| matches!(c, PaintCommand::Logo { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_code_frame_is_80_square() {
        let layout = compose(&fields("Ana"), &BitmapFace);
        let frame = layout
            .commands
            .iter()
            .find_map(|c| match c {
                PaintCommand::Code { frame } => Some(*frame),
                _ => None,
            })
            .unwrap();
        assert_eq!(frame.width, 80.0);
        assert_eq!(frame.height, 80.0);
    }

    #[test]
    fn test_name_uses_fitted_size() {
        let name = "a".repeat(30);
        let layout = compose(&fields(&name), &BitmapFace);
        // 30 * 21 = 630 <= 650
        assert_eq!(layout.name_font_size, 21);
        let (frame, size) = layout.find_text(&name).unwrap();
        assert_eq!(size, 21.0);
        assert_eq!(frame.width, NAME_BOX_WIDTH);
    }

    #[test]
    fn test_overflowing_name_is_kept_whole() {
        let name = "b".repeat(60);
        let layout = compose(&fields(&name), &BitmapFace);
        assert_eq!(layout.name_font_size, NAME_MIN_FONT_SIZE);
        assert!(layout.find_text(&name).is_some());
    }

    #[test]
    fn test_body_paragraph_stays_within_width() {
        let layout = compose(&fields("Ana"), &BitmapFace);
        let body_lines = layout
            .commands
            .iter()
            .filter(|c| matches!(c, PaintCommand::Text { size, .. } if *size == BODY_SIZE))
            .count();
        assert!(body_lines >= 3);
    }
}
