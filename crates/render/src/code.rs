use crate::error::RenderError;
use qrcode::{Color as Module, EcLevel, QrCode};

/// 嵌入证书的验证二维码，纠错等级 H
#[derive(Debug, Clone)]
pub struct VerificationCode {
    width: usize,
    modules: Vec<bool>,
    level: EcLevel,
}

impl VerificationCode {
    pub fn encode(payload: &str) -> Result<Self, RenderError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)
            .map_err(|err| RenderError::Code(err.to_string()))?;
        let width = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|module| module == Module::Dark)
            .collect();
        Ok(Self {
            width,
            modules,
            level: code.error_correction_level(),
        })
    }

    /// 每边模块数
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn level(&self) -> EcLevel {
        self.level
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_uses_high_error_correction() {
        let code = VerificationCode::encode("https://certs.example.org/certificate/abc").unwrap();
        assert_eq!(code.level(), EcLevel::H);
        assert!(code.width() >= 21);
        // 左上角定位图案
        assert!(code.is_dark(0, 0));
        assert!(!code.is_dark(1, 1));
        assert!(code.is_dark(2, 2));
    }

    #[test]
    fn test_out_of_range_modules_are_light() {
        let code = VerificationCode::encode("x").unwrap();
        assert!(!code.is_dark(code.width(), 0));
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let payload = "x".repeat(4000);
        assert!(matches!(
            VerificationCode::encode(&payload),
            Err(RenderError::Code(_))
        ));
    }
}
