use std::fmt::Display;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// 徽标或字体文件缺失、无法解码
    #[error("asset {path} unavailable: {reason}")]
    Asset { path: String, reason: String },

    #[error("verification code encoding failed: {0}")]
    Code(String),

    #[error("snapshot failed: {0}")]
    Snapshot(String),

    #[error("pdf assembly failed: {0}")]
    Pagination(String),
}

impl RenderError {
    pub(crate) fn asset(path: &Path, reason: impl Display) -> Self {
        Self::Asset {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
