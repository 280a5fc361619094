//! 证书标识解析
//!
//! 手动输入、二维码扫描结果、URL 路径段三种来源统一归一化为同一个查询键。
//! 这里不做格式校验，无效标识交给查询阶段返回“未找到”。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 验证链接中标识之前的固定路径
pub const VERIFICATION_PATH_MARKER: &str = "/certificate/";

/// 标识来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSource {
    /// 用户在查询表单中手动输入
    Manual,
    /// 二维码解码得到的原始文本
    Scanned,
    /// `/certificate/{id}` 路由中的路径段
    Path,
}

/// 归一化后的查询键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupKey(String);

impl LookupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 将任意来源的原始文本解析为查询键
pub fn resolve(raw: &str, source: IdentifierSource) -> LookupKey {
    let candidate = match source {
        IdentifierSource::Scanned => match raw.rfind(VERIFICATION_PATH_MARKER) {
            Some(pos) => &raw[pos + VERIFICATION_PATH_MARKER.len()..],
            None => raw,
        },
        IdentifierSource::Manual | IdentifierSource::Path => raw,
    };
    LookupKey(candidate.trim().to_string())
}

/// 构建嵌入二维码的验证链接 `<origin>/certificate/<id>`
pub fn verification_url(origin: &str, id: impl fmt::Display) -> String {
    format!(
        "{}{}{}",
        origin.trim_end_matches('/'),
        VERIFICATION_PATH_MARKER,
        id
    )
}
