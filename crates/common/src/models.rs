use crate::entities::certificates;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// 管理员提交的签发表单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCertificate {
    #[serde(default)]
    pub full_name: String,
    #[serde(default, deserialize_with = "empty_date_as_none")]
    pub certification_date: Option<NaiveDate>,
}

/// 写入记录存储的新证书
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub id: Uuid,
    pub full_name: String,
    pub certification_date: NaiveDate,
    pub pdf_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupQuery {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewQuery {
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "empty_date_as_none")]
    pub certification_date: Option<NaiveDate>,
}

/// 公开查询接口返回的证书视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateView {
    pub id: Uuid,
    pub full_name: String,
    pub certification_date: NaiveDate,
    pub created_at: DateTime<FixedOffset>,
    pub pdf_url: String,
    pub verification_url: String,
    pub valid: bool,
}

impl CertificateView {
    pub fn from_model(model: certificates::Model, verification_url: String) -> Self {
        Self {
            id: model.id,
            full_name: model.full_name,
            certification_date: model.certification_date,
            created_at: model.created_at,
            pdf_url: model.pdf_url,
            verification_url,
            valid: true,
        }
    }
}

/// HTML 日期输入框提交空字符串时视为未填写
fn empty_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
