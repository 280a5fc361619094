//! 外部协作方接口：记录存储、对象存储、认证
//!
//! 服务层只依赖这里的 trait，具体实现由 main 在启动时注入。

pub mod auth;
pub mod records;
pub mod storage;

use async_trait::async_trait;
use bytes::Bytes;
use certportal_common::PortalResult;
use certportal_common::entities::certificates;
use certportal_common::models::NewCertificate;
use serde::Serialize;

pub use auth::{HostedAuth, SessionEvent, SessionEvents, SessionSubscription};
pub use records::SeaOrmCertificateStore;
pub use storage::{HostedObjectStore, LocalObjectStore};

/// 已认证的管理员会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub access_token: String,
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    /// false 时已存在的对象导致 AlreadyExists
    pub overwrite: bool,
}

impl UploadOptions {
    pub fn pdf() -> Self {
        Self {
            content_type: "application/pdf".to_string(),
            overwrite: false,
        }
    }
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// 至多返回一条记录；不存在时返回 `Ok(None)`
    async fn find(&self, id: &str) -> PortalResult<Option<certificates::Model>>;

    async fn insert(&self, new: NewCertificate) -> PortalResult<certificates::Model>;

    /// 按创建时间倒序
    async fn list_recent(&self) -> PortalResult<Vec<certificates::Model>>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, key: &str, data: Bytes, options: UploadOptions) -> PortalResult<()>;

    fn public_url(&self, key: &str) -> PortalResult<String>;
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<Session>;

    async fn sign_out(&self, access_token: &str) -> PortalResult<()>;

    /// 令牌无效或已过期时返回 `Ok(None)`
    async fn current_session(&self, access_token: &str) -> PortalResult<Option<Session>>;

    fn on_session_change(&self) -> SessionSubscription;
}
