//! 证书门户统一错误类型定义
//!
//! 全项目共享一个错误类型，简化错误传播和处理。

use std::fmt::Display;
use thiserror::Error;

/// 门户统一错误类型
#[derive(Error, Debug)]
pub enum PortalError {
    /// 证书未找到 (404)，属于正常业务结果
    #[error("not found: {0}")]
    NotFound(String),

    /// 表单字段缺失或无效 (400)
    #[error("validation failed: {0}")]
    Validation(String),

    /// 登录被认证后端拒绝 (401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 对象存储中已存在同名对象 (409)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// 托管后端（认证/对象存储）调用失败 (502)
    #[error("backend error: {0}")]
    Backend(String),

    /// 数据库错误 (500)
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 文档渲染失败 (500)
    #[error("render error: {0}")]
    Render(String),

    /// 扫描帧无法读取 (400)
    #[error("scan error: {0}")]
    Scan(String),

    /// IO 错误 (500)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误 (500)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 其他内部错误 (500)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// 创建后端错误
    pub fn backend(msg: impl Display) -> Self {
        Self::Backend(msg.to_string())
    }

    /// 创建渲染错误
    pub fn render(msg: impl Display) -> Self {
        Self::Render(msg.to_string())
    }

    /// 判断是否为客户端错误（4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Validation(_)
                | Self::Unauthorized(_)
                | Self::AlreadyExists(_)
                | Self::Scan(_)
        )
    }

    /// 判断是否为服务端错误（5xx）
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// 获取 HTTP 状态码
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) | Self::Scan(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::AlreadyExists(_) => 409,
            Self::Backend(_) => 502,
            _ => 500,
        }
    }

    /// 获取 HTTP 状态码（axum 类型）
    #[cfg(feature = "server")]
    pub fn axum_status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::from_u16(self.http_status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// 门户 Result 类型别名
pub type Result<T> = std::result::Result<T, PortalError>;

// ============ Axum HTTP 响应支持 ============

#[cfg(feature = "server")]
mod axum_impl {
    use super::*;
    use axum::{
        Json,
        response::{IntoResponse, Response},
    };
    use serde_json::json;

    /// JSON 接口直接返回 PortalError
    impl IntoResponse for PortalError {
        fn into_response(self) -> Response {
            let status = self.axum_status_code();

            // 根据错误类型和严重程度记录结构化日志
            match &self {
                // 未找到是正常的查询结果，不按错误记录
                PortalError::NotFound(resource) => {
                    tracing::info!(
                        status = status.as_u16(),
                        resource = %resource,
                        "Certificate not found"
                    );
                }
                PortalError::Validation(msg) | PortalError::Scan(msg) => {
                    tracing::info!(
                        status = status.as_u16(),
                        reason = %msg,
                        "Request rejected"
                    );
                }
                PortalError::Unauthorized(msg) | PortalError::AlreadyExists(msg) => {
                    tracing::info!(
                        status = status.as_u16(),
                        reason = %msg,
                        "Request refused"
                    );
                }
                // 托管后端错误 - warn 级别，通常与外部服务相关
                PortalError::Backend(msg) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        backend_error = %msg,
                        "Backend call failed"
                    );
                }
                PortalError::Database(db_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        error = %db_err,
                        "Database operation failed"
                    );
                }
                PortalError::Render(msg) => {
                    tracing::error!(
                        status = status.as_u16(),
                        render_error = %msg,
                        "Document rendering failed"
                    );
                }
                PortalError::Io(io_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        io_error = %io_err,
                        "IO operation failed"
                    );
                }
                PortalError::Serialization(json_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        serialization_error = %json_err,
                        "JSON serialization failed"
                    );
                }
                PortalError::Internal(internal_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        internal_error = ?internal_err,
                        "Internal server error"
                    );
                }
            }

            let body = Json(json!({"error": self.to_string()}));
            (status, body).into_response()
        }
    }
}
