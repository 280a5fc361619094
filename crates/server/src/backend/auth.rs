//! 托管认证服务客户端与会话变更通知
//!
//! 认证后端提供 GoTrue 风格的 REST 接口：
//! `POST /auth/v1/token?grant_type=password`、`GET /auth/v1/user`、`POST /auth/v1/logout`。

use super::{AuthBackend, Session};
use async_trait::async_trait;
use certportal_common::{PortalError, PortalResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;
const DEFAULT_SIGN_IN_MESSAGE: &str = "Credenciales incorrectas";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut { access_token: String },
}

/// 会话变更事件源
#[derive(Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }
}

impl SessionEvents {
    pub fn publish(&self, event: SessionEvent) {
        // 没有订阅者时发送失败，属于正常情况
        if self.sender.send(event).is_err() {
            debug!("no session subscribers");
        }
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// 会话变更订阅句柄；`release` 或 drop 时退订，且只生效一次
pub struct SessionSubscription {
    receiver: Option<broadcast::Receiver<SessionEvent>>,
}

impl SessionSubscription {
    /// 取出一条已到达的事件，不等待
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "session subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// 返回 true 表示本次调用完成了退订
    pub fn release(&mut self) -> bool {
        self.receiver.take().is_some()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Clone)]
pub struct HostedAuth {
    base_url: String,
    anon_key: String,
    client: Client,
    events: SessionEvents,
}

impl HostedAuth {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            client: Client::new(),
            events: SessionEvents::default(),
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }
}

#[async_trait]
impl AuthBackend for HostedAuth {
    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|err| PortalError::backend(format!("sign-in request failed: {err}")))?;

        let status = resp.status();
        if status.is_success() {
            let body = resp
                .json::<TokenResponse>()
                .await
                .map_err(|err| PortalError::backend(format!("invalid token response: {err}")))?;
            let session = Session {
                access_token: body.access_token,
                user_id: body.user.id,
                email: body.user.email,
            };
            info!(user_id = %session.user_id, "operator signed in");
            self.events.publish(SessionEvent::SignedIn(session.clone()));
            return Ok(session);
        }

        let message = resp
            .json::<JsonValue>()
            .await
            .ok()
            .and_then(|body| error_message(&body));
        if status.is_client_error() {
            Err(PortalError::Unauthorized(
                message.unwrap_or_else(|| DEFAULT_SIGN_IN_MESSAGE.to_string()),
            ))
        } else {
            Err(PortalError::backend(format!(
                "sign-in failed with {}: {}",
                status,
                message.unwrap_or_default()
            )))
        }
    }

    async fn sign_out(&self, access_token: &str) -> PortalResult<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| PortalError::backend(format!("sign-out request failed: {err}")))?;

        let status = resp.status();
        // 令牌已失效同样视为退出成功
        if !(status.is_success() || status == StatusCode::UNAUTHORIZED) {
            return Err(PortalError::backend(format!("sign-out failed with {status}")));
        }
        self.events.publish(SessionEvent::SignedOut {
            access_token: access_token.to_string(),
        });
        Ok(())
    }

    async fn current_session(&self, access_token: &str) -> PortalResult<Option<Session>> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| PortalError::backend(format!("session request failed: {err}")))?;

        match resp.status() {
            status if status.is_success() => {
                let user = resp
                    .json::<UserResponse>()
                    .await
                    .map_err(|err| PortalError::backend(format!("invalid user response: {err}")))?;
                Ok(Some(Session {
                    access_token: access_token.to_string(),
                    user_id: user.id,
                    email: user.email,
                }))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(PortalError::backend(format!(
                "session lookup failed with {status}"
            ))),
        }
    }

    fn on_session_change(&self) -> SessionSubscription {
        self.events.subscribe()
    }
}

/// 认证后端的错误字段名不统一
fn error_message(body: &JsonValue) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(JsonValue::as_str))
        .map(str::to_string)
}
