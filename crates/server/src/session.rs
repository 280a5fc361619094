//! 会话守卫
//!
//! 受保护视图挂载时订阅会话变更并异步获取当前会话，
//! 在视图生命周期内（HTTP 中为一次请求）根据通知更新状态，卸载时退订一次。

use crate::backend::{AuthBackend, Session, SessionEvent, SessionSubscription};
use crate::pages;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{debug, warn};

pub const SESSION_COOKIE: &str = "certportal_session";
pub const LOGIN_PATH: &str = "/admin/login";
const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Resolving,
    Resolved(Option<Session>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// 会话尚未确定，显示等待页
    Wait,
    RedirectToLogin,
    Render(Session),
}

pub struct SessionGate {
    token: Option<String>,
    state: GateState,
    subscription: SessionSubscription,
}

impl SessionGate {
    /// 先订阅再获取会话，避免错过获取期间的变更
    pub fn mount(auth: &dyn AuthBackend, token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            state: GateState::Resolving,
            subscription: auth.on_session_change(),
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub async fn resolve(&mut self, auth: &dyn AuthBackend) -> &GateState {
        let session = match &self.token {
            None => None,
            Some(token) => match auth.current_session(token).await {
                Ok(session) => session,
                Err(err) => {
                    warn!(error = %err, "session lookup failed, treating as signed out");
                    None
                }
            },
        };
        self.state = GateState::Resolved(session);
        self.sync();
        &self.state
    }

    /// 应用订阅期间到达的会话变更
    pub fn sync(&mut self) {
        while let Some(event) = self.subscription.try_next() {
            match event {
                SessionEvent::SignedOut { access_token } => {
                    if self.token.as_deref() == Some(access_token.as_str()) {
                        debug!("gated session signed out");
                        self.state = GateState::Resolved(None);
                    }
                }
                SessionEvent::SignedIn(session) => {
                    if self.token.as_deref() == Some(session.access_token.as_str()) {
                        self.state = GateState::Resolved(Some(session));
                    }
                }
            }
        }
    }

    pub fn decision(&self) -> GateDecision {
        match &self.state {
            GateState::Resolving => GateDecision::Wait,
            GateState::Resolved(None) => GateDecision::RedirectToLogin,
            GateState::Resolved(Some(session)) => GateDecision::Render(session.clone()),
        }
    }

    /// 返回 true 表示本次调用完成了退订
    pub fn unmount(&mut self) -> bool {
        self.subscription.release()
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// axum 中间件：无有效会话时重定向到登录页，否则把 `Session` 放入请求扩展
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = extract_cookie(req.headers(), SESSION_COOKIE);
    let mut gate = SessionGate::mount(state.auth.as_ref(), token);
    gate.resolve(state.auth.as_ref()).await;
    let decision = gate.decision();
    gate.unmount();

    match decision {
        GateDecision::Render(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        GateDecision::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
        GateDecision::Wait => pages::waiting().into_response(),
    }
}

/// 从 Cookie 头中取出指定 cookie 的值
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(|pair| pair.trim())
        .find_map(|pair| pair.strip_prefix(&prefix))
        .map(|value| value.to_string())
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE_SECS
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
