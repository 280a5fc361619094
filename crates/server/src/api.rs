use crate::backend::Session;
use crate::metrics::{metrics_middleware, render_metrics};
use crate::pages;
use crate::scanner::{ScanOptions, Scanner, StillFrames};
use crate::session::{
    LOGIN_PATH, SESSION_COOKIE, clear_session_cookie, extract_cookie, require_session,
    session_cookie,
};
use crate::state::AppState;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Extension, Form, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use bytes::Bytes;
use certportal_common::models::{
    CertificateView, IssueCertificate, LoginForm, LookupQuery, PreviewQuery,
};
use certportal_common::{IdentifierSource, LookupKey, PortalError, resolve};
use chrono::Utc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

type ApiResult<T> = std::result::Result<T, PortalError>;

const DASHBOARD_PATH: &str = "/admin/dashboard";

/// 手机相机原图通常 3 到 8 MB
pub const SCAN_BODY_LIMIT: usize = 20 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route(DASHBOARD_PATH, get(dashboard))
        .route("/admin/create", get(create_page).post(create_certificate))
        .route("/admin/preview.png", get(preview))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let mut app = Router::new()
        .route("/", get(landing))
        .route("/lookup", get(lookup))
        .route(
            "/scan",
            get(scan_page)
                .post(scan_submit)
                .layer(DefaultBodyLimit::max(SCAN_BODY_LIMIT)),
        )
        .route("/certificate/{id}", get(certificate_page))
        .route(LOGIN_PATH, get(login_page).post(login))
        .route("/admin/logout", post(logout))
        .route("/api/v1/certificates/{id}", get(get_certificate))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .merge(admin);

    if let Some(root) = &state.config.storage_dir {
        let bucket = &state.config.storage_bucket;
        app = app.nest_service(
            &format!("/storage/{bucket}"),
            ServeDir::new(root.join(bucket)),
        );
    }

    app.fallback(|| async { Redirect::to("/") })
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 查询键放入路径段前做百分号编码
fn certificate_location(key: &LookupKey) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(key.as_str().as_bytes()).collect();
    format!("/certificate/{}", encoded.replace('+', "%20"))
}

async fn landing() -> Html<String> {
    pages::landing(None)
}

async fn lookup(Query(query): Query<LookupQuery>) -> Response {
    let key = resolve(query.id.as_deref().unwrap_or_default(), IdentifierSource::Manual);
    if key.is_empty() {
        return Redirect::to("/").into_response();
    }
    Redirect::to(&certificate_location(&key)).into_response()
}

async fn scan_page() -> Html<String> {
    pages::scan(None)
}

fn scan_failed(status: StatusCode, message: &str) -> Response {
    (status, pages::scan(Some(message))).into_response()
}

fn upload_failed(err: MultipartError) -> Response {
    let status = err.status();
    info!(error = %err, status = status.as_u16(), "scan upload rejected");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return scan_failed(status, pages::UPLOAD_TOO_LARGE_MESSAGE);
    }
    scan_failed(StatusCode::BAD_REQUEST, pages::UNREADABLE_IMAGE_MESSAGE)
}

async fn scan_submit(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut uploads: Vec<Bytes> = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("frame") {
                    continue;
                }
                match field.bytes().await {
                    Ok(data) if !data.is_empty() => uploads.push(data),
                    Ok(_) => {}
                    Err(err) => return upload_failed(err),
                }
            }
            Ok(None) => break,
            Err(err) => return upload_failed(err),
        }
    }

    let frames = match StillFrames::from_uploads(uploads).await {
        Ok(frames) => frames,
        Err(err) => {
            info!(error = %err, "scan rejected");
            return scan_failed(StatusCode::BAD_REQUEST, pages::UNREADABLE_IMAGE_MESSAGE);
        }
    };
    if frames.is_empty() {
        return scan_failed(StatusCode::OK, pages::NO_CODE_MESSAGE);
    }

    let count = frames.len();
    let mut scanner = Scanner::new(ScanOptions::stills(state.config.scan_fps));
    if let Err(err) = scanner.start(frames) {
        warn!(error = %err, "scanner failed to start");
        return scan_failed(StatusCode::INTERNAL_SERVER_ERROR, pages::NO_CODE_MESSAGE);
    }
    let payload = scanner.decoded().await;
    scanner.finished().await;

    let Some(payload) = payload else {
        debug!(frames = count, "no code detected in uploaded frames");
        return scan_failed(StatusCode::OK, pages::NO_CODE_MESSAGE);
    };
    let key = resolve(&payload, IdentifierSource::Scanned);
    if key.is_empty() {
        return scan_failed(StatusCode::OK, pages::INVALID_CODE_MESSAGE);
    }
    Redirect::to(&certificate_location(&key)).into_response()
}

async fn certificate_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let key = resolve(&id, IdentifierSource::Path);
    match state.verification.lookup(&key).await {
        Ok(Some(view)) => {
            let mobile = headers
                .get(header::USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(pages::is_mobile)
                .unwrap_or(false);
            pages::certificate(&view, mobile).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            pages::certificate_missing(pages::NOT_FOUND_MESSAGE),
        )
            .into_response(),
        Err(err) => (
            err.axum_status_code(),
            pages::certificate_missing(pages::LOOKUP_FAILED_MESSAGE),
        )
            .into_response(),
    }
}

async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CertificateView>> {
    let key = resolve(&id, IdentifierSource::Path);
    let view = state
        .verification
        .lookup(&key)
        .await?
        .ok_or_else(|| PortalError::not_found(format!("certificate {key}")))?;
    Ok(Json(view))
}

async fn login_page() -> Html<String> {
    pages::login(None)
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.auth.sign_in(form.email.trim(), &form.password).await {
        Ok(session) => {
            info!(user_id = %session.user_id, "operator signed in");
            let cookie = session_cookie(&session.access_token, state.config.secure_cookies());
            (
                [(header::SET_COOKIE, cookie)],
                Redirect::to(DASHBOARD_PATH),
            )
                .into_response()
        }
        Err(PortalError::Unauthorized(message)) => {
            info!(reason = %message, "sign-in rejected");
            let message = if message.trim().is_empty() {
                pages::BAD_CREDENTIALS_MESSAGE
            } else {
                message.as_str()
            };
            (StatusCode::UNAUTHORIZED, pages::login(Some(message))).into_response()
        }
        Err(err) => {
            warn!(error = %err, "sign-in failed");
            (
                err.axum_status_code(),
                pages::login(Some("No se pudo conectar con el servicio de autenticación.")),
            )
                .into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_cookie(&headers, SESSION_COOKIE) {
        if let Err(err) = state.auth.sign_out(&token).await {
            warn!(error = %err, "sign-out failed, clearing cookie anyway");
        }
    }
    let cookie = clear_session_cookie(state.config.secure_cookies());
    ([(header::SET_COOKIE, cookie)], Redirect::to(LOGIN_PATH)).into_response()
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Response {
    debug!(user_id = %session.user_id, "dashboard requested");
    match state.verification.recent().await {
        Ok(list) => pages::dashboard(&list, None).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to list certificates");
            (
                err.axum_status_code(),
                pages::dashboard(&[], Some("No se pudieron cargar los certificados.")),
            )
                .into_response()
        }
    }
}

/// 预览表单以 GET 提交回本页，字段与预览图随之更新
async fn create_page(Query(query): Query<PreviewQuery>) -> Html<String> {
    let full_name = query.full_name.unwrap_or_default();
    let date = query
        .certification_date
        .unwrap_or_else(|| Utc::now().date_naive());
    pages::create(&full_name, date, None)
}

async fn create_certificate(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<IssueCertificate>,
) -> Response {
    let full_name = form.full_name.clone();
    let date = form
        .certification_date
        .unwrap_or_else(|| Utc::now().date_naive());

    match state.issuance.issue(form).await {
        Ok(view) => {
            info!(id = %view.id, user_id = %session.user_id, "certificate created from admin panel");
            Redirect::to(DASHBOARD_PATH).into_response()
        }
        Err(err) => {
            let message = match &err {
                PortalError::Validation(_) => pages::MISSING_FIELDS_MESSAGE,
                other => {
                    warn!(error = %other, user_id = %session.user_id, "certificate issuance failed");
                    pages::ISSUANCE_FAILED_MESSAGE
                }
            };
            (
                err.axum_status_code(),
                pages::create(&full_name, date, Some(message)),
            )
                .into_response()
        }
    }
}

async fn preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<Response> {
    let png = state.issuance.preview(query).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response())
}

async fn metrics() -> Response {
    render_metrics()
}

async fn healthz() -> &'static str {
    "ok"
}
