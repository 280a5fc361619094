mod api;
mod backend;
mod db;
mod issuance;
mod metrics;
mod pages;
mod scanner;
mod session;
mod state;
mod verification;

#[cfg(test)]
mod testing;

use crate::backend::{
    AuthBackend, CertificateStore, HostedAuth, HostedObjectStore, LocalObjectStore, ObjectStore,
    SeaOrmCertificateStore,
};
use crate::db::init_db;
use crate::state::AppState;
use anyhow::Result;
use certportal_common::AppConfig;
use certportal_render::{RenderOptions, Renderer};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env()?;

    // 未配置数据库时仍然启动，查询在调用时失败
    let db = match &config.database_url {
        Some(url) => init_db(url).await?,
        None => {
            warn!("DATABASE_URL not set, certificate records are unavailable");
            DatabaseConnection::default()
        }
    };
    let records: Arc<dyn CertificateStore> = Arc::new(SeaOrmCertificateStore::new(db));

    let objects: Arc<dyn ObjectStore> = match &config.storage_dir {
        Some(root) => {
            let store = LocalObjectStore::new(root.clone(), &config.storage_bucket, &config.public_origin);
            tokio::fs::create_dir_all(store.bucket_dir()).await?;
            info!("serving documents from {}", store.bucket_dir().display());
            Arc::new(store)
        }
        None => {
            let key = config
                .backend_service_key
                .as_deref()
                .unwrap_or(&config.backend_anon_key);
            Arc::new(HostedObjectStore::new(
                &config.backend_url,
                &config.storage_bucket,
                key,
            ))
        }
    };
    if config.backend_url.is_empty() {
        warn!("BACKEND_URL not set, sign-in and hosted storage calls will fail");
    }
    let auth: Arc<dyn AuthBackend> = Arc::new(HostedAuth::new(
        &config.backend_url,
        &config.backend_anon_key,
    ));

    let renderer = Renderer::new(RenderOptions {
        logo_path: config.logo_path.clone(),
        font_path: config.font_path.clone(),
        pixel_ratio: config.render_pixel_ratio,
    });

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, records, objects, auth, renderer);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("certificate portal listening on {}", listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {}", err);
            }
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}
