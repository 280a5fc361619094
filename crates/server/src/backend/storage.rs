use super::{ObjectStore, UploadOptions};
use async_trait::async_trait;
use bytes::Bytes;
use certportal_common::{PortalError, PortalResult};
use reqwest::{Client, StatusCode};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// 托管对象存储（`/storage/v1/object/{bucket}/{key}`）
#[derive(Clone)]
pub struct HostedObjectStore {
    base_url: String,
    bucket: String,
    api_key: String,
    client: Client,
}

impl HostedObjectStore {
    pub fn new(base_url: &str, bucket: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key: api_key.to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ObjectStore for HostedObjectStore {
    async fn upload(&self, key: &str, data: Bytes, options: UploadOptions) -> PortalResult<()> {
        validate_key(key)?;
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, key
        );
        let size = data.len();
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, &options.content_type)
            .header("x-upsert", if options.overwrite { "true" } else { "false" })
            .body(data)
            .send()
            .await
            .map_err(|err| PortalError::backend(format!("upload request failed: {err}")))?;

        let status = resp.status();
        if status.is_success() {
            info!(bucket = %self.bucket, key = %key, size, "object uploaded");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        if is_duplicate(status, &body) {
            return Err(PortalError::AlreadyExists(format!("{}/{}", self.bucket, key)));
        }
        Err(PortalError::backend(format!(
            "upload of {key} failed with {status}: {body}"
        )))
    }

    fn public_url(&self, key: &str) -> PortalResult<String> {
        if self.base_url.is_empty() {
            return Err(PortalError::backend("storage endpoint is not configured"));
        }
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        ))
    }
}

/// 存储服务对重复对象有时返回 409，有时返回 400 并在正文中说明
fn is_duplicate(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::CONFLICT {
        return true;
    }
    let lowered = body.to_ascii_lowercase();
    status == StatusCode::BAD_REQUEST
        && (lowered.contains("duplicate") || lowered.contains("already exists"))
}

/// 单机部署使用的本地文件系统存储，对象由 `/storage/{bucket}/{key}` 提供
#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    bucket: String,
    public_origin: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: &str, public_origin: &str) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.to_string(),
            public_origin: public_origin.trim_end_matches('/').to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, key: &str, data: Bytes, options: UploadOptions) -> PortalResult<()> {
        validate_key(key)?;
        let dir = self.bucket_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(key);

        let mut open = OpenOptions::new();
        open.write(true);
        if options.overwrite {
            open.create(true).truncate(true);
        } else {
            open.create_new(true);
        }
        let mut file = match open.open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(PortalError::AlreadyExists(format!("{}/{}", self.bucket, key)));
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;
        info!(path = %path.display(), size = data.len(), "object stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> PortalResult<String> {
        Ok(format!(
            "{}/storage/{}/{}",
            self.public_origin, self.bucket, key
        ))
    }
}

/// 对象键只允许单层文件名
fn validate_key(key: &str) -> PortalResult<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
        return Err(PortalError::validation(format!("invalid object key: {key}")));
    }
    Ok(())
}
