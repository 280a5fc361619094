use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub public_origin: String,
    pub database_url: Option<String>,
    pub backend_url: String,
    pub backend_anon_key: String,
    pub backend_service_key: Option<String>,
    pub storage_bucket: String,
    pub storage_dir: Option<PathBuf>,
    pub logo_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub render_pixel_ratio: u32,
    pub scan_fps: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env early so process env reads pick it up.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，便于测试时绕开进程环境变量。
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let public_origin = lookup("PUBLIC_ORIGIN")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        if !(public_origin.starts_with("http://") || public_origin.starts_with("https://")) {
            return Err(anyhow!(
                "PUBLIC_ORIGIN must start with http:// or https://, got {}",
                public_origin
            ));
        }

        let database_url = non_empty(lookup("DATABASE_URL"));

        // 托管后端地址与密钥缺失时退化为空字符串，调用时才会失败
        let backend_url = lookup("BACKEND_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_default();
        let backend_anon_key = lookup("BACKEND_ANON_KEY").unwrap_or_default();
        let backend_service_key = non_empty(lookup("BACKEND_SERVICE_KEY"));

        let storage_bucket = non_empty(lookup("STORAGE_BUCKET"))
            .unwrap_or_else(|| "certificates".to_string());
        let storage_dir = non_empty(lookup("STORAGE_DIR")).map(PathBuf::from);
        let logo_path = non_empty(lookup("LOGO_PATH")).map(PathBuf::from);
        let font_path = non_empty(lookup("FONT_PATH")).map(PathBuf::from);

        // 下限由渲染器统一保证
        let render_pixel_ratio =
            u32::try_from(parse_u64(&lookup, "RENDER_PIXEL_RATIO", 2)).unwrap_or(u32::MAX);
        let scan_fps = parse_u64(&lookup, "SCAN_FPS", 10).max(1);

        Ok(Self {
            listen_addr,
            public_origin,
            database_url,
            backend_url,
            backend_anon_key,
            backend_service_key,
            storage_bucket,
            storage_dir,
            logo_path,
            font_path,
            render_pixel_ratio,
            scan_fps,
        })
    }

    /// 会话 Cookie 是否需要 Secure 标记
    pub fn secure_cookies(&self) -> bool {
        self.public_origin.starts_with("https://")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.public_origin, "http://localhost:8080");
        assert!(config.database_url.is_none());
        // 缺失后端配置不是启动错误
        assert_eq!(config.backend_url, "");
        assert_eq!(config.backend_anon_key, "");
        assert_eq!(config.storage_bucket, "certificates");
        assert_eq!(config.render_pixel_ratio, 2);
        assert_eq!(config.scan_fps, 10);
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_origin_trailing_slash_is_stripped() {
        let config = config_from(&[
            ("PUBLIC_ORIGIN", "https://certs.example.org/"),
            ("BACKEND_URL", "https://backend.example.org/"),
        ])
        .unwrap();
        assert_eq!(config.public_origin, "https://certs.example.org");
        assert_eq!(config.backend_url, "https://backend.example.org");
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        assert!(config_from(&[("PUBLIC_ORIGIN", "certs.example.org")]).is_err());
    }

    #[test]
    fn test_pixel_ratio_parsing() {
        let config = config_from(&[("RENDER_PIXEL_RATIO", "1")]).unwrap();
        assert_eq!(config.render_pixel_ratio, 1);

        let config = config_from(&[("RENDER_PIXEL_RATIO", "3")]).unwrap();
        assert_eq!(config.render_pixel_ratio, 3);

        let config = config_from(&[("RENDER_PIXEL_RATIO", "abc")]).unwrap();
        assert_eq!(config.render_pixel_ratio, 2);
    }

    #[test]
    fn test_blank_optional_values_are_ignored() {
        let config = config_from(&[
            ("DATABASE_URL", "  "),
            ("STORAGE_DIR", ""),
            ("STORAGE_BUCKET", ""),
        ])
        .unwrap();
        assert!(config.database_url.is_none());
        assert!(config.storage_dir.is_none());
        assert_eq!(config.storage_bucket, "certificates");
    }
}
