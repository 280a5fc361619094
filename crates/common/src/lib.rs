pub mod config;
pub mod entities;
pub mod error;
pub mod identifier;
pub mod models;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{PortalError, Result as PortalResult};

// 配置相关
pub use config::AppConfig;

// 标识解析
pub use identifier::{IdentifierSource, LookupKey, resolve, verification_url};

// 兼容性别名（Result 是更常用的名称）
pub use error::Result;
