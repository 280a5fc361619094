use super::CertificateStore;
use async_trait::async_trait;
use certportal_common::PortalResult;
use certportal_common::entities::certificates;
use certportal_common::models::NewCertificate;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::debug;
use uuid::Uuid;

pub struct SeaOrmCertificateStore {
    db: DatabaseConnection,
}

impl SeaOrmCertificateStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CertificateStore for SeaOrmCertificateStore {
    async fn find(&self, id: &str) -> PortalResult<Option<certificates::Model>> {
        // 非 UUID 不可能匹配任何行，无需查询
        let Ok(id) = Uuid::parse_str(id) else {
            debug!(key = %id, "lookup key is not a uuid");
            return Ok(None);
        };
        let found = certificates::Entity::find_by_id(id).one(&self.db).await?;
        Ok(found)
    }

    async fn insert(&self, new: NewCertificate) -> PortalResult<certificates::Model> {
        let active = certificates::ActiveModel {
            id: Set(new.id),
            full_name: Set(new.full_name),
            certification_date: Set(new.certification_date),
            pdf_url: Set(new.pdf_url),
            ..Default::default()
        };
        Ok(active.insert(&self.db).await?)
    }

    async fn list_recent(&self) -> PortalResult<Vec<certificates::Model>> {
        let list = certificates::Entity::find()
            .order_by_desc(certificates::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(list)
    }
}
