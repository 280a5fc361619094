use crate::backend::CertificateStore;
use crate::metrics;
use certportal_common::entities::certificates;
use certportal_common::models::CertificateView;
use certportal_common::{LookupKey, PortalResult, verification_url};
use std::sync::Arc;
use tracing::{info, warn};

/// 只读查询服务；未找到是正常结果
#[derive(Clone)]
pub struct VerificationService {
    records: Arc<dyn CertificateStore>,
    public_origin: String,
}

impl VerificationService {
    pub fn new(records: Arc<dyn CertificateStore>, public_origin: &str) -> Self {
        Self {
            records,
            public_origin: public_origin.to_string(),
        }
    }

    pub async fn lookup(&self, key: &LookupKey) -> PortalResult<Option<CertificateView>> {
        if key.is_empty() {
            return Ok(None);
        }
        match self.records.find(key.as_str()).await {
            Ok(Some(model)) => {
                metrics::inc_lookup("found");
                info!(id = %model.id, "certificate verified");
                Ok(Some(self.view(model)))
            }
            Ok(None) => {
                metrics::inc_lookup("not_found");
                info!(key = %key, "certificate not found");
                Ok(None)
            }
            Err(err) => {
                metrics::inc_lookup("error");
                warn!(key = %key, error = %err, "certificate lookup failed");
                Err(err)
            }
        }
    }

    /// 管理面板列表，最新在前
    pub async fn recent(&self) -> PortalResult<Vec<CertificateView>> {
        let list = self.records.list_recent().await?;
        Ok(list.into_iter().map(|model| self.view(model)).collect())
    }

    fn view(&self, model: certificates::Model) -> CertificateView {
        let url = verification_url(&self.public_origin, model.id);
        CertificateView::from_model(model, url)
    }
}
