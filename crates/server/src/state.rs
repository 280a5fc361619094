use crate::backend::{AuthBackend, CertificateStore, ObjectStore};
use crate::issuance::IssuanceService;
use crate::verification::VerificationService;
use certportal_common::AppConfig;
use certportal_render::Renderer;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<dyn AuthBackend>,
    pub verification: VerificationService,
    pub issuance: IssuanceService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        records: Arc<dyn CertificateStore>,
        objects: Arc<dyn ObjectStore>,
        auth: Arc<dyn AuthBackend>,
        renderer: Renderer,
    ) -> Self {
        let verification = VerificationService::new(records.clone(), &config.public_origin);
        let issuance = IssuanceService::new(records, objects, renderer, &config.public_origin);
        Self {
            config: Arc::new(config),
            auth,
            verification,
            issuance,
        }
    }
}
