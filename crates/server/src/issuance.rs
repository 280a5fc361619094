//! 证书签发
//!
//! 顺序执行：校验 -> 生成 UUID -> 渲染 -> 上传 `<id>.pdf` -> 获取公开地址 -> 写入记录。
//! 各步骤之间没有事务；写入记录失败时已上传的文档成为孤儿对象，只记录日志。

use crate::backend::{CertificateStore, ObjectStore, UploadOptions};
use crate::metrics;
use certportal_common::models::{CertificateView, IssueCertificate, NewCertificate, PreviewQuery};
use certportal_common::{PortalError, PortalResult, verification_url};
use certportal_render::{CertificateFields, NAME_PLACEHOLDER, Renderer};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct IssuanceService {
    records: Arc<dyn CertificateStore>,
    objects: Arc<dyn ObjectStore>,
    renderer: Renderer,
    public_origin: String,
}

impl IssuanceService {
    pub fn new(
        records: Arc<dyn CertificateStore>,
        objects: Arc<dyn ObjectStore>,
        renderer: Renderer,
        public_origin: &str,
    ) -> Self {
        Self {
            records,
            objects,
            renderer,
            public_origin: public_origin.to_string(),
        }
    }

    pub async fn issue(&self, form: IssueCertificate) -> PortalResult<CertificateView> {
        let full_name = form.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(PortalError::validation("full_name is required"));
        }
        let certification_date = form
            .certification_date
            .ok_or_else(|| PortalError::validation("certification_date is required"))?;

        let id = Uuid::new_v4();
        let link = verification_url(&self.public_origin, id);

        let document = self
            .renderer
            .render(CertificateFields {
                full_name: full_name.clone(),
                certification_date,
                identifier: id.to_string(),
                verification_url: link.clone(),
            })
            .await
            .map_err(|err| {
                metrics::inc_issuance_failure("render");
                PortalError::render(err)
            })?;

        let key = format!("{id}.pdf");
        self.objects
            .upload(&key, document.pdf, UploadOptions::pdf())
            .await
            .inspect_err(|_| metrics::inc_issuance_failure("upload"))?;
        let pdf_url = self
            .objects
            .public_url(&key)
            .inspect_err(|_| metrics::inc_issuance_failure("public_url"))?;

        let model = match self
            .records
            .insert(NewCertificate {
                id,
                full_name,
                certification_date,
                pdf_url,
            })
            .await
        {
            Ok(model) => model,
            Err(err) => {
                metrics::inc_issuance_failure("insert");
                warn!(
                    object_key = %key,
                    error = %err,
                    "record insert failed, uploaded document is orphaned"
                );
                return Err(err);
            }
        };

        metrics::inc_certificates_issued();
        info!(id = %model.id, name_font_size = document.name_font_size, "certificate issued");
        Ok(CertificateView::from_model(model, link))
    }

    /// 创建页的实时预览；姓名为空时显示占位文字，日期默认为今天
    pub async fn preview(&self, query: PreviewQuery) -> PortalResult<Vec<u8>> {
        let full_name = query
            .full_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| NAME_PLACEHOLDER.to_string());
        let certification_date = query
            .certification_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let id = Uuid::nil();

        self.renderer
            .preview_png(CertificateFields {
                full_name,
                certification_date,
                identifier: id.to_string(),
                verification_url: verification_url(&self.public_origin, id),
            })
            .await
            .map_err(PortalError::render)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryObjects, MemoryRecords, decode_pdf_codes};
    use certportal_common::{IdentifierSource, resolve};
    use certportal_render::RenderOptions;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    struct Fixture {
        records: Arc<MemoryRecords>,
        objects: Arc<MemoryObjects>,
        service: IssuanceService,
    }

    fn fixture_with(renderer: Renderer) -> Fixture {
        let records = Arc::new(MemoryRecords::default());
        let objects = Arc::new(MemoryObjects::default());
        let service = IssuanceService::new(
            records.clone(),
            objects.clone(),
            renderer,
            "https://certs.example.org",
        );
        Fixture {
            records,
            objects,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Renderer::new(RenderOptions::default()))
    }

    fn form(name: &str) -> IssueCertificate {
        IssueCertificate {
            full_name: name.to_string(),
            certification_date: NaiveDate::from_ymd_opt(2024, 5, 1),
        }
    }

    #[tokio::test]
    async fn test_issue_uploads_document_and_inserts_record() {
        let fx = fixture();
        let view = fx.service.issue(form("  Juan Pérez ")).await.unwrap();

        assert_eq!(view.full_name, "Juan Pérez");
        assert_eq!(view.pdf_url, format!("https://storage.test/{}.pdf", view.id));
        assert_eq!(
            view.verification_url,
            format!("https://certs.example.org/certificate/{}", view.id)
        );

        let (pdf, content_type) = fx.objects.get(&format!("{}.pdf", view.id)).unwrap();
        assert_eq!(content_type, "application/pdf");
        assert!(pdf.starts_with(b"%PDF"));

        let stored = fx.records.find(&view.id.to_string()).await.unwrap().unwrap();
        assert_eq!(stored.pdf_url, view.pdf_url);
    }

    #[tokio::test]
    async fn test_embedded_code_links_back_to_record() {
        let fx = fixture();
        let view = fx.service.issue(form("Ana")).await.unwrap();
        let (pdf, _) = fx.objects.get(&format!("{}.pdf", view.id)).unwrap();

        let codes = decode_pdf_codes(&pdf);
        assert_eq!(codes.len(), 1);
        let key = resolve(&codes[0], IdentifierSource::Scanned);
        assert_eq!(key.as_str(), view.id.to_string());
    }

    #[tokio::test]
    async fn test_identical_input_yields_distinct_ids() {
        let fx = fixture();
        let first = fx.service.issue(form("Ana")).await.unwrap();
        let second = fx.service.issue(form("Ana")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(fx.objects.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_name_rejected_before_backend_calls() {
        let fx = fixture();
        let err = fx.service.issue(form("   ")).await.unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
        assert_eq!(fx.objects.len(), 0);
        assert_eq!(fx.records.len(), 0);
    }

    #[tokio::test]
    async fn test_missing_date_rejected() {
        let fx = fixture();
        let err = fx
            .service
            .issue(IssueCertificate {
                full_name: "Ana".to_string(),
                certification_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_render_failure_uploads_nothing() {
        let fx = fixture_with(Renderer::new(RenderOptions {
            logo_path: Some(PathBuf::from("/nonexistent/logo.png")),
            ..Default::default()
        }));
        let err = fx.service.issue(form("Ana")).await.unwrap_err();
        assert!(matches!(err, PortalError::Render(_)));
        assert_eq!(fx.objects.len(), 0);
        assert_eq!(fx.records.len(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_writes_no_record() {
        let fx = fixture();
        fx.objects.fail_uploads();
        let err = fx.service.issue(form("Ana")).await.unwrap_err();
        assert!(matches!(err, PortalError::Backend(_)));
        assert_eq!(fx.records.len(), 0);
    }

    #[tokio::test]
    async fn test_insert_failure_leaves_orphan_object() {
        let fx = fixture();
        fx.records.fail_inserts();
        let err = fx.service.issue(form("Ana")).await.unwrap_err();
        assert!(matches!(err, PortalError::Backend(_)));
        // 不做补偿删除
        assert_eq!(fx.objects.len(), 1);
        assert_eq!(fx.records.len(), 0);
    }

    #[tokio::test]
    async fn test_preview_defaults_placeholder_name() {
        let fx = fixture();
        let png = fx.service.preview(PreviewQuery::default()).await.unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
