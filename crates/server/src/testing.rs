//! 测试用的内存实现

use crate::backend::{
    AuthBackend, CertificateStore, ObjectStore, Session, SessionEvent, SessionEvents,
    SessionSubscription, UploadOptions,
};
use crate::scanner::decode_frame;
use async_trait::async_trait;
use bytes::Bytes;
use certportal_common::entities::certificates;
use certportal_common::models::NewCertificate;
use certportal_common::{PortalError, PortalResult};
use certportal_render::VerificationCode;
use chrono::Utc;
use flate2::read::ZlibDecoder;
use image::{GrayImage, Luma, RgbImage};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryRecords {
    rows: Mutex<Vec<certificates::Model>>,
    fail_inserts: AtomicBool,
    fail_reads: AtomicBool,
    find_calls: AtomicUsize,
}

impl MemoryRecords {
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl CertificateStore for MemoryRecords {
    async fn find(&self, id: &str) -> PortalResult<Option<certificates::Model>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortalError::backend("records unavailable"));
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|row| row.id.to_string() == id).cloned())
    }

    async fn insert(&self, new: NewCertificate) -> PortalResult<certificates::Model> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(PortalError::backend("insert rejected"));
        }
        let model = certificates::Model {
            id: new.id,
            full_name: new.full_name,
            certification_date: new.certification_date,
            created_at: Utc::now().fixed_offset(),
            pdf_url: new.pdf_url,
        };
        self.rows.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn list_recent(&self) -> PortalResult<Vec<certificates::Model>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortalError::backend("records unavailable"));
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().rev().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryObjects {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_uploads: AtomicBool,
}

impl MemoryObjects {
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn upload(&self, key: &str, data: Bytes, options: UploadOptions) -> PortalResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(PortalError::backend("storage unavailable"));
        }
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) && !options.overwrite {
            return Err(PortalError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), (data, options.content_type));
        Ok(())
    }

    fn public_url(&self, key: &str) -> PortalResult<String> {
        Ok(format!("https://storage.test/{key}"))
    }
}

pub struct FakeAuth {
    email: String,
    password: String,
    tokens: Mutex<HashSet<String>>,
    issued: AtomicUsize,
    events: SessionEvents,
}

impl FakeAuth {
    pub fn with_user(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            tokens: Mutex::new(HashSet::new()),
            issued: AtomicUsize::new(0),
            events: SessionEvents::default(),
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    fn session(&self, token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            user_id: "user-1".to_string(),
            email: Some(self.email.clone()),
        }
    }
}

#[async_trait]
impl AuthBackend for FakeAuth {
    async fn sign_in(&self, email: &str, password: &str) -> PortalResult<Session> {
        if email != self.email || password != self.password {
            return Err(PortalError::Unauthorized(
                "Invalid login credentials".to_string(),
            ));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let token = format!("tok-{n}");
        self.tokens.lock().unwrap().insert(token.clone());
        let session = self.session(&token);
        self.events.publish(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> PortalResult<()> {
        self.tokens.lock().unwrap().remove(access_token);
        self.events.publish(SessionEvent::SignedOut {
            access_token: access_token.to_string(),
        });
        Ok(())
    }

    async fn current_session(&self, access_token: &str) -> PortalResult<Option<Session>> {
        let known = self.tokens.lock().unwrap().contains(access_token);
        Ok(known.then(|| self.session(access_token)))
    }

    fn on_session_change(&self) -> SessionSubscription {
        self.events.subscribe()
    }
}

/// 生成包含指定文本二维码的灰度帧（每模块 4 像素，四周留白）
pub fn code_frame(text: &str) -> GrayImage {
    let code = VerificationCode::encode(text).unwrap();
    let module = 4u32;
    let quiet = 4u32;
    let side = (code.width() as u32 + quiet * 2) * module;
    GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / module) as i64 - quiet as i64;
        let my = (y / module) as i64 - quiet as i64;
        let dark = mx >= 0 && my >= 0 && code.is_dark(mx as usize, my as usize);
        if dark { Luma([0]) } else { Luma([255]) }
    })
}

/// 从证书 PDF 中取出嵌入的栅格并解码其中的二维码
pub fn decode_pdf_codes(pdf: &[u8]) -> Vec<String> {
    let doc = lopdf::Document::load_mem(pdf).unwrap();
    let stream = doc
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .find(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .map(|name| name == b"Image")
                .unwrap_or(false)
        })
        .unwrap();
    let width = stream.dict.get(b"Width").unwrap().as_i64().unwrap() as u32;
    let height = stream.dict.get(b"Height").unwrap().as_i64().unwrap() as u32;
    let flate = stream
        .dict
        .get(b"Filter")
        .and_then(|filter| filter.as_name())
        .map(|name| name == b"FlateDecode")
        .unwrap_or(false);
    let data = if flate {
        // lopdf 不解压图像流，这里自行 inflate
        let mut data = Vec::new();
        ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut data)
            .unwrap();
        data
    } else {
        stream.content.clone()
    };
    let raster = RgbImage::from_raw(width, height, data).unwrap();
    let gray = image::DynamicImage::ImageRgb8(raster).to_luma8();
    decode_frame(&gray).into_iter().collect()
}
