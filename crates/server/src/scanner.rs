//! 二维码扫描会话
//!
//! `Idle -> Scanning -> (Decoded | Stopped)`。采样任务以固定频率读取帧，
//! 首次解码成功时发出一次结果、释放帧源并停止；外部停止或帧源耗尽时进入 `Stopped`。

use async_trait::async_trait;
use bytes::Bytes;
use certportal_common::{PortalError, PortalResult};
use image::GrayImage;
use image::imageops;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// 实时画面的检测区域边长
pub const LIVE_REGION: u32 = 250;

/// 上传图片检测前缩放到的最大边长
pub const STILL_MAX_SIDE: u32 = 1024;

#[async_trait]
pub trait FrameSource: Send + 'static {
    /// 帧源耗尽时返回 None
    async fn next_frame(&mut self) -> Option<GrayImage>;

    async fn release(&mut self) -> PortalResult<()>;
}

/// 上传的静态图片序列
pub struct StillFrames {
    frames: VecDeque<GrayImage>,
}

impl StillFrames {
    pub fn new(frames: Vec<GrayImage>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// 解码上传的图片；任何一张无法识别都视为扫描错误。解码与缩放在阻塞线程池中执行
    pub async fn from_uploads(uploads: Vec<Bytes>) -> PortalResult<Self> {
        let frames = tokio::task::spawn_blocking(move || {
            uploads
                .iter()
                .map(|data| load_still(data))
                .collect::<PortalResult<Vec<_>>>()
        })
        .await
        .map_err(|err| PortalError::Scan(format!("frame decode task failed: {err}")))??;
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn load_still(data: &[u8]) -> PortalResult<GrayImage> {
    let img = image::load_from_memory(data)
        .map_err(|err| PortalError::Scan(format!("unreadable frame: {err}")))?;
    let img = if img.width().max(img.height()) > STILL_MAX_SIDE {
        img.resize(STILL_MAX_SIDE, STILL_MAX_SIDE, imageops::FilterType::Triangle)
    } else {
        img
    };
    Ok(img.to_luma8())
}

#[async_trait]
impl FrameSource for StillFrames {
    async fn next_frame(&mut self) -> Option<GrayImage> {
        self.frames.pop_front()
    }

    async fn release(&mut self) -> PortalResult<()> {
        self.frames.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Decoded,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub fps: u64,
    /// 居中的正方形检测区域；None 表示整帧
    pub region: Option<u32>,
}

impl ScanOptions {
    pub fn live(fps: u64) -> Self {
        Self {
            fps: fps.max(1),
            region: Some(LIVE_REGION),
        }
    }

    pub fn stills(fps: u64) -> Self {
        Self {
            fps: fps.max(1),
            region: None,
        }
    }

    fn period(&self) -> Duration {
        Duration::from_millis((1000 / self.fps.max(1)).max(1))
    }
}

pub struct Scanner {
    options: ScanOptions,
    state_tx: watch::Sender<ScanState>,
    state_rx: watch::Receiver<ScanState>,
    stop_tx: Option<oneshot::Sender<()>>,
    payload_rx: Option<oneshot::Receiver<String>>,
    task: Option<JoinHandle<()>>,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        let (state_tx, state_rx) = watch::channel(ScanState::Idle);
        Self {
            options,
            state_tx,
            state_rx,
            stop_tx: None,
            payload_rx: None,
            task: None,
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state_rx.borrow()
    }

    /// 获取帧源并开始采样，只能从 `Idle` 启动一次
    pub fn start<S: FrameSource>(&mut self, source: S) -> PortalResult<()> {
        if self.state() != ScanState::Idle {
            return Err(PortalError::Scan("scanner already started".to_string()));
        }
        let (stop_tx, stop_rx) = oneshot::channel();
        let (payload_tx, payload_rx) = oneshot::channel();
        self.state_tx.send_replace(ScanState::Scanning);
        self.stop_tx = Some(stop_tx);
        self.payload_rx = Some(payload_rx);
        self.task = Some(tokio::spawn(sample(
            source,
            self.options,
            self.state_tx.clone(),
            stop_rx,
            payload_tx,
        )));
        Ok(())
    }

    /// 等待解码结果；停止或帧源耗尽时返回 None。结果只交付一次
    pub async fn decoded(&mut self) -> Option<String> {
        let receiver = self.payload_rx.take()?;
        receiver.await.ok()
    }

    /// 幂等；已解码时无效果
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            // 采样任务已结束时发送失败
            let _ = stop.send(());
        } else if self.state() == ScanState::Idle {
            self.state_tx.send_replace(ScanState::Stopped);
        }
    }

    /// 等待采样任务退出
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "scan task aborted");
            }
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Outcome {
    Decoded(String),
    Stopped,
}

async fn sample<S: FrameSource>(
    mut source: S,
    options: ScanOptions,
    state: watch::Sender<ScanState>,
    mut stop: oneshot::Receiver<()>,
    payload: oneshot::Sender<String>,
) {
    let mut ticker = interval(options.period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames = 0usize;

    let outcome = loop {
        tokio::select! {
            biased;
            // 显式停止或 Scanner 被丢弃
            _ = &mut stop => break Outcome::Stopped,
            _ = ticker.tick() => {
                let Some(frame) = source.next_frame().await else {
                    debug!(frames, "frame source exhausted");
                    break Outcome::Stopped;
                };
                frames += 1;
                let region = options.region;
                let decoded = tokio::task::spawn_blocking(move || {
                    decode_frame(&detection_region(&frame, region))
                })
                .await;
                match decoded {
                    Ok(Some(text)) => break Outcome::Decoded(text),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "frame decode task failed"),
                }
            }
        }
    };

    match outcome {
        Outcome::Decoded(text) => {
            info!(frames, "optical code decoded");
            state.send_replace(ScanState::Decoded);
            if payload.send(text).is_err() {
                debug!("scan result receiver dropped");
            }
        }
        Outcome::Stopped => {
            state.send_replace(ScanState::Stopped);
        }
    }

    if let Err(err) = source.release().await {
        warn!(error = %err, "failed to release frame source");
    }
}

/// 居中裁剪检测区域，帧小于区域时使用整帧
fn detection_region(frame: &GrayImage, region: Option<u32>) -> GrayImage {
    match region {
        Some(side) if frame.width() > side || frame.height() > side => {
            let width = side.min(frame.width());
            let height = side.min(frame.height());
            let x = (frame.width() - width) / 2;
            let y = (frame.height() - height) / 2;
            imageops::crop_imm(frame, x, y, width, height).to_image()
        }
        _ => frame.clone(),
    }
}

/// 尝试解码单帧，返回第一个可解码的二维码文本
pub fn decode_frame(frame: &GrayImage) -> Option<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        frame.width() as usize,
        frame.height() as usize,
        |x, y| frame.get_pixel(x as u32, y as u32).0[0],
    );
    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| grid.decode().ok().map(|(_, text)| text))
}
