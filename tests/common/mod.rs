#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat as RasterFormat, Rgb, RgbImage, Rgba, RgbaImage};
use image_clipboard_copier::image_copy::{
    ClipboardPayload, ClipboardWriter, CopierConfig, ImageClipboardCopier, ImageCopyError,
    ImageFetcher, RawImageBytes,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// 假下载器对某个 URL 的行为。
#[derive(Clone)]
pub enum Route {
    Bytes(Vec<u8>),
    Fail(String),
    /// 永不返回，用于超时与取消。
    Hang { started: Arc<Notify> },
    /// 通知 `started` 后等待 `release` 再返回。
    Gated {
        started: Arc<Notify>,
        release: Arc<Notify>,
        bytes: Vec<u8>,
    },
}

#[derive(Default)]
pub struct FakeFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, route: Route) -> Self {
        self.routes
            .lock()
            .expect("routes lock poisoned")
            .insert(url.to_string(), route);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(
        &self,
        url: &str,
        _config: &CopierConfig,
        _cancel: &CancellationToken,
    ) -> Result<RawImageBytes, ImageCopyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let route = self
            .routes
            .lock()
            .expect("routes lock poisoned")
            .get(url)
            .cloned();

        match route {
            Some(Route::Bytes(bytes)) => Ok(RawImageBytes::new(bytes, "fake")),
            Some(Route::Fail(message)) => Err(ImageCopyError::Fetch(message)),
            Some(Route::Hang { started }) => {
                started.notify_one();
                std::future::pending().await
            }
            Some(Route::Gated {
                started,
                release,
                bytes,
            }) => {
                started.notify_one();
                release.notified().await;
                Ok(RawImageBytes::new(bytes, "fake"))
            }
            None => Err(ImageCopyError::Fetch(format!("HTTP 404: {}", url))),
        }
    }
}

/// 记录每次写入的剪贴板。
#[derive(Default)]
pub struct RecordingClipboard {
    writes: Mutex<Vec<ClipboardPayload>>,
    fail_with: Option<String>,
}

impl RecordingClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn writes(&self) -> Vec<ClipboardPayload> {
        self.writes.lock().expect("writes lock poisoned").clone()
    }

    pub fn last(&self) -> Option<ClipboardPayload> {
        self.writes().last().cloned()
    }
}

#[async_trait]
impl ClipboardWriter for RecordingClipboard {
    async fn write(&self, payload: ClipboardPayload) -> Result<(), ImageCopyError> {
        if let Some(message) = &self.fail_with {
            return Err(ImageCopyError::ClipboardWrite(message.clone()));
        }
        self.writes.lock().expect("writes lock poisoned").push(payload);
        Ok(())
    }
}

/// 在阻塞线程中睡眠后才记录写入，模拟慢速的系统剪贴板。
pub struct BlockingClipboard {
    delay: Duration,
    writes: Arc<Mutex<Vec<ClipboardPayload>>>,
}

impl BlockingClipboard {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn writes(&self) -> Vec<ClipboardPayload> {
        self.writes.lock().expect("writes lock poisoned").clone()
    }
}

#[async_trait]
impl ClipboardWriter for BlockingClipboard {
    async fn write(&self, payload: ClipboardPayload) -> Result<(), ImageCopyError> {
        let delay = self.delay;
        let writes = Arc::clone(&self.writes);
        tokio::task::spawn_blocking(move || {
            std::thread::sleep(delay);
            writes.lock().expect("writes lock poisoned").push(payload);
        })
        .await
        .map_err(|e| ImageCopyError::ClipboardWrite(e.to_string()))
    }
}

/// 永不完成的剪贴板，用于写入超时。
pub struct StuckClipboard;

#[async_trait]
impl ClipboardWriter for StuckClipboard {
    async fn write(&self, _payload: ClipboardPayload) -> Result<(), ImageCopyError> {
        std::future::pending().await
    }
}

pub fn copier(
    config: CopierConfig,
    fetcher: Arc<FakeFetcher>,
    clipboard: Arc<RecordingClipboard>,
) -> ImageClipboardCopier {
    ImageClipboardCopier::with_parts(config, fetcher, clipboard).expect("valid config")
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7) as u8, (y * 3) as u8, 200, 255])
    });
    encode(DynamicImage::ImageRgba8(image), RasterFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
    encode(DynamicImage::ImageRgb8(image), RasterFormat::Jpeg)
}

fn encode(image: DynamicImage, format: RasterFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode test image failed");
    buf
}

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
