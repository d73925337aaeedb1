//! # 剪贴板写入模块
//!
//! ## 设计思路
//!
//! 将与操作系统剪贴板交互的逻辑独立在 `ClipboardWriter` trait 之后，便于隔离平台不稳定因素，
//! 也让编排层可以在测试中注入内存实现。
//!
//! ## 实现思路
//!
//! `SystemClipboard` 基于 `arboard`：
//! - `arboard` 只接受 RGBA 像素，因此先把 PNG 负载解码为 RGBA，再由 `arboard` 按平台格式写入。
//! - 解码与写入都在阻塞线程中执行，避免阻塞 async 运行时。
//! - 写入失败不重试，直接上报 `ClipboardWrite`。
//!
//! X11/Wayland 下剪贴板内容由写入进程持有，进程退出后内容随之消失（除非有剪贴板管理器接管）。
//! 短生命周期的进程（命令行）使用 `retaining_for_handoff` 创建实例，退出前调用
//! `wait_for_handoff`：以同一张图片重新占有选区，直到其他程序接管或等待超时。

use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use image::{GenericImageView, ImageFormat};

use super::ImageCopyError;
use super::source::ClipboardPayload;

/// 写入系统剪贴板的能力。
#[async_trait]
pub trait ClipboardWriter: Send + Sync {
    /// 将 PNG 负载作为图片条目写入剪贴板。
    async fn write(&self, payload: ClipboardPayload) -> Result<(), ImageCopyError>;
}

#[derive(Debug)]
struct RetainedImage {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
}

/// 基于 `arboard` 的系统剪贴板实现。
#[derive(Debug, Default, Clone)]
pub struct SystemClipboard {
    retain_for_handoff: bool,
    retained: Arc<Mutex<Option<RetainedImage>>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入成功后保留最后一张图片的像素，供 [`wait_for_handoff`](Self::wait_for_handoff) 使用。
    pub fn retaining_for_handoff() -> Self {
        Self {
            retain_for_handoff: true,
            ..Self::default()
        }
    }

    /// 在阻塞线程中执行：PNG → RGBA → arboard。
    fn write_blocking(&self, payload: &ClipboardPayload) -> Result<(), ImageCopyError> {
        let decoded = image::load_from_memory_with_format(payload.bytes(), ImageFormat::Png)
            .map_err(|e| ImageCopyError::ClipboardWrite(format!("剪贴板负载不是有效 PNG：{}", e)))?;
        let (width, height) = decoded.dimensions();
        let rgba = decoded.into_rgba8();

        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| ImageCopyError::ClipboardWrite(format!("无法访问剪贴板：{}", e)))?;

        let image_data = arboard::ImageData {
            width: width as usize,
            height: height as usize,
            bytes: Cow::Borrowed(rgba.as_raw()),
        };

        clipboard
            .set_image(image_data)
            .map_err(|e| ImageCopyError::ClipboardWrite(format!("复制失败：{}", e)))?;

        self.retain(width as usize, height as usize, rgba.into_raw());
        Ok(())
    }

    fn retain(&self, width: usize, height: usize, rgba: Vec<u8>) {
        if !self.retain_for_handoff {
            return;
        }
        *self.retained.lock().unwrap_or_else(PoisonError::into_inner) = Some(RetainedImage {
            width,
            height,
            rgba,
        });
    }

    /// 阻塞等待其他程序接管剪贴板，最长 `max_wait`。
    ///
    /// 没有保留的图片时立即返回 `Ok(false)`；非 Linux 平台内容由系统持有，同样直接返回。
    pub fn wait_for_handoff(&self, max_wait: Duration) -> Result<bool, ImageCopyError> {
        let retained = self
            .retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(image) = retained else {
            return Ok(false);
        };

        Self::hold_selection(image, max_wait)?;
        Ok(true)
    }

    #[cfg(target_os = "linux")]
    fn hold_selection(image: RetainedImage, max_wait: Duration) -> Result<(), ImageCopyError> {
        use arboard::SetExtLinux;

        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| ImageCopyError::ClipboardWrite(format!("无法访问剪贴板：{}", e)))?;

        clipboard
            .set()
            .wait_until(std::time::Instant::now() + max_wait)
            .image(arboard::ImageData {
                width: image.width,
                height: image.height,
                bytes: Cow::Owned(image.rgba),
            })
            .map_err(|e| ImageCopyError::ClipboardWrite(format!("保持剪贴板所有权失败：{}", e)))
    }

    #[cfg(not(target_os = "linux"))]
    fn hold_selection(_image: RetainedImage, _max_wait: Duration) -> Result<(), ImageCopyError> {
        Ok(())
    }
}

#[async_trait]
impl ClipboardWriter for SystemClipboard {
    async fn write(&self, payload: ClipboardPayload) -> Result<(), ImageCopyError> {
        log::debug!(
            "📋 准备写入剪贴板 - {} {} bytes",
            payload.mime_type(),
            payload.len()
        );

        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write_blocking(&payload))
            .await
            .map_err(|e| ImageCopyError::ClipboardWrite(format!("线程执行失败：{}", e)))?
    }
}
