//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `CopierConfig`，保证运行时行为可观测、可调整、可测试。
//! 字段覆盖下载、解码、编码、剪贴板写入四个阶段的上限与超时，以及并发写入策略。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的配置。
//! - `#[serde(default)]` 允许配置文件只写需要覆盖的字段。
//! - `validate` 统一做范围校验，加载文件与运行时替换配置都会经过它。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ImageCopyError;

/// 图片复制配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopierConfig {
    /// 下载时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 单次 HTTP 请求总超时（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时（秒）。
    pub connect_timeout: u64,
    /// 下载首包超时（毫秒）。
    pub stream_first_byte_timeout_ms: u64,
    /// 下载分块读取超时（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
    /// 是否接受 `data:image/...;base64,` 形式的地址。
    pub allow_data_urls: bool,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 解码阶段超时（毫秒）。
    pub decode_timeout_ms: u64,
    /// PNG 编码阶段超时（毫秒）。
    pub encode_timeout_ms: u64,
    /// 剪贴板写入超时（毫秒）。
    pub clipboard_timeout_ms: u64,
    /// 单次复制请求的总截止时间（毫秒），各阶段超时都不会超过剩余时间。
    pub request_deadline_ms: u64,
    /// 新请求发起后，旧请求是否放弃写入剪贴板。
    ///
    /// 关闭后写入仍串行执行，但每个请求都会写入（最后完成者生效）。
    pub supersede_stale_requests: bool,
}

impl Default for CopierConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            stream_first_byte_timeout_ms: 10_000,
            stream_chunk_timeout_ms: 15_000,
            max_redirects: 5,
            allow_data_urls: true,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            decode_timeout_ms: 15_000,
            encode_timeout_ms: 15_000,
            clipboard_timeout_ms: 5_000,
            request_deadline_ms: 60_000,
            supersede_stale_requests: true,
        }
    }
}

impl CopierConfig {
    /// 校验各字段取值范围。
    pub fn validate(&self) -> Result<(), ImageCopyError> {
        if self.max_file_size < 1024 {
            return Err(ImageCopyError::InvalidConfig("max_file_size 不能小于 1KB".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout) {
            return Err(ImageCopyError::InvalidConfig("connect_timeout 必须在 1~120 秒之间".to_string()));
        }
        if !(1..=600).contains(&self.download_timeout) {
            return Err(ImageCopyError::InvalidConfig("download_timeout 必须在 1~600 秒之间".to_string()));
        }
        if !(10..=120_000).contains(&self.stream_first_byte_timeout_ms) {
            return Err(ImageCopyError::InvalidConfig(
                "stream_first_byte_timeout_ms 必须在 10~120000 毫秒之间".to_string(),
            ));
        }
        if !(10..=120_000).contains(&self.stream_chunk_timeout_ms) {
            return Err(ImageCopyError::InvalidConfig(
                "stream_chunk_timeout_ms 必须在 10~120000 毫秒之间".to_string(),
            ));
        }
        if self.max_redirects > 20 {
            return Err(ImageCopyError::InvalidConfig("max_redirects 不能超过 20".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ImageCopyError::InvalidConfig("max_decoded_pixels 不能为 0".to_string()));
        }
        if self.max_decoded_bytes < 1024 * 1024 {
            return Err(ImageCopyError::InvalidConfig("max_decoded_bytes 不能小于 1MB".to_string()));
        }

        for (name, value) in [
            ("decode_timeout_ms", self.decode_timeout_ms),
            ("encode_timeout_ms", self.encode_timeout_ms),
            ("clipboard_timeout_ms", self.clipboard_timeout_ms),
        ] {
            if !(10..=300_000).contains(&value) {
                return Err(ImageCopyError::InvalidConfig(format!(
                    "{} 必须在 10~300000 毫秒之间",
                    name
                )));
            }
        }

        if !(10..=600_000).contains(&self.request_deadline_ms) {
            return Err(ImageCopyError::InvalidConfig(
                "request_deadline_ms 必须在 10~600000 毫秒之间".to_string(),
            ));
        }

        Ok(())
    }

    pub(crate) fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}
