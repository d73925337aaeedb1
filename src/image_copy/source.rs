//! # 请求与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线中间结果”解耦：
//! - `ImageRequest` 表示一次用户点击产生的复制请求
//! - `RawImageBytes` 表示已下载但未处理的字节
//! - `ClipboardPayload` 表示可直接写入剪贴板的 PNG 数据
//!
//! `ClipboardPayload` 只能由流水线构造，从类型上保证写入剪贴板的永远是 `image/png`。

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use super::ImageFormat;

/// 剪贴板条目统一使用的 MIME 类型。
pub const CLIPBOARD_MIME_TYPE: &str = "image/png";

/// 一次复制请求。
///
/// 格式在边界处解析一次，后续阶段只读取 `format`，不再重复检查文件名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// 调用方给出的文件名，仅用于推断格式与日志。
    pub declared_name: String,
    /// 资源地址。
    pub url: String,
    /// 从文件名后缀解析出的格式。
    pub format: ImageFormat,
}

impl ImageRequest {
    pub fn new(declared_name: impl Into<String>, url: impl Into<String>) -> Self {
        let declared_name = declared_name.into();
        let format = ImageFormat::from_declared_name(&declared_name);
        Self {
            declared_name,
            url: url.into(),
            format,
        }
    }
}

/// 下载阶段输出：原始字节与来源标识。
#[derive(Debug, Clone)]
pub struct RawImageBytes {
    bytes: Bytes,
    source_hint: &'static str,
    sniffed_mime: Option<&'static str>,
}

impl RawImageBytes {
    /// 包装下载得到的字节，并通过文件签名嗅探真实类型（仅用于诊断）。
    pub fn new(bytes: impl Into<Bytes>, source_hint: &'static str) -> Self {
        let bytes = bytes.into();
        let sniffed_mime = infer::get(&bytes).map(|kind| kind.mime_type());
        Self {
            bytes,
            source_hint,
            sniffed_mime,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 来源提示（`http`、`data-url` 等）。
    pub fn source_hint(&self) -> &'static str {
        self.source_hint
    }

    /// 按 magic bytes 嗅探到的 MIME，无法识别时为 `None`。
    pub fn sniffed_mime(&self) -> Option<&'static str> {
        self.sniffed_mime
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// 写入剪贴板的数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardPayload {
    bytes: Bytes,
    width: Option<u32>,
    height: Option<u32>,
}

impl ClipboardPayload {
    /// 已是 PNG 的原始字节，原样透传。
    pub(crate) fn passthrough(bytes: Bytes) -> Self {
        Self {
            bytes,
            width: None,
            height: None,
        }
    }

    /// 流水线重新编码得到的 PNG。
    pub(crate) fn encoded(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes: Bytes::from(bytes),
            width: Some(width),
            height: Some(height),
        }
    }

    /// 恒为 `image/png`。
    pub fn mime_type(&self) -> &'static str {
        CLIPBOARD_MIME_TYPE
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 重新编码时记录的像素尺寸；透传的 PNG 不做解码，因此为 `None`。
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// 单次调用的状态机阶段。
///
/// `Idle → Fetching → {Decoding → Encoding} → Writing → {Succeeded | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStage {
    Idle,
    Fetching,
    Decoding,
    Encoding,
    Writing,
    Succeeded,
    Failed,
}

impl CopyStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Decoding => "decoding",
            Self::Encoding => "encoding",
            Self::Writing => "writing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for CopyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
