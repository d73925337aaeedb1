//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载复制链路中的所有失败来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 每个分支都能给出稳定的 `code()`（供命令层/前端分类）与 `stage()`（失败发生在哪个阶段）。

use super::source::CopyStage;

/// 图片复制链路统一错误类型。
///
/// 所有错误都在流水线边界被捕获并记录日志，最终以 `CopyOutcome::Failed` 交给调用方，
/// 不会以 panic 或 `Err` 的形式越过 `ImageClipboardCopier::copy`。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageCopyError {
    #[error("下载失败：{0}")]
    Fetch(String),

    #[error("不支持的图片格式：{0:?}")]
    UnsupportedFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("PNG 编码错误：{0}")]
    Encode(String),

    #[error("剪贴板写入失败：{0}")]
    ClipboardWrite(String),

    #[error("超时错误：{stage} 阶段超过 {timeout_ms}ms")]
    Timeout { stage: CopyStage, timeout_ms: u64 },

    #[error("已取消：在 {stage} 阶段被取消")]
    Cancelled { stage: CopyStage },

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("配置错误：{0}")]
    InvalidConfig(String),
}

impl ImageCopyError {
    /// 稳定错误码，供命令层输出。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "E_FETCH",
            Self::UnsupportedFormat(_) => "E_UNSUPPORTED_FORMAT",
            Self::Decode(_) => "E_DECODE",
            Self::Encode(_) => "E_ENCODE",
            Self::ClipboardWrite(_) => "E_CLIPBOARD_WRITE",
            Self::Timeout { .. } => "E_TIMEOUT",
            Self::Cancelled { .. } => "E_CANCELLED",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::InvalidConfig(_) => "E_INVALID_CONFIG",
        }
    }

    /// 错误所属阶段。
    ///
    /// 下载体积超限归入 `Fetch`，`ResourceLimit` 仅用于解码前的像素/内存上限。
    pub fn stage(&self) -> CopyStage {
        match self {
            Self::UnsupportedFormat(_) | Self::InvalidConfig(_) => CopyStage::Idle,
            Self::Fetch(_) => CopyStage::Fetching,
            Self::Decode(_) | Self::ResourceLimit(_) => CopyStage::Decoding,
            Self::Encode(_) => CopyStage::Encoding,
            Self::ClipboardWrite(_) => CopyStage::Writing,
            Self::Timeout { stage, .. } | Self::Cancelled { stage } => *stage,
        }
    }
}
