//! # 图片复制模块（image_copy）
//!
//! ## 设计思路
//!
//! 该模块将“格式识别 → 下载 → 解码/编码 → 写入剪贴板 → 命令输出”按职责拆分为多个子模块，
//! 避免单文件膨胀与耦合。
//!
//! - `commands`：仅做入参/出参适配（薄封装）
//! - `service`：请求 id 与取消令牌管理
//! - `handler`：编排整条处理流水线（超时、取消、阶段耗时）
//! - `fetcher`：HTTP / data URL 下载
//! - `pipeline`：解码、像素限制、PNG 编码
//! - `clipboard_writer`：写入系统剪贴板
//! - `gate`：剪贴板写入串行化与过期请求丢弃
//! - `config/error/format/source`：配置、错误、格式、中间数据模型
//!
//! ## 调用链
//!
//! ```text
//! 调用方（UI 点击 / 命令行）
//!    ↓
//! commands.rs（结果整形）
//!    ↓
//! service.rs（请求 id → 取消令牌）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ format.rs（文件名 → ImageFormat，一次解析）
//!    ├─ fetcher.rs（下载 + 体积/超时校验）
//!    ├─ pipeline.rs（解码 + 像素限制 + PNG 编码）
//!    ├─ gate.rs（领取令牌 / 获取写入权）
//!    └─ clipboard_writer.rs（写剪贴板）
//!    ↓
//! CopyOutcome 返回调用方
//! ```

pub mod commands;
mod clipboard_writer;
mod config;
mod error;
mod fetcher;
mod format;
mod gate;
mod handler;
mod pipeline;
mod service;
mod source;

pub use clipboard_writer::{ClipboardWriter, SystemClipboard};
pub use config::CopierConfig;
pub use error::ImageCopyError;
pub use fetcher::{HttpFetcher, ImageFetcher};
pub use format::ImageFormat;
pub use gate::WriteTicket;
pub use handler::{CopyOutcome, CopyReport, ImageClipboardCopier};
pub use service::ImageCopyService;
pub use source::{CLIPBOARD_MIME_TYPE, ClipboardPayload, CopyStage, ImageRequest, RawImageBytes};
