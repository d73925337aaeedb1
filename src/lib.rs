//! # 图片复制到剪贴板：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │           调用方 (命令行 / 嵌入的 UI 事件处理器)          │
//! │                                                          │
//! │   copy(declared_name, url) ── cancel(request_id)         │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓ CopyOutcome (从不抛出错误)
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↓            后端 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (应用级错误)                    │
//! │  │                                                       │
//! │  ├─ settings ─── JSON 配置读取 + 校验                     │
//! │  │                                                       │
//! │  └─ image_copy   下载·解码·PNG 编码·写剪贴板             │
//! │      ├─ gate           写入代际令牌，丢弃过期请求         │
//! │      └─ service        请求 id → 取消令牌                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 应用级错误 `AppError`（配置、I/O） |
//! | [`settings`] | 从 JSON 文件加载 `CopierConfig` |
//! | [`image_copy`] | 图片复制流水线、超时与取消、剪贴板写入串行化 |

pub mod error;
pub mod image_copy;
pub mod settings;
