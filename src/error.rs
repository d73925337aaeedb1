//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 复制流水线内部的失败由 `ImageCopyError` 表达，并且永远以 `CopyOutcome` 的形式返回；
//! 这里的 `AppError` 只覆盖流水线之外的应用级失败：读取配置文件、解析配置、初始化复制器。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ImageCopyError`、`std::io::Error` 提供 `From` 转换，无需手动 map。

use crate::image_copy::ImageCopyError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 配置文件内容无效
    #[error("配置错误: {0}")]
    Config(String),

    /// 图片复制组件初始化或配置校验失败
    #[error("{0}")]
    Copy(#[from] ImageCopyError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),
}
