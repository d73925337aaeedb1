//! # 格式识别
//!
//! 文件名后缀在请求边界处解析为 `ImageFormat`，流水线只按枚举分派。
//! 后缀匹配区分大小写：`photo.JPG` 视为不支持。

use std::fmt;

use serde::Serialize;

/// 复制链路可处理的源格式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// `.jpg` / `.jpeg`，需要重新编码为 PNG。
    Jpeg,
    /// `.png`，原样写入剪贴板。
    Png,
    /// 其他后缀（保存最后一个 `.` 之后的原始文本，没有 `.` 时为空串）。
    Unsupported(String),
}

impl ImageFormat {
    /// 根据声明的文件名解析格式。
    ///
    /// ```
    /// use image_clipboard_copier::image_copy::ImageFormat;
    ///
    /// assert_eq!(ImageFormat::from_declared_name("a.jpeg"), ImageFormat::Jpeg);
    /// assert_eq!(ImageFormat::from_declared_name("b.png"), ImageFormat::Png);
    /// assert_eq!(
    ///     ImageFormat::from_declared_name("c.gif"),
    ///     ImageFormat::Unsupported("gif".to_string())
    /// );
    /// ```
    pub fn from_declared_name(name: &str) -> Self {
        if name.ends_with(".jpg") || name.ends_with(".jpeg") {
            Self::Jpeg
        } else if name.ends_with(".png") {
            Self::Png
        } else {
            let suffix = name
                .rsplit_once('.')
                .map(|(_, suffix)| suffix)
                .unwrap_or_default();
            Self::Unsupported(suffix.to_string())
        }
    }

    /// 是否需要解码并重新编码为 PNG。
    pub fn needs_reencode(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    /// 声明格式对应的 MIME（不支持时为 `None`）。
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            Self::Jpeg => Some("image/jpeg"),
            Self::Png => Some("image/png"),
            Self::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => f.write_str("jpeg"),
            Self::Png => f.write_str("png"),
            Self::Unsupported(suffix) => write!(f, "unsupported({suffix})"),
        }
    }
}
