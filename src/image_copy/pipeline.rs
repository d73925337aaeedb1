//! # 解码与编码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → PNG”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸，按像素/内存上限快速拒绝
//! 2. 按内容嗅探格式完整解码（与浏览器 `<img>` 行为一致）
//! 3. 以原始宽高绘制到 RGBA 画布
//! 4. 以最高压缩档位编码为 PNG（无损，即“最高质量”）
//!
//! 这里的函数都是同步阻塞的，由编排层放到 `spawn_blocking` 中执行。

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, ImageReader};
use std::io::Cursor;

use super::source::{ClipboardPayload, RawImageBytes};
use super::{CopierConfig, ImageCopyError, ImageFormat};

/// 解码后的图像及其自然尺寸。
pub(crate) struct DecodedImage {
    pub(crate) image: DynamicImage,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// 将原始字节解码为图像。
pub(crate) fn decode_source(
    raw: &RawImageBytes,
    declared: &ImageFormat,
    config: &CopierConfig,
) -> Result<DecodedImage, ImageCopyError> {
    if raw.is_empty() {
        return Err(ImageCopyError::Decode("图片内容为空".to_string()));
    }

    let bytes = raw.bytes().as_ref();
    let detected = image::guess_format(bytes)
        .map_err(|e| ImageCopyError::Decode(format!("无法识别图片格式：{}", e)))?;

    if declared.mime_type() != Some(detected.to_mime_type()) {
        log::warn!(
            "⚠️ 声明格式与内容不一致 - 声明: {} 实际: {}",
            declared,
            detected.to_mime_type()
        );
    }

    let (header_width, header_height) = inspect_dimensions_from_memory(bytes)?;
    validate_pixel_limits(config, header_width, header_height)?;
    validate_decoded_memory_limits(config, header_width, header_height)?;

    let image = image::load_from_memory_with_format(bytes, detected)
        .map_err(|e| ImageCopyError::Decode(format!("图片解码失败：{}", e)))?;
    let (width, height) = image.dimensions();

    if width == 0 || height == 0 {
        return Err(ImageCopyError::Decode(format!("图片尺寸无效：{}x{}", width, height)));
    }

    log::info!(
        "✅ 图片解码成功 - 来源: {} 格式: {:?} 尺寸: {}x{}",
        raw.source_hint(),
        detected,
        width,
        height
    );

    Ok(DecodedImage {
        image,
        width,
        height,
    })
}

/// 以自然尺寸绘制到 RGBA 画布并编码为 PNG。
pub(crate) fn encode_png(decoded: DecodedImage) -> Result<ClipboardPayload, ImageCopyError> {
    let DecodedImage {
        image,
        width,
        height,
    } = decoded;

    let canvas = image.into_rgba8();
    if canvas.dimensions() != (width, height) {
        return Err(ImageCopyError::Encode("画布尺寸与解码尺寸不一致".to_string()));
    }

    let mut buf = Vec::new();
    PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
        .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| ImageCopyError::Encode(format!("PNG 编码失败：{}", e)))?;

    log::debug!("🧩 PNG 编码完成 - {}x{} {} bytes", width, height, buf.len());

    Ok(ClipboardPayload::encoded(buf, width, height))
}

/// 已是 PNG 的字节不做任何处理。
pub(crate) fn passthrough_png(raw: RawImageBytes) -> ClipboardPayload {
    if raw.sniffed_mime() != Some("image/png") {
        log::warn!(
            "⚠️ 声明为 PNG 的内容签名不符（{}），按原样写入",
            raw.sniffed_mime().unwrap_or("unknown")
        );
    }
    ClipboardPayload::passthrough(raw.into_bytes())
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ImageCopyError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageCopyError::Decode(format!("无法识别图片格式：{}", e)))?
        .into_dimensions()
        .map_err(|e| ImageCopyError::Decode(format!("无法读取图片尺寸：{}", e)))
}

/// 校验像素数量是否超过配置上限。
fn validate_pixel_limits(config: &CopierConfig, width: u32, height: u32) -> Result<(), ImageCopyError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ImageCopyError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ImageCopyError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn validate_decoded_memory_limits(
    config: &CopierConfig,
    width: u32,
    height: u32,
) -> Result<(), ImageCopyError> {
    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| ImageCopyError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(ImageCopyError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}
