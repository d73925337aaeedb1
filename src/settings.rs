//! 配置文件读取
//!
//! 配置以 JSON 保存，字段与 `CopierConfig` 一致，缺省字段使用默认值。
//! 文件不存在时直接返回默认配置。

use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::image_copy::CopierConfig;

/// 读取并校验配置文件。
pub fn load_config(path: Option<&Path>) -> Result<CopierConfig, AppError> {
    let Some(path) = path else {
        return Ok(CopierConfig::default());
    };

    if !path.exists() {
        log::warn!("配置文件不存在，使用默认配置: {}", path.display());
        return Ok(CopierConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    log::info!("已加载配置文件: {}", path.display());
    Ok(config)
}

/// 解析 JSON 配置并做范围校验。
pub fn parse_config(content: &str) -> Result<CopierConfig, AppError> {
    let config = serde_json::from_str::<CopierConfig>(content)
        .map_err(|e| AppError::Config(format!("解析配置文件失败: {}", e)))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_copy::ImageCopyError;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config, CopierConfig::default());
    }

    #[test]
    fn nonexistent_file_yields_defaults() {
        let path = std::env::temp_dir().join("image-clipboard-copier-does-not-exist.json");
        let config = load_config(Some(&path)).expect("defaults should load");
        assert_eq!(config, CopierConfig::default());
    }

    #[test]
    fn reads_config_file_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "image-clipboard-copier-settings-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "clipboard_timeout_ms": 2500 }"#).expect("write temp config failed");

        let config = load_config(Some(&path)).expect("config should load");
        let _ = fs::remove_file(&path);

        assert_eq!(config.clipboard_timeout_ms, 2500);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(parse_config("{ not json"), Err(AppError::Config(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let result = parse_config(r#"{ "connect_timeout": 0 }"#);
        assert!(matches!(result, Err(AppError::Copy(ImageCopyError::InvalidConfig(_)))));
    }
}
