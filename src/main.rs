//! # 图片复制到剪贴板：命令行入口
//!
//! 本文件仅负责日志初始化、参数解析与结果输出。
//! 业务逻辑位于 `image_copy` 模块，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use image_clipboard_copier::image_copy::{
    HttpFetcher, ImageClipboardCopier, ImageCopyError, ImageCopyService, SystemClipboard,
};
use image_clipboard_copier::image_copy::commands::{CopyCommandResult, copy_image};
use image_clipboard_copier::settings;

/// 下载一张 JPEG/PNG 图片并以 PNG 写入系统剪贴板
#[derive(Debug, Parser)]
#[command(name = "image-clipboard-copier", version, about)]
struct Cli {
    /// 声明的文件名，用于判断格式（如 photo.jpg、icon.png）
    declared_name: String,

    /// 图片地址（http/https 或 data:image/...;base64,）
    url: String,

    /// JSON 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 以 JSON 输出结果
    #[arg(long)]
    json: bool,

    /// 请求 id，用于日志关联
    #[arg(long, default_value = "cli")]
    request_id: String,

    /// 复制成功后最多等待多少秒让其他程序接管剪贴板（仅 Linux 生效，0 表示不等待）
    #[arg(long, default_value_t = 60)]
    hold_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match settings::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ 加载配置失败: {}", e);
            return ExitCode::from(2);
        }
    };

    let clipboard = Arc::new(SystemClipboard::retaining_for_handoff());
    let copier =
        ImageClipboardCopier::with_parts(config, Arc::new(HttpFetcher::new()), clipboard.clone());
    let service = match copier.map(ImageCopyService::with_copier) {
        Ok(service) => service,
        Err(e) => {
            log::error!("❌ 初始化复制服务失败: {}", e);
            return ExitCode::from(2);
        }
    };

    let result = copy_image(&service, &cli.request_id, &cli.declared_name, &cli.url).await;
    print_result(&result, cli.json);

    if result.is_failure() {
        return ExitCode::from(1);
    }

    if result.status == "copied" && cli.hold_secs > 0 {
        if let Err(e) = hold_clipboard(clipboard, Duration::from_secs(cli.hold_secs)).await {
            log::error!("❌ 剪贴板内容可能在退出后丢失: {}", e);
            return ExitCode::from(1);
        }
    }

    ExitCode::SUCCESS
}

/// 进程退出前保持剪贴板所有权，直到其他程序接管。
async fn hold_clipboard(
    clipboard: Arc<SystemClipboard>,
    max_wait: Duration,
) -> Result<(), ImageCopyError> {
    let held = tokio::task::spawn_blocking(move || {
        #[cfg(target_os = "linux")]
        log::info!("⏳ 等待其他程序接管剪贴板（最长 {}s）", max_wait.as_secs());
        clipboard.wait_for_handoff(max_wait)
    })
    .await
    .map_err(|e| ImageCopyError::ClipboardWrite(format!("线程执行失败：{}", e)))??;

    if held {
        log::debug!("🤝 剪贴板已交接或等待结束");
    }
    Ok(())
}

fn print_result(result: &CopyCommandResult, json: bool) {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{}", text),
            Err(e) => log::error!("❌ 序列化结果失败: {}", e),
        }
        return;
    }

    match result.code {
        Some(code) => eprintln!("[{}] {}", code, result.message),
        None => println!("{}", result.message),
    }
}
