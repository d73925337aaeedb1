//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageClipboardCopier` 只负责流程编排与配置管理，具体能力分别委托给
//! `ImageFetcher`（下载）、`pipeline`（解码/编码）与 `ClipboardWriter`（写入）。
//! 处理链路固定为：
//! 1. 读取配置快照，领取写入令牌
//! 2. 按声明格式分派（不支持的格式直接失败，不发起下载）
//! 3. 下载原始字节
//! 4. JPEG：解码 → 以原始尺寸编码为 PNG；PNG：原样透传
//! 5. 通过写入闸门后写入剪贴板
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<CopierConfig>>` 支持运行时替换，单次请求使用同一快照。
//! - 每个阶段都受“阶段超时”与“请求剩余时间”中较小者约束，并与取消令牌竞争。
//! - 所有错误在此处被捕获并记录，调用方只拿到 `CopyOutcome`，不会收到 panic 或 `Err`。
//! - 写剪贴板在独立任务中执行并持有写入权；调用方超时/取消后，写入权直到底层写入结束才释放。
//! - 记录 `fetch/decode/encode/write/total` 阶段耗时，便于性能诊断。

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::clipboard_writer::{ClipboardWriter, SystemClipboard};
use super::fetcher::{HttpFetcher, ImageFetcher, redact_url_for_log};
use super::gate::{WriteGate, WriteTicket};
use super::pipeline;
use super::source::{CopyStage, ImageRequest};
use super::{CopierConfig, ImageCopyError, ImageFormat};

/// 成功复制后的诊断信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    /// 本次调用领取的写入令牌代数。
    pub generation: u64,
    pub format: ImageFormat,
    pub source_hint: &'static str,
    /// 写入剪贴板的 PNG 字节数。
    pub payload_bytes: usize,
    /// 重新编码时的像素尺寸；PNG 透传时为 `None`。
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fetch_ms: u64,
    pub decode_ms: u64,
    pub encode_ms: u64,
    pub write_ms: u64,
    pub total_ms: u64,
}

/// 单次复制调用的最终结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// 已写入剪贴板。
    Copied(CopyReport),
    /// 写入前已有更新的请求发起，本次放弃写入。
    Superseded { generation: u64 },
    /// 在某个阶段失败。
    ///
    /// 除 `Writing` 阶段的 `Timeout`/`Cancelled` 外，剪贴板未被本次调用修改；
    /// 这两种情况下底层写入可能仍在进行并最终生效。
    Failed(ImageCopyError),
}

impl CopyOutcome {
    pub fn is_copied(&self) -> bool {
        matches!(self, Self::Copied(_))
    }

    pub fn error(&self) -> Option<&ImageCopyError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&CopyReport> {
        match self {
            Self::Copied(report) => Some(report),
            _ => None,
        }
    }
}

/// 图片复制器。
///
/// 封装配置状态、下载器、剪贴板写入器与写入闸门，并编排完整流程。
/// 克隆开销很小，所有克隆共享同一个写入闸门。
#[derive(Clone)]
pub struct ImageClipboardCopier {
    config: Arc<RwLock<CopierConfig>>,
    fetcher: Arc<dyn ImageFetcher>,
    clipboard: Arc<dyn ClipboardWriter>,
    gate: Arc<WriteGate>,
}

impl ImageClipboardCopier {
    /// 使用 HTTP 下载器与系统剪贴板创建复制器。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_clipboard_copier::image_copy::{CopierConfig, ImageClipboardCopier};
    ///
    /// # async fn demo() -> Result<(), image_clipboard_copier::image_copy::ImageCopyError> {
    /// let copier = ImageClipboardCopier::new(CopierConfig::default())?;
    /// let outcome = copier.copy("photo.jpg", "https://example.com/photo.jpg").await;
    /// assert!(outcome.is_copied());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: CopierConfig) -> Result<Self, ImageCopyError> {
        Self::with_parts(config, Arc::new(HttpFetcher::new()), Arc::new(SystemClipboard::new()))
    }

    /// 注入自定义下载器与剪贴板写入器。
    pub fn with_parts(
        config: CopierConfig,
        fetcher: Arc<dyn ImageFetcher>,
        clipboard: Arc<dyn ClipboardWriter>,
    ) -> Result<Self, ImageCopyError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            fetcher,
            clipboard,
            gate: Arc::new(WriteGate::new()),
        })
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> CopierConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 校验并替换配置，已在途的请求不受影响。
    pub fn set_config(&self, config: CopierConfig) -> Result<(), ImageCopyError> {
        config.validate()?;

        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *current = config;

        log::info!(
            "⚙️ 已更新复制配置（deadline={}ms, supersede={}）",
            current.request_deadline_ms,
            current.supersede_stale_requests
        );
        Ok(())
    }

    /// 复制入口：按文件名推断格式，下载 `url` 并写入剪贴板。
    pub async fn copy(&self, declared_name: &str, url: &str) -> CopyOutcome {
        self.copy_with_cancel(declared_name, url, &CancellationToken::new())
            .await
    }

    /// 与 [`copy`](Self::copy) 相同，但可以通过 `cancel` 中途取消。
    pub async fn copy_with_cancel(
        &self,
        declared_name: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> CopyOutcome {
        self.copy_request(ImageRequest::new(declared_name, url), cancel)
            .await
    }

    pub async fn copy_request(&self, request: ImageRequest, cancel: &CancellationToken) -> CopyOutcome {
        let ticket = self.gate.issue();
        log::info!(
            "📥 复制请求 #{} - 文件: {} 格式: {} URL: {}",
            ticket.generation(),
            request.declared_name,
            request.format,
            redact_url_for_log(&request.url)
        );

        match self.run_pipeline(&request, ticket, cancel).await {
            Ok(Some(report)) => {
                log::info!(
                    "✅ 图片已复制 #{} - {} bytes fetch={}ms decode={}ms encode={}ms write={}ms total={}ms",
                    report.generation,
                    report.payload_bytes,
                    report.fetch_ms,
                    report.decode_ms,
                    report.encode_ms,
                    report.write_ms,
                    report.total_ms
                );
                CopyOutcome::Copied(report)
            }
            Ok(None) => {
                log::info!("⏭️ 复制请求 #{} 已被更新的请求取代", ticket.generation());
                CopyOutcome::Superseded {
                    generation: ticket.generation(),
                }
            }
            Err(err) => {
                log::error!(
                    "❌ 图片复制失败 #{} - 文件: {} 阶段: {} 错误: {}",
                    ticket.generation(),
                    request.declared_name,
                    err.stage(),
                    err
                );
                enter_stage(ticket, CopyStage::Failed);
                CopyOutcome::Failed(err)
            }
        }
    }

    /// 返回 `Ok(None)` 表示被取代。
    async fn run_pipeline(
        &self,
        request: &ImageRequest,
        ticket: WriteTicket,
        cancel: &CancellationToken,
    ) -> Result<Option<CopyReport>, ImageCopyError> {
        let config = self.config_snapshot();
        let deadline = Instant::now() + config.request_deadline();
        let total_start = Instant::now();

        if let ImageFormat::Unsupported(suffix) = &request.format {
            return Err(ImageCopyError::UnsupportedFormat(suffix.clone()));
        }
        let reencode = request.format.needs_reencode();

        enter_stage(ticket, CopyStage::Fetching);
        let fetch_start = Instant::now();
        let raw = run_stage(
            CopyStage::Fetching,
            config.download_timeout.saturating_mul(1000),
            deadline,
            cancel,
            self.fetcher.fetch(&request.url, &config, cancel),
        )
        .await?;
        let fetch_ms = elapsed_ms(fetch_start);
        let source_hint = raw.source_hint();

        let (payload, decode_ms, encode_ms) = if reencode {
            enter_stage(ticket, CopyStage::Decoding);
            let decode_start = Instant::now();
            let format = request.format.clone();
            let decode_config = config.clone();
            let decoded = run_stage(
                CopyStage::Decoding,
                config.decode_timeout_ms,
                deadline,
                cancel,
                run_blocking(CopyStage::Decoding, move || {
                    pipeline::decode_source(&raw, &format, &decode_config)
                }),
            )
            .await?;
            let decode_ms = elapsed_ms(decode_start);

            enter_stage(ticket, CopyStage::Encoding);
            let encode_start = Instant::now();
            let payload = run_stage(
                CopyStage::Encoding,
                config.encode_timeout_ms,
                deadline,
                cancel,
                run_blocking(CopyStage::Encoding, move || pipeline::encode_png(decoded)),
            )
            .await?;
            (payload, decode_ms, elapsed_ms(encode_start))
        } else {
            (pipeline::passthrough_png(raw), 0, 0)
        };

        enter_stage(ticket, CopyStage::Writing);
        let write_start = Instant::now();
        // 排队等待写入权只受请求截止时间约束
        let permit = run_stage(
            CopyStage::Writing,
            config.request_deadline_ms,
            deadline,
            cancel,
            async {
                Ok::<_, ImageCopyError>(
                    self.gate
                        .acquire(ticket, config.supersede_stale_requests)
                        .await,
                )
            },
        )
        .await?;
        let Some(permit) = permit else {
            return Ok(None);
        };

        let payload_bytes = payload.len();
        let dimensions = payload.dimensions();
        if cancel.is_cancelled() {
            return Err(ImageCopyError::Cancelled {
                stage: CopyStage::Writing,
            });
        }
        let clipboard = Arc::clone(&self.clipboard);
        let write_task = tokio::spawn(async move {
            let _permit = permit;
            clipboard.write(payload).await
        });
        let written = run_stage(
            CopyStage::Writing,
            config.clipboard_timeout_ms,
            deadline,
            cancel,
            async {
                write_task
                    .await
                    .map_err(|e| ImageCopyError::ClipboardWrite(format!("写入任务异常退出：{}", e)))?
            },
        )
        .await;
        if let Err(err @ (ImageCopyError::Timeout { .. } | ImageCopyError::Cancelled { .. })) = &written {
            log::warn!(
                "⚠️ #{} 已放弃等待剪贴板写入（{}），写入仍可能完成",
                ticket.generation(),
                err.code()
            );
        }
        written?;
        let write_ms = elapsed_ms(write_start);
        enter_stage(ticket, CopyStage::Succeeded);

        Ok(Some(CopyReport {
            generation: ticket.generation(),
            format: request.format.clone(),
            source_hint,
            payload_bytes,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            fetch_ms,
            decode_ms,
            encode_ms,
            write_ms,
            total_ms: elapsed_ms(total_start),
        }))
    }
}

/// 在阶段超时、请求截止时间与取消令牌的约束下执行一个阶段。
async fn run_stage<T, F>(
    stage: CopyStage,
    stage_timeout_ms: u64,
    deadline: Instant,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, ImageCopyError>
where
    F: Future<Output = Result<T, ImageCopyError>>,
{
    if cancel.is_cancelled() {
        return Err(ImageCopyError::Cancelled { stage });
    }

    let remaining = deadline.saturating_duration_since(Instant::now());
    let budget = Duration::from_millis(stage_timeout_ms).min(remaining);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ImageCopyError::Cancelled { stage }),
        result = tokio::time::timeout(budget, fut) => result.map_err(|_| ImageCopyError::Timeout {
            stage,
            timeout_ms: budget.as_millis() as u64,
        })?,
    }
}

/// 把同步的解码/编码放到阻塞线程池。
async fn run_blocking<T, F>(stage: CopyStage, f: F) -> Result<T, ImageCopyError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ImageCopyError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        let message = format!("线程执行失败：{}", e);
        match stage {
            CopyStage::Encoding => ImageCopyError::Encode(message),
            _ => ImageCopyError::Decode(message),
        }
    })?
}

fn enter_stage(ticket: WriteTicket, stage: CopyStage) {
    if stage.is_terminal() {
        log::debug!("🏁 #{} → {}", ticket.generation(), stage);
    } else {
        log::debug!("🔀 #{} → {}", ticket.generation(), stage);
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
