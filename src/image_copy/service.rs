//! # 服务层（可取消的复制请求）
//!
//! ## 设计思路
//!
//! `ImageCopyService` 在复制器之上维护 `request_id → CancellationToken` 映射，
//! 让调用方（UI、命令行）可以按请求 id 取消仍在进行中的复制。
//!
//! 请求结束（无论成功、失败还是被取代）或调用方丢弃 future 后，映射中的令牌都会被移除。
//! 令牌表锁中毒时直接恢复内部数据继续使用。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use super::{CopierConfig, CopyOutcome, ImageClipboardCopier, ImageCopyError};

struct InFlight {
    seq: u64,
    token: CancellationToken,
}

type InFlightMap = Mutex<HashMap<String, InFlight>>;

fn lock_in_flight(map: &InFlightMap) -> MutexGuard<'_, HashMap<String, InFlight>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 请求结束或调用方丢弃 future 时移除自己的登记项。
struct InFlightEntry<'a> {
    map: &'a InFlightMap,
    request_id: &'a str,
    seq: u64,
}

impl Drop for InFlightEntry<'_> {
    fn drop(&mut self) {
        let mut guard = lock_in_flight(self.map);
        if guard
            .get(self.request_id)
            .is_some_and(|current| current.seq == self.seq)
        {
            guard.remove(self.request_id);
        }
    }
}

/// 图片复制服务状态。
pub struct ImageCopyService {
    copier: ImageClipboardCopier,
    in_flight: Mutex<HashMap<String, InFlight>>,
    next_seq: AtomicU64,
}

impl ImageCopyService {
    /// 使用默认配置创建服务。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_clipboard_copier::image_copy::ImageCopyService;
    ///
    /// # async fn demo() -> Result<(), image_clipboard_copier::image_copy::ImageCopyError> {
    /// let service = ImageCopyService::new()?;
    /// let outcome = service.copy("req-1", "icon.png", "https://example.com/icon.png").await;
    /// println!("{:?}", outcome);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Result<Self, ImageCopyError> {
        Self::with_config(CopierConfig::default())
    }

    pub fn with_config(config: CopierConfig) -> Result<Self, ImageCopyError> {
        Ok(Self::with_copier(ImageClipboardCopier::new(config)?))
    }

    pub fn with_copier(copier: ImageClipboardCopier) -> Self {
        Self {
            copier,
            in_flight: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn copier(&self) -> &ImageClipboardCopier {
        &self.copier
    }

    /// 执行一次可取消的复制。
    ///
    /// 相同 `request_id` 的旧请求会被取消，由新请求接管该 id。
    pub async fn copy(&self, request_id: &str, declared_name: &str, url: &str) -> CopyOutcome {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        let previous = lock_in_flight(&self.in_flight).insert(
            request_id.to_string(),
            InFlight {
                seq,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            log::warn!("⚠️ 请求 id 重复：{}，取消旧请求", request_id);
            previous.token.cancel();
        }
        let _entry = InFlightEntry {
            map: &self.in_flight,
            request_id,
            seq,
        };

        self.copier
            .copy_with_cancel(declared_name, url, &token)
            .await
    }

    /// 取消进行中的请求；返回是否找到对应请求。
    pub fn cancel(&self, request_id: &str) -> bool {
        match lock_in_flight(&self.in_flight).get(request_id) {
            Some(entry) => {
                log::info!("🛑 取消复制请求：{}", request_id);
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// 当前进行中的请求数量。
    pub fn in_flight(&self) -> usize {
        lock_in_flight(&self.in_flight).len()
    }
}
