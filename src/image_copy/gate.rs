//! # 写入闸门
//!
//! 系统剪贴板是进程外共享资源，同一时刻只允许一个复制请求写入。
//!
//! 每次调用开始时领取递增的代数（generation）；写入前获取异步互斥锁，
//! 并确认自己仍是最新一代，否则以 `Superseded` 结束，不触碰剪贴板。
//!
//! 写入权是 `OwnedMutexGuard`，会被移入真正执行写入的任务中：
//! 调用方因超时或取消提前返回时，写入权一直保留到底层写入结束才释放。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// 一次调用持有的代数令牌。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteTicket(u64);

impl WriteTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub(crate) struct WriteGate {
    latest: AtomicU64,
    write_lock: Arc<Mutex<()>>,
}

impl WriteGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 领取新一代令牌，之前发出的令牌随即过期。
    pub(crate) fn issue(&self) -> WriteTicket {
        WriteTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn is_current(&self, ticket: WriteTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// 获取写入权。
    ///
    /// `supersede` 为真时，过期令牌返回 `None`；否则只做串行化。
    pub(crate) async fn acquire(
        &self,
        ticket: WriteTicket,
        supersede: bool,
    ) -> Option<OwnedMutexGuard<()>> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        if supersede && !self.is_current(ticket) {
            log::debug!(
                "⏭️ 令牌 #{} 已过期（最新 #{}），放弃写入",
                ticket.0,
                self.latest.load(Ordering::SeqCst)
            );
            return None;
        }
        Some(guard)
    }
}
