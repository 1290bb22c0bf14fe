//! 外部矿工引擎边界
//!
//! 引擎是不透明的协作者，只暴露 prepare → run → stop 的生命周期，
//! 以及一条单向的文本输出通道 [`EngineOutput`]。

pub mod process;

use crate::error::EngineError;
use crate::scrollback::{SharedScrollback, Snapshot};
use crate::session::SessionEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

pub use process::{ProcessEngine, StopSignal};

/// 矿工引擎特征
pub trait MinerEngine: Send + Sync {
    /// 运行前的一次性准备
    fn prepare(&self) -> Result<(), EngineError>;

    /// 阻塞运行整个挖矿会话，`argv[0]` 只是进程标识
    ///
    /// 返回值仅供日志使用，正常结束和被停止在会话层不做区分。
    fn run(&self, argv: &[String], output: EngineOutput) -> bool;

    /// 异步停止信号，效果只能通过 `run` 返回观察到
    fn stop(&self);
}

/// 引擎输出句柄
///
/// 可以从任意线程调用，多个调用方之间由缓冲区锁串行化。
#[derive(Debug, Clone)]
pub struct EngineOutput {
    scrollback: SharedScrollback,
    event_sender: broadcast::Sender<SessionEvent>,
}

impl EngineOutput {
    pub fn new(scrollback: SharedScrollback, event_sender: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            scrollback,
            event_sender,
        }
    }

    /// 写入一段输出文本，`None` 和空文本被忽略
    pub fn write<'a>(&self, chunk: impl Into<Option<&'a str>>) -> Snapshot {
        let chunk = match chunk.into() {
            Some(chunk) if !chunk.is_empty() => chunk,
            _ => return self.scrollback.snapshot(),
        };

        let mut buffer = self.scrollback.lock();
        let snapshot = buffer.append(chunk);
        trace!(target: "engine", bytes = chunk.len(), lines = snapshot.line_count(), "Engine output");

        // 持锁发布，快照顺序与追加顺序一致
        let _ = self.event_sender.send(SessionEvent::Output {
            chunk: Arc::from(chunk),
            snapshot: snapshot.clone(),
        });

        snapshot
    }

    pub fn snapshot(&self) -> Snapshot {
        self.scrollback.snapshot()
    }
}
