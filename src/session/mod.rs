//! 矿工会话 - 启动/停止状态机
//!
//! 会话在控制线程上同步执行引擎的 prepare，然后在专用后台线程上执行阻塞的
//! run。引擎输出经 [`EngineOutput`] 进入滚动缓冲区，状态变更和快照通过
//! `broadcast` 通道发布给展示层。


use crate::config::SessionConfig;
use crate::engine::{EngineOutput, MinerEngine};
use crate::error::{EngineError, SessionError};
use crate::mining::{build_arguments, masked_arguments, MinerConnectionConfig};
use crate::scrollback::{SharedScrollback, Snapshot, DEFAULT_MAX_LINES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// 默认进程标识 (argv[0])
pub const DEFAULT_PROCESS_NAME: &str = "cuckatoo-panel";

/// 默认事件通道容量
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// 空闲
    Idle,
    /// 正在准备引擎
    Preparing,
    /// 引擎运行中
    Running,
    /// 已发出停止信号，等待引擎返回
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Preparing => "preparing",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// 会话事件
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// 状态变更
    StateChanged {
        old_state: SessionState,
        new_state: SessionState,
        timestamp: SystemTime,
    },
    /// 引擎输出，附带追加后的快照
    Output { chunk: Arc<str>, snapshot: Snapshot },
    /// 引擎准备失败
    PrepareFailed { reason: String },
    /// 后台运行结束
    RunFinished { run_id: Uuid, success: bool },
}

/// 会话选项
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub process_name: String,
    pub max_lines: usize,
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            max_lines: DEFAULT_MAX_LINES,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            process_name: config.process_name.clone(),
            max_lines: config.max_lines,
            event_capacity: config.event_capacity,
        }
    }
}

/// 矿工会话
pub struct MinerSession {
    /// 外部引擎
    engine: Arc<dyn MinerEngine>,
    /// 会话选项
    options: SessionOptions,
    /// 会话状态
    state: Arc<Mutex<SessionState>>,
    /// 回到 Idle 时通知
    idle: Arc<Condvar>,
    /// 引擎输出通道
    output: EngineOutput,
    /// 事件广播
    event_sender: broadcast::Sender<SessionEvent>,
    /// 后台运行线程句柄
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MinerSession {
    /// 创建新的矿工会话
    pub fn new(engine: Arc<dyn MinerEngine>, options: SessionOptions) -> Self {
        let (event_sender, _) = broadcast::channel(options.event_capacity.max(1));
        let output = EngineOutput::new(SharedScrollback::new(options.max_lines), event_sender.clone());

        Self {
            engine,
            options,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            idle: Arc::new(Condvar::new()),
            output,
            event_sender,
            worker: Mutex::new(None),
        }
    }

    /// 请求启动
    ///
    /// 只有在 `Idle` 状态下才会被接受。prepare 在调用线程上同步完成，
    /// run 总是在后台线程上执行。返回本次运行的标识。
    pub fn request_start(&self, config: &MinerConnectionConfig) -> Result<Uuid, SessionError> {
        transition(&self.state, &self.event_sender, "start", SessionState::Idle, SessionState::Preparing)?;

        // 回收上一次已结束的后台线程
        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }

        if let Err(e) = self.engine.prepare() {
            let reason = match e {
                EngineError::PrepareFailed { reason } => reason,
                other => other.to_string(),
            };
            crate::session_error!("Engine prepare failed: {}", reason);
            self.force_state(SessionState::Idle);
            send_event(&self.event_sender, SessionEvent::PrepareFailed { reason: reason.clone() });
            return Err(SessionError::PrepareFailed { reason });
        }

        let argv = build_arguments(&self.options.process_name, config);
        let run_id = Uuid::new_v4();
        crate::session_info!(%run_id, args = ?masked_arguments(&argv), "Starting miner");

        self.force_state(SessionState::Running);

        let engine = self.engine.clone();
        let output = self.output.clone();
        let state = self.state.clone();
        let idle = self.idle.clone();
        let event_sender = self.event_sender.clone();

        // 持有 worker 锁直到句柄存入，wait_idle 不会看到空槽
        let mut worker = lock(&self.worker);
        let spawned = thread::Builder::new()
            .name("miner-run".to_string())
            .spawn(move || {
                let success = panic::catch_unwind(AssertUnwindSafe(|| engine.run(&argv, output)))
                    .unwrap_or_else(|_| {
                        crate::session_error!(%run_id, "Miner engine panicked");
                        false
                    });

                finish_run(&state, &idle, &event_sender);
                crate::session_info!(%run_id, success, "Miner run finished");
                send_event(&event_sender, SessionEvent::RunFinished { run_id, success });
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(run_id)
            }
            Err(e) => {
                drop(worker);
                crate::session_error!("Failed to spawn miner worker: {}", e);
                self.force_state(SessionState::Idle);
                Err(SessionError::WorkerSpawnFailed {
                    error: e.to_string(),
                })
            }
        }
    }

    /// 请求停止
    ///
    /// 只有在 `Running` 状态下才会被接受。停止是异步的，会话在后台运行
    /// 返回后才回到 `Idle`。
    pub fn request_stop(&self) -> Result<(), SessionError> {
        transition(&self.state, &self.event_sender, "stop", SessionState::Running, SessionState::Stopping)?;

        crate::session_info!("Stopping miner");
        self.engine.stop();
        Ok(())
    }

    /// 引擎输出回调，可以从任意线程调用
    pub fn on_engine_output<'a>(&self, chunk: impl Into<Option<&'a str>>) -> Snapshot {
        self.output.write(chunk)
    }

    /// 引擎输出句柄
    pub fn output(&self) -> EngineOutput {
        self.output.clone()
    }

    /// 当前状态
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn is_idle(&self) -> bool {
        self.state() == SessionState::Idle
    }

    /// 当前滚动缓冲区快照
    pub fn snapshot(&self) -> Snapshot {
        self.output.snapshot()
    }

    /// 订阅会话事件
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// 等待会话回到 Idle 并回收后台线程，没有超时
    ///
    /// 可以从多个线程同时调用，每个调用方都在状态回到 Idle 之后才返回。
    pub fn wait_idle(&self) {
        // 仍持有 Idle 状态时取走句柄，取到的只会是已经结束的运行
        let handle = {
            let mut current = lock(&self.state);
            while *current != SessionState::Idle {
                current = self
                    .idle
                    .wait(current)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            lock(&self.worker).take()
        };

        if let Some(handle) = handle {
            if handle.join().is_err() {
                crate::session_warn!("Miner worker terminated abnormally");
            }
        }
    }

    fn force_state(&self, new_state: SessionState) {
        let mut current = lock(&self.state);
        let old_state = std::mem::replace(&mut *current, new_state);
        state_changed(&self.event_sender, old_state, new_state);
        if new_state == SessionState::Idle {
            self.idle.notify_all();
        }
    }
}

impl fmt::Debug for MinerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinerSession")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

/// 在同一把锁下检查并变更状态
///
/// 状态事件在持锁期间发布，订阅者看到的顺序与实际变更顺序一致。
fn transition(
    state: &Mutex<SessionState>,
    event_sender: &broadcast::Sender<SessionEvent>,
    operation: &'static str,
    expected: SessionState,
    new_state: SessionState,
) -> Result<(), SessionError> {
    let mut current = lock(state);
    if *current != expected {
        crate::session_warn!("Rejected {} while {}", operation, *current);
        return Err(SessionError::InvalidState {
            operation,
            state: *current,
        });
    }

    *current = new_state;
    state_changed(event_sender, expected, new_state);
    Ok(())
}

/// 后台运行返回后回到 Idle，不区分正常结束与被停止
fn finish_run(
    state: &Mutex<SessionState>,
    idle: &Condvar,
    event_sender: &broadcast::Sender<SessionEvent>,
) {
    let mut current = lock(state);
    let old_state = std::mem::replace(&mut *current, SessionState::Idle);
    state_changed(event_sender, old_state, SessionState::Idle);
    idle.notify_all();
}

fn state_changed(
    event_sender: &broadcast::Sender<SessionEvent>,
    old_state: SessionState,
    new_state: SessionState,
) {
    debug!(target: "session", "State changed: {} -> {}", old_state, new_state);
    send_event(
        event_sender,
        SessionEvent::StateChanged {
            old_state,
            new_state,
            timestamp: SystemTime::now(),
        },
    );
}

fn send_event(event_sender: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = event_sender.send(event) {
        debug!(target: "session", "No subscribers for session event: {}", e);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
