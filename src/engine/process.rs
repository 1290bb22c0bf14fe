//! 以子进程方式运行的矿工引擎

use super::{EngineOutput, MinerEngine};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::debug;

const READ_BUFFER_SIZE: usize = 4096;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 停止时发送给子进程的信号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StopSignal {
    #[default]
    Sigint,
    Sigterm,
    Sigkill,
}

/// 子进程矿工引擎
///
/// 被执行的程序接收与原生引擎相同的参数（`argv[0]` 除外）。
#[derive(Debug)]
pub struct ProcessEngine {
    program: PathBuf,
    stop_signal: StopSignal,
    child: Mutex<Option<Child>>,
    /// 子进程启动前收到的停止请求
    stop_requested: AtomicBool,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            stop_signal: StopSignal::default(),
            child: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn with_stop_signal(mut self, stop_signal: StopSignal) -> Self {
        self.stop_signal = stop_signal;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn lock_child(&self) -> MutexGuard<'_, Option<Child>> {
        self.child
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 查找程序，裸文件名在 PATH 中搜索
    fn resolve_program(&self) -> Option<PathBuf> {
        if self.program.components().count() > 1 {
            return self.program.is_file().then(|| self.program.clone());
        }

        env::var_os("PATH").and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join(&self.program))
                .find(|candidate| candidate.is_file())
        })
    }

    /// 启动子进程，`argv[0]` 不传给程序
    fn spawn(&self, argv: &[String]) -> Result<Child, EngineError> {
        Command::new(&self.program)
            .args(argv.iter().skip(1))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Spawn {
                error: format!("{}: {}", self.program.display(), e),
            })
    }

    fn wait_for_exit(&self) -> io::Result<ExitStatus> {
        loop {
            {
                let mut guard = self.lock_child();
                let child = guard
                    .as_mut()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "miner process handle missing"))?;

                match child.try_wait() {
                    Ok(Some(status)) => {
                        guard.take();
                        return Ok(status);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        guard.take();
                        return Err(e);
                    }
                }
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl MinerEngine for ProcessEngine {
    fn prepare(&self) -> Result<(), EngineError> {
        self.stop_requested.store(false, Ordering::SeqCst);

        match self.resolve_program() {
            Some(path) => {
                debug!(target: "engine", "Using miner program {}", path.display());
                Ok(())
            }
            None => Err(EngineError::ProgramNotFound {
                path: self.program.clone(),
            }),
        }
    }

    fn run(&self, argv: &[String], output: EngineOutput) -> bool {
        let mut child = match self.spawn(argv) {
            Ok(child) => child,
            Err(e) => {
                crate::engine_error!("{}", e);
                output.write(format!("{}\n", e).as_str());
                return false;
            }
        };

        crate::engine_info!(pid = child.id(), "Miner process started");
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        {
            let mut guard = self.lock_child();
            let child = guard.insert(child);
            if self.stop_requested.load(Ordering::SeqCst) {
                if let Err(e) = signal_child(child, self.stop_signal) {
                    crate::engine_warn!("Failed to deliver pending stop: {}", e);
                }
            }
        }

        let stderr_pump = stderr.and_then(|stream| {
            let output = output.clone();
            thread::Builder::new()
                .name("miner-stderr".to_string())
                .spawn(move || pump(stream, &output))
                .map_err(|e| crate::engine_warn!("Failed to spawn stderr reader: {}", e))
                .ok()
        });

        if let Some(stream) = stdout {
            pump(stream, &output);
        }
        if let Some(handle) = stderr_pump {
            let _ = handle.join();
        }

        match self.wait_for_exit() {
            Ok(status) => {
                crate::engine_info!("Miner process exited: {}", status);
                status.success()
            }
            Err(e) => {
                crate::engine_error!("Failed to wait for miner process: {}", e);
                false
            }
        }
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);

        let mut guard = self.lock_child();
        match guard.as_mut() {
            Some(child) => {
                debug!(target: "engine", pid = child.id(), signal = ?self.stop_signal, "Stopping miner process");
                if let Err(e) = signal_child(child, self.stop_signal) {
                    crate::engine_warn!("Failed to stop miner process: {}", e);
                }
            }
            None => debug!(target: "engine", "Stop requested before miner process started"),
        }
    }
}

#[cfg(unix)]
fn signal_child(child: &mut Child, signal: StopSignal) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let signal = match signal {
        StopSignal::Sigint => Signal::SIGINT,
        StopSignal::Sigterm => Signal::SIGTERM,
        StopSignal::Sigkill => Signal::SIGKILL,
    };

    kill(Pid::from_raw(child.id() as libc::pid_t), signal)
        .map_err(|errno| io::Error::from_raw_os_error(errno as i32))
}

#[cfg(not(unix))]
fn signal_child(child: &mut Child, _signal: StopSignal) -> io::Result<()> {
    child.kill()
}

/// 把流中的字节转发到引擎输出
fn pump(mut stream: impl Read, output: &EngineOutput) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let mut pending = Vec::new();

    loop {
        match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buffer[..n]);
                let text = take_utf8(&mut pending);
                output.write(text.as_str());
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                crate::engine_warn!("Failed to read miner output: {}", e);
                break;
            }
        }
    }

    if !pending.is_empty() {
        output.write(String::from_utf8_lossy(&pending).as_ref());
    }
}

/// 取出可解码的前缀，末尾不完整的多字节序列留到下一次读取
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(error) if error.error_len().is_none() => error.valid_up_to(),
        Err(_) => pending.len(),
    };

    let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
    pending.drain(..valid);
    text
}
