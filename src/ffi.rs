//! 原生引擎的 C ABI 边界
//!
//! 原生矿工库通过 [`NativeEngineVTable`] 暴露 prepare/start/stop 三个入口，
//! 输出经 [`cuckatoo_panel_engine_output`] 回调进入会话。

use crate::engine::{EngineOutput, MinerEngine};
use crate::error::EngineError;
use libc::{c_char, c_int, c_void};
use std::ffi::{CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// prepare 成功返回码
pub const NATIVE_SUCCESS: c_int = 0;

/// 输出回调，`context` 原样传回，`chunk` 为 NUL 结尾的 UTF-8 文本，可以为空指针
pub type OutputCallback = unsafe extern "C" fn(context: *mut c_void, chunk: *const c_char);

/// 原生引擎函数表 (C 兼容)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeEngineVTable {
    /// 一次性准备，返回 0 表示成功
    pub prepare: unsafe extern "C" fn() -> c_int,
    /// 阻塞运行，`argv` 以空指针结尾
    pub start: unsafe extern "C" fn(
        argc: c_int,
        argv: *const *const c_char,
        callback: OutputCallback,
        context: *mut c_void,
    ) -> bool,
    /// 请求停止，可以从任意线程调用
    pub stop: unsafe extern "C" fn(),
}

/// 通过函数表驱动的原生引擎
#[derive(Debug, Clone, Copy)]
pub struct NativeEngine {
    vtable: NativeEngineVTable,
}

impl NativeEngine {
    /// 创建原生引擎
    ///
    /// # Safety
    /// 函数表中的函数必须可以从任意线程调用；`start` 返回后不得再使用
    /// 传入的 `context`，`stop` 必须能在 `start` 运行期间并发调用。
    pub unsafe fn new(vtable: NativeEngineVTable) -> Self {
        Self { vtable }
    }
}

impl MinerEngine for NativeEngine {
    fn prepare(&self) -> Result<(), EngineError> {
        let code = unsafe { (self.vtable.prepare)() };
        if code == NATIVE_SUCCESS {
            Ok(())
        } else {
            Err(EngineError::PrepareFailed {
                reason: format!("native prepare returned {}", code),
            })
        }
    }

    fn run(&self, argv: &[String], output: EngineOutput) -> bool {
        let args = match to_c_strings(argv) {
            Ok(args) => args,
            Err(e) => {
                crate::engine_error!("Cannot pass arguments to native engine: {}", e);
                return false;
            }
        };

        let argc = match c_int::try_from(args.len()) {
            Ok(argc) => argc,
            Err(_) => {
                crate::engine_error!("Too many arguments for native engine: {}", args.len());
                return false;
            }
        };

        let mut pointers: Vec<*const c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        pointers.push(ptr::null());

        // context 指向栈上的 output，start 返回前一直有效
        let context = &output as *const EngineOutput as *mut c_void;
        let success = unsafe {
            (self.vtable.start)(argc, pointers.as_ptr(), cuckatoo_panel_engine_output, context)
        };

        crate::engine_info!(success, "Native engine returned");
        success
    }

    fn stop(&self) {
        unsafe { (self.vtable.stop)() }
    }
}

/// 参数转换为 C 字符串，参数中不允许出现 NUL
fn to_c_strings(argv: &[String]) -> Result<Vec<CString>, EngineError> {
    argv.iter()
        .map(|arg| {
            CString::new(arg.as_str()).map_err(|e| EngineError::InvalidArgument {
                reason: format!("interior NUL at byte {}", e.nul_position()),
            })
        })
        .collect()
}

/// 原生引擎输出回调
///
/// 空指针文本不做任何操作，非法 UTF-8 按替换字符处理。
///
/// # Safety
/// `context` 必须是 [`NativeEngine`] 传给 `start` 的指针，且只能在 `start`
/// 返回前使用；`chunk` 为空或指向 NUL 结尾的字符串。
#[no_mangle]
pub unsafe extern "C" fn cuckatoo_panel_engine_output(context: *mut c_void, chunk: *const c_char) {
    if context.is_null() || chunk.is_null() {
        return;
    }

    let output = &*(context as *const EngineOutput);
    let text = CStr::from_ptr(chunk).to_string_lossy();

    // 不允许 panic 跨越 C 边界
    if panic::catch_unwind(AssertUnwindSafe(|| output.write(text.as_ref()))).is_err() {
        crate::engine_error!("Panic while handling native engine output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrollback::SharedScrollback;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
    use tokio::sync::broadcast;

    static START_CALLED: AtomicBool = AtomicBool::new(false);
    static RECEIVED_ARGC: AtomicI32 = AtomicI32::new(-1);

    unsafe extern "C" fn prepare_ok() -> c_int {
        NATIVE_SUCCESS
    }

    unsafe extern "C" fn prepare_fails() -> c_int {
        7
    }

    unsafe extern "C" fn start_echo(
        argc: c_int,
        argv: *const *const c_char,
        callback: OutputCallback,
        context: *mut c_void,
    ) -> bool {
        RECEIVED_ARGC.store(argc, Ordering::SeqCst);
        assert!((*argv.add(argc as usize)).is_null());

        for index in 0..argc as usize {
            callback(context, *argv.add(index));
            callback(context, b"\n\0".as_ptr() as *const c_char);
        }
        callback(context, ptr::null());
        callback(context, b"\xff\n\0".as_ptr() as *const c_char);
        true
    }

    unsafe extern "C" fn start_flagged(
        _argc: c_int,
        _argv: *const *const c_char,
        _callback: OutputCallback,
        _context: *mut c_void,
    ) -> bool {
        START_CALLED.store(true, Ordering::SeqCst);
        true
    }

    unsafe extern "C" fn stop_noop() {}

    fn output(max_lines: usize) -> EngineOutput {
        let (sender, _) = broadcast::channel(16);
        EngineOutput::new(SharedScrollback::new(max_lines), sender)
    }

    #[test]
    fn test_prepare_return_code() {
        let engine = unsafe {
            NativeEngine::new(NativeEngineVTable {
                prepare: prepare_fails,
                start: start_flagged,
                stop: stop_noop,
            })
        };

        match engine.prepare() {
            Err(EngineError::PrepareFailed { reason }) => assert!(reason.contains('7')),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_run_forwards_arguments_and_output() {
        let engine = unsafe {
            NativeEngine::new(NativeEngineVTable {
                prepare: prepare_ok,
                start: start_echo,
                stop: stop_noop,
            })
        };
        let output = output(10);

        assert!(engine.prepare().is_ok());
        let args = vec!["cuckatoo-panel".to_string(), "--lean_trimming".to_string()];
        assert!(engine.run(&args, output.clone()));

        assert_eq!(RECEIVED_ARGC.load(Ordering::SeqCst), 2);
        assert_eq!(
            output.snapshot().text(),
            "cuckatoo-panel\n--lean_trimming\n\u{fffd}\n"
        );
    }

    #[test]
    fn test_interior_nul_is_rejected_before_start() {
        let engine = unsafe {
            NativeEngine::new(NativeEngineVTable {
                prepare: prepare_ok,
                start: start_flagged,
                stop: stop_noop,
            })
        };

        let args = vec!["cuckatoo-panel".to_string(), "bad\0arg".to_string()];
        assert!(!engine.run(&args, output(10)));
        assert!(!START_CALLED.load(Ordering::SeqCst));
    }

    #[test]
    fn test_null_callback_arguments() {
        let output = output(10);
        let context = &output as *const EngineOutput as *mut c_void;

        unsafe {
            cuckatoo_panel_engine_output(ptr::null_mut(), b"lost\n\0".as_ptr() as *const c_char);
            cuckatoo_panel_engine_output(context, ptr::null());
        }

        assert!(output.snapshot().is_empty());
    }
}
