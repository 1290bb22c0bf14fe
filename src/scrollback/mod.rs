//! 有界滚动日志缓冲区
//!
//! 保存矿工引擎输出的文本，按行数上限裁剪。每次追加都会生成一个不可变的
//! [`Snapshot`]，供渲染线程使用，生产者不会因渲染而阻塞。

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// 默认最大保留行数
pub const DEFAULT_MAX_LINES: usize = 200;

/// 行分隔符
const LINE_SEPARATOR: char = '\n';

/// 渲染用的不可变文本快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    text: Arc<str>,
    line_count: usize,
}

impl Snapshot {
    fn new(text: &str, line_count: usize) -> Self {
        Self {
            text: Arc::from(text),
            line_count,
        }
    }

    /// 快照文本
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 快照中的行分隔符数量
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new("", 0)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 有界滚动缓冲区
///
/// 不是线程安全的，跨线程使用请通过 [`SharedScrollback`]。
#[derive(Debug, Clone)]
pub struct ScrollbackBuffer {
    /// 保留的文本
    text: String,
    /// 当前保留的行分隔符数量
    line_count: usize,
    /// 最大行数
    max_lines: usize,
    /// 最近一次生成的快照
    snapshot: Snapshot,
}

impl ScrollbackBuffer {
    /// 创建新的滚动缓冲区
    pub fn new(max_lines: usize) -> Self {
        Self {
            text: String::new(),
            line_count: 0,
            max_lines,
            snapshot: Snapshot::default(),
        }
    }

    /// 追加文本并返回裁剪后的快照
    ///
    /// 空文本和 `None` 都不修改缓冲区，直接返回当前快照。
    pub fn append<'a>(&mut self, chunk: impl Into<Option<&'a str>>) -> Snapshot {
        let chunk = match chunk.into() {
            Some(chunk) if !chunk.is_empty() => chunk,
            _ => return self.snapshot.clone(),
        };

        self.text.push_str(chunk);
        self.line_count += chunk.matches(LINE_SEPARATOR).count();

        if self.line_count > self.max_lines {
            self.evict_oldest_lines(self.line_count - self.max_lines);
        }

        self.snapshot = Snapshot::new(&self.text, self.line_count);
        self.snapshot.clone()
    }

    /// 一次性丢弃最旧的 `count` 个完整行
    fn evict_oldest_lines(&mut self, count: usize) {
        let cut = self
            .text
            .match_indices(LINE_SEPARATOR)
            .nth(count - 1)
            .map(|(index, separator)| index + separator.len())
            .unwrap_or(self.text.len());

        self.text.drain(..cut);
        self.line_count -= count;
    }

    /// 当前快照
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// 清空缓冲区
    pub fn clear(&mut self) {
        self.text.clear();
        self.line_count = 0;
        self.snapshot = Snapshot::default();
    }
}

impl Default for ScrollbackBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

/// 跨线程共享的滚动缓冲区
#[derive(Debug, Clone, Default)]
pub struct SharedScrollback {
    inner: Arc<Mutex<ScrollbackBuffer>>,
}

impl SharedScrollback {
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScrollbackBuffer::new(max_lines))),
        }
    }

    /// 获取缓冲区锁，锁中毒时恢复内部数据
    pub fn lock(&self) -> MutexGuard<'_, ScrollbackBuffer> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append<'a>(&self, chunk: impl Into<Option<&'a str>>) -> Snapshot {
        self.lock().append(chunk)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
