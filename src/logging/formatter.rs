//! 控制台日志格式化器

use chrono::{DateTime, Local};
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const GRAY: &str = "\x1b[90m";

/// 控制面板日志格式化器
///
/// 输出格式：`[时间] 级别 标签 消息`，标签按日志目标区分会话、引擎和设置。
pub struct PanelFormatter {
    /// 是否启用彩色输出
    colored: bool,
}

impl PanelFormatter {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    fn paint(&self, color: &'static str) -> &'static str {
        if self.colored {
            color
        } else {
            ""
        }
    }
}

/// 级别的简写和颜色
fn level_style(level: &tracing::Level) -> (&'static str, &'static str) {
    match *level {
        tracing::Level::ERROR => ("ERR", "\x1b[31m"), // 红色
        tracing::Level::WARN => ("WRN", "\x1b[33m"),  // 黄色
        tracing::Level::INFO => ("   ", "\x1b[32m"),  // 绿色，不显示INFO
        tracing::Level::DEBUG => ("DBG", "\x1b[36m"), // 青色
        tracing::Level::TRACE => ("TRC", "\x1b[37m"), // 白色
    }
}

/// 日志目标对应的标签和颜色，未知目标不显示标签
pub fn target_tag(target: &str) -> Option<(&'static str, &'static str)> {
    match target {
        "session" => Some(("SESSION", "\x1b[35m")),   // 紫色
        "engine" => Some(("ENGINE", "\x1b[34m")),     // 蓝色
        "settings" => Some(("SETTINGS", "\x1b[36m")), // 青色
        _ => None,
    }
}

impl<S, N> FormatEvent<S, N> for PanelFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let now: DateTime<Local> = Local::now();
        let timestamp = now.format("%H:%M:%S%.3f");

        let (level_str, level_color) = level_style(metadata.level());
        let reset = self.paint(RESET);

        write!(writer, "{}[{}]{} ", self.paint(GRAY), timestamp, reset)?;
        write!(writer, "{}{}{} ", self.paint(level_color), level_str, reset)?;

        if let Some((tag, color)) = target_tag(metadata.target()) {
            write!(writer, "{}{:<8}{} ", self.paint(color), tag, reset)?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// 格式化时间间隔
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();
    let days = total_seconds / 86400;
    let hours = (total_seconds % 86400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
