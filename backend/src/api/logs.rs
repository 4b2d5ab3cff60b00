//! Pipeline log broadcasting.
//!
//! Every pipeline stage reports through the helpers at the bottom of this
//! module. Entries go to stderr (stdout is reserved for CLI data output) and
//! are fanned out to Server-Sent Events subscribers of `GET /api/logs`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries kept for a slow SSE client before it starts lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Marker printed before the message on stderr.
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => "",
            LogLevel::Success => "✓ ",
            LogLevel::Warning => "⚠️ ",
            LogLevel::Error => "❌ ",
        }
    }
}

/// One pipeline progress message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting under the previous entry, e.g. per-block lines under a stage
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Line written to stderr.
    fn render(&self) -> String {
        format!(
            "{}{}{}",
            "   ".repeat(self.indent as usize + 1),
            self.level.marker(),
            self.message
        )
    }
}

/// Process-wide broadcaster shared by the pipeline and the SSE endpoint.
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Print an entry and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        eprintln!("{}", entry.render());
        // No receivers is fine.
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(level: LogLevel, msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(level, msg).with_indent(indent));
}

pub fn log_info(msg: impl Into<String>) {
    emit(LogLevel::Info, msg, 0);
}

pub fn log_success(msg: impl Into<String>) {
    emit(LogLevel::Success, msg, 0);
}

pub fn log_warning(msg: impl Into<String>) {
    emit(LogLevel::Warning, msg, 0);
}

pub fn log_error(msg: impl Into<String>) {
    emit(LogLevel::Error, msg, 0);
}

/// Per-block detail under a pipeline stage.
pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    emit(LogLevel::Info, msg, indent);
}

/// Conflicting master keys under the join stage.
pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    emit(LogLevel::Warning, msg, indent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_receives_entry() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::new(LogLevel::Warning, "3 records without management code").with_indent(1));

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.indent, 1);
        assert!(entry.message.contains("management code"));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let json = serde_json::to_value(LogEntry::new(LogLevel::Success, "done")).unwrap();
        assert_eq!(json["level"], "success");
        assert_eq!(json["indent"], 0);
    }

    #[test]
    fn test_render_nests_by_indent() {
        assert_eq!(LogEntry::new(LogLevel::Info, "Grid read").render(), "   Grid read");
        assert_eq!(
            LogEntry::new(LogLevel::Warning, "MC-404").with_indent(1).render(),
            "      ⚠️ MC-404"
        );
    }
}
