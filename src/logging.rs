use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Operator log: JSON lines appended under `<state-root>/logs/bot.log`.
/// Logging never interferes with command handling, so failures here are
/// swallowed.
#[derive(Debug, Clone)]
pub struct BotLog {
    state_root: PathBuf,
}

impl BotLog {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn info(&self, event: &str, message: &str) {
        self.append("info", event, message);
    }

    pub fn warn(&self, event: &str, message: &str) {
        self.append("warn", event, message);
    }

    pub fn error(&self, event: &str, message: &str) {
        self.append("error", event, message);
    }

    fn log_path(&self) -> PathBuf {
        self.state_root.join("logs/bot.log")
    }

    fn append(&self, level: &str, event: &str, message: &str) {
        let payload = serde_json::json!({
            "timestamp": now_secs(),
            "level": level,
            "event": event,
            "message": message,
        });
        let Ok(line) = serde_json::to_string(&payload) else {
            return;
        };

        let path = self.log_path();
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
            return;
        };
        let _ = writeln!(file, "{line}");
    }
}

pub fn bot_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/bot.log")
}
