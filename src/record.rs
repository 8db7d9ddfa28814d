use std::fmt::Write as _;

use log::Level;

/// Message stored when rendering a log event fails.
pub(crate) const UNRENDERABLE_MESSAGE: &str = "<unrenderable log message>";

/// An owned snapshot of one emitted log event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapturedRecord {
    /// Target the event was emitted for, e.g. `my_crate::worker`.
    pub name: String,
    pub level: Level,
    /// The rendered message text.
    pub message: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl CapturedRecord {
    /// Snapshots a `log` record, rendering its message eagerly. The borrowed
    /// format arguments are invalid once the logging call returns.
    pub(crate) fn from_log(record: &log::Record<'_>) -> Self {
        let mut message = String::new();
        if write!(message, "{}", record.args()).is_err() {
            message = UNRENDERABLE_MESSAGE.to_string();
        }
        CapturedRecord {
            name: record.target().to_string(),
            level: record.level(),
            message,
            module_path: record.module_path().map(str::to_string),
            file: record.file().map(str::to_string),
            line: record.line(),
        }
    }

    /// The `(name, level, message)` triple for structural assertions that do
    /// not depend on formatting details.
    pub fn tuple(&self) -> (String, Level, String) {
        (self.name.clone(), self.level, self.message.clone())
    }
}
