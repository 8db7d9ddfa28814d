use std::sync::Mutex;

use itertools::Itertools as _;
use log::LevelFilter;

use crate::record::CapturedRecord;

struct SinkState {
    records: Vec<CapturedRecord>,
    lines: Vec<String>,
    threshold: LevelFilter,
}

/// In-memory handler that stores every accepted record together with its
/// formatted rendering.
///
/// `records` and `lines` always have the same length. Both are updated under
/// a single lock per emission, so concurrent emitters cannot interleave a
/// record with another record's text.
pub struct CaptureSink {
    state: Mutex<SinkState>,
    echo: bool,
}

impl CaptureSink {
    pub fn new(threshold: LevelFilter) -> Self {
        Self::with_echo(threshold, false)
    }

    pub(crate) fn with_echo(threshold: LevelFilter, echo: bool) -> Self {
        CaptureSink {
            state: Mutex::new(SinkState {
                records: Vec::new(),
                lines: Vec::new(),
                threshold,
            }),
            echo,
        }
    }

    /// Stores `record` if it passes the sink threshold, otherwise does
    /// nothing.
    pub fn emit(&self, record: &CapturedRecord) {
        let mut state = self.state.lock().unwrap();
        if record.level > state.threshold {
            return;
        }
        let line = format!("{} {}: {}", record.level, record.name, record.message);
        if self.echo {
            eprintln!("{line}");
        }
        state.records.push(record.clone());
        state.lines.push(line);
    }

    /// The accumulated formatted text, one newline-joined line per stored
    /// record, in emission order.
    pub fn text(&self) -> String {
        self.state.lock().unwrap().lines.iter().join("\n")
    }

    /// The stored records in emission order.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.state.lock().unwrap().records.clone()
    }

    /// Drops all stored records and text. Attach state and threshold are
    /// kept.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.records.clear();
        state.lines.clear();
    }

    pub fn threshold(&self) -> LevelFilter {
        self.state.lock().unwrap().threshold
    }

    /// Changes the minimum accepted severity. Only affects subsequent
    /// emissions.
    pub fn set_threshold(&self, threshold: LevelFilter) {
        self.state.lock().unwrap().threshold = threshold;
    }
}
