//! Model of the logging subsystem the capture engine attaches to: named
//! targets with severity thresholds and attached sinks, plus the
//! process-global `log` dispatcher feeding them.
//!
//! Each thread owns its own registry, so concurrently running tests never
//! observe each other's capture scopes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Once;

use log::LevelFilter;

use crate::record::CapturedRecord;
use crate::sink::CaptureSink;

/// Threshold of the root target before any capture scope overrides it.
pub(crate) const ROOT_DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

#[derive(Default)]
pub(crate) struct TargetState {
    /// `None` inherits the nearest ancestor threshold, ultimately the root.
    pub(crate) level: Option<LevelFilter>,
    /// Attached sinks in attach order.
    pub(crate) sinks: Vec<Arc<CaptureSink>>,
}

pub(crate) struct Registry {
    root: TargetState,
    named: HashMap<String, TargetState>,
}

impl Registry {
    fn new() -> Self {
        Registry {
            root: TargetState {
                level: Some(ROOT_DEFAULT_LEVEL),
                sinks: Vec::new(),
            },
            named: HashMap::new(),
        }
    }

    /// Resolves a target, `None` meaning the root. Named entries are created
    /// on demand so that restoring a since-removed target cannot fail.
    pub(crate) fn state_mut(&mut self, target: Option<&str>) -> &mut TargetState {
        match target {
            None => &mut self.root,
            Some(name) => self.named.entry(name.to_string()).or_default(),
        }
    }

    /// The threshold gating records emitted for `target`: its own if set,
    /// otherwise the nearest ancestor's, otherwise the root's.
    pub(crate) fn effective_level(&self, target: &str) -> LevelFilter {
        for name in ancestry(target) {
            if let Some(level) = self.named.get(name).and_then(|state| state.level) {
                return level;
            }
        }
        self.root.level.unwrap_or(ROOT_DEFAULT_LEVEL)
    }

    /// Routes a record to every sink attached on the path from its target up
    /// to the root. Each sink applies its own threshold on top; a sink
    /// attached at two points on the path receives the record twice.
    pub(crate) fn dispatch(&self, record: &CapturedRecord) {
        if record.level > self.effective_level(&record.name) {
            return;
        }
        for name in ancestry(&record.name) {
            if let Some(state) = self.named.get(name) {
                for sink in &state.sinks {
                    sink.emit(record);
                }
            }
        }
        for sink in &self.root.sinks {
            sink.emit(record);
        }
    }
}

/// Iterates a target and its ancestors: `a::b::c`, `a::b`, `a`.
fn ancestry(target: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(target);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.rfind("::").map(|idx| &current[..idx]);
        Some(current)
    })
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
}

/// Runs `f` on the calling thread's registry.
pub(crate) fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
}

struct CaptureDispatcher;

impl log::Log for CaptureDispatcher {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        with_registry(|registry| metadata.level() <= registry.effective_level(metadata.target()))
    }

    fn log(&self, record: &log::Record<'_>) {
        // Render before borrowing the registry; a Display impl inside the
        // format arguments may itself emit log events.
        let captured = CapturedRecord::from_log(record);
        with_registry(|registry| registry.dispatch(&captured));
    }

    fn flush(&self) {}
}

static DISPATCHER: CaptureDispatcher = CaptureDispatcher;
static INSTALL: Once = Once::new();

/// Installs the capture dispatcher as the process-wide `log` backend and
/// opens the global level gate. Idempotent. If another logger was installed
/// first it is left in place and capture through `log` stays inactive.
pub fn install() {
    INSTALL.call_once(|| {
        if log::set_logger(&DISPATCHER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}
