use std::sync::Arc;

use log::LevelFilter;

use crate::registry;
use crate::registry::Registry;
use crate::sink::CaptureSink;

/// One attach/detach lifecycle: installs a sink on one or more targets and
/// reinstates the saved handler lists and thresholds when dropped.
///
/// Dropping also runs on unwind, so a panicking test still detaches and a
/// nested scope always hands back exactly the state the outer scope had
/// established.
pub struct CaptureScope {
    sink: Arc<CaptureSink>,
    /// Prior state per touched target, in attach order.
    saved: Vec<SavedTarget>,
}

struct SavedTarget {
    target: Option<String>,
    sinks: Vec<Arc<CaptureSink>>,
    level: Option<LevelFilter>,
}

impl CaptureScope {
    /// Attaches `sink` to the named `targets`, or to the root target when
    /// `targets` is empty.
    pub fn begin<I, S>(sink: Arc<CaptureSink>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        let saved = registry::with_registry(|registry| {
            if targets.is_empty() {
                vec![attach(registry, None, &sink)]
            } else {
                targets
                    .iter()
                    .map(|target| attach(registry, Some(target.as_str()), &sink))
                    .collect()
            }
        });
        CaptureScope { sink, saved }
    }

    /// The sink this scope installed.
    pub fn sink(&self) -> &Arc<CaptureSink> {
        &self.sink
    }
}

fn attach(registry: &mut Registry, target: Option<&str>, sink: &Arc<CaptureSink>) -> SavedTarget {
    let state = registry.state_mut(target);
    let saved = SavedTarget {
        target: target.map(str::to_string),
        sinks: state.sinks.clone(),
        level: state.level,
    };
    state.sinks.push(sink.clone());
    if target.is_none() {
        // Open the root gate; the sink threshold does the final filtering.
        state.level = Some(LevelFilter::Trace);
    }
    saved
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        registry::with_registry(|registry| {
            // Reverse attach order unwinds overlapping scopes correctly.
            for saved in self.saved.drain(..).rev() {
                let state = registry.state_mut(saved.target.as_deref());
                state.sinks = saved.sinks;
                state.level = saved.level;
            }
        });
    }
}

/// Scoped severity override for either a capture sink or a named target.
///
/// Restores the saved value on drop. Guards on distinct targets are
/// independent; guards on the same target must be dropped in LIFO order to
/// land back on the original value, which Rust's drop order gives for free.
#[must_use = "the override ends when the guard is dropped"]
pub struct LevelGuard {
    restore: Restore,
}

enum Restore {
    Sink {
        sink: Arc<CaptureSink>,
        prior: LevelFilter,
    },
    Target {
        name: String,
        prior: Option<LevelFilter>,
    },
}

pub(crate) fn override_level(
    sink: &Arc<CaptureSink>,
    level: LevelFilter,
    target: Option<&str>,
) -> LevelGuard {
    let restore = match target {
        None => {
            let prior = sink.threshold();
            sink.set_threshold(level);
            Restore::Sink {
                sink: sink.clone(),
                prior,
            }
        }
        Some(name) => {
            let prior = registry::with_registry(|registry| {
                std::mem::replace(&mut registry.state_mut(Some(name)).level, Some(level))
            });
            Restore::Target {
                name: name.to_string(),
                prior,
            }
        }
    };
    LevelGuard { restore }
}

pub(crate) fn set_level(sink: &Arc<CaptureSink>, level: LevelFilter, target: Option<&str>) {
    match target {
        None => sink.set_threshold(level),
        Some(name) => registry::with_registry(|registry| {
            registry.state_mut(Some(name)).level = Some(level);
        }),
    }
}

impl Drop for LevelGuard {
    fn drop(&mut self) {
        match &self.restore {
            Restore::Sink { sink, prior } => sink.set_threshold(*prior),
            Restore::Target { name, prior } => registry::with_registry(|registry| {
                registry.state_mut(Some(name)).level = *prior;
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::with_registry;

    fn new_sink() -> Arc<CaptureSink> {
        Arc::new(CaptureSink::new(LevelFilter::Trace))
    }

    fn root_state() -> (Option<LevelFilter>, usize) {
        with_registry(|registry| {
            let state = registry.state_mut(None);
            (state.level, state.sinks.len())
        })
    }

    fn target_level(name: &str) -> Option<LevelFilter> {
        with_registry(|registry| registry.state_mut(Some(name)).level)
    }

    #[test]
    fn root_scope_saves_and_restores_level_and_sinks() {
        let (level_before, sinks_before) = root_state();
        {
            let _scope = CaptureScope::begin(new_sink(), Vec::<String>::new());
            let (level, sinks) = root_state();
            assert_eq!(level, Some(LevelFilter::Trace));
            assert_eq!(sinks, sinks_before + 1);
        }
        assert_eq!(root_state(), (level_before, sinks_before));
    }

    #[test]
    fn named_scope_leaves_the_target_level_alone() {
        {
            let _scope = CaptureScope::begin(new_sink(), ["scoped_named"]);
            assert_eq!(target_level("scoped_named"), None);
        }
        assert_eq!(target_level("scoped_named"), None);
    }

    #[test]
    fn nested_scopes_restore_the_outer_state() {
        let outer_sink = new_sink();
        let _outer = CaptureScope::begin(outer_sink.clone(), Vec::<String>::new());
        let (_, outer_count) = root_state();
        {
            let _inner = CaptureScope::begin(new_sink(), Vec::<String>::new());
            let (level, count) = root_state();
            assert_eq!(level, Some(LevelFilter::Trace));
            assert_eq!(count, outer_count + 1);
        }
        let (level, count) = root_state();
        assert_eq!(level, Some(LevelFilter::Trace));
        assert_eq!(count, outer_count);
    }

    #[test]
    fn scope_detaches_on_panic() {
        let (level_before, sinks_before) = root_state();
        let result = std::panic::catch_unwind(|| {
            let _scope = CaptureScope::begin(new_sink(), Vec::<String>::new());
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(root_state(), (level_before, sinks_before));
    }

    #[test]
    fn level_guards_on_the_same_target_restore_lifo() {
        let sink = new_sink();
        with_registry(|registry| {
            registry.state_mut(Some("lifo")).level = Some(LevelFilter::Warn);
        });
        {
            let _outer = override_level(&sink, LevelFilter::Info, Some("lifo"));
            assert_eq!(target_level("lifo"), Some(LevelFilter::Info));
            {
                let _inner = override_level(&sink, LevelFilter::Error, Some("lifo"));
                assert_eq!(target_level("lifo"), Some(LevelFilter::Error));
            }
            assert_eq!(target_level("lifo"), Some(LevelFilter::Info));
        }
        assert_eq!(target_level("lifo"), Some(LevelFilter::Warn));
    }

    #[test]
    fn sink_guard_restores_the_threshold() {
        let sink = new_sink();
        {
            let _guard = override_level(&sink, LevelFilter::Error, None);
            assert_eq!(sink.threshold(), LevelFilter::Error);
        }
        assert_eq!(sink.threshold(), LevelFilter::Trace);
    }

    #[test]
    fn guards_on_distinct_targets_are_independent() {
        let sink = new_sink();
        let outer = override_level(&sink, LevelFilter::Info, Some("left"));
        let inner = override_level(&sink, LevelFilter::Error, Some("right"));
        drop(outer);
        assert_eq!(target_level("left"), None);
        assert_eq!(target_level("right"), Some(LevelFilter::Error));
        drop(inner);
        assert_eq!(target_level("right"), None);
    }

    #[test]
    fn set_level_is_not_restored_by_guards() {
        let sink = new_sink();
        set_level(&sink, LevelFilter::Error, Some("permanent"));
        assert_eq!(target_level("permanent"), Some(LevelFilter::Error));
        set_level(&sink, LevelFilter::Warn, None);
        assert_eq!(sink.threshold(), LevelFilter::Warn);
    }
}
