//! Converts `tracing` events into captured records so a single capture
//! covers both logging facades.

use tracing::field::Field;
use tracing::field::Visit;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::record::CapturedRecord;
use crate::registry;

/// A `tracing` layer feeding events through the same per-thread dispatch as
/// `log` records, so capture scopes and thresholds apply uniformly.
///
/// ```
/// use tracing_subscriber::layer::SubscriberExt as _;
///
/// let capture = logtrap::LogCapture::start();
/// let subscriber = tracing_subscriber::registry().with(logtrap::TracingCapture);
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::warn!("tracing event");
/// });
/// assert!(capture.text().contains("tracing event"));
/// ```
pub struct TracingCapture;

impl<S> Layer<S> for TracingCapture
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        let record = CapturedRecord {
            name: metadata.target().to_string(),
            level: convert_level(*metadata.level()),
            message: visitor.message,
            module_path: metadata.module_path().map(str::to_string),
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
        };
        registry::with_registry(|registry| registry.dispatch(&record));
    }
}

/// Picks out the `message` field; other fields are formatting details the
/// capture does not preserve.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

fn convert_level(level: tracing::Level) -> log::Level {
    match level {
        tracing::Level::ERROR => log::Level::Error,
        tracing::Level::WARN => log::Level::Warn,
        tracing::Level::INFO => log::Level::Info,
        tracing::Level::DEBUG => log::Level::Debug,
        tracing::Level::TRACE => log::Level::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::CaptureScope;
    use crate::sink::CaptureSink;
    use log::LevelFilter;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt as _;

    #[test]
    fn events_route_through_the_thread_registry() {
        let sink = Arc::new(CaptureSink::new(LevelFilter::Trace));
        let _scope = CaptureScope::begin(sink.clone(), Vec::<String>::new());
        let subscriber = tracing_subscriber::registry().with(TracingCapture);
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "bridged", "failure {}", 7);
        });
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "bridged");
        assert_eq!(records[0].level, log::Level::Error);
        assert_eq!(records[0].message, "failure 7");
    }

    #[test]
    fn levels_map_one_to_one() {
        assert_eq!(convert_level(tracing::Level::ERROR), log::Level::Error);
        assert_eq!(convert_level(tracing::Level::WARN), log::Level::Warn);
        assert_eq!(convert_level(tracing::Level::INFO), log::Level::Info);
        assert_eq!(convert_level(tracing::Level::DEBUG), log::Level::Debug);
        assert_eq!(convert_level(tracing::Level::TRACE), log::Level::Trace);
    }

    #[test]
    fn target_thresholds_gate_bridged_events() {
        let sink = Arc::new(CaptureSink::new(LevelFilter::Trace));
        let _scope = CaptureScope::begin(sink.clone(), Vec::<String>::new());
        registry::with_registry(|registry| {
            registry.state_mut(Some("muted")).level = Some(LevelFilter::Error);
        });
        let subscriber = tracing_subscriber::registry().with(TracingCapture);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "muted", "dropped");
            tracing::error!(target: "muted", "kept");
        });
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "kept");
    }
}
