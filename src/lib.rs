//! Scoped capture of `log` records and `tracing` events for test assertions.
//!
//! A [`LogCapture`] attaches an in-memory sink to the calling thread's
//! logging targets, restores the prior configuration when dropped, and lets
//! the test query what was emitted in between:
//!
//! ```
//! use log::Level;
//! use log::info;
//!
//! let capture = logtrap::LogCapture::start();
//! info!("boo {}", "arg");
//!
//! let records = capture.records();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].level, Level::Info);
//! assert_eq!(records[0].message, "boo arg");
//! assert!(capture.text().contains("boo arg"));
//! assert_eq!(capture.grep("b.. arg").unwrap().len(), 1);
//! ```
//!
//! Captures nest: an inner [`LogCapture`] or [`LogCapture::at_level`] guard
//! hands back exactly the configuration the outer scope had established,
//! on normal exit and on panic alike. Each thread captures independently,
//! so parallel tests do not interfere.

pub mod bridge;
pub mod capture;
pub mod error;
pub mod record;
pub mod registry;
pub mod scope;
pub mod sink;

pub use bridge::TracingCapture;
pub use capture::CaptureBuilder;
pub use capture::Grep;
pub use capture::LogCapture;
pub use error::InvalidPattern;
pub use record::CapturedRecord;
pub use registry::install;
pub use scope::CaptureScope;
pub use scope::LevelGuard;
pub use sink::CaptureSink;
