use std::borrow::Cow;
use std::sync::Arc;

use log::Level;
use log::LevelFilter;
use regex::Regex;

use crate::error::InvalidPattern;
use crate::record::CapturedRecord;
use crate::registry;
use crate::scope;
use crate::scope::CaptureScope;
use crate::scope::LevelGuard;
use crate::sink::CaptureSink;

/// Test-facing facade over one capture scope: queries over the captured
/// records plus the controlled level mutation surface.
///
/// Dropping the capture detaches the sink and restores the prior logging
/// configuration.
pub struct LogCapture {
    scope: CaptureScope,
}

impl LogCapture {
    /// Begins capturing on the root target, accepting every severity.
    pub fn start() -> Self {
        Self::builder().start()
    }

    pub fn builder() -> CaptureBuilder {
        CaptureBuilder::new()
    }

    /// The underlying shared sink. Clone the `Arc` to emit or query from
    /// another thread.
    pub fn sink(&self) -> &Arc<CaptureSink> {
        self.scope.sink()
    }

    /// The full formatted log text in emission order.
    pub fn text(&self) -> String {
        self.sink().text()
    }

    /// The captured records in emission order.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.sink().records()
    }

    /// `(name, level, message)` triples in emission order, for structural
    /// equality assertions.
    pub fn record_tuples(&self) -> Vec<(String, Level, String)> {
        self.records().iter().map(CapturedRecord::tuple).collect()
    }

    /// Drops everything captured so far.
    pub fn clear(&self) {
        self.sink().clear();
    }

    /// Changes the sink threshold, or the threshold of the named `target`
    /// when one is given. Permanent until changed again; the capture scope
    /// teardown only restores the targets it attached to.
    pub fn set_level(&self, level: LevelFilter, target: Option<&str>) {
        scope::set_level(self.sink(), level, target);
    }

    /// Like [`LogCapture::set_level`], but scoped: the returned guard
    /// restores the previous threshold when dropped, on any exit path.
    /// Guards nest; same-target guards restore in LIFO order.
    pub fn at_level(&self, level: LevelFilter, target: Option<&str>) -> LevelGuard {
        scope::override_level(self.sink(), level, target)
    }

    /// Finds captured records whose message contains a match for the query
    /// pattern, optionally narrowed to one level and one target name.
    ///
    /// Results keep emission order. No match yields an empty vector; an
    /// unparseable pattern string is an error.
    ///
    /// ```
    /// use log::Level;
    /// use log::error;
    /// use log::info;
    /// use logtrap::Grep;
    ///
    /// let capture = logtrap::LogCapture::start();
    /// info!("foo");
    /// info!("bar");
    /// error!("moo");
    ///
    /// let found = capture.grep(".*oo").unwrap();
    /// assert_eq!(found.len(), 2);
    /// let found = capture.grep(Grep::new(".*oo").level(Level::Info)).unwrap();
    /// assert_eq!(found.len(), 1);
    /// assert!(capture.grep("unobtainium").unwrap().is_empty());
    /// ```
    pub fn grep(&self, query: impl Into<Grep>) -> Result<Vec<CapturedRecord>, InvalidPattern> {
        let Grep {
            pattern,
            level,
            name,
        } = query.into();
        let regex = pattern.compile()?;
        // Conjunctive predicate list, the always-present pattern check first.
        let mut predicates: Vec<Box<dyn Fn(&CapturedRecord) -> bool + '_>> =
            vec![Box::new(|record| regex.is_match(&record.message))];
        if let Some(level) = level {
            predicates.push(Box::new(move |record| record.level == level));
        }
        if let Some(name) = name {
            predicates.push(Box::new(move |record| record.name == name));
        }
        Ok(self
            .records()
            .into_iter()
            .filter(|record| predicates.iter().all(|predicate| predicate(record)))
            .collect())
    }
}

/// A [`LogCapture::grep`] query: a message pattern plus optional level and
/// target-name constraints. Converts from a pattern string or a precompiled
/// [`Regex`]; both forms behave identically.
pub struct Grep {
    pattern: Pattern,
    level: Option<Level>,
    name: Option<String>,
}

enum Pattern {
    Text(String),
    Compiled(Regex),
}

impl Grep {
    pub fn new(pattern: impl Into<Grep>) -> Self {
        pattern.into()
    }

    /// Only match records with exactly this level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Only match records emitted for exactly this target name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<&str> for Grep {
    fn from(pattern: &str) -> Self {
        Grep {
            pattern: Pattern::Text(pattern.to_string()),
            level: None,
            name: None,
        }
    }
}

impl From<String> for Grep {
    fn from(pattern: String) -> Self {
        pattern.as_str().into()
    }
}

impl From<Regex> for Grep {
    fn from(regex: Regex) -> Self {
        Grep {
            pattern: Pattern::Compiled(regex),
            level: None,
            name: None,
        }
    }
}

impl From<&Regex> for Grep {
    fn from(regex: &Regex) -> Self {
        regex.clone().into()
    }
}

impl Pattern {
    fn compile(&self) -> Result<Cow<'_, Regex>, InvalidPattern> {
        match self {
            Pattern::Text(text) => match Regex::new(text) {
                Ok(regex) => Ok(Cow::Owned(regex)),
                Err(source) => Err(InvalidPattern {
                    pattern: text.clone(),
                    source,
                }),
            },
            Pattern::Compiled(regex) => Ok(Cow::Borrowed(regex)),
        }
    }
}

/// Configures a capture before it attaches.
pub struct CaptureBuilder {
    threshold: LevelFilter,
    echo: bool,
    targets: Vec<String>,
}

impl CaptureBuilder {
    fn new() -> Self {
        CaptureBuilder {
            threshold: LevelFilter::Trace,
            echo: false,
            targets: Vec::new(),
        }
    }

    /// Initial sink threshold. Defaults to accepting everything.
    pub fn threshold(mut self, threshold: LevelFilter) -> Self {
        self.threshold = threshold;
        self
    }

    /// Also print each captured line to stderr as it arrives.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Attach to a named target instead of the root. May be repeated to
    /// watch several targets with one sink.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Installs the global dispatcher if needed and begins the scope.
    pub fn start(self) -> LogCapture {
        registry::install();
        let sink = Arc::new(CaptureSink::with_echo(self.threshold, self.echo));
        LogCapture {
            scope: CaptureScope::begin(sink, self.targets),
        }
    }
}
