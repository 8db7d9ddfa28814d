/// Error returned by [`crate::LogCapture::grep`] when the pattern string
/// does not parse as a regular expression.
#[derive(thiserror::Error, Debug)]
#[error("invalid grep pattern {pattern:?}")]
pub struct InvalidPattern {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}
