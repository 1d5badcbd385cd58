use std::{fmt, io, sync::Arc};

use thiserror::Error;

/// All resolver errors.
///
/// `thiserror` is used to display meaningful error messages.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// `$ref` is not a string, or the locator cannot be resolved.
    #[error("invalid reference '{0}'")]
    InvalidReference(String),

    /// A reference cycle crossing files with no component materialization yet.
    #[error("circular reference: {0}")]
    CircularReference(VisitPath),

    /// The loader reported not-found for a filesystem path.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Size exceeds `max_file_size`.
    #[error("file too large: {locator} ({size} bytes, limit {limit})")]
    FileTooLarge { locator: String, size: u64, limit: u64 },

    /// Underlying YAML/JSON parser failed.
    #[error("failed to parse {locator}: {cause}")]
    ParseError { locator: String, cause: String },

    /// Fragment navigation failed in the target document.
    #[error("JSON pointer '{pointer}' not found (missing segment '{missing_segment}')")]
    JSONPointerNotFound { pointer: String, missing_segment: String },

    /// No fragment was given, but the target file declares multiple components.
    #[error("ambiguous reference '{0}': target declares more than one component")]
    AmbiguousReference(String),

    /// The target file is a path-item definition and cannot be materialized as a component.
    #[error("'{0}' is a path definition and cannot be extracted as a component")]
    PathFileNotExtractable(String),

    /// Recursion exceeded `max_depth`.
    #[error("max recursion depth exceeded ({0})")]
    MaxDepthExceeded(u32),

    /// The operation was cancelled via the caller's cancellation token.
    #[error("resolution cancelled")]
    Cancelled,

    /// Wraps the location being processed when an inner error occurred.
    #[error("failed to process {location}: {source}")]
    At { location: String, #[source] source: Box<ResolveError> },

    /// An IO error from the default `FileLoader`.
    #[error("{0}")]
    Io(IoError),
}

impl ResolveError {
    #[must_use]
    pub fn at(self, location: impl Into<String>) -> Self {
        Self::At { location: location.into(), source: Box::new(self) }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<io::Error> for ResolveError {
    fn from(err: io::Error) -> Self {
        Self::Io(IoError(Arc::new(err)))
    }
}

/// Wraps [`std::io::Error`] in an `Arc` so [`ResolveError`] stays `Clone`.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IoError(Arc<io::Error>);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

/// The canonical-file-path + fragment chain that formed a reference cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitPath(pub Vec<String>);

impl fmt::Display for VisitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl From<Vec<String>> for VisitPath {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<String> for VisitPath {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

#[test]
fn test_visit_path_display() {
    let path = VisitPath(vec!["a.yaml#/A".to_string(), "b.yaml#/B".to_string()]);
    assert_eq!(path.to_string(), "a.yaml#/A -> b.yaml#/B");
}

#[test]
fn test_io_error_roundtrip() {
    let err = io::Error::new(io::ErrorKind::NotFound, "missing");
    let resolve_err: ResolveError = ResolveError::from(err);
    assert!(matches!(resolve_err, ResolveError::Io(_)));
}
