//! Error type shared by every stage of the pipeline.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong. Every failure the parser raises carries exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    // Package level
    NoInstanceDocument,
    MultipleInstanceDocuments,
    // Malformed content
    InvalidXml,
    InvalidPeriod,
    InvalidDecimal,
    InvalidUnit,
    // Invariant violations
    DuplicateDimension,
    DuplicateFact,
    ConflictingConceptDefinition,
    // Reference resolution
    MissingTaxonomySchema,
    UnresolvedLocator,
    UnknownConcept,
    UnknownContext,
    // Structural
    PresentationCycle,
    IoError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A position inside one of the filing's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: Option<usize>,
}

impl Location {
    pub fn file(path: &Path) -> Self {
        Self {
            file: path.to_path_buf(),
            line: None,
        }
    }

    pub fn at(path: &Path, line: usize) -> Self {
        Self {
            file: path.to_path_buf(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file.display(), line),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    location: Option<Location>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Builds an error whose message ends with the offending `file:line`.
    pub fn at(kind: ErrorKind, location: Location, message: impl fmt::Display) -> Self {
        Self {
            kind,
            message: format!("{message} ({location})"),
            location: Some(location),
            source: None,
        }
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::IoError,
            message: format!("{}: {err}", path.display()),
            location: Some(Location::file(path)),
            source: Some(Box::new(err)),
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::IoError,
            message: err.to_string(),
            location: None,
            source: Some(Box::new(err)),
        }
    }
}

/// A failure that lenient options downgraded. Collected on the parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<Error> for Warning {
    fn from(err: Error) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Collects downgraded failures and mirrors each one to the log.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub(crate) fn warn(&mut self, err: Error) {
        tracing::warn!(kind = %err.kind(), "{}", err.message());
        self.warnings.push(err.into());
    }

    /// Raises `err` when `strict`, records it as a warning otherwise.
    pub(crate) fn escalate(&mut self, strict: bool, err: Error) -> Result<()> {
        if strict {
            Err(err)
        } else {
            self.warn(err);
            Ok(())
        }
    }

    pub(crate) fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
