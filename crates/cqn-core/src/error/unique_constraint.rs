use super::Error;

use regex::Regex;
use std::sync::OnceLock;

/// The write path on which a uniqueness violation was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// A uniqueness-constraint violation, normalized into a domain error.
///
/// The engine's message is kept for diagnostics while the error itself
/// reports a stable domain code and an HTTP-style status.
#[derive(Debug)]
pub(super) struct UniqueConstraint {
    pub(super) kind: WriteKind,
    pub(super) original_message: Box<str>,
}

impl WriteKind {
    pub fn domain_code(self) -> &'static str {
        match self {
            WriteKind::Insert => "ENTITY_ALREADY_EXISTS",
            WriteKind::Update => "UNIQUE_CONSTRAINT_VIOLATION",
        }
    }
}

impl std::error::Error for UniqueConstraint {}

impl core::fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.kind.domain_code())
    }
}

fn unique_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("(?i)unique constraint").expect("valid pattern"))
}

impl Error {
    /// Creates a normalized uniqueness violation error.
    pub fn unique_constraint(kind: WriteKind, original_message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::UniqueConstraint(UniqueConstraint {
            kind,
            original_message: original_message.into().into(),
        }))
    }

    /// Rewrites a uniqueness violation reported by the engine into the
    /// domain error for `kind`. Any other error is returned unchanged.
    ///
    /// Only the engine's message is inspected; the SQL text of the failing
    /// statement never triggers a match.
    pub fn normalize_unique(self, kind: WriteKind) -> Error {
        if self.is_unique_constraint() {
            return self;
        }

        match self.engine_message() {
            Some(message) if unique_pattern().is_match(&message) => {
                Error::unique_constraint(kind, message)
            }
            _ => self,
        }
    }

    /// Returns `true` if this error is a normalized uniqueness violation.
    pub fn is_unique_constraint(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::UniqueConstraint(_))
    }

    /// The stable domain code of a normalized error, e.g. `ENTITY_ALREADY_EXISTS`.
    pub fn domain_code(&self) -> Option<&'static str> {
        match self.kind() {
            super::ErrorKind::UniqueConstraint(err) => Some(err.kind.domain_code()),
            _ => None,
        }
    }

    /// The HTTP-style status carried by a normalized error.
    pub fn http_status(&self) -> Option<u16> {
        match self.kind() {
            super::ErrorKind::UniqueConstraint(_) => Some(400),
            _ => None,
        }
    }

    /// The engine's original message of a normalized error.
    pub fn original_message(&self) -> Option<&str> {
        match self.kind() {
            super::ErrorKind::UniqueConstraint(err) => Some(&err.original_message),
            _ => None,
        }
    }
}
