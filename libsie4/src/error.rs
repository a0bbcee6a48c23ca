//! The single error type of the public API.
//!
//! Every variant maps to a stable numeric code so callers can branch on
//! failures without string matching. Parse and validation errors are
//! fail-fast: the first one aborts and no partial document is returned.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SieError {
    /// The input did not match the line grammar at all.
    #[error("syntax error: {0}")]
    Syntax(Box<pest::error::Error<crate::parser::Rule>>),

    /// A post carried fewer fields than its label requires.
    #[error("too few fields for {label} at line {line}")]
    Arity { label: String, line: usize },

    /// A label appeared before its phase was reached or after it closed.
    #[error("{label} out of order at line {line}: {detail}")]
    PhaseOrder {
        label: String,
        line: usize,
        detail: &'static str,
    },

    /// The same natural key was defined twice in the chart of accounts.
    #[error("duplicate {entity} `{key}' at line {line}")]
    DuplicateKey {
        entity: &'static str,
        key: String,
        line: usize,
    },

    /// `#KSUMMA` must occur exactly zero or two times per file.
    #[error("found {count} #KSUMMA posts, expected 0 or 2")]
    Ksumma { count: usize },

    /// The file declares a format or type this codec does not speak.
    #[error("unsupported {what}: expected {expected}, got `{got}'")]
    Unsupported {
        what: &'static str,
        expected: &'static str,
        got: String,
    },

    /// A mandatory value is absent (validator, import/export specific).
    #[error("[{code}] missing {context}")]
    Missing { code: u32, context: String },

    /// A cross-entity rule is violated: unbalanced entry, incomplete
    /// object pair, malformed field value.
    #[error("[{code}] {context}")]
    Consistency { code: u32, context: String },

    /// Text cannot be represented in the wire code page.
    #[error("text not representable in CP437 (valid up to byte {valid_up_to}): {context}")]
    Encoding { valid_up_to: usize, context: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SieError {
    /// Stable numeric code for the error, suitable for surfacing to callers.
    pub fn code(&self) -> u32 {
        match self {
            SieError::Syntax(_) => 1001,
            SieError::Arity { .. } => 1002,
            SieError::PhaseOrder { .. } => 1003,
            SieError::DuplicateKey { .. } => 1004,
            SieError::Ksumma { .. } => 1005,
            SieError::Unsupported { .. } => 1006,
            SieError::Encoding { .. } => 1007,
            SieError::Io(_) => 1008,
            SieError::Missing { code, .. } => *code,
            SieError::Consistency { code, .. } => *code,
        }
    }
}

pub type Result<T> = std::result::Result<T, SieError>;
