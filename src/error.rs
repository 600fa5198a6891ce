use std::ops::Range;

/// Errors that abort a transform. Nothing is written when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Overlapping edits at {first:?} and {second:?}")]
    InternalConsistency {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("Source map error: {0}")]
    SourceMap(#[from] sourcemap::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for transform operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// A manifest exists but could not be proven machine-authored.
    AmbiguousManifest,
}

/// Non-fatal diagnostic returned next to a successful result.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}
