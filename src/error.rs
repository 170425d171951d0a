//! Error types for tag compilation.

use crate::adapters::Domain;

/// Boxed error raised by an external language adapter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Every failure is fatal for the compile call that raised it.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A template literal in script code reaches end of input.
    #[error("unclosed template literal starting at offset {offset}")]
    UnclosedTemplateLiteral { offset: usize },

    /// A closing bracket that does not match the innermost open one.
    #[error("unexpected '{found}' at offset {offset}")]
    UnbalancedDelimiter { found: char, offset: usize },

    /// The requested language has no registered adapter.
    #[error("{domain} adapter \"{lang}\" is not registered")]
    MissingAdapter { domain: Domain, lang: String },

    /// The `options` attribute of a script or style region is not a JSON object.
    #[error("malformed options attribute: {reason}")]
    MalformedAttributeOptions { reason: String },

    /// The adapter itself raised.
    #[error("{domain} adapter \"{lang}\" failed: {source}")]
    AdapterFailure {
        domain: Domain,
        lang: String,
        #[source]
        source: BoxError,
    },

    /// Custom delimiter pair rejected by the delimiter matcher.
    #[error("unsupported delimiters \"{0}\"")]
    UnsupportedDelimiters(String),

    /// Compiler options could not be deserialized.
    #[error("invalid compiler options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
}

/// Result type for compile operations.
pub type Result<T> = std::result::Result<T, CompileError>;
