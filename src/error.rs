//! Error types for shelfkb.
//!
//! Errors are split by concern: the reasoner transport, configuration
//! files, and the knowledge-base operations that sit on top of both.
//! `KbError` is the type every public operation returns.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while talking to the reasoner.
#[derive(Debug, Error)]
pub enum ReasonerError {
    /// The reasoner could not be reached.
    #[error("Reasoner unavailable: {message}")]
    Unavailable {
        /// Transport failure.
        message: String,
    },

    /// The reasoner lost track of a query.
    #[error("Reasoner does not know query id {id}")]
    WrongQueryId {
        /// Id the query was registered under.
        id: String,
    },

    /// The reasoner refused or aborted a query.
    #[error("Query failed in reasoner: {message}")]
    QueryFailed {
        /// Reasoner's error text.
        message: String,
    },

    /// A solution was not valid JSON bindings.
    #[error("Failed to decode solution: {message}")]
    Decode {
        /// Decoder error.
        message: String,
    },
}

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or JSON, or has the wrong shape.
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser error.
        message: String,
    },

    /// A layout entry does not describe a shelf system.
    #[error("Invalid entry '{id}': {reason}")]
    InvalidEntry {
        /// Shelf system id of the entry.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An operation needs a setting that was left out.
    #[error("Setting '{key}' is required but not configured")]
    MissingKey {
        /// Name of the setting.
        key: &'static str,
    },
}

/// Top-level error type for knowledge-base operations.
#[derive(Debug, Error)]
pub enum KbError {
    /// Talking to the reasoner failed.
    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),

    /// A configuration file was unusable.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A query that must succeed had no solution.
    #[error("Query has no solution: {query}")]
    QueryFailed {
        /// The query text.
        query: String,
    },

    /// A solution lacks an expected binding.
    #[error("Variable '{variable}' is not bound in the solution of: {query}")]
    MissingBinding {
        /// The query text.
        query: String,
        /// The unbound variable.
        variable: String,
    },

    /// A binding has the wrong kind of term.
    #[error("Variable '{variable}' is bound to {found}, expected {expected}")]
    UnexpectedTerm {
        /// The variable.
        variable: String,
        /// Kind of term that was expected.
        expected: &'static str,
        /// What was bound instead.
        found: String,
    },

    /// A frame lookup failed.
    #[error("No transform from '{source_frame}' to '{target}': {reason}")]
    Transform {
        /// Frame the result was wanted in.
        target: String,
        /// Frame the input was given in.
        source_frame: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// The operation is not available.
    #[error("Unsupported: {what}")]
    Unsupported {
        /// The operation.
        what: String,
    },

    /// A bug or a poisoned lock.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl KbError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an error for a query that was required to succeed.
    #[must_use]
    pub fn query_failed(query: impl Into<String>) -> Self {
        Self::QueryFailed {
            query: query.into(),
        }
    }

    /// Returns true if the reasoner transport failed.
    #[must_use]
    pub const fn is_reasoner(&self) -> bool {
        matches!(self, Self::Reasoner(_))
    }

    /// Returns true if a configuration file could not be used.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if the reasoner answered but not the way we needed.
    #[must_use]
    pub const fn is_answer_error(&self) -> bool {
        matches!(
            self,
            Self::QueryFailed { .. } | Self::MissingBinding { .. } | Self::UnexpectedTerm { .. }
        )
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Reasoner(e) => matches!(e, ReasonerError::Unavailable { .. }),
            // tf may simply not have the frame yet
            Self::Transform { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for knowledge-base operations.
pub type KbResult<T> = Result<T, KbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_failed_message() {
        let err = KbError::query_failed("shelf_layer_frame('l1', _).");
        let msg = format!("{err}");
        assert!(msg.contains("no solution"));
        assert!(msg.contains("shelf_layer_frame"));
        assert!(err.is_answer_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_binding_message() {
        let err = KbError::MissingBinding {
            query: "object_frame_name('s', R).".to_string(),
            variable: "R".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("'R'"));
        assert!(msg.contains("object_frame_name"));
    }

    #[test]
    fn test_reasoner_error_conversion() {
        let err: KbError = ReasonerError::Unavailable {
            message: "service /rosprolog/query not advertised".to_string(),
        }
        .into();
        assert!(err.is_reasoner());
        assert!(err.is_retryable());

        let err: KbError = ReasonerError::QueryFailed {
            message: "syntax error".to_string(),
        }
        .into();
        assert!(err.is_reasoner());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: KbError = ConfigError::InvalidEntry {
            id: "shelf_1".to_string(),
            reason: "side must be left or right".to_string(),
        }
        .into();
        assert!(err.is_config());
        assert!(format!("{err}").contains("shelf_1"));
    }

    #[test]
    fn test_transform_error_retryable() {
        let err = KbError::Transform {
            target: "map".to_string(),
            source_frame: "shelf_1".to_string(),
            reason: "unknown frame".to_string(),
        };
        assert!(err.is_retryable());
        assert!(format!("{err}").contains("'shelf_1'"));
    }

    #[test]
    fn test_internal_error() {
        let err = KbError::internal("poisoned lock: frame cache");
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("poisoned lock"));
    }
}
