//! Error types for the svnfi core library.
//!
//! Only the conditions spec.md classifies as fatal (`ParseError`) are
//! modeled as a `Result::Err`. Everything spec.md classifies as a warning
//! (bogon nodes, unresolved ancestry, dropped mergeinfo ranges, dubious
//! topology) is reported through `tracing::warn!` at the call site and
//! never surfaces as an error value.

use thiserror::Error;

/// Unified error type for the pipeline library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Fatal errors raised while tokenizing or parsing the dump stream.
///
/// All of these abort the pipeline; the offending line number (1-origin,
/// counting header lines only) is carried for diagnostics.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: malformed integer header {header:?}: {value:?}")]
    MalformedInteger {
        line: usize,
        header: String,
        value: String,
    },

    #[error("line {line}: missing required header {header:?}")]
    MissingHeader { line: usize, header: String },

    #[error("line {line}: property block length check failed (advertised {advertised}, consumed {consumed})")]
    PropertyLengthMismatch {
        line: usize,
        advertised: usize,
        consumed: usize,
    },

    #[error("line {line}: blob content not newline-terminated")]
    UnterminatedBlob { line: usize },

    #[error("revision counter overflowed at line {line}")]
    RevisionCounterOverflow { line: usize },

    #[error("line {line}: unexpected end of input while expecting {expected}")]
    UnexpectedEof { line: usize, expected: String },

    #[error("I/O error reading dump stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from loading and validating pipeline [`Options`](crate::options::Options).
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("configuration parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid branch-mapping regex {pattern:?}: {detail}")]
    InvalidBranchMapping { pattern: String, detail: String },

    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from serializing the event list to the fast-import grammar.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("dangling mark reference :{0} (no Blob/Commit with that mark precedes it)")]
    DanglingMark(u64),

    #[error("I/O error writing fast-import stream: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::MissingHeader {
            line: 12,
            header: "Node-path".into(),
        };
        assert_eq!(
            err.to_string(),
            "line 12: missing required header \"Node-path\""
        );
    }

    #[test]
    fn test_core_error_from_parse_error() {
        let err = ParseError::RevisionCounterOverflow { line: 1 };
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Parse(_)));
    }
}
