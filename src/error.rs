use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a summary run. Degenerate data (no host, zero-length
/// organisms, no mapped reads) is not an error; see `classifier::DegenerateInput`.
#[derive(Error, Debug)]
pub enum HostCheckError {
    #[error("cannot read {}: {source}", .path.display())]
    MissingFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed idxstats line {line_number} ({reason}): {line:?}")]
    MalformedInput {
        line_number: usize,
        line: String,
        reason: String,
    },

    #[error("{field} total for {organism_key} exceeds the 64-bit count range")]
    CountOverflow { organism_key: String, field: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid classification pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HostCheckError>;

impl HostCheckError {
    /// Process exit code used by the binary for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            HostCheckError::Config(_) | HostCheckError::InvalidPattern(_) => 2,
            HostCheckError::MissingFile { .. } | HostCheckError::Io(_) => 3,
            HostCheckError::MalformedInput { .. } | HostCheckError::CountOverflow { .. } => 4,
            HostCheckError::Json(_) => 1,
        }
    }
}
