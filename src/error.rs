//! Error type shared across the generator pipeline.
//!
//! Every fallible step returns this one sum type; the CLI driver reports the
//! message and exits non-zero. There is no retry and no partial output.

use std::path::PathBuf;
use thiserror::Error;

/// Generator error.
#[derive(Error, Debug)]
pub enum Error {
    /// Unparseable DV descriptor, filename or bit-relation line.
    #[error("malformed input: {0}")]
    InputFormat(String),

    /// A parameter outside its declared bounds.
    #[error("{what} out of range: {value} (allowed {allowed})")]
    Range {
        what: &'static str,
        value: i64,
        allowed: &'static str,
    },

    /// More DVs than fit in the 64-bit result mask.
    #[error("{count} DVs cannot be packed into a 64-bit mask")]
    Capacity { count: usize },

    /// File open/read/write failure, with the offending path.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Persisted intermediate state could not be encoded or decoded.
    #[error("persisted state: {0}")]
    Persist(#[from] serde_json::Error),
}

impl Error {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for generator operations.
pub type Result<T> = std::result::Result<T, Error>;
