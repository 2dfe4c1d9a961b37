use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::algorithm::HashAlgorithm;

pub type Result<T, E = SignatureError> = std::result::Result<T, E>;

/// Failures of a single digest, save, load or comparison.
///
/// None of these abort a batch; batch callers fold them into a FAILED entry.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("{} does not exist", .0.display())]
    PathNotFound(PathBuf),

    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("unsupported hash algorithm: {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed signature {}: {reason}", path.display())]
    MalformedSignature { path: PathBuf, reason: String },

    #[error("hash algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch { expected: HashAlgorithm, found: HashAlgorithm },

    #[error("unsafe path {}: {reason}", path.display())]
    UnsafePath { path: PathBuf, reason: &'static str },

    #[error("no digest computed for {0}")]
    MissingDigest(String),
}

impl SignatureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SignatureError::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SignatureError::MalformedSignature { path: path.into(), reason: reason.into() }
    }

    /// Short, stable label for report lines.
    pub fn kind(&self) -> &'static str {
        match self {
            SignatureError::PathNotFound(_) => "path-not-found",
            SignatureError::NotAFile(_) => "not-a-file",
            SignatureError::UnsupportedAlgorithm(_) => "unsupported-algorithm",
            SignatureError::InvalidChunkSize => "invalid-chunk-size",
            SignatureError::Io { .. } => "io-failure",
            SignatureError::MalformedSignature { .. } => "malformed-signature",
            SignatureError::AlgorithmMismatch { .. } => "algorithm-mismatch",
            SignatureError::UnsafePath { .. } => "unsafe-path",
            SignatureError::MissingDigest(_) => "missing-digest",
        }
    }
}
