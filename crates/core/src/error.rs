use std::path::PathBuf;

use thiserror::Error;

/// Failures of the header codec. Neither is fatal to a batch: callers skip
/// the document and report it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocError {
    #[error("headerless document: no header delimiter pair found")]
    Headerless,
    #[error("unparsable header: {0}")]
    UnparsableHeader(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error(transparent)]
    Document(#[from] DocError),
    #[error("empty body")]
    EmptyBody,
    #[error("no leading problem number in first body line")]
    NoLeadingNumber,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document id {0:?}")]
    InvalidId(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("archive directory not found: {0:?}")]
    MissingArchive(PathBuf),
    #[error("{0} already exists")]
    DuplicateTarget(String),
    #[error("failed to read source {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure of an opaque external call (classification, generation, OCR).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalError {
    #[error("{call} call failed: {message}")]
    CallFailed { call: &'static str, message: String },
    #[error("{call} returned an empty response")]
    EmptyResponse { call: &'static str },
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("unsupported image type {0:?} (expected jpg, jpeg or png)")]
    UnsupportedImage(PathBuf),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transcription failed: {0}")]
    Transcription(#[from] ExternalError),
    #[error("{0} already exists")]
    DuplicateTarget(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
