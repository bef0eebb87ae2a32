//! Boot media errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootMediaError {
    #[error("malformed image reference: {0:?}")]
    MalformedReference(String),

    #[error("image file not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("image path is not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("image file name is not valid UTF-8: {0}")]
    InvalidFileName(PathBuf),

    #[error("cannot build image URL: {0}")]
    Url(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind image server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}
