use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PrepError {
    #[error("invalid slide identifier: {0:?}")]
    InvalidSlideId(String),

    #[error("invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read slide id list at {0}")]
    SlideListRead(PathBuf),

    #[error("failed to read resolution cache: {0}")]
    CacheParse(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("container error: {0}")]
    Container(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("malformed catalog response: {0}")]
    CatalogResponse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
