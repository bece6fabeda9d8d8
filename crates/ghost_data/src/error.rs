use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GhostDataError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

/// Failure of a single Content API request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{resource} responded with {status}")]
    Status { resource: String, status: u16 },
    #[error("could not decode {resource} response: {source}")]
    Decode {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("skipped {resource} record {id}: {source}")]
    Record {
        resource: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{resource} response did not contain a record for '{key}'")]
    NotFound { resource: String, key: String },
}

/// Failure while reading the pixel size of an image.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("image download failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image host responded with {0}")]
    Status(u16),
    #[error("no image header found in the first {0} bytes")]
    HeaderNotFound(usize),
    #[error("could not read image: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
