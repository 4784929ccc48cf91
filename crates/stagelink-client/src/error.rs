//! Client error types

use stagelink_core::catalog::UploadError;
use stagelink_core::protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Validation(#[from] UploadError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay connection closed")]
    Disconnected,
}
