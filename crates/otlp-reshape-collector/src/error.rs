//! Errors for this crate.

use std::path::PathBuf;

use thiserror::Error;

/// An error from the reshaping collector.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or request, from the core library.
    #[error(transparent)]
    ReshapeError(#[from] otlp_reshape_core::Error),
    #[error("unable to read {}: {source}", path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ConfigParseError(#[from] serde_yaml::Error),
    #[error(transparent)]
    DecodeError(#[from] prost::DecodeError),
    #[error(transparent)]
    TaskError(#[from] tokio::task::JoinError),
    #[error(transparent)]
    LogFilterError(#[from] tracing_subscriber::filter::ParseError),
    #[error(transparent)]
    ArgumentError(#[from] clap::Error),
}
