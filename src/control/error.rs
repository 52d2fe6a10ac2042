use std::io;
use std::path::PathBuf;

use thiserror::Error;

use tokio_util::codec::LinesCodecError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unable to bind control socket {path:?}: {source}")]
    Bind { path: PathBuf, source: io::Error },
    #[error("ill-formed control command {0:?}")]
    Malformed(String),
    #[error("control connection failed: {0}")]
    Line(#[from] LinesCodecError),
    #[error("daemon is shutting down")]
    Shutdown,
}
