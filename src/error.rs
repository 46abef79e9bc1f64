use std::path::PathBuf;

use thiserror::Error;

/// Terminal session failures, reported once through the completion callback.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("video file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("could not open {0}")]
    OpenFailed(String),

    #[error("pose engine failed to start: {0}")]
    Engine(String),

    #[error("capture error: {0}")]
    Capture(#[from] opencv::Error),
}
