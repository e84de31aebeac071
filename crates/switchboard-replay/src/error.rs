//! Replay error types.

use std::io;

use switchboard_core::CoreError;
use thiserror::Error;

/// Errors that stop a replay.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Reading the log or writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The log is not a JSON array of events, or output could not be encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The local user id cannot name anybody.
    #[error("invalid local user: {0}")]
    User(#[from] CoreError),
}
