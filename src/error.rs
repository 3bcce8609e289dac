//! Error taxonomy for generation, customization, and execution.
//!
//! Every error here is local to one request or session. Nothing in this
//! module represents a process-fatal condition: the interactive loop
//! recovers to a stable state (`Cancelled` or back to selection) on any of
//! them.

use thiserror::Error;

/// Errors raised while generating candidate commands.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The provider could not be reached or answered with an error.
    ///
    /// `status` is the upstream HTTP status, or `0` when the failure
    /// happened below HTTP (DNS, connect, timeout). The upstream detail is
    /// preserved verbatim in `message`; no retry happens at this layer.
    #[error("provider request failed (status {status}): {message}")]
    Provider { status: u16, message: String },

    /// The provider answered, but nothing in the response parsed as a
    /// command. No cache entry is written for such responses.
    #[error("provider response contained no parseable commands")]
    EmptyResponse,
}

/// A command still contains unresolved placeholder spans.
///
/// Raised when classification or execution is attempted on a command such
/// as `ffmpeg -i {INPUT} out.mp4` before every placeholder has been edited.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("command still contains unresolved placeholders: {placeholders:?}")]
pub struct IncompleteCommandError {
    /// The placeholder texts that are still unresolved, in command order.
    pub placeholders: Vec<String>,
}

/// The process for a command could not be started at all.
///
/// A non-zero exit code or a timeout is *not* a launch error; those are
/// reported as ordinary execution outcomes.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("failed to spawn process: {0}")]
    Spawn(String),
}

/// Errors the execution gate can report.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Incomplete(#[from] IncompleteCommandError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
}
