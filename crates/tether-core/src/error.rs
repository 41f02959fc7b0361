use thiserror::Error;

/// Failure raised by a render contract while building a subtree.
///
/// The binding layer reports it through the diagnostics channel and skips
/// the affected entry; the mount itself keeps processing emissions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal failure of an upstream value stream.
///
/// After [`Stream::fail`](crate::stream::Stream::fail) a stream delivers no
/// further values; mounts bound to it stop processing but stay attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StreamError {
    pub message: String,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
