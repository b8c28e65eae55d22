use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("serial port {port} does not exist; choose from existing: {available:?}")]
    PortNotFound {
        port: String,
        available: Vec<String>,
    },
    #[error("cannot open {port} serial port: {source}")]
    ConnectionFailed {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial I/O failed while handling {command:?}: {source}")]
    Transport {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no response to {command:?} within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("connected device reported {actual:?}, expected {expected:?}")]
    IdentificationMismatch { actual: String, expected: String },
    #[error("malformed preamble for channel {channel}: {reason} (response: {response:?})")]
    MalformedPreamble {
        channel: u8,
        reason: String,
        response: String,
    },
    #[error("malformed curve for channel {channel}: {reason}")]
    MalformedCurve { channel: u8, reason: String },
    #[error("invalid smoothing parameters (window {window}, order {order}): {reason}")]
    InvalidSmoothingParameters {
        window: usize,
        order: usize,
        reason: String,
    },
    #[error("failed to write output: {0}")]
    Output(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl ScopeError {
    /// Channel-level faults skip the current channel; everything else ends the session.
    pub fn is_channel_level(&self) -> bool {
        matches!(
            self,
            ScopeError::MalformedPreamble { .. } | ScopeError::MalformedCurve { .. }
        )
    }
}

impl From<std::io::Error> for ScopeError {
    fn from(value: std::io::Error) -> Self {
        ScopeError::Output(value.to_string())
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Plot(value.to_string())
    }
}
