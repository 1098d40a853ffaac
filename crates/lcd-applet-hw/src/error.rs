//! Error types for the LCD applet hardware library.

use thiserror::Error;

use crate::lcd::DeviceClass;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the display manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The display-manager service is not reachable (not installed or not running).
    #[error("display manager service unavailable")]
    ServiceUnavailable,

    /// The device class was not declared in the applet capabilities.
    #[error("device class {0} not declared in applet capabilities")]
    InvalidDeviceClass(DeviceClass),

    /// No device of the class is currently attached.
    #[error("no {0} device attached")]
    DeviceUnavailable(DeviceClass),

    /// The driver rejected a frame.
    #[error("frame submission failed: {0}")]
    SubmissionFailed(String),

    /// The display manager closed the connection.
    #[error("connection closed by display manager")]
    UnexpectedDisconnect,

    /// The applet has no connection to the display manager.
    #[error("not connected to the display manager")]
    NotConnected,

    /// The library was used before `init` or after `deinit`.
    #[error("driver library not initialized")]
    NotInitialized,

    /// A connection or device handle the driver does not know.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Frame size does not match the device geometry.
    #[error("frame size mismatch: expected {expected}, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// Unrecognised device class name or code.
    #[error("unknown device class: {0}")]
    UnknownDeviceClass(String),

    /// Unrecognised priority name.
    #[error("unknown priority: {0}")]
    UnknownPriority(String),
}

impl Error {
    /// Returns true for failures that are expected to clear up on their own
    /// (service restart, device re-plug, a dropped frame).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ServiceUnavailable
                | Error::DeviceUnavailable(_)
                | Error::SubmissionFailed(_)
                | Error::UnexpectedDisconnect
                | Error::NotConnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::ServiceUnavailable.is_transient());
        assert!(Error::DeviceUnavailable(DeviceClass::Color).is_transient());
        assert!(Error::SubmissionFailed("busy".into()).is_transient());
        assert!(!Error::InvalidDeviceClass(DeviceClass::Monochrome).is_transient());
        assert!(!Error::NotInitialized.is_transient());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::DeviceUnavailable(DeviceClass::Monochrome).to_string(),
            "no monochrome device attached"
        );
        assert_eq!(
            Error::FrameSize {
                expected: 6880,
                actual: 10
            }
            .to_string(),
            "frame size mismatch: expected 6880, got 10"
        );
    }
}
