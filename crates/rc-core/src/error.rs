//! Error types for the measurement rig.
//!
//! Two layers of error exist:
//!
//! - **`DeviceError`**: raised by implementations of the device capability
//!   interface (digital line writes, analog task reads). It carries a
//!   [`DeviceErrorKind`] so the core can tell an unsupported operation apart
//!   from a genuine I/O failure.
//! - **`RigError`**: the error returned by every core operation (relay
//!   gateway, sequencer, acquisition sessions). Device errors convert into it
//!   with `?`.
//!
//! ## Failure classes
//!
//! [`RigError::class`] maps each variant onto a user-visible [`ErrorClass`]:
//!
//! - **Client**: the request named an unknown relay or selector, or asked for
//!   out-of-range parameters. Never retried.
//! - **Conflict**: the acquisition session was in the wrong state.
//! - **Server**: the hardware failed or returned malformed data.
//!
//! The core performs no automatic retries; retry policy belongs to callers.

use thiserror::Error;

// =============================================================================
// Device Errors
// =============================================================================

/// Category of a device-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// Link to the chassis or driver was lost
    Communication,
    /// The device reported a fault
    Hardware,
    /// An operation did not complete in time
    Timeout,
    /// The device cannot perform the requested operation at all
    /// (e.g. reading back digital outputs on simulated hardware).
    Unsupported,
    /// The device rejected a parameter (rate, buffer size, channel spec)
    InvalidParameter,
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeviceErrorKind::Communication => "communication",
            DeviceErrorKind::Hardware => "hardware",
            DeviceErrorKind::Timeout => "timeout",
            DeviceErrorKind::Unsupported => "unsupported",
            DeviceErrorKind::InvalidParameter => "invalid_parameter",
        };
        write!(f, "{}", label)
    }
}

/// Error raised by a device capability implementation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Device '{device}' {kind} error: {message}")]
pub struct DeviceError {
    /// Name of the device that failed
    pub device: String,
    /// Failure category
    pub kind: DeviceErrorKind,
    /// Driver-supplied detail
    pub message: String,
}

impl DeviceError {
    /// Build an error of any kind.
    pub fn new(device: impl Into<String>, kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an [`DeviceErrorKind::Unsupported`] error.
    pub fn unsupported(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(device, DeviceErrorKind::Unsupported, message)
    }

    /// Check if the device reported the operation as unsupported.
    pub fn is_unsupported(&self) -> bool {
        self.kind == DeviceErrorKind::Unsupported
    }
}

// =============================================================================
// Rig Errors
// =============================================================================

/// Convenience alias for results using the rig error type.
pub type RigResult<T> = std::result::Result<T, RigError>;

/// User-visible failure class of a [`RigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input from the caller (unknown names, out-of-range parameters).
    Client,
    /// The operation conflicts with the current session state.
    Conflict,
    /// The hardware or driver failed.
    Server,
}

/// Primary error type for relay sequencing and acquisition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RigError {
    /// Relay name is not part of the fixed relay catalogue.
    #[error("Unknown relay: {name}")]
    UnknownRelay {
        /// Name as given by the caller
        name: String,
    },

    /// Capacitor or discharge-resistor code is not recognized.
    #[error("Invalid {kind} selector: {value}")]
    InvalidSelector {
        /// `capacitor` or `discharge resistor`
        kind: &'static str,
        /// Code as given by the caller
        value: String,
    },

    /// `start` or a finite read was requested while an acquisition session
    /// is active.
    #[error("ADC acquisition is already running")]
    AlreadyRunning,

    /// `stop` was called while no acquisition session is active.
    #[error("No ADC acquisition is running")]
    NotRunning,

    /// Underlying digital write or analog read failed.
    #[error("Hardware I/O failure: {0}")]
    HardwareIo(DeviceError),

    /// Operation not available on this hardware.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The device returned a read with the wrong number of channel arrays.
    #[error("Malformed analog read: expected {expected} channels, got {got}")]
    MalformedRead {
        /// Channel arrays the read should carry
        expected: usize,
        /// Channel arrays actually returned
        got: usize,
    },

    /// Request parameters failed validation at the caller-facing boundary.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RigError {
    /// Map the error onto its user-visible failure class.
    pub fn class(&self) -> ErrorClass {
        match self {
            RigError::UnknownRelay { .. }
            | RigError::InvalidSelector { .. }
            | RigError::InvalidRequest(_) => ErrorClass::Client,
            RigError::AlreadyRunning | RigError::NotRunning => ErrorClass::Conflict,
            RigError::HardwareIo(_)
            | RigError::UnsupportedOperation(_)
            | RigError::MalformedRead { .. } => ErrorClass::Server,
        }
    }

    /// Shorthand for [`RigError::UnknownRelay`].
    pub fn unknown_relay(name: impl Into<String>) -> Self {
        RigError::UnknownRelay { name: name.into() }
    }
}

impl From<DeviceError> for RigError {
    fn from(err: DeviceError) -> Self {
        if err.is_unsupported() {
            RigError::UnsupportedOperation(err.to_string())
        } else {
            RigError::HardwareIo(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_display() {
        let err = DeviceError::new("cDAQ1", DeviceErrorKind::Hardware, "line stuck");
        assert_eq!(err.to_string(), "Device 'cDAQ1' hardware error: line stuck");
    }

    #[test]
    fn test_unsupported_maps_to_unsupported_operation() {
        let err: RigError = DeviceError::unsupported("sim", "digital readback").into();
        assert!(matches!(err, RigError::UnsupportedOperation(_)));
        assert_eq!(err.class(), ErrorClass::Server);
    }

    #[test]
    fn test_hardware_maps_to_hardware_io() {
        let err: RigError = DeviceError::new("sim", DeviceErrorKind::Timeout, "no ack").into();
        assert!(matches!(err, RigError::HardwareIo(ref e) if e.kind == DeviceErrorKind::Timeout));
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(RigError::unknown_relay("zz9_9").class(), ErrorClass::Client);
        assert_eq!(
            RigError::InvalidSelector {
                kind: "capacitor",
                value: "cs9".into()
            }
            .class(),
            ErrorClass::Client
        );
        assert_eq!(RigError::AlreadyRunning.class(), ErrorClass::Conflict);
        assert_eq!(RigError::NotRunning.class(), ErrorClass::Conflict);
        assert_eq!(
            RigError::MalformedRead {
                expected: 4,
                got: 3
            }
            .class(),
            ErrorClass::Server
        );
    }

    #[test]
    fn test_unknown_relay_message() {
        let err = RigError::unknown_relay("zk9_1");
        assert_eq!(err.to_string(), "Unknown relay: zk9_1");
    }
}
