//! Error types for the route responder.
//!
//! Every variant maps to exactly one errno. The dispatcher hands that errno
//! back to the transport, negated, in place of a byte count.

use std::io;

/// Result type for responder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling a route request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Message or attribute was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected length.
        expected: usize,
        /// Actual bytes available.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Attribute violates its validation policy.
    #[error("attribute {attr} violates policy: {reason}")]
    Policy {
        /// Attribute type id.
        attr: u16,
        /// What was wrong with it.
        reason: String,
    },

    /// Attribute payload does not have the width the accessor expects.
    #[error("attribute {attr}: expected {expected} bytes, got {actual}")]
    TypeMismatch {
        /// Attribute type id.
        attr: u16,
        /// Expected payload length.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// A response buffer could not be allocated or queued.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// No device with the requested index.
    #[error("no such device: index {index}")]
    DeviceNotFound {
        /// The interface index that was not found.
        index: u32,
    },

    /// The supplied address is not assigned to the device.
    #[error("address not available")]
    AddressNotAvailable,

    /// Message type is unknown or disabled.
    #[error("function not implemented: {0}")]
    NotImplemented(String),

    /// Address family is not supported for this message type.
    #[error("address family {family} not supported")]
    FamilyNotSupported {
        /// Raw family byte from the request.
        family: u8,
    },

    /// A table snapshot produced no entries.
    #[error("no such entry: {0}")]
    NoEntry(String),

    /// An external registry rejected a mutation.
    #[error("{message} (errno {errno})")]
    Stack {
        /// Positive errno value reported by the registry.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Responder configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The shared network state lock was poisoned by a panicking writer.
    #[error("network state lock poisoned")]
    StatePoisoned,
}

impl Error {
    /// Create a registry error from an errno value (positive or negative).
    pub fn from_errno(errno: i32) -> Self {
        let errno = errno.abs();
        let message = io::Error::from_raw_os_error(errno).to_string();
        Self::Stack { errno, message }
    }

    /// Positive errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Truncated { .. }
            | Self::InvalidMessage(_)
            | Self::InvalidAttribute(_)
            | Self::Policy { .. }
            | Self::TypeMismatch { .. }
            | Self::Config(_) => libc::EINVAL,
            Self::OutOfMemory(_) => libc::ENOMEM,
            Self::DeviceNotFound { .. } => libc::ENODEV,
            Self::AddressNotAvailable => libc::EADDRNOTAVAIL,
            Self::NotImplemented(_) => libc::ENOSYS,
            Self::FamilyNotSupported { .. } => libc::EAFNOSUPPORT,
            Self::NoEntry(_) => libc::ENOENT,
            Self::Stack { errno, .. } => *errno,
            Self::StatePoisoned => libc::EIO,
        }
    }

    /// Negative errno, as returned to the transport in place of a byte count.
    pub fn status(&self) -> isize {
        -(self.errno() as isize)
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV).
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), libc::ENOENT | libc::ENODEV)
    }

    /// Check if the request was rejected as malformed (EINVAL).
    pub fn is_invalid(&self) -> bool {
        self.errno() == libc::EINVAL
    }

    /// Check if the operation or family is unsupported (ENOSYS, EAFNOSUPPORT).
    pub fn is_unsupported(&self) -> bool {
        matches!(self.errno(), libc::ENOSYS | libc::EAFNOSUPPORT)
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory(err.to_string())
    }
}
