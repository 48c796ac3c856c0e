//! Common error type for device and client operations

use crate::network::error::Error as NetworkError;

/// A common error type for device and client operations.
///
/// Callback failures are not errors: they are reported through the
/// `success` flag of the response. This enum covers everything around the
/// callbacks that can go wrong.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A fixed-size buffer was too small (device id, message, topic).
    BufferOverflow,
    /// An inbound message could not be parsed as a request.
    InvalidMessage,
    /// An event was refused because the previous one is too recent.
    RateLimited,
    /// The underlying transport failed.
    Transport(NetworkError),
}

impl From<NetworkError> for Error {
    fn from(error: NetworkError) -> Self {
        Error::Transport(error)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::BufferOverflow => f.write_str("buffer overflow"),
            Error::InvalidMessage => f.write_str("invalid message"),
            Error::RateLimited => f.write_str("event rate limited"),
            Error::Transport(e) => write!(f, "transport error: {:?}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            Error::InvalidMessage => defmt::write!(f, "InvalidMessage"),
            Error::RateLimited => defmt::write!(f, "RateLimited"),
            Error::Transport(e) => defmt::write!(f, "Transport({})", e),
        }
    }
}
