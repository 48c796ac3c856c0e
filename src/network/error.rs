//! Common error types for network operations

/// A common error type for network operations.
///
/// Kept small and `Copy` so it can be embedded in [`crate::Error`] and
/// passed around on targets without an allocator.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a session that is not connected.
    NotConnected,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// The broker refused the connection.
    ConnectionRefused,
    /// The connection was closed by the peer.
    ConnectionClosed,
    /// A packet did not fit in the client's fixed-size buffers.
    PacketTooLarge,
    /// A malformed or unexpected packet was received.
    ProtocolError,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::PacketTooLarge => defmt::write!(f, "PacketTooLarge"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
