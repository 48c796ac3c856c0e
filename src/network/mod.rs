//! Byte-connection traits for the transport layer
//!
//! The SDK does not open sockets itself. The application hands over an
//! already established connection (TCP, TLS, a modem UART, ...) implementing
//! [`Connection`], and the [`mqtt`] client speaks the protocol over it.

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// MQTT 3.1.1 client used as the platform transport
pub mod mqtt;

/// Reads bytes from a connection.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection.
    ///
    /// Returns `Ok(0)` when no data is available right now.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Writes bytes to a connection.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Closes a connection.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}
