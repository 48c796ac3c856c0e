//! Reply tokens for outbound events.
//!
//! The platform needs a token on every event that is unique for the device.
//! Without a random source we derive it from the device id checksum, the
//! event timestamp and a per-device sequence number, then base64 encode the
//! 12 bytes into 16 URL-safe characters.

use crate::error::Error;
use base64ct::{Base64Url, Encoding};
use heapless::String;

/// Length of an encoded reply token.
pub const REPLY_TOKEN_LEN: usize = 16;

/// A reply token attached to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyToken(String<REPLY_TOKEN_LEN>);

impl ReplyToken {
    /// Derives the token for the `sequence`-th event of `device_id` sent at
    /// `timestamp`.
    pub fn generate(device_id: &str, timestamp: u32, sequence: u32) -> Result<Self, Error> {
        let mut raw = [0u8; 12];
        raw[..4].copy_from_slice(&crc32fast::hash(device_id.as_bytes()).to_be_bytes());
        raw[4..8].copy_from_slice(&timestamp.to_be_bytes());
        raw[8..].copy_from_slice(&sequence.to_be_bytes());

        let mut encoded = [0u8; REPLY_TOKEN_LEN];
        let token = Base64Url::encode(&raw, &mut encoded).map_err(|_| Error::BufferOverflow)?;
        let token = String::try_from(token).map_err(|_| Error::BufferOverflow)?;
        Ok(Self(token))
    }

    /// The encoded token.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl core::fmt::Display for ReplyToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
