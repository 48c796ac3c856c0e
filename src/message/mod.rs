//! Platform message shapes.
//!
//! Every message is a JSON object with a `header` and a `payload`. The
//! payload's `type` tells requests, responses and events apart and its
//! `value` object carries the action-specific fields. Field names here are
//! the platform's and must not change.
//!
//! Requests are parsed from the receive buffer. The strings a response
//! echoes back are unescaped into fixed-capacity fields so they serialize
//! to the same JSON text; everything else is borrowed. Responses and events
//! are serialized straight into a caller-provided slice.

#![deny(unsafe_code)]

use crate::error::Error;
use heapless::String;
use serde::{Deserialize, Deserializer, Serialize};

pub mod token;

pub use token::ReplyToken;

/// Maximum size of a serialized message.
pub const MAX_MESSAGE_LEN: usize = 1024;

/// Capacity of the request strings echoed in the response.
pub const MAX_FIELD_LEN: usize = 64;

/// An unescaped request string echoed in the response.
pub type Field = String<MAX_FIELD_LEN>;

/// Payload version spoken by this SDK.
pub const PAYLOAD_VERSION: u8 = 2;

/// Signature version announced in the header.
pub const SIGNATURE_VERSION: u8 = 1;

/// Response message for a request that succeeded.
pub const MESSAGE_OK: &str = "OK";
/// Response message for a request the device callback rejected.
pub const MESSAGE_DEVICE_ERROR: &str = "Device returned an error while processing the request!";
/// Response message for a request addressed to an unknown device.
pub const MESSAGE_UNKNOWN_DEVICE: &str = "Device does not exist!";

/// Message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Always [`PAYLOAD_VERSION`].
    #[serde(rename = "payloadVersion")]
    pub payload_version: u8,
    /// Always [`SIGNATURE_VERSION`].
    #[serde(rename = "signatureVersion")]
    pub signature_version: u8,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            payload_version: PAYLOAD_VERSION,
            signature_version: SIGNATURE_VERSION,
        }
    }
}

/// The payload `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Sent by the platform, answered with a response.
    Request,
    /// Answer to a request.
    Response,
    /// Spontaneous report from a device.
    Event,
}

/// Why an event was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cause {
    /// Someone operated the device by hand.
    PhysicalInteraction,
    /// Regular sensor report.
    PeriodicPoll,
    /// Change triggered from the app.
    AppInteraction,
    /// Threshold or alarm condition.
    Alert,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct CauseObject {
    #[serde(rename = "type")]
    kind: Cause,
}

/// An inbound request.
///
/// Only the payload is read; `header` and `signature` are checked by the
/// transport and skipped here.
#[derive(Debug, Clone, Deserialize)]
pub struct Request<'a> {
    /// Request payload.
    #[serde(borrow)]
    pub payload: RequestPayload<'a>,
}

/// Payload of an inbound request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPayload<'a> {
    /// Action name, e.g. `setPowerLevel`.
    pub action: Field,
    /// Id of the app or client that issued the request.
    #[serde(rename = "clientId", default)]
    pub client_id: Option<Field>,
    /// Creation time, seconds since the epoch.
    #[serde(rename = "createdAt", default)]
    pub created_at: u32,
    /// Target device.
    #[serde(rename = "deviceId")]
    pub device_id: Field,
    /// Correlation token echoed in the response.
    #[serde(rename = "replyToken")]
    pub reply_token: Field,
    /// Must be [`MessageType::Request`].
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Action parameters.
    #[serde(default, borrow)]
    pub value: RequestValue<'a>,
}

/// The request `value` fields understood by the device types.
///
/// Levels accept any JSON number; fractions are truncated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RequestValue<'a> {
    /// `setPowerState`: `"On"` or `"Off"`.
    #[serde(default, borrow)]
    pub state: Option<&'a str>,
    /// `setPowerLevel`: absolute level.
    #[serde(rename = "powerLevel", default, deserialize_with = "truncated")]
    pub power_level: Option<i32>,
    /// `adjustPowerLevel`: relative change.
    #[serde(rename = "powerLevelDelta", default, deserialize_with = "truncated")]
    pub power_level_delta: Option<i32>,
}

fn truncated<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    // `as` saturates out-of-range values
    Ok(value.map(|value| value as i32))
}

impl<'a> Request<'a> {
    /// Parses a request from raw JSON.
    ///
    /// Fails with [`Error::InvalidMessage`] on malformed JSON, missing
    /// mandatory fields, echoed strings longer than [`MAX_FIELD_LEN`] or a
    /// payload that is not a request.
    pub fn parse(message: &'a [u8]) -> Result<Self, Error> {
        let mut unescaped = [0u8; MAX_FIELD_LEN];
        let (request, _) =
            serde_json_core::from_slice_escaped::<Request<'a>>(message, &mut unescaped)
                .map_err(|_| Error::InvalidMessage)?;
        if request.payload.kind != MessageType::Request {
            return Err(Error::InvalidMessage);
        }
        Ok(request)
    }
}

/// The response `value` fields a device may fill in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseValue {
    /// Resulting power state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
    /// Resulting absolute power level.
    #[serde(rename = "powerLevel", skip_serializing_if = "Option::is_none")]
    pub power_level: Option<i32>,
}

/// An outbound response.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Response<'a> {
    /// Message header.
    pub header: Header,
    /// Response payload.
    pub payload: ResponsePayload<'a>,
}

/// Payload of an outbound response.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResponsePayload<'a> {
    /// Action being answered.
    pub action: &'a str,
    /// Echoed from the request when present.
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<&'a str>,
    /// Creation time, seconds since the epoch.
    #[serde(rename = "createdAt")]
    pub created_at: u32,
    /// Device that handled the request.
    #[serde(rename = "deviceId")]
    pub device_id: &'a str,
    /// Human readable outcome.
    pub message: &'static str,
    /// Echoed from the request.
    #[serde(rename = "replyToken")]
    pub reply_token: &'a str,
    /// Whether the device handled the request.
    pub success: bool,
    /// Always [`MessageType::Response`].
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Resulting device state.
    pub value: ResponseValue,
}

impl<'a> Response<'a> {
    /// Builds the response to `request`.
    pub fn new(
        request: &'a RequestPayload<'_>,
        created_at: u32,
        success: bool,
        message: &'static str,
        value: ResponseValue,
    ) -> Self {
        Self {
            header: Header::default(),
            payload: ResponsePayload {
                action: request.action.as_str(),
                client_id: request.client_id.as_deref(),
                created_at,
                device_id: request.device_id.as_str(),
                message,
                reply_token: request.reply_token.as_str(),
                success,
                kind: MessageType::Response,
                value,
            },
        }
    }
}

/// An outbound event carrying a value of type `V`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Event<'a, V> {
    header: Header,
    payload: EventPayload<'a, V>,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct EventPayload<'a, V> {
    action: &'a str,
    cause: CauseObject,
    #[serde(rename = "createdAt")]
    created_at: u32,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    #[serde(rename = "replyToken")]
    reply_token: &'a str,
    #[serde(rename = "type")]
    kind: MessageType,
    value: V,
}

impl<'a, V: Serialize> Event<'a, V> {
    /// Builds an event.
    pub fn new(
        device_id: &'a str,
        action: &'a str,
        cause: Cause,
        created_at: u32,
        reply_token: &'a str,
        value: V,
    ) -> Self {
        Self {
            header: Header::default(),
            payload: EventPayload {
                action,
                cause: CauseObject { kind: cause },
                created_at,
                device_id,
                reply_token,
                kind: MessageType::Event,
                value,
            },
        }
    }
}

/// Serializes a message into `buf`, returning the number of bytes written.
pub fn to_slice<T: Serialize>(message: &T, buf: &mut [u8]) -> Result<usize, Error> {
    serde_json_core::to_slice(message, buf).map_err(|_| Error::BufferOverflow)
}
