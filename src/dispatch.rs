//! Inbound request routing.
//!
//! Parses one request, offers it to the device it is addressed to and
//! serializes the response. Transport agnostic: the caller owns both the
//! receive buffer and the output buffer.

use crate::device::Device;
use crate::error::Error;
use crate::message::{
    self, MESSAGE_DEVICE_ERROR, MESSAGE_OK, MESSAGE_UNKNOWN_DEVICE, Request, Response,
    ResponseValue,
};

/// Outcome of [`handle_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handled {
    /// Length of the response written to the output buffer.
    pub len: usize,
    /// The response's `success` flag.
    pub success: bool,
}

/// Handles one raw request message.
///
/// The request goes to the first device in `devices` whose id matches. A
/// request for an unknown device still gets a response, with `success`
/// set to `false`. The response is written to `out` with `timestamp` as its
/// creation time.
///
/// # Errors
///
/// * [`Error::InvalidMessage`] - `message` is not a valid request; nothing is written
/// * [`Error::BufferOverflow`] - the response does not fit in `out`
pub fn handle_request(
    devices: &mut [&mut dyn Device],
    message: &[u8],
    timestamp: u32,
    out: &mut [u8],
) -> Result<Handled, Error> {
    let request = Request::parse(message)?;
    let payload = &request.payload;

    let mut value = ResponseValue::default();
    let outcome = devices
        .iter_mut()
        .find(|device| device.device_id() == payload.device_id.as_str())
        .map(|device| {
            device.handle_request(&payload.device_id, &payload.action, &payload.value, &mut value)
        });

    let (success, text) = match outcome {
        Some(true) => (true, MESSAGE_OK),
        Some(false) => {
            debug!("{}: {} failed", payload.device_id.as_str(), payload.action.as_str());
            (false, MESSAGE_DEVICE_ERROR)
        }
        None => {
            warn!("request for unknown device {}", payload.device_id.as_str());
            (false, MESSAGE_UNKNOWN_DEVICE)
        }
    };

    let response = Response::new(payload, timestamp, success, text, value);
    let len = message::to_slice(&response, out)?;

    Ok(Handled { len, success })
}
