//! Smart-device abstractions.
//!
//! A device owns its id, a few callback slots and an event limiter. Inbound
//! requests reach it through [`Device::handle_request`], which matches the
//! action name, runs the registered callback and fills in the response
//! value. Outbound events are built by the device's `send_*_event` methods
//! and handed to a [`Transport`].
//!
//! [`DeviceCore`] carries what every device type shares: the id, the
//! `setPowerState` callback and the event plumbing. [`Camera`],
//! [`DimSwitch`] and [`PowerSensor`] wrap it.
//!
//! Callbacks are plain function pointers, as with the shell commands of
//! embedded consoles: keep hardware state in statics guarded by a critical
//! section or in the peripheral itself.

#![deny(unsafe_code)]

use crate::error::Error;
use crate::message::{self, Cause, Event, MAX_MESSAGE_LEN, ReplyToken, RequestValue, ResponseValue};
use heapless::String;
use serde::Serialize;

pub mod camera;
pub mod dim_switch;
pub mod power_sensor;

pub use camera::Camera;
pub use dim_switch::DimSwitch;
pub use power_sensor::{PowerReading, PowerSensor};

/// Maximum length of a device id.
pub const MAX_DEVICE_ID_LEN: usize = 32;

/// Default minimum time between two events of one device.
pub const DEFAULT_EVENT_WAIT_TIME_MS: u32 = 100;

/// Lower bound for the event wait time; smaller values are raised to it.
pub const MIN_EVENT_WAIT_TIME_MS: u32 = 100;

const PRODUCT_TYPE_PREFIX: &str = "sinric.device.type.";

pub(crate) const SET_POWER_STATE: &str = "setPowerState";

/// Device identifier as assigned by the platform.
pub type DeviceId = String<MAX_DEVICE_ID_LEN>;

/// Callback for `setPowerState` requests.
///
/// Receives the device id and the requested state (`true` = on). It may
/// overwrite the state with the one actually reached and returns whether
/// the request was handled.
pub type PowerStateCallback = fn(device_id: &str, state: &mut bool) -> bool;

/// Product type announced to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    /// `sinric.device.type.CAMERA`
    Camera,
    /// `sinric.device.type.DIMMABLE_SWITCH`
    DimmableSwitch,
    /// `sinric.device.type.POWER_SENSOR`
    PowerSensor,
}

impl ProductType {
    /// The type name without the common prefix.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Camera => "CAMERA",
            Self::DimmableSwitch => "DIMMABLE_SWITCH",
            Self::PowerSensor => "POWER_SENSOR",
        }
    }
}

impl core::fmt::Display for ProductType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(PRODUCT_TYPE_PREFIX)?;
        f.write_str(self.name())
    }
}

/// Time source used for message timestamps and event throttling.
pub trait Clock {
    /// Seconds since the Unix epoch, synchronised with the platform.
    fn timestamp(&self) -> u32;
    /// Monotonic milliseconds since boot.
    fn uptime_ms(&self) -> u64;
}

/// Where devices send their events.
pub trait Transport: Clock {
    /// Sends one serialized event message.
    fn send_event(&mut self, message: &[u8]) -> Result<(), Error>;
}

/// A device reachable by platform requests.
///
/// Object safe, so devices of different types can be dispatched from one
/// `&mut [&mut dyn Device]`.
pub trait Device {
    /// The platform-assigned device id.
    fn device_id(&self) -> &str;

    /// The product type of this device.
    fn product_type(&self) -> ProductType;

    /// Handles one request.
    ///
    /// Returns `false` when `device_id` is not this device's, when no
    /// callback is registered for `action`, or when the callback failed.
    fn handle_request(
        &mut self,
        device_id: &str,
        action: &str,
        request: &RequestValue<'_>,
        response: &mut ResponseValue,
    ) -> bool;
}

/// Clamps `value` into `[min, max]`.
pub fn limit_value(value: i32, min: i32, max: i32) -> i32 {
    value.clamp(min, max)
}

#[derive(Debug, Clone, Copy)]
struct EventLimiter {
    wait_time_ms: u64,
    last_event_ms: Option<u64>,
}

impl EventLimiter {
    fn new(wait_time_ms: u32) -> Self {
        Self {
            wait_time_ms: u64::from(wait_time_ms.max(MIN_EVENT_WAIT_TIME_MS)),
            last_event_ms: None,
        }
    }

    fn is_allowed(&self, now_ms: u64) -> bool {
        match self.last_event_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.wait_time_ms,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct PowerStateValue {
    state: &'static str,
}

fn state_name(state: bool) -> &'static str {
    if state { "On" } else { "Off" }
}

/// State and behaviour shared by every device type.
#[derive(Debug, Clone)]
pub struct DeviceCore {
    device_id: DeviceId,
    product_type: ProductType,
    limiter: EventLimiter,
    sequence: u32,
    power_state_callback: Option<PowerStateCallback>,
}

impl DeviceCore {
    /// Creates a device core with the default event wait time.
    pub fn new(device_id: &str, product_type: ProductType) -> Result<Self, Error> {
        Self::with_event_wait_time(device_id, product_type, DEFAULT_EVENT_WAIT_TIME_MS)
    }

    /// Creates a device core that sends at most one event every
    /// `event_wait_time_ms` milliseconds (at least [`MIN_EVENT_WAIT_TIME_MS`]).
    pub fn with_event_wait_time(
        device_id: &str,
        product_type: ProductType,
        event_wait_time_ms: u32,
    ) -> Result<Self, Error> {
        let device_id = DeviceId::try_from(device_id).map_err(|_| Error::BufferOverflow)?;
        Ok(Self {
            device_id,
            product_type,
            limiter: EventLimiter::new(event_wait_time_ms),
            sequence: 0,
            power_state_callback: None,
        })
    }

    /// Effective minimum time between two events.
    pub fn event_wait_time_ms(&self) -> u64 {
        self.limiter.wait_time_ms
    }

    /// Sets the `setPowerState` callback, replacing any previous one.
    pub fn on_power_state(&mut self, callback: PowerStateCallback) {
        self.power_state_callback = Some(callback);
    }

    /// Sends a `setPowerState` event reporting the actual power state.
    ///
    /// The cause defaults to [`Cause::PhysicalInteraction`].
    pub fn send_power_state_event<T: Transport>(
        &mut self,
        transport: &mut T,
        state: bool,
        cause: Option<Cause>,
    ) -> Result<(), Error> {
        let value = PowerStateValue {
            state: state_name(state),
        };
        self.send_event(
            transport,
            SET_POWER_STATE,
            cause.unwrap_or(Cause::PhysicalInteraction),
            value,
        )
    }

    /// Builds an event with `value` and hands it to `transport`.
    pub fn send_event<T: Transport, V: Serialize>(
        &mut self,
        transport: &mut T,
        action: &str,
        cause: Cause,
        value: V,
    ) -> Result<(), Error> {
        let timestamp = transport.timestamp();
        self.send_event_at(transport, timestamp, action, cause, value)
    }

    /// Like [`send_event`](Self::send_event) with an explicit `createdAt`.
    pub(crate) fn send_event_at<T: Transport, V: Serialize>(
        &mut self,
        transport: &mut T,
        timestamp: u32,
        action: &str,
        cause: Cause,
        value: V,
    ) -> Result<(), Error> {
        let now_ms = transport.uptime_ms();
        if !self.limiter.is_allowed(now_ms) {
            debug!("{}: {} event dropped, too soon", self.device_id.as_str(), action);
            return Err(Error::RateLimited);
        }

        let sequence = self.sequence.wrapping_add(1);
        let token = ReplyToken::generate(&self.device_id, timestamp, sequence)?;
        let event = Event::new(&self.device_id, action, cause, timestamp, token.as_str(), value);

        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message::to_slice(&event, &mut buf)?;
        transport.send_event(&buf[..len])?;

        self.sequence = sequence;
        self.limiter.last_event_ms = Some(now_ms);
        debug!("{}: sent {} event", self.device_id.as_str(), action);
        Ok(())
    }
}

impl Device for DeviceCore {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn product_type(&self) -> ProductType {
        self.product_type
    }

    fn handle_request(
        &mut self,
        device_id: &str,
        action: &str,
        request: &RequestValue<'_>,
        response: &mut ResponseValue,
    ) -> bool {
        if device_id != self.device_id.as_str() {
            return false;
        }

        match (action, self.power_state_callback) {
            (SET_POWER_STATE, Some(callback)) => {
                let mut state = request.state == Some("On");
                let success = callback(device_id, &mut state);
                response.state = Some(state_name(state));
                success
            }
            _ => false,
        }
    }
}
