//! SinricPro client over MQTT.
//!
//! Binds the devices to one MQTT session: requests arrive on the request
//! topic, responses go to the response topic and events to the event topic.
//! The client implements [`Transport`], so it is what devices are handed
//! when they send events.
//!
//! ```rust,no_run
//! use libsinric::client::{Options, SinricPro};
//! use libsinric::device::{Clock, DimSwitch};
//! # use libsinric::network::Connection;
//! # struct TcpConnection;
//! # impl Connection for TcpConnection {}
//! # impl libsinric::network::Read for TcpConnection {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl libsinric::network::Write for TcpConnection {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl libsinric::network::Close for TcpConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Rtc;
//! # impl Clock for Rtc {
//! #     fn timestamp(&self) -> u32 { 1_600_000_000 }
//! #     fn uptime_ms(&self) -> u64 { 0 }
//! # }
//!
//! fn set_level(_device_id: &str, _level: &mut i32) -> bool {
//!     true
//! }
//!
//! # fn main() -> Result<(), libsinric::Error> {
//! let mut switch = DimSwitch::new("5dc1564130xxxxxxxxxxxxxx")?;
//! switch.on_power_level(set_level);
//!
//! let mut client = SinricPro::connect(TcpConnection, Rtc, Options::new("dimmer"))?;
//! loop {
//!     client.handle(&mut [&mut switch])?;
//! }
//! # }
//! ```

use crate::device::{Clock, Device, Transport};
use crate::dispatch;
use crate::error::Error;
use crate::message::MAX_MESSAGE_LEN;
use crate::network::Connection;
use crate::network::mqtt::{self, QoS};

/// Default topic requests are received on.
pub const DEFAULT_REQUEST_TOPIC: &str = "sinricpro/requests";
/// Default topic responses are published on.
pub const DEFAULT_RESPONSE_TOPIC: &str = "sinricpro/responses";
/// Default topic events are published on.
pub const DEFAULT_EVENT_TOPIC: &str = "sinricpro/events";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Options<'a> {
    /// MQTT session options.
    pub mqtt: mqtt::Options<'a>,
    /// Topic subscribed to for requests.
    pub request_topic: &'a str,
    /// Topic responses are published on.
    pub response_topic: &'a str,
    /// Topic events are published on.
    pub event_topic: &'a str,
    /// QoS for the subscription and for published messages. QoS 1 makes
    /// the broker redeliver requests that were not acknowledged.
    pub qos: QoS,
}

impl<'a> Options<'a> {
    /// Default options for `client_id`: 60 s keep-alive, clean session,
    /// default topics, QoS 0.
    pub fn new(client_id: &'a str) -> Self {
        Self {
            mqtt: mqtt::Options {
                client_id,
                keep_alive_seconds: 60,
                clean_session: true,
            },
            request_topic: DEFAULT_REQUEST_TOPIC,
            response_topic: DEFAULT_RESPONSE_TOPIC,
            event_topic: DEFAULT_EVENT_TOPIC,
            qos: QoS::AtMostOnce,
        }
    }
}

/// A connected SinricPro client.
#[derive(Debug)]
pub struct SinricPro<'a, C: Connection, K: Clock> {
    mqtt: mqtt::Client<C>,
    clock: K,
    request_topic: &'a str,
    response_topic: &'a str,
    event_topic: &'a str,
    qos: QoS,
}

impl<'a, C: Connection, K: Clock> SinricPro<'a, C, K> {
    /// Opens the MQTT session and subscribes to the request topic.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] when the broker refuses the session or the
    /// subscription, or the connection fails during the handshake.
    pub fn connect(connection: C, clock: K, options: Options<'a>) -> Result<Self, Error> {
        let client_id = options.mqtt.client_id;
        let mut mqtt = mqtt::Client::connect(connection, options.mqtt)?;
        mqtt.subscribe(options.request_topic, options.qos)?;
        debug!("connected as {}", client_id);

        Ok(Self {
            mqtt,
            clock,
            request_topic: options.request_topic,
            response_topic: options.response_topic,
            event_topic: options.event_topic,
            qos: options.qos,
        })
    }

    /// Processes at most one incoming message.
    ///
    /// Returns `Ok(None)` when no complete message was received or the
    /// message was not on the request topic, otherwise the success flag of
    /// the published response. A request for an unknown device is still
    /// answered, with `success: false`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidMessage`] - the request could not be parsed; it is left unanswered
    /// * [`Error::BufferOverflow`] - the response does not fit in one message
    /// * [`Error::Transport`] - polling or publishing the response failed
    pub fn handle(&mut self, devices: &mut [&mut dyn Device]) -> Result<Option<bool>, Error> {
        let Some(packet) = self.mqtt.poll()? else {
            return Ok(None);
        };

        if packet.topic.as_str() != self.request_topic {
            debug!("ignoring message on {}", packet.topic.as_str());
            return Ok(None);
        }

        let mut out = [0u8; MAX_MESSAGE_LEN];
        let handled =
            dispatch::handle_request(devices, &packet.payload, self.clock.timestamp(), &mut out)?;
        self.mqtt
            .publish(self.response_topic, &out[..handled.len], self.qos)?;

        Ok(Some(handled.success))
    }

    /// Keeps the MQTT session alive. Call it within the keep-alive interval.
    pub fn ping(&mut self) -> Result<(), Error> {
        Ok(self.mqtt.ping()?)
    }

    /// Ends the session.
    pub fn disconnect(self) -> Result<(), Error> {
        Ok(self.mqtt.disconnect()?)
    }

    /// The underlying MQTT client.
    pub fn mqtt_mut(&mut self) -> &mut mqtt::Client<C> {
        &mut self.mqtt
    }
}

impl<C: Connection, K: Clock> Clock for SinricPro<'_, C, K> {
    fn timestamp(&self) -> u32 {
        self.clock.timestamp()
    }

    fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }
}

impl<C: Connection, K: Clock> Transport for SinricPro<'_, C, K> {
    fn send_event(&mut self, message: &[u8]) -> Result<(), Error> {
        Ok(self.mqtt.publish(self.event_topic, message, self.qos)?)
    }
}
