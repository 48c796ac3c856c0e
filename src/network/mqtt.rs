//! MQTT 3.1.1 client for embedded systems.
//!
//! A small MQTT client used as the platform transport: requests arrive as
//! PUBLISH packets on a subscribed topic, responses and events leave as
//! PUBLISH packets. It works over any [`Connection`] and uses fixed-size
//! buffers sized for one platform message.
//!
//! Only what the SDK needs is implemented: CONNECT, PUBLISH (QoS 0/1 in
//! both directions, inbound QoS 1 acknowledged with PUBACK), SUBSCRIBE,
//! PINGREQ and DISCONNECT. QoS 2 is not supported. Packets the client does
//! not handle are dropped so the stream stays in sync.
//!
//! [`Client::poll`] never waits on a partial packet. Bytes are collected in
//! a receive buffer and a packet is only handed out once it is complete, so
//! a message split across several reads is picked up by a later poll.
//!
//! ```rust,no_run
//! use libsinric::network::mqtt::{Client, Options, QoS};
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
//!
//! let options = Options {
//!     client_id: "living-room-dimmer",
//!     keep_alive_seconds: 60,
//!     clean_session: true,
//! };
//!
//! // let mut client = Client::connect(TcpConnection, options)?;
//! // client.subscribe("sinricpro/requests", QoS::AtLeastOnce)?;
//! ```

use crate::message::MAX_MESSAGE_LEN;
use crate::network::error::Error;
use crate::network::{Connection, Read, Write};
use heapless::{String, Vec};

// MQTT control packet types (fixed header, upper nibble plus required flags)
const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const PINGREQ: u8 = 0xC0;
const DISCONNECT: u8 = 0xE0;

const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 4; // MQTT 3.1.1

/// Maximum topic length accepted by the client.
pub const MAX_TOPIC_LEN: usize = 128;

/// Largest packet body the client will send or receive: topic, packet id
/// and one full platform message.
pub const MAX_PACKET_LEN: usize = 2 + MAX_TOPIC_LEN + 2 + MAX_MESSAGE_LEN;

// fixed header (type byte plus up to four length bytes) and one packet body
const RX_BUFFER_LEN: usize = 5 + MAX_PACKET_LEN;

/// An incoming PUBLISH message.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    /// The topic on which the message was published.
    pub topic: String<MAX_TOPIC_LEN>,
    /// The message payload.
    pub payload: Vec<u8, MAX_MESSAGE_LEN>,
}

/// Quality of Service levels supported by the client.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce = 0,
    /// Acknowledged delivery, duplicates possible.
    AtLeastOnce = 1,
}

/// Options for the MQTT connection.
#[derive(Debug, Clone)]
pub struct Options<'a> {
    /// The client identifier, unique per broker.
    pub client_id: &'a str,
    /// The keep-alive interval in seconds, 0 disables it.
    pub keep_alive_seconds: u16,
    /// Whether the broker should discard previous session state.
    pub clean_session: bool,
}

/// An MQTT 3.1.1 client.
#[derive(Debug)]
pub struct Client<C: Connection> {
    connection: C,
    next_packet_id: u16,
    rx: Vec<u8, RX_BUFFER_LEN>,
    // bytes of an oversized packet still to be dropped from the connection
    discard: usize,
}

impl<C: Connection> Client<C> {
    /// Establishes an MQTT session over `connection`.
    ///
    /// Sends CONNECT and waits for CONNACK. The handshake reads the
    /// connection until the answer is complete, so a read returning `Ok(0)`
    /// here counts as a closed connection.
    ///
    /// # Errors
    ///
    /// * [`Error::ConnectionRefused`] - the broker answered with a non-zero return code
    /// * [`Error::ConnectionClosed`] - the connection closed during the handshake
    /// * [`Error::ProtocolError`] - the answer was not a valid CONNACK
    /// * [`Error::PacketTooLarge`] - the client id does not fit
    pub fn connect(mut connection: C, options: Options<'_>) -> Result<Self, Error> {
        let mut body: Vec<u8, 266> = Vec::new();

        // --- Variable Header ---
        push_str(&mut body, PROTOCOL_NAME)?;
        body.push(PROTOCOL_LEVEL).map_err(|_| Error::PacketTooLarge)?;
        let connect_flags = if options.clean_session { 0x02 } else { 0x00 };
        body.push(connect_flags).map_err(|_| Error::PacketTooLarge)?;
        body.extend_from_slice(&options.keep_alive_seconds.to_be_bytes())
            .map_err(|_| Error::PacketTooLarge)?;

        // --- Payload ---
        push_str(&mut body, options.client_id.as_bytes())?;

        send_packet(&mut connection, CONNECT, &body)?;

        let mut connack = [0u8; 4];
        read_exact(&mut connection, &mut connack)?;

        if connack[0] != CONNACK || connack[1] != 2 {
            return Err(Error::ProtocolError);
        }

        match connack[3] {
            0 => Ok(Self {
                connection,
                next_packet_id: 1,
                rx: Vec::new(),
                discard: 0,
            }),
            1..=5 => Err(Error::ConnectionRefused),
            _ => Err(Error::ProtocolError),
        }
    }

    /// Publishes `payload` on `topic`.
    ///
    /// QoS 1 messages carry a packet identifier; the PUBACK is not awaited
    /// and is dropped by [`poll`](Self::poll) when it arrives.
    ///
    /// # Errors
    ///
    /// * [`Error::PacketTooLarge`] - topic and payload exceed [`MAX_PACKET_LEN`]
    /// * [`Error::WriteError`] - the connection failed to take the packet
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        let mut body: Vec<u8, MAX_PACKET_LEN> = Vec::new();

        push_str(&mut body, topic.as_bytes())?;
        if qos != QoS::AtMostOnce {
            let packet_id = self.packet_id();
            body.extend_from_slice(&packet_id.to_be_bytes())
                .map_err(|_| Error::PacketTooLarge)?;
        }
        body.extend_from_slice(payload)
            .map_err(|_| Error::PacketTooLarge)?;

        let header = PUBLISH | ((qos as u8) << 1);
        send_packet(&mut self.connection, header, &body)
    }

    /// Subscribes to `topic` and waits for the SUBACK.
    ///
    /// Meant to be called right after [`connect`](Self::connect), before
    /// polling starts. Like the connect handshake it treats a read
    /// returning `Ok(0)` as a closed connection.
    ///
    /// # Errors
    ///
    /// * [`Error::ConnectionRefused`] - the broker rejected the subscription
    /// * [`Error::ProtocolError`] - the answer was not the matching SUBACK
    /// * [`Error::PacketTooLarge`] - the topic exceeds [`MAX_TOPIC_LEN`]
    /// * [`Error::ConnectionClosed`], [`Error::ReadError`], [`Error::WriteError`] - connection failures
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Error> {
        if topic.len() > MAX_TOPIC_LEN {
            return Err(Error::PacketTooLarge);
        }
        let mut body: Vec<u8, { MAX_TOPIC_LEN + 5 }> = Vec::new();

        let packet_id = self.packet_id();
        body.extend_from_slice(&packet_id.to_be_bytes())
            .map_err(|_| Error::PacketTooLarge)?;
        push_str(&mut body, topic.as_bytes())?;
        body.push(qos as u8).map_err(|_| Error::PacketTooLarge)?;

        send_packet(&mut self.connection, SUBSCRIBE, &body)?;

        let mut suback = [0u8; 5];
        read_exact(&mut self.connection, &mut suback)?;

        if suback[0] != SUBACK {
            return Err(Error::ProtocolError);
        }
        if u16::from_be_bytes([suback[2], suback[3]]) != packet_id {
            return Err(Error::ProtocolError);
        }
        // 0x80 is the failure return code
        if suback[4] == 0x80 {
            return Err(Error::ConnectionRefused);
        }

        Ok(())
    }

    /// Polls the connection for one incoming PUBLISH message.
    ///
    /// Reads whatever the connection has available without waiting.
    /// Returns `Ok(None)` when no complete PUBLISH is buffered yet; a
    /// partial packet stays buffered and is completed by later polls.
    /// Other packet types are dropped. Incoming QoS 1 messages are
    /// acknowledged.
    ///
    /// # Errors
    ///
    /// * [`Error::PacketTooLarge`] - a packet exceeded [`MAX_PACKET_LEN`]; it is dropped
    ///   from the stream, over several polls if needed
    /// * [`Error::ProtocolError`] - a malformed packet; a PUBLISH is dropped, a broken
    ///   fixed header discards the buffered bytes
    /// * [`Error::ReadError`], [`Error::WriteError`] - connection failures
    pub fn poll(&mut self) -> Result<Option<PublishPacket>, Error> {
        self.drain_discarded()?;
        if self.discard > 0 {
            return Ok(None);
        }
        self.fill()?;

        loop {
            let (header_len, remaining_len) = match frame(&self.rx) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(None),
                Err(error) => {
                    self.rx.clear();
                    return Err(error);
                }
            };
            let total = header_len + remaining_len;

            if remaining_len > MAX_PACKET_LEN {
                let buffered = self.rx.len().min(total);
                self.consume(buffered);
                self.discard = total - buffered;
                self.drain_discarded()?;
                return Err(Error::PacketTooLarge);
            }
            if self.rx.len() < total {
                return Ok(None);
            }

            let header = self.rx[0];
            if header & 0xF0 != PUBLISH {
                self.consume(total);
                continue;
            }

            let parsed = parse_publish(header, &self.rx[header_len..total]);
            self.consume(total);
            let (packet, packet_id) = parsed?;
            if let Some(packet_id) = packet_id {
                send_packet(&mut self.connection, PUBACK, &packet_id)?;
            }
            return Ok(Some(packet));
        }
    }

    /// Sends a PINGREQ to keep the session alive.
    pub fn ping(&mut self) -> Result<(), Error> {
        send_packet(&mut self.connection, PINGREQ, &[])
    }

    /// Sends DISCONNECT and closes the underlying connection.
    pub fn disconnect(mut self) -> Result<(), Error> {
        send_packet(&mut self.connection, DISCONNECT, &[])?;
        self.connection.close().map_err(|_| Error::ConnectionClosed)
    }

    /// Get a mutable reference to the underlying connection
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    fn packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        // packet identifiers must be non-zero
        self.next_packet_id = match self.next_packet_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }

    /// Appends everything the connection has available to the receive buffer.
    fn fill(&mut self) -> Result<(), Error> {
        while !self.rx.is_full() {
            let start = self.rx.len();
            self.rx
                .resize(RX_BUFFER_LEN, 0)
                .map_err(|_| Error::PacketTooLarge)?;
            let read = self.connection.read(&mut self.rx[start..]);
            let len = match read {
                Ok(len) => len,
                Err(_) => {
                    self.rx.truncate(start);
                    return Err(Error::ReadError);
                }
            };
            self.rx.truncate(start + len);
            if len == 0 {
                break;
            }
        }
        Ok(())
    }

    fn drain_discarded(&mut self) -> Result<(), Error> {
        let mut scratch = [0u8; 64];
        while self.discard > 0 {
            let chunk = self.discard.min(scratch.len());
            match self.connection.read(&mut scratch[..chunk]) {
                Ok(0) => break,
                Ok(len) => self.discard -= len,
                Err(_) => return Err(Error::ReadError),
            }
        }
        Ok(())
    }

    fn consume(&mut self, len: usize) {
        let remaining = self.rx.len() - len;
        self.rx.copy_within(len.., 0);
        self.rx.truncate(remaining);
    }
}

/// Decodes the fixed header at the start of `buf`.
///
/// Returns the header length and the remaining length, or `None` while the
/// length bytes are still incomplete.
fn frame(buf: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let mut remaining_len = 0usize;
    let mut multiplier = 1usize;
    for (i, byte) in buf.iter().skip(1).take(4).enumerate() {
        remaining_len += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((i + 2, remaining_len)));
        }
        multiplier *= 128;
    }
    if buf.len() >= 5 {
        return Err(Error::ProtocolError);
    }
    Ok(None)
}

/// Splits a PUBLISH body into the message and, for QoS 1, the packet id to
/// acknowledge.
fn parse_publish(header: u8, body: &[u8]) -> Result<(PublishPacket, Option<[u8; 2]>), Error> {
    let qos = (header >> 1) & 0x03;
    if qos > 1 {
        return Err(Error::ProtocolError);
    }
    if body.len() < 2 {
        return Err(Error::ProtocolError);
    }

    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    let mut offset = 2 + topic_len;
    if body.len() < offset {
        return Err(Error::ProtocolError);
    }
    let topic = core::str::from_utf8(&body[2..offset]).map_err(|_| Error::ProtocolError)?;
    let topic = String::try_from(topic).map_err(|_| Error::PacketTooLarge)?;

    let mut packet_id = None;
    if qos == 1 {
        if body.len() < offset + 2 {
            return Err(Error::ProtocolError);
        }
        packet_id = Some([body[offset], body[offset + 1]]);
        offset += 2;
    }

    let payload = Vec::from_slice(&body[offset..]).map_err(|_| Error::PacketTooLarge)?;
    Ok((PublishPacket { topic, payload }, packet_id))
}

/// Appends a length-prefixed MQTT string.
fn push_str<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    let len = u16::try_from(bytes.len()).map_err(|_| Error::PacketTooLarge)?;
    buf.extend_from_slice(&len.to_be_bytes())
        .map_err(|_| Error::PacketTooLarge)?;
    buf.extend_from_slice(bytes)
        .map_err(|_| Error::PacketTooLarge)
}

fn send_packet<C: Write>(connection: &mut C, header: u8, body: &[u8]) -> Result<(), Error> {
    let mut fixed_header: Vec<u8, 5> = Vec::new();
    fixed_header.push(header).map_err(|_| Error::PacketTooLarge)?;
    encode_remaining_length(&mut fixed_header, body.len())?;

    write_all(connection, &fixed_header)?;
    write_all(connection, body)?;
    connection.flush().map_err(|_| Error::WriteError)
}

fn write_all<C: Write>(connection: &mut C, mut buf: &[u8]) -> Result<(), Error> {
    while !buf.is_empty() {
        match connection.write(buf) {
            Ok(0) => return Err(Error::WriteError),
            Ok(n) => buf = &buf[n..],
            Err(_) => return Err(Error::WriteError),
        }
    }
    Ok(())
}

fn read_exact<C: Read>(connection: &mut C, buf: &mut [u8]) -> Result<(), Error> {
    let mut total_read = 0;
    while total_read < buf.len() {
        match connection.read(&mut buf[total_read..]) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(n) => total_read += n,
            Err(_) => return Err(Error::ReadError),
        }
    }
    Ok(())
}

/// Encodes the variable-length "remaining length" field.
///
/// Each byte carries 7 bits, the high bit marks continuation; at most four
/// bytes (268 435 455).
fn encode_remaining_length(buf: &mut Vec<u8, 5>, mut len: usize) -> Result<(), Error> {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| Error::PacketTooLarge)?;
        if len == 0 {
            return Ok(());
        }
    }
}
