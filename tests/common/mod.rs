//! Scripted connection and clock shared by the integration tests.

#![allow(dead_code)]

use libsinric::device::Clock;
use libsinric::network::error::Error;
use libsinric::network::{Close, Connection, Read, Write};
use std::cell::Cell;
use std::collections::VecDeque;

pub const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// A connection replaying scripted broker bytes and recording what the
/// client writes.
#[derive(Debug, Default)]
pub struct MockConnection {
    pub incoming: VecDeque<u8>,
    pub outgoing: Vec<u8>,
    pub is_open: bool,
}

impl MockConnection {
    /// A connection whose broker accepts the session and the first
    /// subscription.
    pub fn accepting() -> Self {
        let mut connection = Self {
            is_open: true,
            ..Default::default()
        };
        connection.push(&CONNACK);
        connection.push(&suback(1, 0x00));
        connection
    }

    /// Queues raw bytes for the client to read.
    pub fn push(&mut self, data: &[u8]) {
        self.incoming.extend(data);
    }

    /// Splits everything written so far into packets and clears it.
    pub fn take_packets(&mut self) -> Vec<(u8, Vec<u8>)> {
        let written = std::mem::take(&mut self.outgoing);
        let mut packets = Vec::new();
        let mut rest = &written[..];
        while !rest.is_empty() {
            let header = rest[0];
            let (len, used) = decode_remaining_length(&rest[1..]);
            let start = 1 + used;
            packets.push((header, rest[start..start + len].to_vec()));
            rest = &rest[start + len..];
        }
        packets
    }
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.is_open {
            return Err(Error::NotConnected);
        }
        let len = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.is_open {
            return Err(Error::NotConnected);
        }
        self.outgoing.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(mut self) -> Result<(), Self::Error> {
        self.is_open = false;
        Ok(())
    }
}

impl Connection for MockConnection {}

/// A clock the test moves by hand.
#[derive(Debug)]
pub struct ManualClock {
    pub timestamp: Cell<u32>,
    pub uptime_ms: Cell<u64>,
}

impl ManualClock {
    pub fn at(timestamp: u32) -> Self {
        Self {
            timestamp: Cell::new(timestamp),
            uptime_ms: Cell::new(0),
        }
    }
}

impl Clock for ManualClock {
    fn timestamp(&self) -> u32 {
        self.timestamp.get()
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime_ms.get()
    }
}

impl Clock for &ManualClock {
    fn timestamp(&self) -> u32 {
        self.timestamp.get()
    }

    fn uptime_ms(&self) -> u64 {
        self.uptime_ms.get()
    }
}

pub fn suback(packet_id: u16, return_code: u8) -> [u8; 5] {
    let id = packet_id.to_be_bytes();
    [0x90, 0x03, id[0], id[1], return_code]
}

/// A QoS 0 PUBLISH packet as the broker would send it.
pub fn publish(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(payload);
    frame(0x30, &body)
}

/// A QoS 1 PUBLISH packet carrying `packet_id`.
pub fn publish_qos1(topic: &str, packet_id: u16, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(&packet_id.to_be_bytes());
    body.extend_from_slice(payload);
    frame(0x32, &body)
}

fn frame(header: u8, body: &[u8]) -> Vec<u8> {
    let mut packet = vec![header];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if len == 0 {
            break;
        }
    }
    packet.extend_from_slice(body);
    packet
}

/// Splits a QoS 0 PUBLISH body into topic and payload.
pub fn split_publish(body: &[u8]) -> (String, serde_json::Value) {
    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
    let payload = serde_json::from_slice(&body[2 + topic_len..]).unwrap();
    (topic, payload)
}

pub fn request(device_id: &str, action: &str, value: &str) -> String {
    format!(
        r#"{{"header":{{"payloadVersion":2,"signatureVersion":1}},"payload":{{"action":"{action}","clientId":"alexa-skill","createdAt":1700000000,"deviceId":"{device_id}","replyToken":"token-{action}","type":"request","value":{value}}},"signature":{{"HMAC":"unused"}}}}"#
    )
}

fn decode_remaining_length(bytes: &[u8]) -> (usize, usize) {
    let mut len = 0;
    let mut multiplier = 1;
    for (i, byte) in bytes.iter().enumerate() {
        len += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return (len, i + 1);
        }
        multiplier *= 128;
    }
    panic!("truncated remaining length");
}
