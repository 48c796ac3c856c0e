//! # libsinric - SinricPro device SDK
//!
//! A Rust SDK for building SinricPro smart-home devices on microcontrollers.
//! Each device type maps the platform's JSON requests onto locally registered
//! callbacks and turns local readings into the platform's event messages.
//! The library is `no_std` and never allocates: every message is built in a
//! fixed-size buffer.
//!
//! ## Devices
//!
//! - **[`Camera`](device::Camera)**: on / off
//! - **[`DimSwitch`](device::DimSwitch)**: on / off, absolute and relative power level
//! - **[`PowerSensor`](device::PowerSensor)**: periodic power usage reports with
//!   energy accumulation between reports
//!
//! ## Transport
//!
//! Devices only know the [`Transport`](device::Transport) trait. The crate
//! ships [`SinricPro`](client::SinricPro), which implements it on top of an
//! MQTT 3.1.1 session over any [`Connection`](network::Connection).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use libsinric::device::DimSwitch;
//!
//! fn set_level(_device_id: &str, level: &mut i32) -> bool {
//!     // drive the PWM output here
//!     *level = (*level).clamp(0, 100);
//!     true
//! }
//!
//! let mut switch = DimSwitch::new("5dc1564130xxxxxxxxxxxxxx").unwrap();
//! switch.on_power_level(set_level);
//!
//! // inside the main loop, with a connected `SinricPro` client:
//! // client.handle(&mut [&mut switch])?;
//! // switch.send_power_level_event(&mut client, 42, None)?;
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Route debug output through `defmt`
//! - `log`: Route debug output through the `log` facade

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Crate-wide error type.
pub mod error;

/// Device abstractions: the shared device core and the concrete device types.
pub mod device;

/// Wire types for the platform's request, response and event messages.
pub mod message;

/// Routing of inbound requests to devices.
pub mod dispatch;

/// Byte-connection traits and the MQTT client used as transport.
pub mod network;

/// The SinricPro client binding devices to an MQTT session.
pub mod client;

pub use error::Error;
