//! Power sensor reporting electrical readings and accumulated energy.

use super::{Device, DeviceCore, PowerStateCallback, ProductType, Transport};
use crate::error::Error;
use crate::message::{Cause, RequestValue, ResponseValue};
use serde::Serialize;

const POWER_USAGE: &str = "powerUsage";

/// Value sent for readings the caller did not provide.
const NOT_PROVIDED: f32 = -1.0;

/// One set of electrical readings.
///
/// Only voltage and current are mandatory; see
/// [`PowerSensor::send_power_sensor_event`] for how the rest is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    /// Volts.
    pub voltage: f32,
    /// Amperes.
    pub current: f32,
    /// Active power in watts. Defaults to `voltage * current`.
    pub power: Option<f32>,
    /// Apparent power in volt-amperes.
    pub apparent_power: Option<f32>,
    /// Reactive power in volt-amperes reactive.
    pub reactive_power: Option<f32>,
    /// Power factor. Derived from `apparent_power` when that is given.
    pub factor: Option<f32>,
}

impl PowerReading {
    /// A reading with only voltage and current.
    pub fn new(voltage: f32, current: f32) -> Self {
        Self {
            voltage,
            current,
            power: None,
            apparent_power: None,
            reactive_power: None,
            factor: None,
        }
    }

    /// Sets the measured active power.
    pub fn with_power(mut self, power: f32) -> Self {
        self.power = Some(power);
        self
    }

    /// Sets the measured apparent power.
    pub fn with_apparent_power(mut self, apparent_power: f32) -> Self {
        self.apparent_power = Some(apparent_power);
        self
    }

    /// Sets the measured reactive power.
    pub fn with_reactive_power(mut self, reactive_power: f32) -> Self {
        self.reactive_power = Some(reactive_power);
        self
    }

    /// Sets the measured power factor.
    pub fn with_factor(mut self, factor: f32) -> Self {
        self.factor = Some(factor);
        self
    }

    /// Active power, falling back to `voltage * current`.
    pub fn power(&self) -> f32 {
        self.power.unwrap_or(self.voltage * self.current)
    }

    /// Power factor: `power / apparent_power` when the apparent power is
    /// known, otherwise the provided factor. `None` when the result is not
    /// a finite number, e.g. for a zero apparent power.
    pub fn factor(&self) -> Option<f32> {
        let factor = match self.apparent_power {
            Some(apparent_power) => Some(self.power() / apparent_power),
            None => self.factor,
        };
        factor.filter(|factor| factor.is_finite())
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct PowerUsageValue {
    #[serde(rename = "startTime")]
    start_time: u32,
    voltage: f32,
    current: f32,
    power: f32,
    #[serde(rename = "apparentPower")]
    apparent_power: f32,
    #[serde(rename = "reactivePower")]
    reactive_power: f32,
    factor: f32,
    #[serde(rename = "wattHours")]
    watt_hours: f32,
}

/// A power sensor.
///
/// Between two events it remembers when the previous one was sent and the
/// power it reported, so every event also carries the energy used since
/// the previous one.
#[derive(Debug, Clone)]
pub struct PowerSensor {
    core: DeviceCore,
    start_time: u32,
    last_power: f32,
}

impl PowerSensor {
    /// Creates a power sensor with the default event wait time.
    pub fn new(device_id: &str) -> Result<Self, Error> {
        let core = DeviceCore::new(device_id, ProductType::PowerSensor)?;
        Ok(Self::from_core(core))
    }

    /// Creates a power sensor with a custom event wait time.
    pub fn with_event_wait_time(device_id: &str, event_wait_time_ms: u32) -> Result<Self, Error> {
        let core = DeviceCore::with_event_wait_time(
            device_id,
            ProductType::PowerSensor,
            event_wait_time_ms,
        )?;
        Ok(Self::from_core(core))
    }

    fn from_core(core: DeviceCore) -> Self {
        Self {
            core,
            start_time: 0,
            last_power: 0.0,
        }
    }

    /// Sets the `setPowerState` callback.
    pub fn on_power_state(&mut self, callback: PowerStateCallback) {
        self.core.on_power_state(callback);
    }

    /// Timestamp of the last event sent, 0 before the first one.
    pub fn start_time(&self) -> u32 {
        self.start_time
    }

    /// Power reported by the last event sent.
    pub fn last_power(&self) -> f32 {
        self.last_power
    }

    /// Sends a `powerUsage` event, by default as a periodic poll.
    ///
    /// Missing power is computed as `voltage * current`; a given apparent
    /// power overrides the factor with `power / apparent_power`. Readings
    /// still missing are sent as `-1`. `wattHours` covers the time since
    /// the previous event at the power it reported.
    ///
    /// The energy baseline only moves when the event reached the transport,
    /// so a rate-limited or failed event is folded into the next one.
    pub fn send_power_sensor_event<T: Transport>(
        &mut self,
        transport: &mut T,
        reading: PowerReading,
        cause: Option<Cause>,
    ) -> Result<(), Error> {
        let now = transport.timestamp();
        let power = reading.power();

        let value = PowerUsageValue {
            start_time: self.start_time,
            voltage: reading.voltage,
            current: reading.current,
            power,
            apparent_power: reading.apparent_power.unwrap_or(NOT_PROVIDED),
            reactive_power: reading.reactive_power.unwrap_or(NOT_PROVIDED),
            factor: reading.factor().unwrap_or(NOT_PROVIDED),
            watt_hours: self.watt_hours(now),
        };

        self.core.send_event_at(
            transport,
            now,
            POWER_USAGE,
            cause.unwrap_or(Cause::PeriodicPoll),
            value,
        )?;

        self.start_time = now;
        self.last_power = power;
        Ok(())
    }

    /// Energy in watt-hours consumed between the previous event and `now`.
    fn watt_hours(&self, now: u32) -> f32 {
        if self.start_time == 0 {
            return 0.0;
        }
        // a clock stepping backwards counts as no elapsed time
        let elapsed = now.saturating_sub(self.start_time);
        elapsed as f32 * self.last_power / 3600.0
    }
}

impl Device for PowerSensor {
    fn device_id(&self) -> &str {
        self.core.device_id()
    }

    fn product_type(&self) -> ProductType {
        ProductType::PowerSensor
    }

    fn handle_request(
        &mut self,
        device_id: &str,
        action: &str,
        request: &RequestValue<'_>,
        response: &mut ResponseValue,
    ) -> bool {
        self.core.handle_request(device_id, action, request, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockTransport;

    fn approx(value: &serde_json::Value, expected: f64) -> bool {
        (value.as_f64().unwrap() - expected).abs() < 1e-3
    }

    #[test]
    fn test_derived_power() {
        let reading = PowerReading::new(230.0, 2.0);
        assert_eq!(reading.power(), 460.0);
        assert_eq!(reading.factor(), None);

        let reading = reading.with_power(400.0);
        assert_eq!(reading.power(), 400.0);
    }

    #[test]
    fn test_factor_from_apparent_power() {
        let reading = PowerReading::new(230.0, 2.0)
            .with_apparent_power(500.0)
            .with_factor(0.5);
        // 460 W / 500 VA overrides the given factor
        assert!((reading.factor().unwrap() - 0.92).abs() < 1e-6);

        let reading = PowerReading::new(230.0, 2.0).with_factor(0.5);
        assert_eq!(reading.factor(), Some(0.5));
    }

    #[test]
    fn test_zero_apparent_power() {
        let reading = PowerReading::new(230.0, 2.0).with_apparent_power(0.0);
        assert_eq!(reading.factor(), None);

        let reading = PowerReading::new(0.0, 0.0).with_apparent_power(0.0);
        assert_eq!(reading.factor(), None);

        let mut sensor = PowerSensor::new("meter-1").unwrap();
        let mut transport = MockTransport::default();
        sensor
            .send_power_sensor_event(
                &mut transport,
                PowerReading::new(230.0, 2.0).with_apparent_power(0.0),
                None,
            )
            .unwrap();

        let value = &transport.last_event()["payload"]["value"];
        assert!(approx(&value["factor"], -1.0));
        assert!(approx(&value["apparentPower"], 0.0));
    }

    #[test]
    fn test_first_event() {
        let mut sensor = PowerSensor::new("meter-1").unwrap();
        let mut transport = MockTransport {
            timestamp: 1_600_000_000,
            ..Default::default()
        };

        sensor
            .send_power_sensor_event(&mut transport, PowerReading::new(230.0, 2.0), None)
            .unwrap();

        let event = transport.last_event();
        let payload = &event["payload"];
        assert_eq!(payload["action"], "powerUsage");
        assert_eq!(payload["cause"]["type"], "PERIODIC_POLL");

        let value = &payload["value"];
        assert_eq!(value["startTime"], 0);
        assert!(approx(&value["voltage"], 230.0));
        assert!(approx(&value["current"], 2.0));
        assert!(approx(&value["power"], 460.0));
        assert!(approx(&value["apparentPower"], -1.0));
        assert!(approx(&value["reactivePower"], -1.0));
        assert!(approx(&value["factor"], -1.0));
        assert!(approx(&value["wattHours"], 0.0));

        assert_eq!(sensor.start_time(), 1_600_000_000);
        assert_eq!(sensor.last_power(), 460.0);
    }

    #[test]
    fn test_value_keys() {
        let mut sensor = PowerSensor::new("meter-1").unwrap();
        let mut transport = MockTransport::default();

        sensor
            .send_power_sensor_event(&mut transport, PowerReading::new(1.0, 1.0), None)
            .unwrap();

        let event = transport.last_event();
        let mut keys: Vec<&str> = event["payload"]["value"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "apparentPower",
                "current",
                "factor",
                "power",
                "reactivePower",
                "startTime",
                "voltage",
                "wattHours"
            ]
        );
    }

    #[test]
    fn test_energy_accumulation() {
        let mut sensor = PowerSensor::new("meter-1").unwrap();
        let mut transport = MockTransport {
            timestamp: 1_600_000_000,
            uptime_ms: 0,
            ..Default::default()
        };

        let reading = PowerReading::new(230.0, 5.0).with_power(1000.0);
        sensor
            .send_power_sensor_event(&mut transport, reading, None)
            .unwrap();

        // half an hour at 1000 W
        transport.timestamp += 1800;
        transport.uptime_ms += 1_800_000;
        let reading = PowerReading::new(230.0, 1.0).with_power(200.0);
        sensor
            .send_power_sensor_event(&mut transport, reading, None)
            .unwrap();

        let value = &transport.last_event()["payload"]["value"];
        assert_eq!(value["startTime"], 1_600_000_000);
        assert!(approx(&value["wattHours"], 500.0));
        assert_eq!(sensor.last_power(), 200.0);
    }

    #[test]
    fn test_rate_limited_event_keeps_baseline() {
        let mut sensor = PowerSensor::new("meter-1").unwrap();
        let mut transport = MockTransport {
            timestamp: 1_600_000_000,
            ..Default::default()
        };

        sensor
            .send_power_sensor_event(&mut transport, PowerReading::new(230.0, 1.0), None)
            .unwrap();

        transport.timestamp += 1;
        assert_eq!(
            sensor.send_power_sensor_event(&mut transport, PowerReading::new(230.0, 9.0), None),
            Err(Error::RateLimited)
        );
        assert_eq!(sensor.start_time(), 1_600_000_000);
        assert_eq!(sensor.last_power(), 230.0);
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut sensor = PowerSensor::new("meter-1").unwrap();
        let mut transport = MockTransport {
            timestamp: 1_600_000_000,
            ..Default::default()
        };

        sensor
            .send_power_sensor_event(&mut transport, PowerReading::new(230.0, 1.0), None)
            .unwrap();

        transport.timestamp -= 60;
        transport.uptime_ms += 1_000;
        sensor
            .send_power_sensor_event(&mut transport, PowerReading::new(230.0, 1.0), None)
            .unwrap();

        assert!(approx(&transport.last_event()["payload"]["value"]["wattHours"], 0.0));
    }

    #[test]
    fn test_power_sensor_product_type() {
        let sensor = PowerSensor::new("meter-1").unwrap();
        assert_eq!(sensor.product_type(), ProductType::PowerSensor);
        assert_eq!(sensor.device_id(), "meter-1");
    }
}
