//! Dimmable switch: on / off plus absolute and relative power level.

use super::{Device, DeviceCore, PowerStateCallback, ProductType, Transport, limit_value};
use crate::error::Error;
use crate::message::{Cause, RequestValue, ResponseValue};
use serde::Serialize;

/// Lowest power level reported to the platform.
pub const MIN_POWER_LEVEL: i32 = 0;
/// Highest power level reported to the platform.
pub const MAX_POWER_LEVEL: i32 = 100;

const SET_POWER_LEVEL: &str = "setPowerLevel";
const ADJUST_POWER_LEVEL: &str = "adjustPowerLevel";

/// Callback for `setPowerLevel` requests.
///
/// * `device_id` - id of the addressed device
/// * `power_level` - in: requested level `0..=100`, out: level the device was set to
///
/// Returns whether the request was handled.
pub type SetPowerLevelCallback = fn(device_id: &str, power_level: &mut i32) -> bool;

/// Callback for `adjustPowerLevel` requests.
///
/// * `device_id` - id of the addressed device
/// * `power_level` - in: delta `-100..=100`, out: absolute level the device was set to
///
/// Returns whether the request was handled.
pub type AdjustPowerLevelCallback = fn(device_id: &str, power_level: &mut i32) -> bool;

#[derive(Debug, Clone, Copy, Serialize)]
struct PowerLevelValue {
    #[serde(rename = "powerLevel")]
    power_level: i32,
}

/// A dimmable switch.
#[derive(Debug, Clone)]
pub struct DimSwitch {
    core: DeviceCore,
    set_power_level_callback: Option<SetPowerLevelCallback>,
    adjust_power_level_callback: Option<AdjustPowerLevelCallback>,
}

impl DimSwitch {
    /// Creates a dimmable switch with the default event wait time.
    pub fn new(device_id: &str) -> Result<Self, Error> {
        let core = DeviceCore::new(device_id, ProductType::DimmableSwitch)?;
        Ok(Self::from_core(core))
    }

    /// Creates a dimmable switch with a custom event wait time.
    pub fn with_event_wait_time(device_id: &str, event_wait_time_ms: u32) -> Result<Self, Error> {
        let core = DeviceCore::with_event_wait_time(
            device_id,
            ProductType::DimmableSwitch,
            event_wait_time_ms,
        )?;
        Ok(Self::from_core(core))
    }

    fn from_core(core: DeviceCore) -> Self {
        Self {
            core,
            set_power_level_callback: None,
            adjust_power_level_callback: None,
        }
    }

    /// Sets the `setPowerState` callback.
    pub fn on_power_state(&mut self, callback: PowerStateCallback) {
        self.core.on_power_state(callback);
    }

    /// Sets the `setPowerLevel` callback.
    pub fn on_power_level(&mut self, callback: SetPowerLevelCallback) {
        self.set_power_level_callback = Some(callback);
    }

    /// Sets the `adjustPowerLevel` callback.
    pub fn on_adjust_power_level(&mut self, callback: AdjustPowerLevelCallback) {
        self.adjust_power_level_callback = Some(callback);
    }

    /// Reports the power state, by default as a physical interaction.
    pub fn send_power_state_event<T: Transport>(
        &mut self,
        transport: &mut T,
        state: bool,
        cause: Option<Cause>,
    ) -> Result<(), Error> {
        self.core.send_power_state_event(transport, state, cause)
    }

    /// Reports the actual power level, by default as a physical interaction.
    ///
    /// The level is sent as given.
    pub fn send_power_level_event<T: Transport>(
        &mut self,
        transport: &mut T,
        power_level: i32,
        cause: Option<Cause>,
    ) -> Result<(), Error> {
        self.core.send_event(
            transport,
            SET_POWER_LEVEL,
            cause.unwrap_or(Cause::PhysicalInteraction),
            PowerLevelValue { power_level },
        )
    }
}

impl Device for DimSwitch {
    fn device_id(&self) -> &str {
        self.core.device_id()
    }

    fn product_type(&self) -> ProductType {
        ProductType::DimmableSwitch
    }

    fn handle_request(
        &mut self,
        device_id: &str,
        action: &str,
        request: &RequestValue<'_>,
        response: &mut ResponseValue,
    ) -> bool {
        if device_id != self.core.device_id() {
            return false;
        }

        if self.core.handle_request(device_id, action, request, response) {
            return true;
        }

        let (callback, mut power_level) = match action {
            SET_POWER_LEVEL => (
                self.set_power_level_callback,
                request.power_level.unwrap_or_default(),
            ),
            ADJUST_POWER_LEVEL => (
                self.adjust_power_level_callback,
                request.power_level_delta.unwrap_or_default(),
            ),
            _ => return false,
        };

        let Some(callback) = callback else {
            return false;
        };

        let success = callback(device_id, &mut power_level);
        response.power_level = Some(limit_value(power_level, MIN_POWER_LEVEL, MAX_POWER_LEVEL));
        success
    }
}
