//! Camera supporting the basic on / off command.

use super::{Device, DeviceCore, PowerStateCallback, ProductType, Transport};
use crate::error::Error;
use crate::message::{Cause, RequestValue, ResponseValue};

/// A camera.
///
/// Streams are handled by the platform; the device itself only switches
/// on and off.
#[derive(Debug, Clone)]
pub struct Camera {
    core: DeviceCore,
}

impl Camera {
    /// Creates a camera with the default event wait time.
    pub fn new(device_id: &str) -> Result<Self, Error> {
        Ok(Self {
            core: DeviceCore::new(device_id, ProductType::Camera)?,
        })
    }

    /// Creates a camera with a custom event wait time.
    pub fn with_event_wait_time(device_id: &str, event_wait_time_ms: u32) -> Result<Self, Error> {
        Ok(Self {
            core: DeviceCore::with_event_wait_time(
                device_id,
                ProductType::Camera,
                event_wait_time_ms,
            )?,
        })
    }

    /// Sets the `setPowerState` callback.
    pub fn on_power_state(&mut self, callback: PowerStateCallback) {
        self.core.on_power_state(callback);
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
}

impl Device for Camera {
    fn device_id(&self) -> &str {
        self.core.device_id()
    }

    fn product_type(&self) -> ProductType {
        ProductType::Camera
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

    fn power(_device_id: &str, _state: &mut bool) -> bool {
        true
    }

    #[test]
    fn test_camera_on_off() {
        let mut camera = Camera::new("camera-1").unwrap();
        camera.on_power_state(power);

        let request = RequestValue {
            state: Some("On"),
            ..Default::default()
        };
        let mut response = ResponseValue::default();
        assert!(camera.handle_request("camera-1", "setPowerState", &request, &mut response));
        assert_eq!(response.state, Some("On"));
        assert_eq!(camera.product_type().to_string(), "sinric.device.type.CAMERA");
    }

    #[test]
    fn test_camera_has_no_level_control() {
        let mut camera = Camera::new("camera-1").unwrap();
        camera.on_power_state(power);

        let request = RequestValue {
            power_level: Some(50),
            ..Default::default()
        };
        let mut response = ResponseValue::default();
        assert!(!camera.handle_request("camera-1", "setPowerLevel", &request, &mut response));
        assert_eq!(response, ResponseValue::default());
    }

    #[test]
    fn test_camera_event() {
        let mut camera = Camera::new("camera-1").unwrap();
        let mut transport = MockTransport::default();

        camera
            .send_power_state_event(&mut transport, false, Some(Cause::AppInteraction))
            .unwrap();

        let event = transport.last_event();
        assert_eq!(event["payload"]["value"]["state"], "Off");
        assert_eq!(event["payload"]["cause"]["type"], "APP_INTERACTION");
    }
}
