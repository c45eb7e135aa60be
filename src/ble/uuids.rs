//! BLE Service and Characteristic UUIDs.
//!
//! Both Sunset and Hexagon fixtures expose the same vendor service.

use uuid::Uuid;

/// Light control service UUID.
pub const LIGHT_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_fff0_0000_1000_8000_00805f9b34fb);
/// Command characteristic UUID (Write).
pub const LIGHT_WRITE_UUID: Uuid = Uuid::from_u128(0x0000_fff3_0000_1000_8000_00805f9b34fb);
/// Status characteristic UUID (Notify).
pub const LIGHT_NOTIFY_UUID: Uuid = Uuid::from_u128(0x0000_fff4_0000_1000_8000_00805f9b34fb);

/// Check if a service UUID is the light control service.
pub fn is_light_service(uuid: &Uuid) -> bool {
    *uuid == LIGHT_SERVICE_UUID
}
