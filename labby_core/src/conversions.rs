//! Bridges `labby_config` types to `labby_traits` types.

use labby_config::DeviceKind;
use labby_traits::DeviceType;

/// Device type a config entry promises.
pub fn device_type_of(kind: DeviceKind) -> DeviceType {
    match kind {
        DeviceKind::PowerSupply => DeviceType::PowerSupply,
    }
}
