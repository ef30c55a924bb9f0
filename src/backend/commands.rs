use serde::Deserialize;

use crate::device::DeviceColor;

/// A saved multi-device shortcut. The backend also reports the raw messages
/// each one sends, which the dashboard has no use for.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OneClick {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceCommand {
    Power(bool),
    Color(DeviceColor),

    /// Percentage, 0-100
    Brightness(u8),

    /// Kelvin
    ColorTemperature(u32),
    Scene(String),
}

impl DeviceCommand {
    /// Path segments following `/api/device/{id}/`. Segments are not yet
    /// percent-encoded.
    pub fn path_segments(&self) -> [String; 2] {
        match self {
            DeviceCommand::Power(on) => {
                let value = if *on { "on" } else { "off" };
                ["power".to_string(), value.to_string()]
            }
            DeviceCommand::Color(color) => ["color".to_string(), color.to_hex()],
            DeviceCommand::Brightness(level) => ["brightness".to_string(), (*level).min(100).to_string()],
            DeviceCommand::ColorTemperature(kelvin) => ["colortemp".to_string(), kelvin.to_string()],
            DeviceCommand::Scene(scene) => ["scene".to_string(), scene.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_maps_to_on_and_off() {
        assert_eq!(DeviceCommand::Power(true).path_segments(), ["power", "on"]);
        assert_eq!(DeviceCommand::Power(false).path_segments(), ["power", "off"]);
    }

    #[test]
    fn brightness_is_clamped_to_percent() {
        assert_eq!(DeviceCommand::Brightness(250).path_segments(), ["brightness", "100"]);
    }

    #[test]
    fn color_is_sent_as_hex() {
        let color = DeviceColor { r: 51, g: 102, b: 204 };
        assert_eq!(DeviceCommand::Color(color).path_segments(), ["color", "#3366cc"]);
    }
}
