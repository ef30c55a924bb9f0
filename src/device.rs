use std::str::FromStr;

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use eyre::eyre;
use palette::Srgb;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl DeviceColor {
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for DeviceColor {
    type Err = eyre::Report;

    /// Accepts `#rrggbb`, `rrggbb` and the `#rgb` shorthand.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rgb = Srgb::<u8>::from_str(s.trim())
            .map_err(|e| eyre!("Invalid color '{}': {}", s, e))?;

        Ok(DeviceColor {
            r: rgb.red,
            g: rgb.green,
            b: rgb.blue,
        })
    }
}

/// Last observed state of a device, as reported by the backend.
#[derive(Builder, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[builder(setter(into))]
pub struct DeviceState {
    pub on: bool,
    #[builder(default)]
    pub color: DeviceColor,

    /// Intensity multiplier in `[0, 1]`
    #[serde(deserialize_with = "deserialize_brightness")]
    #[builder(default = "1.0")]
    pub brightness: f32,

    /// Active effect mode, if the backend knows it
    #[serde(default)]
    #[builder(default, setter(strip_option))]
    pub scene: Option<String>,

    /// Which upstream channel produced this state
    pub source: String,
    pub updated: DateTime<Utc>,
}

/// Integers are 0-100 percentages (the backend's native scale), floats are
/// already fractions.
fn deserialize_brightness<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Number::deserialize(deserializer)?;

    let fraction = match (value.as_u64(), value.as_f64()) {
        (Some(percent), _) => percent.min(100) as f64 / 100.0,
        (None, Some(fraction)) => fraction.clamp(0.0, 1.0),
        (None, None) => 0.0,
    };

    Ok(fraction as f32)
}

#[derive(Builder, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[builder(setter(into, strip_option), default)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub state: Option<DeviceState>,
}
