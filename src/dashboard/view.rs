use crate::device::Device;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PowerControl {
    pub checked: bool,
    /// False when the device state is unknown
    pub enabled: bool,
}

/// One rendered dashboard row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceRow {
    pub id: String,
    pub name: String,
    pub room: String,
    pub ip: String,
    pub sku: String,
    pub power: PowerControl,
    pub color: Option<String>,
    pub brightness: Option<f32>,
    pub updated: Option<String>,
    pub source: Option<String>,
    pub scene: Option<String>,
}

impl DeviceRow {
    /// `updated` is the current text of the row's live time label.
    pub fn new(device: &Device, updated: Option<String>) -> Self {
        let state = device.state.as_ref();

        DeviceRow {
            id: device.id.clone(),
            name: device.name.clone(),
            room: device.room.clone().unwrap_or_default(),
            ip: device.ip.clone().unwrap_or_default(),
            sku: device.sku.clone(),
            power: PowerControl {
                checked: state.map(|s| s.on).unwrap_or(false),
                enabled: state.is_some(),
            },
            color: state.map(|s| s.color.to_hex()),
            brightness: state.map(|s| s.brightness),
            updated,
            source: state.map(|s| s.source.clone()),
            scene: state.and_then(|s| s.scene.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DashboardView {
    /// Nothing has been fetched successfully yet
    Loading,
    Devices(Vec<DeviceRow>),
}

impl DashboardView {
    pub fn rows(&self) -> &[DeviceRow] {
        match self {
            DashboardView::Loading => &[],
            DashboardView::Devices(rows) => rows,
        }
    }

    pub fn row(&self, id: &str) -> Option<&DeviceRow> {
        self.rows().iter().find(|row| row.id == id)
    }
}
