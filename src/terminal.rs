use std::fmt::Write;

use color_eyre::Result;
use eyre::eyre;

use crate::dashboard::{
    view::{DashboardView, DeviceRow},
    DeviceDashboard,
};

/// A user interaction typed at the prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Power { id: String, on: bool },
    Toggle { id: String },
    Color { id: String, color: String },
    Brightness { id: String, percent: u8 },
    ColorTemperature { id: String, kelvin: u32 },
    Scene { id: String, scene: String },
    Scenes { id: String },
    OneClicks,
    OneClick { name: String },
    Quit,
}

/// What the prompt should do after an interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Continue,
    Message(String),
    Quit,
}

pub const USAGE: &str = "commands: power <id> on|off, toggle <id>, color <id> <hex>, \
brightness <id> <0-100>, colortemp <id> <kelvin>, scene <id> <name>, scenes <id>, \
oneclicks, oneclick <name>, quit";

impl Input {
    pub fn parse(line: &str) -> Result<Input> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| eyre!("Empty command"))?;

        match verb {
            "quit" | "exit" => return Ok(Input::Quit),
            "oneclicks" => return Ok(Input::OneClicks),
            "oneclick" => {
                let name = words.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(eyre!("'oneclick' needs a name"));
                }
                return Ok(Input::OneClick { name });
            }
            _ => {}
        }

        let id = words
            .next()
            .ok_or_else(|| eyre!("'{}' needs a device id", verb))?
            .to_string();
        let rest: Vec<&str> = words.collect();
        let arg = rest.first().copied();

        let input = match (verb, arg) {
            ("toggle", None) => Input::Toggle { id },
            ("scenes", None) => Input::Scenes { id },
            ("power", Some("on")) => Input::Power { id, on: true },
            ("power", Some("off")) => Input::Power { id, on: false },
            ("color", Some(color)) => Input::Color {
                id,
                color: color.to_string(),
            },
            ("brightness", Some(percent)) => {
                let percent: u8 = percent
                    .parse()
                    .map_err(|e| eyre!("Invalid brightness '{}': {}", percent, e))?;
                if percent > 100 {
                    return Err(eyre!("Brightness must be between 0 and 100"));
                }
                Input::Brightness { id, percent }
            }
            ("colortemp", Some(kelvin)) => Input::ColorTemperature {
                id,
                kelvin: kelvin
                    .parse()
                    .map_err(|e| eyre!("Invalid color temperature '{}': {}", kelvin, e))?,
            },
            ("scene", Some(_)) => Input::Scene {
                id,
                scene: rest.join(" "),
            },
            _ => return Err(eyre!("Unrecognized command '{}'. {}", line.trim(), USAGE)),
        };

        Ok(input)
    }

    /// Hands the interaction to the dashboard. Listings are awaited, every
    /// other interaction is fire-and-forget.
    pub async fn apply(self, dashboard: &DeviceDashboard) -> Result<Reply> {
        match self {
            Input::Power { id, on } => dashboard.set_power(&id, on),
            Input::Toggle { id } => dashboard.toggle_power(&id)?,
            Input::Color { id, color } => dashboard.set_color(&id, &color)?,
            Input::Brightness { id, percent } => dashboard.set_brightness(&id, percent),
            Input::ColorTemperature { id, kelvin } => dashboard.set_color_temperature(&id, kelvin),
            Input::Scene { id, scene } => dashboard.set_scene(&id, &scene),
            Input::Scenes { id } => {
                let scenes = dashboard.list_scenes(&id).await?;
                return Ok(Reply::Message(listing(&format!("Scenes for {}", id), scenes)));
            }
            Input::OneClicks => {
                let names = dashboard.list_one_clicks().await?.into_iter().map(|o| o.name);
                return Ok(Reply::Message(listing("One-clicks", names)));
            }
            Input::OneClick { name } => dashboard.activate_one_click(&name),
            Input::Quit => return Ok(Reply::Quit),
        }

        Ok(Reply::Continue)
    }
}

fn listing(title: &str, items: impl IntoIterator<Item = String>) -> String {
    let items: Vec<String> = items.into_iter().collect();

    if items.is_empty() {
        format!("{}: none", title)
    } else {
        format!("{}: {}", title, items.join(", "))
    }
}

const HEADERS: [&str; 10] = [
    "Name", "Room", "IP", "SKU", "Power", "Color", "Brightness", "ID", "Updated", "Source",
];

fn row_cells(row: &DeviceRow) -> [String; 10] {
    let power = match (row.power.enabled, row.power.checked) {
        (false, _) => "-",
        (true, true) => "[on]",
        (true, false) => "[off]",
    };

    let source = match (&row.source, &row.scene) {
        (Some(source), Some(scene)) => format!("<{}> {}", source, scene),
        (Some(source), None) => format!("<{}>", source),
        (None, _) => String::new(),
    };

    [
        row.name.clone(),
        row.room.clone(),
        row.ip.clone(),
        row.sku.clone(),
        power.to_string(),
        row.color.clone().unwrap_or_default(),
        row.brightness
            .map(|b| format!("{:.0}%", b * 100.0))
            .unwrap_or_default(),
        row.id.clone(),
        row.updated.clone().unwrap_or_default(),
        source,
    ]
}

/// Lays the view out as a plain text table.
pub fn render(view: &DashboardView) -> String {
    let rows = match view {
        DashboardView::Loading => return "Loading devices...\n".to_string(),
        DashboardView::Devices(rows) if rows.is_empty() => return "No devices found.\n".to_string(),
        DashboardView::Devices(rows) => rows,
    };

    let cells: Vec<[String; 10]> = rows.iter().map(row_cells).collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_line(&mut out, &widths, HEADERS.iter().copied());
    for row in &cells {
        write_line(&mut out, &widths, row.iter().map(String::as_str));
    }

    out
}

fn write_line<'a>(out: &mut String, widths: &[usize], values: impl Iterator<Item = &'a str>) {
    let padded: Vec<String> = values
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", value, width = *width))
        .collect();

    let _ = writeln!(out, "{}", padded.join("  ").trim_end());
}
