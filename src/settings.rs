use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct BackendSettings {
    pub url: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct DashboardSettings {
    pub poll_interval_ms: u64,
    pub label_tick_ms: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            label_tick_ms: 1000,
        }
    }
}

impl DashboardSettings {
    /// Both cadences drive tokio intervals, which can't have a zero period.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "dashboard.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.label_tick_ms == 0 {
            return Err(ConfigError::Message(
                "dashboard.label_tick_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct Settings {
    pub backend: BackendSettings,
    pub dashboard: DashboardSettings,
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("backend.url", "http://127.0.0.1:8056/")?
        .set_default("dashboard.poll_interval_ms", 5000)?
        .set_default("dashboard.label_tick_ms", 1000)
}

fn build_settings(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    let settings = builder.build()?.try_deserialize::<Settings>()?;
    settings.dashboard.validate()?;

    Ok(settings)
}

pub fn read_settings() -> Result<Settings, ConfigError> {
    build_settings(
        with_defaults()?
            .add_source(config::File::with_name("Settings").required(false))
            .add_source(
                config::Environment::with_prefix("DASHBOARD")
                    .prefix_separator("__")
                    .separator("__"),
            ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_dashboard_cadence() {
        let settings = build_settings(with_defaults().unwrap()).unwrap();

        assert_eq!(settings.dashboard.poll_interval_ms, 5000);
        assert_eq!(settings.dashboard.label_tick_ms, 1000);
        assert!(settings.backend.url.starts_with("http"));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let builder = with_defaults()
            .unwrap()
            .set_override("dashboard.poll_interval_ms", 0)
            .unwrap();

        let err = build_settings(builder).unwrap_err();

        assert!(err.to_string().contains("poll_interval_ms"), "{}", err);
    }

    #[test]
    fn zero_label_tick_is_rejected() {
        let builder = with_defaults()
            .unwrap()
            .set_override("dashboard.label_tick_ms", 0)
            .unwrap();

        let err = build_settings(builder).unwrap_err();

        assert!(err.to_string().contains("label_tick_ms"), "{}", err);
    }

    #[test]
    fn overrides_are_applied() {
        let builder = with_defaults()
            .unwrap()
            .set_override("dashboard.poll_interval_ms", 250)
            .unwrap()
            .set_override("backend.url", "http://10.0.0.2:8056/")
            .unwrap();

        let settings = build_settings(builder).unwrap();

        assert_eq!(settings.dashboard.poll_interval_ms, 250);
        assert_eq!(settings.backend.url, "http://10.0.0.2:8056/");
    }
}
