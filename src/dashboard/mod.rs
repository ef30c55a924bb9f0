use std::{
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use color_eyre::Result;
use eyre::eyre;
use futures::Future;
use tokio::{
    sync::Notify,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use self::{
    live_time::LiveTimeLabel,
    polling::{FetchFn, PollingTask, TaskState},
    view::{DashboardView, DeviceRow},
};
use crate::{
    backend::{DeviceApi, DeviceCommand, OneClick},
    protocols::http::FetchError,
    device::{Device, DeviceColor},
    settings::DashboardSettings,
};

pub mod live_time;
pub mod polling;
pub mod view;

/// Upper bound for on-demand lookups (scene and one-click listings).
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

struct RenderedRow {
    device: Device,
    label: Option<LiveTimeLabel>,
}

/// `None` until the first successful poll.
type Rows = Arc<Mutex<Option<Vec<RenderedRow>>>>;

/// The device table: polls the backend on a fixed cadence and dispatches
/// per-device commands.
///
/// Everything the dashboard starts is scoped to it. Unmounting (or dropping)
/// stops the poll timer, cancels the in-flight poll and detaches every row
/// label.
pub struct DeviceDashboard {
    api: Arc<dyn DeviceApi>,
    task: Arc<PollingTask<Vec<Device>>>,
    rows: Rows,
    redraw: Arc<Notify>,
    scope: CancellationToken,
}

impl DeviceDashboard {
    /// Must be called from within a tokio runtime.
    pub fn mount(api: Arc<dyn DeviceApi>, settings: &DashboardSettings) -> Self {
        let fetch_api = api.clone();
        let fetch: FetchFn<Vec<Device>> = Arc::new(move |cancel| fetch_api.list_devices(cancel));

        let task = Arc::new(PollingTask::new(fetch));
        let rows: Rows = Arc::new(Mutex::new(None));
        let redraw = Arc::new(Notify::new());
        let scope = CancellationToken::new();

        start_snapshot_loop(
            &task,
            &rows,
            &redraw,
            &scope,
            Duration::from_millis(settings.label_tick_ms),
        );

        task.run();
        start_poll_timer(&task, &scope, Duration::from_millis(settings.poll_interval_ms));

        DeviceDashboard {
            api,
            task,
            rows,
            redraw,
            scope,
        }
    }

    pub fn view(&self) -> DashboardView {
        match &*lock(&self.rows) {
            None => DashboardView::Loading,
            Some(rows) => DashboardView::Devices(
                rows.iter()
                    .map(|row| DeviceRow::new(&row.device, row.label.as_ref().map(|l| l.text())))
                    .collect(),
            ),
        }
    }

    /// Resolves when a new snapshot has been applied or a row label ticked.
    pub async fn redraw_requested(&self) {
        self.redraw.notified().await
    }

    pub fn set_power(&self, id: &str, on: bool) {
        self.send_command(id, DeviceCommand::Power(on));
    }

    /// Requests the opposite of the power state currently rendered for `id`.
    pub fn toggle_power(&self, id: &str) -> Result<()> {
        let view = self.view();
        let row = view
            .row(id)
            .ok_or_else(|| eyre!("No device with id '{}' in the current snapshot", id))?;

        if !row.power.enabled {
            return Err(eyre!("Power state of '{}' is unknown", row.name));
        }

        self.set_power(id, !row.power.checked);

        Ok(())
    }

    pub fn set_color(&self, id: &str, color: &str) -> Result<()> {
        let color: DeviceColor = color.parse()?;
        self.send_command(id, DeviceCommand::Color(color));

        Ok(())
    }

    pub fn set_brightness(&self, id: &str, percent: u8) {
        self.send_command(id, DeviceCommand::Brightness(percent));
    }

    pub fn set_color_temperature(&self, id: &str, kelvin: u32) {
        self.send_command(id, DeviceCommand::ColorTemperature(kelvin));
    }

    pub fn set_scene(&self, id: &str, scene: &str) {
        self.send_command(id, DeviceCommand::Scene(scene.to_string()));
    }

    /// Scenes the device supports, fetched on demand.
    pub async fn list_scenes(&self, id: &str) -> Result<Vec<String>> {
        let scenes = lookup(self.api.list_scenes(id, self.scope.child_token())).await?;

        Ok(scenes)
    }

    /// Saved one-click shortcuts, fetched on demand.
    pub async fn list_one_clicks(&self) -> Result<Vec<OneClick>> {
        let one_clicks = lookup(self.api.list_one_clicks(self.scope.child_token())).await?;

        Ok(one_clicks)
    }

    pub fn activate_one_click(&self, name: &str) {
        self.dispatch(name, "one-click activation", |api| api.activate_one_click(name));
    }

    fn send_command(&self, id: &str, command: DeviceCommand) {
        let description = format!("{:?}", command);
        self.dispatch(id, description, |api| api.send_command(id, command));
    }

    /// Fire-and-forget: the outcome never touches the rendered rows, which
    /// only change when the next poll lands.
    fn dispatch<F, R>(&self, target: &str, description: impl Display, request: F)
    where
        F: FnOnce(&dyn DeviceApi) -> R,
        R: Future<Output = Result<(), FetchError>> + Send + 'static,
    {
        if self.scope.is_cancelled() {
            log::debug!("Dropping {} for {}: dashboard is unmounted", description, target);
            return;
        }

        log::debug!("Dispatching {} to {}", description, target);

        let target = target.to_string();
        let request = request(self.api.as_ref());

        tokio::spawn(async move {
            if let Err(e) = request.await {
                log::debug!("Request for {} failed: {}", target, e);
            }
        });
    }

    /// Stops the poll timer, the in-flight poll and every row label.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for DeviceDashboard {
    fn drop(&mut self) {
        self.scope.cancel();
        self.task.cancel();

        // Dropping the labels stops their tick tasks
        lock(&self.rows).take();
    }
}

/// Applies every successful snapshot, replacing all rows and their labels.
/// Failed polls are only logged; the rows stay on the last good snapshot.
fn start_snapshot_loop(
    task: &PollingTask<Vec<Device>>,
    rows: &Rows,
    redraw: &Arc<Notify>,
    scope: &CancellationToken,
    label_tick: Duration,
) {
    let mut states = task.subscribe();
    let mut latest = task.subscribe_latest();
    let rows = rows.clone();
    let redraw = redraw.clone();
    let scope = scope.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = scope.cancelled() => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }

                    if let TaskState::Error(e) = &*states.borrow_and_update() {
                        log::warn!("Device list poll failed, keeping the last snapshot: {}", e);
                    }
                }
                changed = latest.changed() => {
                    if changed.is_err() {
                        break;
                    }

                    let Some(devices) = latest.borrow_and_update().clone() else {
                        continue;
                    };

                    if !apply_snapshot(devices, &rows, &redraw, &scope, label_tick) {
                        break;
                    }
                }
            }
        }
    });
}

/// Returns false once the dashboard has been unmounted.
fn apply_snapshot(
    devices: Vec<Device>,
    rows: &Rows,
    redraw: &Arc<Notify>,
    scope: &CancellationToken,
    label_tick: Duration,
) -> bool {
    log::debug!("Applying snapshot of {} devices", devices.len());

    let snapshot = devices
        .into_iter()
        .map(|device| {
            let label = device.state.as_ref().map(|state| {
                let mut label = LiveTimeLabel::new(state.updated, label_tick).with_redraw(redraw.clone());
                label.attach();
                label
            });

            RenderedRow { device, label }
        })
        .collect();

    // Check under the lock so an unmount can't race a late snapshot in
    {
        let mut current = lock(rows);
        if scope.is_cancelled() {
            return false;
        }
        *current = Some(snapshot);
    }

    redraw.notify_one();

    true
}

fn start_poll_timer(task: &Arc<PollingTask<Vec<Device>>>, scope: &CancellationToken, period: Duration) {
    let task = task.clone();
    let scope = scope.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = scope.cancelled() => break,
                _ = interval.tick() => task.run(),
            }
        }
    });
}

async fn lookup<T>(request: impl Future<Output = Result<T, FetchError>>) -> Result<T, FetchError> {
    tokio::time::timeout(LOOKUP_TIMEOUT, request).await.unwrap_or_else(|_| {
        Err(FetchError::Transport(format!(
            "no response within {}",
            humantime::format_duration(LOOKUP_TIMEOUT)
        )))
    })
}

fn lock(rows: &Mutex<Option<Vec<RenderedRow>>>) -> MutexGuard<'_, Option<Vec<RenderedRow>>> {
    rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
