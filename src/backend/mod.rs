use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::{device::Device, protocols::http::FetchError};

pub use self::commands::{DeviceCommand, OneClick};
pub use self::rest::HttpBackend;

pub mod commands;
pub mod rest;

/// The backend as seen from the dashboard: the list endpoints and a set of
/// control endpoints.
pub trait DeviceApi: Send + Sync + 'static {
    /// Fetches the full device list. The request is aborted when `cancel`
    /// fires.
    fn list_devices(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<Vec<Device>, FetchError>>;

    /// Names of the scenes device `id` supports.
    fn list_scenes(&self, id: &str, cancel: CancellationToken) -> BoxFuture<'static, Result<Vec<String>, FetchError>>;

    /// One-click shortcuts saved on the account the backend is signed in to.
    fn list_one_clicks(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<Vec<OneClick>, FetchError>>;

    /// Sends one control command. Callers are not expected to await the
    /// outcome.
    fn send_command(&self, id: &str, command: DeviceCommand) -> BoxFuture<'static, Result<(), FetchError>>;

    /// Activates a one-click shortcut by name. Same contract as
    /// [`DeviceApi::send_command`].
    fn activate_one_click(&self, name: &str) -> BoxFuture<'static, Result<(), FetchError>>;
}
