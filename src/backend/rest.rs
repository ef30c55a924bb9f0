use color_eyre::Result;
use eyre::eyre;
use futures::{future::BoxFuture, FutureExt};
use hyper::Uri;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{DeviceApi, DeviceCommand, OneClick};
use crate::{
    device::Device,
    protocols::http::{mk_fire_request, mk_get_request, FetchError, HyperHttpClient},
};

/// [`DeviceApi`] over the backend's HTTP endpoints.
#[derive(Clone)]
pub struct HttpBackend {
    client: HyperHttpClient,
    base: Url,
}

impl HttpBackend {
    pub fn new(client: HyperHttpClient, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| eyre!("Invalid backend url '{}'. Check your backend.url config. {}", base_url, e))?;

        if base.cannot_be_a_base() {
            return Err(eyre!("Backend url '{}' cannot be used as a base url", base_url));
        }

        Ok(HttpBackend { client, base })
    }

    /// Resolves `segments` below the base url, percent-encoding each segment.
    fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Uri, FetchError> {
        let mut url = self.base.clone();

        url.path_segments_mut()
            .map_err(|_| FetchError::Transport(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);

        url.as_str()
            .parse::<Uri>()
            .map_err(|e: hyper::http::uri::InvalidUri| FetchError::Transport(e.to_string()))
    }

    pub fn devices_uri(&self) -> Result<Uri, FetchError> {
        self.endpoint(&["api", "devices"])
    }

    pub fn scenes_uri(&self, id: &str) -> Result<Uri, FetchError> {
        self.endpoint(&["api", "device", id, "scenes"])
    }

    pub fn one_clicks_uri(&self) -> Result<Uri, FetchError> {
        self.endpoint(&["api", "oneclicks"])
    }

    pub fn activate_one_click_uri(&self, name: &str) -> Result<Uri, FetchError> {
        self.endpoint(&["api", "oneclick", "activate", name])
    }

    pub fn command_uri(&self, id: &str, command: &DeviceCommand) -> Result<Uri, FetchError> {
        let [kind, value] = command.path_segments();
        self.endpoint(&["api", "device", id, kind.as_str(), value.as_str()])
    }
}

impl DeviceApi for HttpBackend {
    fn list_devices(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<Vec<Device>, FetchError>> {
        let client = self.client.clone();
        let uri = self.devices_uri();

        async move {
            let uri = uri?;
            mk_get_request(&client, &uri, &cancel).await
        }
        .boxed()
    }

    fn list_scenes(&self, id: &str, cancel: CancellationToken) -> BoxFuture<'static, Result<Vec<String>, FetchError>> {
        let client = self.client.clone();
        let uri = self.scenes_uri(id);

        async move {
            let uri = uri?;
            mk_get_request(&client, &uri, &cancel).await
        }
        .boxed()
    }

    fn list_one_clicks(&self, cancel: CancellationToken) -> BoxFuture<'static, Result<Vec<OneClick>, FetchError>> {
        let client = self.client.clone();
        let uri = self.one_clicks_uri();

        async move {
            let uri = uri?;
            mk_get_request(&client, &uri, &cancel).await
        }
        .boxed()
    }

    fn send_command(&self, id: &str, command: DeviceCommand) -> BoxFuture<'static, Result<(), FetchError>> {
        fire(self.client.clone(), self.command_uri(id, &command))
    }

    fn activate_one_click(&self, name: &str) -> BoxFuture<'static, Result<(), FetchError>> {
        fire(self.client.clone(), self.activate_one_click_uri(name))
    }
}

fn fire(client: HyperHttpClient, uri: Result<Uri, FetchError>) -> BoxFuture<'static, Result<(), FetchError>> {
    async move {
        let uri = uri?;
        log::debug!("GET {}", uri);
        mk_fire_request(&client, &uri).await
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, time::Duration};

    use hyper::{
        service::{make_service_fn, service_fn},
        Body, Request, Response, Server, StatusCode,
    };
    use tokio::sync::mpsc;

    use super::*;
    use crate::{device::DeviceColor, protocols::http::mk_hyper_http_client};

    /// Serves every request with `status` and `body` after `delay`, reporting
    /// each request path on the returned channel.
    fn spawn_backend(
        status: StatusCode,
        body: &'static str,
        delay: Duration,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let make_svc = make_service_fn(move |_conn| {
            let tx = tx.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let tx = tx.clone();
                    async move {
                        tx.send(req.uri().path().to_string()).ok();
                        tokio::time::sleep(delay).await;
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(status)
                                .body(Body::from(body))
                                .unwrap(),
                        )
                    }
                }))
            }
        });

        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server);

        (format!("http://{}/", addr), rx)
    }

    fn backend(base_url: &str) -> HttpBackend {
        HttpBackend::new(mk_hyper_http_client().unwrap(), base_url).unwrap()
    }

    #[test]
    fn endpoints_keep_the_base_path_prefix() {
        let backend = backend("http://hass.local:8123/ingress/abc/");

        assert_eq!(
            backend.devices_uri().unwrap().to_string(),
            "http://hass.local:8123/ingress/abc/api/devices"
        );
    }

    #[test]
    fn command_segments_are_percent_encoded() {
        let backend = backend("http://127.0.0.1:8056");

        let uri = backend
            .command_uri("abc", &DeviceCommand::Scene("Sunrise / warm".to_string()))
            .unwrap();

        assert_eq!(uri.path(), "/api/device/abc/scene/Sunrise%20%2F%20warm");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(HttpBackend::new(mk_hyper_http_client().unwrap(), "mailto:someone@example.com").is_err());
        assert!(HttpBackend::new(mk_hyper_http_client().unwrap(), "not a url").is_err());
    }

    #[tokio::test]
    async fn lists_devices() {
        let body = r#"[{"id": "abc", "name": "Lamp", "room": "Hall", "ip": null, "sku": "H6008", "state": null}]"#;
        let (url, mut paths) = spawn_backend(StatusCode::OK, body, Duration::ZERO);

        let devices = backend(&url).list_devices(CancellationToken::new()).await.unwrap();

        assert_eq!(paths.recv().await.unwrap(), "/api/devices");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "abc");
        assert_eq!(devices[0].room.as_deref(), Some("Hall"));
    }

    #[tokio::test]
    async fn non_success_status_is_the_error_cause() {
        let (url, _paths) = spawn_backend(StatusCode::SERVICE_UNAVAILABLE, "", Duration::ZERO);

        let result = backend(&url).list_devices(CancellationToken::new()).await;

        assert_eq!(result, Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)));
    }

    #[tokio::test]
    async fn malformed_body_names_the_failing_field() {
        let (url, _paths) = spawn_backend(StatusCode::OK, r#"[{"id": 42}]"#, Duration::ZERO);

        let result = backend(&url).list_devices(CancellationToken::new()).await;

        match result {
            Err(FetchError::Decode(message)) => assert!(message.contains("id"), "{}", message),
            other => panic!("expected a decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelling_aborts_a_hung_request() {
        let (url, mut paths) = spawn_backend(StatusCode::OK, "[]", Duration::from_secs(30));
        let backend = backend(&url);
        let cancel = CancellationToken::new();

        let request = tokio::spawn(backend.list_devices(cancel.clone()));
        paths.recv().await.unwrap();
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), request)
            .await
            .expect("cancelled request should resolve promptly")
            .unwrap();

        assert_eq!(result, Err(FetchError::Cancelled));
    }

    #[tokio::test]
    async fn power_toggle_hits_the_power_endpoint() {
        let (url, mut paths) = spawn_backend(StatusCode::OK, r#"{"code": 200, "msg": "ok"}"#, Duration::ZERO);

        backend(&url)
            .send_command("abc", DeviceCommand::Power(true))
            .await
            .unwrap();

        assert_eq!(paths.recv().await.unwrap(), "/api/device/abc/power/on");
    }

    #[tokio::test]
    async fn color_value_decodes_back_to_the_chosen_rgb() {
        let (url, mut paths) = spawn_backend(StatusCode::OK, "", Duration::ZERO);
        let color: DeviceColor = "#3366CC".parse().unwrap();

        backend(&url)
            .send_command("abc", DeviceCommand::Color(color))
            .await
            .unwrap();

        let path = paths.recv().await.unwrap();
        let encoded = path.strip_prefix("/api/device/abc/color/").unwrap();
        assert!(!encoded.contains('#'));

        let decoded: DeviceColor = encoded.replace("%23", "#").parse().unwrap();
        assert_eq!(decoded, DeviceColor { r: 51, g: 102, b: 204 });
    }

    #[tokio::test]
    async fn lists_the_scenes_of_a_device() {
        let body = r#"["Aurora", "Rainbow Wave", "Sunrise"]"#;
        let (url, mut paths) = spawn_backend(StatusCode::OK, body, Duration::ZERO);

        let scenes = backend(&url)
            .list_scenes("AA:BB", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(paths.recv().await.unwrap(), "/api/device/AA:BB/scenes");
        assert_eq!(scenes, ["Aurora", "Rainbow Wave", "Sunrise"]);
    }

    #[tokio::test]
    async fn lists_one_clicks_by_name() {
        let body = r#"[
            {"name": "Movie night", "entries": [{"topic": "<REDACTED>", "msgs": [{"cmd": "turn"}]}]},
            {"name": "All off", "entries": []}
        ]"#;
        let (url, mut paths) = spawn_backend(StatusCode::OK, body, Duration::ZERO);

        let one_clicks = backend(&url).list_one_clicks(CancellationToken::new()).await.unwrap();

        assert_eq!(paths.recv().await.unwrap(), "/api/oneclicks");
        let names: Vec<&str> = one_clicks.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Movie night", "All off"]);
    }

    #[tokio::test]
    async fn one_click_activation_encodes_the_name() {
        let (url, mut paths) = spawn_backend(StatusCode::OK, "", Duration::ZERO);

        backend(&url).activate_one_click("Movie night").await.unwrap();

        assert_eq!(paths.recv().await.unwrap(), "/api/oneclick/activate/Movie%20night");
    }

    #[tokio::test]
    async fn command_failures_are_reported_to_the_caller_only() {
        let (url, _paths) = spawn_backend(StatusCode::NOT_FOUND, "", Duration::ZERO);

        let result = backend(&url).send_command("missing", DeviceCommand::Power(false)).await;

        assert_eq!(result, Err(FetchError::Status(StatusCode::NOT_FOUND)));
    }
}
