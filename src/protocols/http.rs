use color_eyre::Result;
use hyper::{Request, StatusCode, Uri};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub type HyperHttpClient = hyper::Client<hyper_rustls::HttpsConnector<hyper::client::HttpConnector>>;

/// Why a request to the backend did not produce a value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("backend responded with status {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("request was cancelled")]
    Cancelled,
}

impl From<hyper::Error> for FetchError {
    fn from(e: hyper::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

impl From<hyper::http::Error> for FetchError {
    fn from(e: hyper::http::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

/// Builds a client that speaks both plain http and https, since the backend
/// is usually reached on the local network without TLS.
pub fn mk_hyper_http_client() -> Result<HyperHttpClient> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();

    let client = hyper::Client::builder().build(connector);

    Ok(client)
}

async fn get_body(client: &HyperHttpClient, uri: &Uri) -> Result<hyper::body::Bytes, FetchError> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(hyper::Body::empty())?;

    let response = client.request(request).await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body_bytes = hyper::body::to_bytes(response.into_body()).await?;

    Ok(body_bytes)
}

/// Issues a GET request and decodes the JSON body.
///
/// The in-flight request is dropped, and with it the underlying connection,
/// as soon as `cancel` fires.
pub async fn mk_get_request<T: for<'a> Deserialize<'a>>(
    client: &HyperHttpClient,
    uri: &Uri,
    cancel: &CancellationToken,
) -> Result<T, FetchError> {
    let body_bytes = tokio::select! {
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        body = get_body(client, uri) => body?,
    };

    let de = &mut serde_json::Deserializer::from_slice(&body_bytes);
    let response: T =
        serde_path_to_error::deserialize(de).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(response)
}

/// Issues a GET request whose response body is of no interest to the caller.
pub async fn mk_fire_request(client: &HyperHttpClient, uri: &Uri) -> Result<(), FetchError> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(hyper::Body::empty())?;

    let response = client.request(request).await?;
    let status = response.status();

    // Drain the body so the connection can go back to the pool
    hyper::body::to_bytes(response.into_body()).await?;

    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status(status))
    }
}
