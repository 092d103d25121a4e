//! HTTP transport helpers shared by the collaborator endpoints.

use crate::api::ByteStream;
use crate::error::ApiError;
use futures::StreamExt;
use std::time::Duration;

/// Build an HTTP client with the connect timeout applied.
///
/// No whole-request timeout is set here: run responses stream for as long as
/// the automation takes. Notification calls set their own per-request limit.
pub(super) fn build_http_client(connect_timeout: Duration) -> reqwest::Client {
    // Fall back to reqwest defaults if builder creation fails for any reason.
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Turn non-2xx responses into `ApiError::Status` carrying the body text.
pub(super) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        code: status.as_u16(),
        body,
    })
}

/// Read one response header as UTF-8 text.
pub(super) fn header_text(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Adapt the response body into the crate's chunk stream.
pub(super) fn body_stream(response: reqwest::Response) -> ByteStream {
    response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from))
        .boxed()
}
