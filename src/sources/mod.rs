//! HTTP plumbing and the analysis-service client.

use reqwest::header::HeaderValue;
use tracing::warn;

use crate::config::{CONNECT_TIMEOUT, Config};
use crate::entities::input::media_type_essence;
use crate::error::PharmaGuardError;

pub(crate) mod pharmaguard;

const EXCERPT_MAX_CHARS: usize = 512;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Builds the HTTP client used for analysis requests.
///
/// There is no retry layer: multipart bodies are sent exactly once. The request timeout
/// bounds how long a submission can stay in flight.
pub(crate) fn http_client(config: &Config) -> Result<reqwest::Client, PharmaGuardError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("pharmaguard-cli/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(PharmaGuardError::HttpClientInit)
}

/// First `EXCERPT_MAX_CHARS` characters of a body with whitespace runs collapsed, for
/// log lines.
pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let collapsed = String::from_utf8_lossy(bytes)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.chars().count() <= EXCERPT_MAX_CHARS {
        return collapsed;
    }
    let mut excerpt: String = collapsed.chars().take(EXCERPT_MAX_CHARS).collect();
    excerpt.push_str(" …");
    excerpt
}

/// Rejects HTML bodies (gateway and proxy error pages) before JSON decoding. Other
/// non-JSON types are logged and parsed anyway.
pub(crate) fn ensure_json_content_type(
    content_type: Option<&HeaderValue>,
    body: &[u8],
) -> Result<(), PharmaGuardError> {
    let Some(essence) = content_type
        .and_then(|value| value.to_str().ok())
        .and_then(media_type_essence)
    else {
        return Ok(());
    };

    match essence.as_str() {
        "text/html" | "application/xhtml+xml" => Err(PharmaGuardError::MalformedResponse(
            format!(
                "received an HTML page instead of JSON: {}",
                body_excerpt(body)
            ),
        )),
        "application/json" | "text/json" => Ok(()),
        json if json.ends_with("+json") => Ok(()),
        other => {
            warn!(content_type = other, "Analysis service sent a non-JSON content type; parsing anyway");
            Ok(())
        }
    }
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
) -> Result<Vec<u8>, PharmaGuardError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await.map_err(PharmaGuardError::transport)? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(PharmaGuardError::MalformedResponse(format!(
                "response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
