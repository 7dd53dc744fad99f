//! Request execution helpers shared by every provider call.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt::Display;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result};

/// Send a request and return the response once its status is a success.
///
/// Non-success responses are read and turned into [`ProviderError::Server`].
pub(crate) async fn send(request: RequestBuilder, cancel: &CancellationToken) -> Result<Response> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let text = body_or_read_error(response.text().await);
                return Err(ProviderError::from_response_body(status.as_u16(), &text));
            }
            Ok(response)
        } => result,
    }
}

/// Error body text, or a placeholder naming why it could not be read.
pub(crate) fn body_or_read_error<E: Display>(body: std::result::Result<String, E>) -> String {
    body.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

/// Send a request and return the success body as text.
pub(crate) async fn send_text(request: RequestBuilder, cancel: &CancellationToken) -> Result<String> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = async {
            let response = send(request, cancel).await?;
            Ok(response.text().await?)
        } => result,
    }
}

/// Send a request and parse the success body as JSON.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<T> {
    let text = send_text(request, cancel).await?;
    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        ProviderError::MalformedResponse(format!("{e} (body: {preview})"))
    })
}

/// Assemble `base?k=v&...` without issuing a request.
///
/// Values made only of URL-safe characters (identifiers, addresses, DIDs,
/// hex signatures) are written as-is; anything else is percent-encoded.
pub(crate) fn build_url(base: &str, params: &[(&str, String)]) -> String {
    let mut url = base.to_string();
    for (i, (key, value)) in params.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(key);
        url.push('=');
        url.push_str(&encode_value(value));
    }
    url
}

fn encode_value(value: &str) -> Cow<'_, str> {
    let plain = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b':'));
    if plain {
        Cow::Borrowed(value)
    } else {
        urlencoding::encode(value)
    }
}
