//! Pre-send hook: attach the bearer credential

use super::request::RetryableRequest;
use crate::auth::Credential;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::warn;

/// Set `Authorization: Bearer <credential>` iff a credential is present.
///
/// Never fails. A credential that cannot be encoded as a header value is
/// skipped; the server will reject the call and the refresh path takes over.
pub fn stamp_headers(headers: &mut HeaderMap, credential: Option<&Credential>) {
    let Some(credential) = credential else {
        return;
    };

    match HeaderValue::from_str(&credential.bearer()) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            warn!(
                "Stored credential {} is not a valid header value, sending unauthenticated",
                credential.redacted()
            );
        }
    }
}

/// Build the transport request for one attempt of `request`
pub fn stamp(request: &RetryableRequest, credential: Option<&Credential>) -> reqwest::Request {
    let mut outgoing = reqwest::Request::new(request.method().clone(), request.url().clone());

    let mut headers = request.headers().clone();
    stamp_headers(&mut headers, credential);
    *outgoing.headers_mut() = headers;

    if let Some(body) = request.body_bytes() {
        *outgoing.body_mut() = Some(body.clone().into());
    }

    outgoing
}
