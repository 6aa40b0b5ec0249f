//! Request correlation IDs.
//!
//! An `x-request-id` from the edge proxy is kept when it looks like an ID;
//! anything else is replaced with a UUID v4. The ID is recorded on the
//! request span, tagged on the Sentry scope and echoed in the response.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Upstream ID if it is short and made of ID characters only.
fn upstream_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let valid = !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'));
    valid.then(|| value.to_string())
}

pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id =
        upstream_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_keeps_proxy_id() {
        assert_eq!(
            upstream_id(&headers("8a1f3c2e-cf-ray:GRU")).as_deref(),
            Some("8a1f3c2e-cf-ray:GRU")
        );
    }

    #[test]
    fn test_rejects_odd_ids() {
        assert!(upstream_id(&HeaderMap::new()).is_none());
        assert!(upstream_id(&headers("")).is_none());
        assert!(upstream_id(&headers("a b")).is_none());
        assert!(upstream_id(&headers("<script>")).is_none());
        assert!(upstream_id(&headers(&"x".repeat(MAX_REQUEST_ID_LEN + 1))).is_none());
    }
}
