//! Per-request CSP nonce.
//!
//! The base layout loads HTMX and the Google sign-in client with
//! `<script nonce="...">`; the same value goes into the `script-src`
//! directive built by the security headers middleware.

use axum::{extract::Request, http::Extensions, middleware::Next, response::Response};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// 128-bit random nonce, base64-encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Nonce of the current request, or `""` outside the middleware stack.
    #[must_use]
    pub fn of(extensions: &Extensions) -> &str {
        extensions.get::<Self>().map_or("", Self::value)
    }
}

/// Store a fresh nonce in the request extensions.
///
/// Runs outside `security_headers_middleware`, which reads it back when
/// building the policy.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_are_unique_and_sized() {
        let a = CspNonce::generate();
        let b = CspNonce::generate();
        assert_ne!(a, b);
        // 16 bytes -> 24 base64 chars with padding
        assert_eq!(a.value().len(), 24);
    }

    #[test]
    fn test_missing_nonce_is_empty() {
        let mut extensions = Extensions::new();
        assert_eq!(CspNonce::of(&extensions), "");
        let nonce = CspNonce::generate();
        extensions.insert(nonce.clone());
        assert_eq!(CspNonce::of(&extensions), nonce.value());
    }
}
