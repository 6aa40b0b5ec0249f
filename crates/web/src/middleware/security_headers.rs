//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses. Start locked down and
//! loosen only when specific functionality requires it.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::csp::CspNonce;

/// Google Identity Services, for the sign-in button.
const GOOGLE_ACCOUNTS: &str = "https://accounts.google.com";

/// HTMX is loaded from this CDN.
const SCRIPT_CDN: &str = "https://unpkg.com";

/// Build the CSP for a response.
///
/// Listing photos are hosted elsewhere, so any HTTPS image is allowed.
/// Inline scripts need the request's nonce.
///
/// ```text
/// default-src 'none';
/// script-src 'self' 'nonce-…' https://unpkg.com https://accounts.google.com/gsi/client;
/// style-src 'self' https://accounts.google.com/gsi/style;
/// font-src 'self';
/// img-src 'self' https: data:;
/// connect-src 'self' https://accounts.google.com/gsi/;
/// frame-src https://accounts.google.com/gsi/;
/// object-src 'none';
/// base-uri 'self';
/// form-action 'self';
/// frame-ancestors 'none';
/// upgrade-insecure-requests
/// ```
#[must_use]
pub fn content_security_policy(nonce: Option<&str>) -> String {
    let nonce_source = nonce
        .filter(|n| !n.is_empty())
        .map(|n| format!(" 'nonce-{n}'"))
        .unwrap_or_default();
    format!(
        "default-src 'none'; \
         script-src 'self'{nonce_source} {SCRIPT_CDN} {GOOGLE_ACCOUNTS}/gsi/client; \
         style-src 'self' {GOOGLE_ACCOUNTS}/gsi/style; \
         font-src 'self'; \
         img-src 'self' https: data:; \
         connect-src 'self' {GOOGLE_ACCOUNTS}/gsi/; \
         frame-src {GOOGLE_ACCOUNTS}/gsi/; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'; \
         upgrade-insecure-requests"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Content-Security-Policy` - see [`content_security_policy`]
/// - `Permissions-Policy` - Deny all sensitive features
/// - `Cache-Control: no-store, max-age=0` - Pages carry per-user state
/// - `Cross-Origin-Opener-Policy: same-origin-allow-popups` - Google sign-in popup
/// - `Cross-Origin-Resource-Policy: same-origin` - Resource isolation
/// - `X-DNS-Prefetch-Control: off` - Prevent DNS prefetch leakage
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let nonce = CspNonce::of(request.extensions()).to_string();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // Prevent clickjacking
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    // Prevent MIME sniffing
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    // Google sign-in checks the origin of the embedding page
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    let csp = content_security_policy(Some(&nonce));
    if let Ok(value) = HeaderValue::from_str(&csp) {
        headers.insert(CONTENT_SECURITY_POLICY, value);
    }

    // Strict Permissions Policy - deny all sensitive features
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             ambient-light-sensor=(), \
             autoplay=(), \
             battery=(), \
             browsing-topics=(), \
             camera=(), \
             display-capture=(), \
             document-domain=(), \
             encrypted-media=(), \
             fullscreen=(self), \
             geolocation=(), \
             gyroscope=(), \
             hid=(), \
             identity-credentials-get=(self \"https://accounts.google.com\"), \
             idle-detection=(), \
             interest-cohort=(), \
             magnetometer=(), \
             microphone=(), \
             midi=(), \
             payment=(), \
             picture-in-picture=(), \
             publickey-credentials-get=(), \
             screen-wake-lock=(), \
             serial=(), \
             sync-xhr=(), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    // Pages carry per-user state
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-store, max-age=0"),
    );

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin-allow-popups"),
    );

    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );

    // Prevent DNS prefetching to avoid leaking which links user hovers over
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_includes_nonce_when_present() {
        let csp = content_security_policy(Some("abc123"));
        assert!(csp.contains("script-src 'self' 'nonce-abc123' https://unpkg.com"));
        assert!(csp.contains("frame-ancestors 'none'"));

        let csp = content_security_policy(None);
        assert!(!csp.contains("nonce-"));
        assert!(content_security_policy(Some("")).contains("script-src 'self' https://unpkg.com"));
    }
}
