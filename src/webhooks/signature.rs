//! Webhook authentication.
//!
//! Jira has two ways of proving a delivery came from a configured webhook:
//!
//! - Jira Cloud (and newer Data Center) can sign the body with HMAC-SHA256
//!   using the webhook's secret, sent as `X-Hub-Signature: sha256=<hex>`.
//! - Older setups embed the shared secret in the webhook URL as a `secret`
//!   query parameter.
//!
//! A delivery is accepted if either check passes. Both comparisons are
//! constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Parses a signature header (e.g., "sha256=abc123...") into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex, etc.).
///
/// ```
/// use jira_relay::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("sha256=abcd1234").is_some());
/// assert!(parse_signature_header("abcd1234").is_none());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 signature of a payload.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    match HmacSha256::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(payload);
            mac.finalize().into_bytes().to_vec()
        }
        // HMAC accepts keys of any length.
        Err(_) => Vec::new(),
    }
}

/// Formats a signature as a header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a body signature header against the payload and secret.
///
/// ```
/// use jira_relay::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = br#"{"webhookEvent":"comment_created"}"#;
/// let header = format_signature_header(&compute_signature(payload, b"s3cret"));
///
/// assert!(verify_signature(payload, &header, b"s3cret"));
/// assert!(!verify_signature(payload, &header, b"wrong"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Compares a URL-embedded secret with the configured one.
pub fn verify_query_secret(provided: &str, secret: &str) -> bool {
    constant_time_eq(provided.as_bytes(), secret.as_bytes())
}

/// Accepts the delivery if the signature header or the query secret checks out.
///
/// An empty configured secret accepts nothing.
pub fn authenticate(
    payload: &[u8],
    signature_header: Option<&str>,
    query_secret: Option<&str>,
    secret: &str,
) -> bool {
    if secret.is_empty() {
        return false;
    }
    let signed = signature_header
        .is_some_and(|header| verify_signature(payload, header, secret.as_bytes()));
    let shared = query_secret.is_some_and(|provided| verify_query_secret(provided, secret));
    signed || shared
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_header_valid() {
        assert_eq!(
            parse_signature_header("sha256=1234abcd"),
            Some(vec![0x12, 0x34, 0xab, 0xcd])
        );
    }

    #[test]
    fn parse_header_rejects_malformed() {
        assert_eq!(parse_signature_header(""), None);
        assert_eq!(parse_signature_header("sha256="), Some(vec![]));
        assert_eq!(parse_signature_header("sha256=abc"), None);
        assert_eq!(parse_signature_header("SHA256=abcd"), None);
    }

    #[test]
    fn rfc4231_test_case_2() {
        // Key "Jefe", data "what do ya want for nothing?"
        let sig = compute_signature(b"what do ya want for nothing?", b"Jefe");
        assert_eq!(
            hex::encode(sig),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signature_over_different_body_fails() {
        let header = format_signature_header(&compute_signature(b"body", b"secret"));
        assert!(verify_signature(b"body", &header, b"secret"));
        assert!(!verify_signature(b"body!", &header, b"secret"));
    }

    #[test]
    fn query_secret_must_match_exactly() {
        assert!(verify_query_secret("abc", "abc"));
        assert!(!verify_query_secret("abd", "abc"));
        assert!(!verify_query_secret("ab", "abc"));
        assert!(!verify_query_secret("", "abc"));
    }

    #[test]
    fn authenticate_accepts_either_mechanism() {
        let payload = b"{}";
        let header = format_signature_header(&compute_signature(payload, b"s3cret"));

        assert!(authenticate(payload, Some(&header), None, "s3cret"));
        assert!(authenticate(payload, None, Some("s3cret"), "s3cret"));
        assert!(authenticate(payload, Some("sha256=00"), Some("s3cret"), "s3cret"));
        assert!(!authenticate(payload, None, None, "s3cret"));
        assert!(!authenticate(payload, Some("sha256=00"), Some("nope"), "s3cret"));
    }

    #[test]
    fn empty_configured_secret_accepts_nothing() {
        assert!(!authenticate(b"{}", None, Some(""), ""));
    }

    proptest! {
        #[test]
        fn computed_signature_verifies(
            payload in prop::collection::vec(any::<u8>(), 0..512),
            secret in "[a-zA-Z0-9]{1,32}",
        ) {
            let header = format_signature_header(&compute_signature(&payload, secret.as_bytes()));
            prop_assert!(verify_signature(&payload, &header, secret.as_bytes()));
            prop_assert!(authenticate(&payload, Some(&header), None, &secret));
        }

        #[test]
        fn wrong_secret_fails(
            payload in prop::collection::vec(any::<u8>(), 0..128),
            secret in "[a-z]{8}",
            other in "[A-Z]{8}",
        ) {
            let header = format_signature_header(&compute_signature(&payload, secret.as_bytes()));
            prop_assert!(!verify_signature(&payload, &header, other.as_bytes()));
        }
    }
}
