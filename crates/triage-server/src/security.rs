//! Security utilities for the triage service
//!
//! Webhook signature verification (HMAC-SHA256 over the raw body) and
//! validation of outbound URLs against SSRF targets.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::IpAddr;
use subtle::ConstantTimeEq;
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Signature and outbound-URL failures
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("unparsable URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("scheme '{0}' is not permitted for outbound calls")]
    InvalidScheme(String),

    #[error("outbound calls to '{0}' are not permitted")]
    BlockedHost(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("Webhook signature header is missing")]
    MissingSignature,

    #[error("Webhook signature does not match")]
    InvalidSignature,
}

/// Names that resolve to the local machine or a cloud metadata service
const DENIED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
    "metadata.google.internal",
    "metadata.goog",
    "169.254.169.254",
    "fd00:ec2::254",
];

/// Hex-encoded HMAC-SHA256 of `body`
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any length"),
    };
    mac.update(body);
    format!("{:x}", mac.finalize().into_bytes())
}

/// Check a webhook signature in constant time.
///
/// Accepts a bare hex digest or one prefixed with `sha256=`, in either case.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    provided: Option<&str>,
) -> Result<(), SecurityError> {
    let provided = provided
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SecurityError::MissingSignature)?;
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);

    let expected = sign(secret, body);
    let matches: bool = expected
        .as_bytes()
        .ct_eq(provided.to_ascii_lowercase().as_bytes())
        .into();

    if matches {
        Ok(())
    } else {
        Err(SecurityError::InvalidSignature)
    }
}

/// Which destinations the model and support platform clients may reach
#[derive(Debug, Clone, Default)]
pub struct OutboundUrlPolicy {
    pub allow_plain_http: bool,
    pub allow_loopback: bool,
    /// RFC 1918, CGNAT and unique-local ranges
    pub allow_private_networks: bool,
}

impl OutboundUrlPolicy {
    /// Relaxed policy for running against local mocks
    pub fn development() -> Self {
        Self {
            allow_plain_http: true,
            allow_loopback: true,
            allow_private_networks: true,
        }
    }
}

/// Parse an outbound URL and reject SSRF targets.
///
/// Link-local addresses (cloud metadata) are refused under every policy.
pub fn validate_outbound_url(raw: &str, policy: &OutboundUrlPolicy) -> Result<Url, SecurityError> {
    let url = Url::parse(raw)?;

    let scheme_ok = match url.scheme() {
        "https" => true,
        "http" => policy.allow_plain_http,
        _ => false,
    };
    if !scheme_ok {
        return Err(SecurityError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(SecurityError::MissingHost)?;
    if host_is_denied(host, policy) {
        return Err(SecurityError::BlockedHost(host.to_string()));
    }
    Ok(url)
}

fn host_is_denied(host: &str, policy: &OutboundUrlPolicy) -> bool {
    let name = host.to_ascii_lowercase();
    if !policy.allow_loopback
        && DENIED_HOSTNAMES
            .iter()
            .any(|denied| name == *denied || name.ends_with(&format!(".{}", denied)))
    {
        return true;
    }

    // IPv6 literals keep their brackets in host_str
    let Ok(ip) = name.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() else {
        return false;
    };

    is_link_local(&ip)
        || (!policy.allow_loopback && ip.is_loopback())
        || (!policy.allow_private_networks && is_private_network(&ip))
}

fn is_private_network(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [first, second, ..] = v4.octets();
            // 100.64.0.0/10 is carrier-grade NAT
            v4.is_private() || first == 0 || (first == 100 && (64..128).contains(&second))
        }
        // fc00::/7
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test";
    const BODY: &[u8] = br#"{"type":"thread.created"}"#;

    #[test]
    fn test_sign_is_hex_sha256() {
        let signature = sign(SECRET, BODY);
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(signature, sign(SECRET, BODY));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign(b"Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_signature() {
        let signature = sign(SECRET, BODY);
        assert!(verify_signature(SECRET, BODY, Some(&signature)).is_ok());
        assert!(verify_signature(SECRET, BODY, Some(&signature.to_uppercase())).is_ok());
        assert!(verify_signature(SECRET, BODY, Some(&format!("sha256={}", signature))).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let signature = sign(SECRET, BODY);
        assert!(matches!(
            verify_signature(SECRET, b"{}", Some(&signature)),
            Err(SecurityError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(b"other", BODY, Some(&signature)),
            Err(SecurityError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET, BODY, Some(&signature[..10])),
            Err(SecurityError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET, BODY, None),
            Err(SecurityError::MissingSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET, BODY, Some("  ")),
            Err(SecurityError::MissingSignature)
        ));
    }

    #[test]
    fn test_public_https_allowed() {
        let policy = OutboundUrlPolicy::default();
        let url = validate_outbound_url("https://api.openai.com/v1", &policy).unwrap();
        assert_eq!(url.host_str(), Some("api.openai.com"));
    }

    #[test]
    fn test_plain_http_needs_opt_in() {
        let strict = OutboundUrlPolicy::default();
        assert!(matches!(
            validate_outbound_url("http://core-api.example.com/graphql", &strict),
            Err(SecurityError::InvalidScheme(_))
        ));
        assert!(matches!(
            validate_outbound_url("ftp://example.com", &OutboundUrlPolicy::development()),
            Err(SecurityError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_loopback_targets_denied() {
        let strict = OutboundUrlPolicy::default();
        for url in [
            "https://localhost:8080",
            "https://api.localhost",
            "https://127.0.0.1:8080",
            "https://[::1]:8080",
        ] {
            assert!(
                matches!(validate_outbound_url(url, &strict), Err(SecurityError::BlockedHost(_))),
                "{} allowed",
                url
            );
        }
    }

    #[test]
    fn test_private_and_metadata_denied() {
        let strict = OutboundUrlPolicy::default();
        for url in [
            "https://10.0.0.1",
            "https://192.168.1.1",
            "https://172.16.0.1",
            "https://100.64.3.4",
            "https://[fd12::1]",
            "https://169.254.169.254/latest/meta-data/",
            "https://metadata.google.internal",
        ] {
            assert!(validate_outbound_url(url, &strict).is_err(), "{} allowed", url);
        }
        assert!(validate_outbound_url("https://100.128.0.1", &strict).is_ok());
    }

    #[test]
    fn test_development_policy() {
        let dev = OutboundUrlPolicy::development();
        assert!(validate_outbound_url("http://localhost:4000/graphql", &dev).is_ok());
        assert!(validate_outbound_url("http://192.168.1.20:8000/v1", &dev).is_ok());
        // Metadata stays off limits
        assert!(validate_outbound_url("http://169.254.10.1", &dev).is_err());
    }
}
