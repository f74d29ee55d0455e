//! Webhook signature verification using HMAC-SHA256.
//!
//! The provider signs each delivery with a shared secret and sends the result
//! in the `X-Hub-Signature-256` header as `sha256=<hex>`. The HMAC is computed
//! over the raw request body exactly as received; callers must verify before
//! parsing and must not re-serialize the payload first.
//!
//! Deliveries without a signature header are a special case: legacy and
//! manually-triggered deliveries omit it, so by default they are accepted
//! unverified. Operators can require signatures via configuration.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of checking a delivery's (possibly absent) signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Header present and the HMAC matched.
    Verified,
    /// Header absent and configuration allows unsigned deliveries.
    SkippedUnsigned,
    /// Header absent but configuration requires a signature.
    MissingRequired,
    /// Header present but the HMAC did not match (or the header was malformed).
    Mismatch,
}

impl SignatureCheck {
    /// Whether processing may continue past the signature gate.
    pub fn accepted(self) -> bool {
        matches!(
            self,
            SignatureCheck::Verified | SignatureCheck::SkippedUnsigned
        )
    }
}

/// Applies the signature policy to a delivery.
///
/// `header` is the raw `X-Hub-Signature-256` value if one was sent. When
/// `require_signature` is false (the default), an absent header skips
/// verification entirely; a present header is always verified.
pub fn check_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &[u8],
    require_signature: bool,
) -> SignatureCheck {
    match header {
        Some(header) => {
            if verify_signature(payload, header, secret) {
                SignatureCheck::Verified
            } else {
                SignatureCheck::Mismatch
            }
        }
        None if require_signature => SignatureCheck::MissingRequired,
        None => SignatureCheck::SkippedUnsigned,
    }
}

/// Parses a `sha256=<hex>` signature header into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, invalid hex).
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 signature of a payload with the given secret.
///
/// Primarily used by tests to construct valid deliveries.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a `sha256=<hex>` header value.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a signature header against the payload and secret.
///
/// Uses constant-time comparison (via the HMAC library's `verify_slice`) to
/// prevent timing attacks. Malformed headers return `false`, never panic.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let expected = match parse_signature_header(signature_header) {
        Some(sig) => sig,
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
