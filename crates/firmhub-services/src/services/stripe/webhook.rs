use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::StripeError;

type HmacSha256 = Hmac<Sha256>;

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The signed payload is `"{t}.{body}"`. Any `v1` entry may match; `t` must lie within
/// `tolerance_secs` of `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), StripeError> {
    let header = header.ok_or(StripeError::MissingSignature)?;

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(StripeError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(StripeError::MalformedSignature);
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(StripeError::TimestampOutOfTolerance);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| StripeError::MalformedSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    let matched = signatures
        .iter()
        .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));
    if matched {
        Ok(())
    } else {
        Err(StripeError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, t: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}", t, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let body = r#"{"id":"evt_1"}"#;
        let header = format!("t=1000,v1={}", sign(body, 1000));
        assert!(verify_webhook_signature(body.as_bytes(), Some(&header), SECRET, 300, 1100).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let body = "{}";
        let header = format!("t=1000,v1=deadbeef,v1={}", sign(body, 1000));
        assert!(verify_webhook_signature(body.as_bytes(), Some(&header), SECRET, 300, 1000).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = format!("t=1000,v1={}", sign("{}", 1000));
        let result = verify_webhook_signature(b"{\"x\":1}", Some(&header), SECRET, 300, 1000);
        assert!(matches!(result, Err(StripeError::SignatureMismatch)));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let header = format!("t=1000,v1={}", sign("{}", 1000));
        let result = verify_webhook_signature(b"{}", Some(&header), SECRET, 300, 1301);
        assert!(matches!(result, Err(StripeError::TimestampOutOfTolerance)));
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert!(matches!(
            verify_webhook_signature(b"{}", None, SECRET, 300, 0),
            Err(StripeError::MissingSignature)
        ));
        assert!(matches!(
            verify_webhook_signature(b"{}", Some("v1=abcd"), SECRET, 300, 0),
            Err(StripeError::MalformedSignature)
        ));
    }
}
