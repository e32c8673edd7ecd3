//! Issuer protection code (ZKI) generation.
//!
//! The ZKI binds the invoice header fields to the issuer's private key and
//! is printed on every receipt, so it can be (and must be) generated
//! offline. The input string is the concatenation of OIB, issue time
//! (`dd.MM.yyyy HH:mm:ss`), invoice number, business location, cash
//! register number and total amount; its SHA-1 digest is signed with RSA
//! PKCS#1 v1.5 and the MD5 of the signature, lowercase hex encoded, is the
//! protection code.

use chrono::NaiveDateTime;
use md5::Md5;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::validate::is_valid_currency_format;

/// Timestamp layout used inside the ZKI input string.
const ZKI_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Errors raised while generating or checking a protection code.
#[derive(Debug, Error)]
pub enum ZkiError {
    #[error("invalid total amount '{0}', expected a positive number with exactly 2 decimals")]
    InvalidAmount(String),
    #[error("RSA signing failed: {0}")]
    Sign(String),
    #[error("protection code does not match the invoice data and signing key")]
    Mismatch,
}

/// Computes the protection code for the given invoice header fields.
///
/// PKCS#1 v1.5 signing is deterministic, so the same inputs and key always
/// produce the same code; any field change produces a different one.
pub fn protection_code(
    key: &RsaPrivateKey,
    oib: &str,
    issued_at: NaiveDateTime,
    invoice_number: u32,
    location_id: &str,
    register_id: u32,
    total_amount: &str,
) -> Result<String, ZkiError> {
    if !is_valid_currency_format(total_amount) {
        return Err(ZkiError::InvalidAmount(total_amount.to_string()));
    }

    let timestamp = issued_at.format(ZKI_TIME_FORMAT);
    let input =
        format!("{oib}{timestamp}{invoice_number}{location_id}{register_id}{total_amount}");

    let digest = Sha1::digest(input.as_bytes());
    let signature = key
        .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
        .map_err(|e| ZkiError::Sign(e.to_string()))?;

    let fingerprint = Md5::digest(&signature);
    Ok(fingerprint.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_key() -> RsaPrivateKey {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 1024).expect("generate key")
    }

    fn issued_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .expect("date")
            .and_hms_opt(16, 0, 38)
            .expect("time")
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let key = test_key();
        let a = protection_code(&key, "12345678903", issued_at(), 1, "POSL1", 12, "100.00")
            .expect("zki");
        let b = protection_code(&key, "12345678903", issued_at(), 1, "POSL1", 12, "100.00")
            .expect("zki");
        assert_eq!(a, b);
        assert!(crate::validate::is_valid_zki(&a));
    }

    #[test]
    fn sensitive_to_every_field() {
        let key = test_key();
        let base = protection_code(&key, "12345678903", issued_at(), 1, "POSL1", 12, "100.00")
            .expect("zki");

        let changed = [
            protection_code(&key, "00000000001", issued_at(), 1, "POSL1", 12, "100.00"),
            protection_code(&key, "12345678903", issued_at(), 2, "POSL1", 12, "100.00"),
            protection_code(&key, "12345678903", issued_at(), 1, "POSL2", 12, "100.00"),
            protection_code(&key, "12345678903", issued_at(), 1, "POSL1", 13, "100.00"),
            protection_code(&key, "12345678903", issued_at(), 1, "POSL1", 12, "100.01"),
        ];
        for other in changed {
            assert_ne!(base, other.expect("zki"));
        }
    }

    #[test]
    fn different_keys_differ() {
        let a = protection_code(&test_key(), "12345678903", issued_at(), 1, "P1", 1, "10.00")
            .expect("zki");
        let b = protection_code(&test_key(), "12345678903", issued_at(), 1, "P1", 1, "10.00")
            .expect("zki");
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_amount() {
        let key = test_key();
        let err = protection_code(&key, "12345678903", issued_at(), 1, "P1", 1, "100.0")
            .expect_err("must reject");
        assert!(matches!(err, ZkiError::InvalidAmount(_)));
    }
}
