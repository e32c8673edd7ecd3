//! Receipt verification URLs.
//!
//! Every receipt must carry a QR code pointing at the tax authority's
//! verification page. The URL references the invoice either by its JIR
//! (once fiscalized) or by its ZKI (when issued offline), plus the issue
//! time to the minute and the total amount in cents.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::validate::{is_valid_currency_format, is_valid_jir, is_valid_zki};

/// Base address of the public verification page.
pub const QR_BASE_URL: &str = "https://porezna.gov.hr/rn";

const QR_TIME_FORMAT: &str = "%Y%m%d_%H%M";

/// Errors raised while building a verification URL.
#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error("invalid JIR '{0}'")]
    InvalidJir(String),
    #[error("invalid protection code '{0}'")]
    InvalidProtectionCode(String),
    #[error("invalid total amount '{0}', expected a positive number with exactly 2 decimals")]
    InvalidAmount(String),
}

/// How the verification URL references the invoice.
#[derive(Debug, Clone, Copy)]
pub enum QrReference<'a> {
    /// By the JIR the service assigned.
    Jir(&'a str),
    /// By the issuer's protection code, for invoices not yet fiscalized.
    ProtectionCode(&'a str),
}

/// Builds the verification URL for a receipt's QR code.
pub fn verification_url(
    reference: QrReference<'_>,
    issued_at: NaiveDateTime,
    total_amount: &str,
) -> Result<String, QrCodeError> {
    if !is_valid_currency_format(total_amount) {
        return Err(QrCodeError::InvalidAmount(total_amount.to_string()));
    }

    let (key, value) = match reference {
        QrReference::Jir(jir) => {
            if !is_valid_jir(jir) {
                return Err(QrCodeError::InvalidJir(jir.to_string()));
            }
            ("jir", jir)
        }
        QrReference::ProtectionCode(code) => {
            if !is_valid_zki(code) {
                return Err(QrCodeError::InvalidProtectionCode(code.to_string()));
            }
            ("zki", code)
        }
    };

    // Amount in cents, without leading zeros.
    let cents_raw = total_amount.replace('.', "");
    let cents = cents_raw.trim_start_matches('0');
    let cents = if cents.is_empty() { "0" } else { cents };

    let datv = issued_at.format(QR_TIME_FORMAT);
    Ok(format!("{QR_BASE_URL}?{key}={value}&datv={datv}&izn={cents}"))
}
