//! Field validators shared across the crate.
//!
//! These mirror the formats the CIS service enforces: monetary amounts with
//! exactly two decimals, the ISO 6523 Mod 11,10 OIB checksum, alphanumeric
//! business location codes, and the shapes of the JIR and ZKI identifiers.

use std::sync::LazyLock;

use regex::Regex;

static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d{2}$").expect("valid currency regex"));

static TAX_RATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d{2}$").expect("valid tax rate regex"));

static LOCATION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-zA-Z]+$").expect("valid location regex"));

static JIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid JIR regex")
});

static ZKI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{32}$").expect("valid ZKI regex"));

/// Checks that `amount` is a positive decimal with exactly two decimal
/// places, e.g. `100.00`. No thousands separators, no sign.
pub fn is_valid_currency_format(amount: &str) -> bool {
    CURRENCY_RE.is_match(amount)
}

/// Checks that `rate` is a tax rate with exactly two decimal places,
/// e.g. `25.00`.
pub fn is_valid_tax_rate(rate: &str) -> bool {
    TAX_RATE_RE.is_match(rate)
}

/// Checks that `location_id` is a non-empty alphanumeric business location
/// code.
pub fn is_valid_location_id(location_id: &str) -> bool {
    LOCATION_ID_RE.is_match(location_id)
}

/// Checks that `jir` has the canonical UUID shape returned by the CIS
/// service.
pub fn is_valid_jir(jir: &str) -> bool {
    JIR_RE.is_match(jir)
}

/// Checks that `zki` is a 32-character lowercase hex protection code.
pub fn is_valid_zki(zki: &str) -> bool {
    ZKI_RE.is_match(zki)
}

/// Validates an OIB (Croatian personal identification number): 11 digits
/// whose last digit is the ISO 7064 Mod 11,10 check digit of the first ten.
pub fn validate_oib(oib: &str) -> bool {
    let bytes = oib.as_bytes();
    if bytes.len() != 11 || !bytes.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let mut remainder: u32 = 10;
    for &b in &bytes[..10] {
        remainder = (remainder + u32::from(b - b'0')) % 10;
        if remainder == 0 {
            remainder = 10;
        }
        remainder = (remainder * 2) % 11;
    }

    let check = (11 - remainder) % 10;
    u32::from(bytes[10] - b'0') == check
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_format() {
        assert!(is_valid_currency_format("0.00"));
        assert!(is_valid_currency_format("100.00"));
        assert!(is_valid_currency_format("12345678.99"));
        // Arbitrary digit length, well past any integer range.
        assert!(is_valid_currency_format("134876348653847632687.99"));

        assert!(!is_valid_currency_format("100"));
        assert!(!is_valid_currency_format("100.0"));
        assert!(!is_valid_currency_format("100.000"));
        assert!(!is_valid_currency_format("-100.00"));
        assert!(!is_valid_currency_format("1,000.00"));
        assert!(!is_valid_currency_format(".00"));
        assert!(!is_valid_currency_format("100.00 0"));
        assert!(!is_valid_currency_format("abc.23"));
        assert!(!is_valid_currency_format(""));
    }

    #[test]
    fn oib_checksum() {
        // Checksum verified against the Mod 11,10 algorithm by hand.
        assert!(validate_oib("00000000001"));
        assert!(validate_oib("12345678903"));

        assert!(!validate_oib("12345678901"));
        assert!(!validate_oib("1234567890"));
        assert!(!validate_oib("123456789012"));
        assert!(!validate_oib("1234567890a"));
        assert!(!validate_oib(""));
    }

    #[test]
    fn location_ids() {
        assert!(is_valid_location_id("POSL1"));
        assert!(is_valid_location_id("1"));
        assert!(!is_valid_location_id(""));
        assert!(!is_valid_location_id("POSL 1"));
        assert!(!is_valid_location_id("POSL-1"));
    }

    #[test]
    fn jir_shape() {
        assert!(is_valid_jir("9d6f5bb6-da48-4fcd-a803-4586a025e0e4"));
        assert!(!is_valid_jir("9d6f5bb6da484fcda8034586a025e0e4"));
        assert!(!is_valid_jir("9d6f5bb6-da48-4fcd-a803-4586a025e0g4"));
        assert!(!is_valid_jir(""));
    }

    #[test]
    fn zki_shape() {
        assert!(is_valid_zki("e4d909c290d0fb1ca068ffaddf22cbd0"));
        assert!(!is_valid_zki("E4D909C290D0FB1CA068FFADDF22CBD0"));
        assert!(!is_valid_zki("e4d909c290d0fb1ca068ffaddf22cbd"));
        assert!(!is_valid_zki(""));
    }
}
