//! PKCS#12 client certificate handling.
//!
//! Fiscalization certificates (FINA demo or production) arrive as a PKCS#12
//! container holding the RSA private key, the client certificate and the
//! issuing CA chain. [`IdentityBundle`] decodes the container, extracts the
//! holder's OIB from the certificate subject and tracks the validity window
//! so callers can warn about (or refuse) expired credentials.

use std::path::Path;

use openssl::asn1::Asn1TimeRef;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::x509::{X509NameRef, X509};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use thiserror::Error;

/// Days before expiry at which [`IdentityBundle::expires_soon`] turns on.
pub const EXPIRY_WARNING_DAYS: i32 = 30;

/// Errors raised while decoding a PKCS#12 identity bundle.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("failed to read certificate: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse PKCS#12 container: {0}")]
    Malformed(String),
    #[error("failed to decrypt PKCS#12 container: {0}")]
    Decrypt(String),
    #[error("private key not found in PKCS#12 container")]
    MissingPrivateKey,
    #[error("client certificate not found in PKCS#12 container")]
    MissingCertificate,
    #[error("private key is not an RSA key")]
    NotRsa,
    #[error("failed to parse private key (tried PKCS#8 and PKCS#1): {0}")]
    KeyParse(String),
    #[error("certificate subject is missing the {0} field")]
    MissingSubjectField(&'static str),
    #[error("failed to extract OIB from certificate subject")]
    OibNotFound,
    #[error("certificate is not valid yet: valid from {0}")]
    NotYetValid(String),
    #[error(transparent)]
    Provider(#[from] openssl::error::ErrorStack),
}

/// A decoded client identity: RSA key, certificate and issuing chain, plus
/// the subject metadata the fiscalization protocol needs.
pub struct IdentityBundle {
    signing_key: RsaPrivateKey,
    certificate: X509,
    certificate_der: Vec<u8>,
    ca_chain: Vec<X509>,
    organization: String,
    oib: String,
    subject: String,
    issuer: String,
    serial: String,
    valid_from: String,
    valid_until: String,
    expired: bool,
    expires_soon: bool,
    days_until_expiry: u16,
}

impl IdentityBundle {
    /// Reads and decodes a PKCS#12 file.
    pub fn from_pkcs12_file(path: impl AsRef<Path>, passphrase: &str) -> Result<Self, CertError> {
        let blob = std::fs::read(path)?;
        Self::from_pkcs12_der(&blob, passphrase)
    }

    /// Decodes a PKCS#12 container from memory.
    ///
    /// Fails if the container cannot be decrypted with `passphrase`, holds
    /// no RSA private key or client certificate, or if the certificate is
    /// not valid yet. An already expired certificate decodes fine and is
    /// reported through [`IdentityBundle::expired`]; refusing it is the
    /// caller's decision.
    pub fn from_pkcs12_der(blob: &[u8], passphrase: &str) -> Result<Self, CertError> {
        let container = Pkcs12::from_der(blob).map_err(|e| CertError::Malformed(e.to_string()))?;
        let parsed = container
            .parse2(passphrase)
            .map_err(|e| CertError::Decrypt(e.to_string()))?;

        let pkey = parsed.pkey.ok_or(CertError::MissingPrivateKey)?;
        let certificate = parsed.cert.ok_or(CertError::MissingCertificate)?;
        let ca_chain: Vec<X509> = parsed
            .ca
            .map(|stack| stack.into_iter().collect())
            .unwrap_or_default();

        // PKCS#8 first, then PKCS#1.
        let signing_key = match pkey.private_key_to_pkcs8() {
            Ok(der) => match RsaPrivateKey::from_pkcs8_der(&der) {
                Ok(key) => key,
                Err(_) => pkcs1_fallback(&pkey)?,
            },
            Err(_) => pkcs1_fallback(&pkey)?,
        };

        let now = openssl::asn1::Asn1Time::days_from_now(0)?;
        let until_start = now.diff(certificate.not_before())?;
        if until_start.days > 0 || (until_start.days == 0 && until_start.secs > 0) {
            return Err(CertError::NotYetValid(
                certificate.not_before().to_string(),
            ));
        }
        let until_expiry = now.diff(certificate.not_after())?;
        let expired = until_expiry.days < 0 || (until_expiry.days == 0 && until_expiry.secs < 0);
        let days_until_expiry =
            u16::try_from(until_expiry.days.max(0)).unwrap_or(u16::MAX);
        let expires_soon = until_expiry.days <= EXPIRY_WARNING_DAYS;

        let subject_name = certificate.subject_name();
        let organization = name_entry(subject_name, Nid::ORGANIZATIONNAME)
            .ok_or(CertError::MissingSubjectField("organization"))?;
        let country = name_entry(subject_name, Nid::COUNTRYNAME)
            .ok_or(CertError::MissingSubjectField("country"))?;
        // The subject organization is "<name> <country><oib>"; everything
        // after the country code is the holder's OIB.
        let oib = organization
            .split(country.as_str())
            .nth(1)
            .map(str::to_string)
            .ok_or(CertError::OibNotFound)?;

        let serial = certificate
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_dec_str().map(|s| s.to_string()))?;

        let certificate_der = certificate.to_der()?;

        if expired {
            tracing::warn!(
                valid_until = %certificate.not_after(),
                "client certificate has expired"
            );
        } else if expires_soon {
            tracing::warn!(days_until_expiry, "client certificate expires soon");
        }

        Ok(IdentityBundle {
            signing_key,
            subject: name_to_string(subject_name),
            issuer: name_to_string(certificate.issuer_name()),
            valid_from: asn1_time_string(certificate.not_before()),
            valid_until: asn1_time_string(certificate.not_after()),
            certificate_der,
            certificate,
            ca_chain,
            organization,
            oib,
            serial,
            expired,
            expires_soon,
            days_until_expiry,
        })
    }

    /// The RSA private key paired with the client certificate.
    pub fn signing_key(&self) -> &RsaPrivateKey {
        &self.signing_key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// DER encoding of the client certificate, as embedded in signatures.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// CA certificates carried alongside the client certificate.
    pub fn ca_chain(&self) -> &[X509] {
        &self.ca_chain
    }

    /// The subject organization, e.g. `FISKAL 1 HR12345678901`.
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// The OIB extracted from the certificate subject.
    pub fn oib(&self) -> &str {
        &self.oib
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number in decimal, as recorded in `X509SerialNumber`.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn expired(&self) -> bool {
        self.expired
    }

    /// True within [`EXPIRY_WARNING_DAYS`] of expiry (and once expired).
    pub fn expires_soon(&self) -> bool {
        self.expires_soon
    }

    pub fn days_until_expiry(&self) -> u16 {
        self.days_until_expiry
    }

    /// Key/value pairs describing the certificate, for display.
    pub fn display_info(&self) -> Vec<(String, String)> {
        let mut info = vec![
            ("Issuer".to_string(), self.issuer.clone()),
            ("Subject".to_string(), self.subject.clone()),
            ("Serial Number".to_string(), self.serial.clone()),
            ("Valid From".to_string(), self.valid_from.clone()),
            ("Valid Until".to_string(), self.valid_until.clone()),
        ];
        for (i, ca) in self.ca_chain.iter().enumerate() {
            info.push((
                format!("CA Cert {}", i + 1),
                format!(
                    "Issuer: {}, Subject: {}",
                    name_to_string(ca.issuer_name()),
                    name_to_string(ca.subject_name())
                ),
            ));
        }
        info
    }
}

impl std::fmt::Debug for IdentityBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityBundle")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .field("oib", &self.oib)
            .field("expired", &self.expired)
            .field("expires_soon", &self.expires_soon)
            .finish_non_exhaustive()
    }
}

fn pkcs1_fallback(
    pkey: &openssl::pkey::PKey<openssl::pkey::Private>,
) -> Result<RsaPrivateKey, CertError> {
    let rsa = pkey.rsa().map_err(|_| CertError::NotRsa)?;
    let der = rsa.private_key_to_der()?;
    RsaPrivateKey::from_pkcs1_der(&der).map_err(|e| CertError::KeyParse(e.to_string()))
}

fn name_entry(name: &X509NameRef, nid: Nid) -> Option<String> {
    name.entries_by_nid(nid)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
}

pub(crate) fn name_to_string(name: &X509NameRef) -> String {
    name.entries()
        .filter_map(|entry| {
            let key = entry.object().nid().short_name().ok()?;
            let value = entry.data().as_utf8().ok()?;
            Some(format!("{key}={value}"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn asn1_time_string(time: &Asn1TimeRef) -> String {
    time.to_string()
}
