//! Client library for the Croatian fiscalization system (CIS).
//!
//! The crate covers the full invoice fiscalization flow:
//!
//! - offline generation of the issuer protection code (ZKI) that must be
//!   printed on every receipt ([`zki`]),
//! - exclusive XML canonicalization and RSA-SHA1 enveloped XML-DSig signing
//!   of requests ([`xmldsig`]),
//! - PKCS#12 client certificate handling with OIB extraction and expiry
//!   tracking ([`cert`]),
//! - selection and pinning of the tax authority's trust anchors ([`trust`]),
//! - SOAP submission over TLS 1.3 ([`comm`]) and the invoice lifecycle from
//!   fingerprinted to accepted, including the late-delivery edge case where
//!   the original ZKI was minted with a now-replaced certificate
//!   ([`invoice`]).
//!
//! # Example
//!
//! ```no_run
//! use chrono::Local;
//! use fiskal_core::invoice::{PaymentMethod, TaxLine};
//! use fiskal_core::{Environment, EntityOptions, FiskalEntity, IdentityBundle, TrustStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bundle = IdentityBundle::from_pkcs12_file("fiskal1.p12", "password")?;
//! let trust = TrustStore::from_dir("anchors", "democis")?;
//! let entity = FiskalEntity::new(
//!     EntityOptions {
//!         oib: "12345678903".to_string(),
//!         in_vat_system: true,
//!         location_id: "POSL1".to_string(),
//!         centralized_invoice_numbers: false,
//!         environment: Environment::Demo,
//!         allow_expired_certificate: false,
//!     },
//!     bundle,
//!     trust,
//! )?;
//!
//! let mut invoice = entity
//!     .invoice(
//!         Local::now().naive_local(),
//!         1,
//!         1,
//!         "100.00",
//!         PaymentMethod::Cash,
//!         "12345678903",
//!     )
//!     .vat(vec![TaxLine::new("25.00", "80.00", "20.00")?])
//!     .finalize()?;
//!
//! println!("ZKI: {}", invoice.protection_code());
//! let jir = invoice.send()?;
//! println!("JIR: {jir}");
//! # Ok(())
//! # }
//! ```

pub mod cert;
pub mod comm;
pub mod config;
pub mod entity;
pub mod invoice;
pub mod schema;
pub mod trust;
pub mod validate;
pub mod xmldsig;
pub mod zki;

pub use cert::IdentityBundle;
pub use config::Environment;
pub use entity::{EntityOptions, FiskalEntity};
pub use trust::TrustStore;

use thiserror::Error as ThisError;

/// Crate-wide error, wrapping each module's error type.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Entity(#[from] entity::EntityError),
    #[error(transparent)]
    Cert(#[from] cert::CertError),
    #[error(transparent)]
    Trust(#[from] trust::TrustError),
    #[error(transparent)]
    Invoice(#[from] invoice::InvoiceError),
    #[error(transparent)]
    Zki(#[from] zki::ZkiError),
    #[error(transparent)]
    Xml(#[from] xmldsig::XmlError),
    #[error(transparent)]
    Signing(#[from] xmldsig::SigningError),
    #[error(transparent)]
    Qr(#[from] invoice::qr::QrCodeError),
    #[error(transparent)]
    Cis(#[from] comm::CisError),
}
