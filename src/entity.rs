//! The fiscalization entity: one taxpayer at one business location.
//!
//! A [`FiskalEntity`] ties together the taxpayer's OIB, the business
//! location settings, the signing credentials and the CIS trust anchors.
//! Construction cross-checks everything up front, most importantly that the
//! supplied OIB matches the one in the certificate, so the service's
//! signature checks cannot fail later for a reason that was knowable here.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::cert::IdentityBundle;
use crate::comm::{self, CisError};
use crate::config::Environment;
use crate::invoice::{InvoiceBuilder, PaymentMethod};
use crate::schema;
use crate::trust::TrustStore;
use crate::validate::{is_valid_location_id, validate_oib};
use crate::zki::{self, ZkiError};
use crate::Error;

/// Errors raised while constructing a [`FiskalEntity`].
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("invalid OIB '{0}'")]
    InvalidOib(String),
    #[error("invalid business location id '{0}', expected a non-empty alphanumeric value")]
    InvalidLocationId(String),
    #[error("OIB '{supplied}' does not match the certificate's OIB '{certificate}'")]
    OibMismatch {
        supplied: String,
        certificate: String,
    },
    #[error("certificate expired; pass allow_expired_certificate to load it anyway")]
    CertificateExpired,
}

/// Settings for a [`FiskalEntity`], everything but the credentials.
#[derive(Debug, Clone)]
pub struct EntityOptions {
    /// The taxpayer's OIB; must match the certificate.
    pub oib: String,
    /// Whether the taxpayer is in the VAT system.
    pub in_vat_system: bool,
    /// Business location id as registered with ePorezna (case sensitive).
    pub location_id: String,
    /// Whether invoice numbers are sequenced per location (`P`) rather than
    /// per register device (`N`).
    pub centralized_invoice_numbers: bool,
    pub environment: Environment,
    /// Permit an expired certificate, e.g. to recompute historical ZKIs.
    /// New invoices must never be signed with one.
    pub allow_expired_certificate: bool,
}

/// A configured taxpayer, ready to fingerprint and submit invoices.
#[derive(Debug)]
pub struct FiskalEntity {
    oib: String,
    in_vat_system: bool,
    location_id: String,
    centralized_invoice_numbers: bool,
    environment: Environment,
    bundle: IdentityBundle,
    trust: TrustStore,
}

impl FiskalEntity {
    /// Validates `options` against the decoded credentials and builds the
    /// entity. The trust store decides which CIS roots are pinned for
    /// transport; it is injected rather than loaded here so callers control
    /// where anchors come from.
    pub fn new(
        options: EntityOptions,
        bundle: IdentityBundle,
        trust: TrustStore,
    ) -> Result<Self, EntityError> {
        if !validate_oib(&options.oib) {
            return Err(EntityError::InvalidOib(options.oib));
        }
        if !is_valid_location_id(&options.location_id) {
            return Err(EntityError::InvalidLocationId(options.location_id));
        }
        if bundle.oib() != options.oib {
            return Err(EntityError::OibMismatch {
                supplied: options.oib,
                certificate: bundle.oib().to_string(),
            });
        }
        if bundle.expired() && !options.allow_expired_certificate {
            return Err(EntityError::CertificateExpired);
        }

        Ok(FiskalEntity {
            oib: options.oib,
            in_vat_system: options.in_vat_system,
            location_id: options.location_id,
            centralized_invoice_numbers: options.centralized_invoice_numbers,
            environment: options.environment,
            bundle,
            trust,
        })
    }

    pub fn oib(&self) -> &str {
        &self.oib
    }

    pub fn in_vat_system(&self) -> bool {
        self.in_vat_system
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub fn centralized_invoice_numbers(&self) -> bool {
        self.centralized_invoice_numbers
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn endpoint_url(&self) -> &'static str {
        self.environment.endpoint_url()
    }

    pub fn bundle(&self) -> &IdentityBundle {
        &self.bundle
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    /// Key/value pairs describing the loaded certificate, for display.
    pub fn certificate_info(&self) -> Vec<(String, String)> {
        self.bundle.display_info()
    }

    /// Computes the ZKI for the given invoice header fields with this
    /// entity's key, OIB and location.
    pub fn generate_zki(
        &self,
        issued_at: NaiveDateTime,
        invoice_number: u32,
        register_id: u32,
        total_amount: &str,
    ) -> Result<String, ZkiError> {
        zki::protection_code(
            self.bundle.signing_key(),
            &self.oib,
            issued_at,
            invoice_number,
            &self.location_id,
            register_id,
            total_amount,
        )
    }

    /// Starts building an invoice issued by this entity.
    #[allow(clippy::too_many_arguments)]
    pub fn invoice(
        &self,
        issued_at: NaiveDateTime,
        invoice_number: u32,
        register_id: u32,
        total_amount: impl Into<String>,
        payment_method: PaymentMethod,
        operator_oib: impl Into<String>,
    ) -> InvoiceBuilder<'_> {
        InvoiceBuilder::new(
            self,
            issued_at,
            invoice_number,
            register_id,
            total_amount,
            payment_method,
            operator_oib,
        )
    }

    /// Sends an `EchoRequest` and returns the text the service echoes back.
    pub fn echo(&self, text: &str) -> Result<String, Error> {
        let payload = schema::echo_request(text);
        let (body, status) = comm::post_to_cis(self.endpoint_url(), &self.trust, payload.as_bytes())
            .map_err(Error::from)?;
        if status != 200 {
            return Err(CisError::UnexpectedStatus(status).into());
        }
        let response = body
            .find("EchoResponse")
            .ok_or(CisError::MalformedResponse(
                "EchoResponse missing".to_string(),
            ))?;
        Ok(response.text())
    }

    /// Round-trips a fixed message through the echo endpoint to confirm the
    /// service is reachable and well-behaved.
    pub fn ping(&self) -> Result<(), Error> {
        const PING_TEXT: &str = "ping";
        let response = self.echo(PING_TEXT)?;
        if response != PING_TEXT {
            return Err(CisError::MalformedResponse(
                "echo response does not match the request".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
