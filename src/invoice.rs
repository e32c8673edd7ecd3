//! Invoice construction, fingerprinting and submission.
//!
//! An [`Invoice`] is created through [`crate::FiskalEntity::invoice`], which
//! validates every field and computes the ZKI protection code up front
//! ("fingerprinted"). [`Invoice::send`] then signs the request and submits
//! it, moving the invoice to accepted, rejected or submission-failed. The
//! ZKI printed on the customer's receipt is never recomputed behind the
//! caller's back: late delivery explicitly re-installs the original code,
//! validated against the key that minted it.

pub mod qr;

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::cert::IdentityBundle;
use crate::comm::{self, CisError};
use crate::entity::FiskalEntity;
use crate::schema::{
    FeeSummary, InvoiceBody, InvoiceNumber, InvoiceRequest, InvoiceResponse, MessageHeader,
    NamedTaxSummary, TaxSummary, CIS_NAMESPACE,
};
use crate::validate::{is_valid_currency_format, is_valid_jir, is_valid_tax_rate, validate_oib};
use crate::xmldsig;
use crate::zki::{self, ZkiError};
use crate::Error;

/// Timestamp layout of the invoice's `DatVrijeme` field. Unlike the ZKI
/// input, the wire format separates date and time with a literal `T`.
const INVOICE_TIME_FORMAT: &str = "%d.%m.%YT%H:%M:%S";

/// Errors raised while building or submitting an invoice.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("the {field} must be a valid currency format, got '{value}'")]
    InvalidAmount {
        field: &'static str,
        value: String,
    },
    #[error("invalid tax rate '{0}', expected a number with exactly 2 decimals")]
    InvalidTaxRate(String),
    #[error("payment method must be G (cash), K (card), O (mix/other), T (bank transfer) or C (check, deprecated), got '{0}'")]
    InvalidPaymentMethod(String),
    #[error("invalid operator OIB '{0}'")]
    InvalidOperatorOib(String),
    #[error("invoice special purpose field must be empty when submitting")]
    SpecialPurposeSet,
    #[error("error serializing invoice request: {0}")]
    Serialize(#[from] quick_xml::SeError),
}

/// Means of payment, carried on the wire as a single letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Mixed or other means of payment.
    Other,
    /// Usually not fiscalized, accepted for completeness.
    BankTransfer,
    /// Deprecated by the tax authority but still valid on the wire.
    Check,
}

impl PaymentMethod {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "G",
            PaymentMethod::Card => "K",
            PaymentMethod::Other => "O",
            PaymentMethod::BankTransfer => "T",
            PaymentMethod::Check => "C",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "G" => Ok(PaymentMethod::Cash),
            "K" => Ok(PaymentMethod::Card),
            "O" => Ok(PaymentMethod::Other),
            "T" => Ok(PaymentMethod::BankTransfer),
            "C" => Ok(PaymentMethod::Check),
            other => Err(InvoiceError::InvalidPaymentMethod(other.to_string())),
        }
    }
}

/// A VAT or consumption tax line: rate, base and amount.
#[derive(Debug, Clone, Serialize)]
pub struct TaxLine {
    #[serde(rename = "tns:Stopa")]
    rate: String,
    #[serde(rename = "tns:Osnovica")]
    base: String,
    #[serde(rename = "tns:Iznos")]
    amount: String,
}

impl TaxLine {
    pub fn new(
        rate: impl Into<String>,
        base: impl Into<String>,
        amount: impl Into<String>,
    ) -> Result<Self, InvoiceError> {
        let rate = rate.into();
        let base = base.into();
        let amount = amount.into();
        if !is_valid_tax_rate(&rate) {
            return Err(InvoiceError::InvalidTaxRate(rate));
        }
        check_amount("tax base", &base)?;
        check_amount("tax amount", &amount)?;
        Ok(TaxLine { rate, base, amount })
    }

    pub fn rate(&self) -> &str {
        &self.rate
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }
}

/// An "other taxes" line, which additionally carries a name.
#[derive(Debug, Clone, Serialize)]
pub struct NamedTaxLine {
    #[serde(rename = "tns:Naziv")]
    name: String,
    #[serde(rename = "tns:Stopa")]
    rate: String,
    #[serde(rename = "tns:Osnovica")]
    base: String,
    #[serde(rename = "tns:Iznos")]
    amount: String,
}

impl NamedTaxLine {
    pub fn new(
        name: impl Into<String>,
        rate: impl Into<String>,
        base: impl Into<String>,
        amount: impl Into<String>,
    ) -> Result<Self, InvoiceError> {
        let rate = rate.into();
        let base = base.into();
        let amount = amount.into();
        if !is_valid_tax_rate(&rate) {
            return Err(InvoiceError::InvalidTaxRate(rate));
        }
        check_amount("tax base", &base)?;
        check_amount("tax amount", &amount)?;
        Ok(NamedTaxLine {
            name: name.into(),
            rate,
            base,
            amount,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A fee line (`Naknada`): name and amount.
#[derive(Debug, Clone, Serialize)]
pub struct Fee {
    #[serde(rename = "tns:NazivN")]
    name: String,
    #[serde(rename = "tns:IznosN")]
    amount: String,
}

impl Fee {
    pub fn new(name: impl Into<String>, amount: impl Into<String>) -> Result<Self, InvoiceError> {
        let amount = amount.into();
        check_amount("fee amount", &amount)?;
        Ok(Fee {
            name: name.into(),
            amount,
        })
    }
}

fn check_amount(field: &'static str, value: &str) -> Result<(), InvoiceError> {
    if is_valid_currency_format(value) {
        Ok(())
    } else {
        Err(InvoiceError::InvalidAmount {
            field,
            value: value.to_string(),
        })
    }
}

/// Where an invoice stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    /// Built and fingerprinted with a ZKI, not yet submitted.
    Fingerprinted,
    /// The service assigned a JIR.
    Accepted,
    /// The service rejected the invoice with structured faults.
    Rejected,
    /// Submission failed before a definitive answer was obtained.
    SubmissionFailed,
}

/// Builder for an [`Invoice`]. Required fields are taken by
/// [`FiskalEntity::invoice`]; everything else is optional.
pub struct InvoiceBuilder<'e> {
    entity: &'e FiskalEntity,
    issued_at: NaiveDateTime,
    invoice_number: u32,
    register_id: u32,
    total_amount: String,
    payment_method: PaymentMethod,
    operator_oib: String,
    vat: Option<Vec<TaxLine>>,
    consumption_tax: Option<Vec<TaxLine>>,
    other_taxes: Option<Vec<NamedTaxLine>>,
    vat_exempt_amount: Option<String>,
    margin_amount: Option<String>,
    untaxable_amount: Option<String>,
    fees: Option<Vec<Fee>>,
    paragon_number: Option<String>,
}

impl<'e> InvoiceBuilder<'e> {
    pub(crate) fn new(
        entity: &'e FiskalEntity,
        issued_at: NaiveDateTime,
        invoice_number: u32,
        register_id: u32,
        total_amount: impl Into<String>,
        payment_method: PaymentMethod,
        operator_oib: impl Into<String>,
    ) -> Self {
        InvoiceBuilder {
            entity,
            issued_at,
            invoice_number,
            register_id,
            total_amount: total_amount.into(),
            payment_method,
            operator_oib: operator_oib.into(),
            vat: None,
            consumption_tax: None,
            other_taxes: None,
            vat_exempt_amount: None,
            margin_amount: None,
            untaxable_amount: None,
            fees: None,
            paragon_number: None,
        }
    }

    pub fn vat(mut self, lines: Vec<TaxLine>) -> Self {
        self.vat = Some(lines);
        self
    }

    pub fn consumption_tax(mut self, lines: Vec<TaxLine>) -> Self {
        self.consumption_tax = Some(lines);
        self
    }

    pub fn other_taxes(mut self, lines: Vec<NamedTaxLine>) -> Self {
        self.other_taxes = Some(lines);
        self
    }

    pub fn vat_exempt_amount(mut self, amount: impl Into<String>) -> Self {
        self.vat_exempt_amount = Some(amount.into());
        self
    }

    pub fn margin_amount(mut self, amount: impl Into<String>) -> Self {
        self.margin_amount = Some(amount.into());
        self
    }

    pub fn untaxable_amount(mut self, amount: impl Into<String>) -> Self {
        self.untaxable_amount = Some(amount.into());
        self
    }

    pub fn fees(mut self, fees: Vec<Fee>) -> Self {
        self.fees = Some(fees);
        self
    }

    /// Paragon (manually issued backup receipt) number.
    pub fn paragon_number(mut self, number: impl Into<String>) -> Self {
        self.paragon_number = Some(number.into());
        self
    }

    /// Validates the invoice and computes its ZKI.
    pub fn finalize(self) -> Result<Invoice<'e>, Error> {
        check_amount("total amount", &self.total_amount).map_err(Error::from)?;
        if !validate_oib(&self.operator_oib) {
            return Err(InvoiceError::InvalidOperatorOib(self.operator_oib).into());
        }

        // An optional amount of exactly zero is treated as not present.
        let normalize = |field: &'static str,
                         amount: Option<String>|
         -> Result<Option<String>, InvoiceError> {
            match amount {
                None => Ok(None),
                Some(value) => {
                    check_amount(field, &value)?;
                    Ok(if value == "0.00" { None } else { Some(value) })
                }
            }
        };
        let vat_exempt_amount = normalize("VAT exempt amount", self.vat_exempt_amount)?;
        let margin_amount = normalize("margin amount", self.margin_amount)?;
        let untaxable_amount = normalize("untaxable amount", self.untaxable_amount)?;

        let protection_code = self.entity.generate_zki(
            self.issued_at,
            self.invoice_number,
            self.register_id,
            &self.total_amount,
        )?;

        let sequence_mark = if self.entity.centralized_invoice_numbers() {
            "P"
        } else {
            "N"
        };

        Ok(Invoice {
            entity: self.entity,
            issued_at: self.issued_at,
            sequence_mark,
            invoice_number: self.invoice_number,
            register_id: self.register_id,
            vat: self.vat,
            consumption_tax: self.consumption_tax,
            other_taxes: self.other_taxes,
            vat_exempt_amount,
            margin_amount,
            untaxable_amount,
            fees: self.fees,
            total_amount: self.total_amount,
            payment_method: self.payment_method,
            operator_oib: self.operator_oib,
            protection_code,
            late_delivery: false,
            old_key_validated: false,
            paragon_number: self.paragon_number,
            special_purpose: None,
            status: InvoiceStatus::Fingerprinted,
            jir: None,
        })
    }
}

/// A fingerprinted invoice, bound to the entity that issued it.
#[derive(Debug)]
pub struct Invoice<'e> {
    entity: &'e FiskalEntity,
    issued_at: NaiveDateTime,
    sequence_mark: &'static str,
    invoice_number: u32,
    register_id: u32,
    vat: Option<Vec<TaxLine>>,
    consumption_tax: Option<Vec<TaxLine>>,
    other_taxes: Option<Vec<NamedTaxLine>>,
    vat_exempt_amount: Option<String>,
    margin_amount: Option<String>,
    untaxable_amount: Option<String>,
    fees: Option<Vec<Fee>>,
    total_amount: String,
    payment_method: PaymentMethod,
    operator_oib: String,
    protection_code: String,
    late_delivery: bool,
    old_key_validated: bool,
    paragon_number: Option<String>,
    special_purpose: Option<String>,
    status: InvoiceStatus,
    jir: Option<String>,
}

impl<'e> Invoice<'e> {
    /// The ZKI protection code printed on the receipt.
    pub fn protection_code(&self) -> &str {
        &self.protection_code
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    /// The assigned JIR, once accepted.
    pub fn jir(&self) -> Option<&str> {
        self.jir.as_deref()
    }

    pub fn issued_at(&self) -> NaiveDateTime {
        self.issued_at
    }

    pub fn invoice_number(&self) -> u32 {
        self.invoice_number
    }

    pub fn total_amount(&self) -> &str {
        &self.total_amount
    }

    pub fn late_delivery(&self) -> bool {
        self.late_delivery
    }

    /// Marks the invoice as delivered late and re-installs the ZKI it was
    /// originally issued with. The code is validated against the entity's
    /// current signing key before anything is changed; if the original key
    /// has since been replaced use
    /// [`Invoice::set_late_delivery_with_old_key`].
    pub fn set_late_delivery(&mut self, original_code: &str) -> Result<(), Error> {
        self.check_code_against(self.entity.bundle(), original_code)?;
        self.protection_code = original_code.to_string();
        self.late_delivery = true;
        self.old_key_validated = false;
        Ok(())
    }

    /// Late delivery for the expired-certificate edge case: the ZKI was
    /// minted with a key that has since been replaced, so it is validated
    /// against the old bundle instead. The old bundle is only used for this
    /// check; signing and submission still use the entity's current
    /// credentials, and the original code goes out unchanged.
    pub fn set_late_delivery_with_old_key(
        &mut self,
        original_code: &str,
        old_bundle: &IdentityBundle,
    ) -> Result<(), Error> {
        self.check_code_against(old_bundle, original_code)?;
        self.protection_code = original_code.to_string();
        self.late_delivery = true;
        self.old_key_validated = true;
        Ok(())
    }

    fn check_code_against(
        &self,
        bundle: &IdentityBundle,
        code: &str,
    ) -> Result<(), Error> {
        let computed = zki::protection_code(
            bundle.signing_key(),
            self.entity.oib(),
            self.issued_at,
            self.invoice_number,
            self.entity.location_id(),
            self.register_id,
            &self.total_amount,
        )?;
        if computed != code {
            return Err(ZkiError::Mismatch.into());
        }
        Ok(())
    }

    fn to_body(&self) -> InvoiceBody {
        InvoiceBody {
            oib: self.entity.oib().to_string(),
            in_vat_system: self.entity.in_vat_system(),
            issued_at: self.issued_at.format(INVOICE_TIME_FORMAT).to_string(),
            sequence_mark: self.sequence_mark.to_string(),
            invoice_number: InvoiceNumber {
                number: self.invoice_number,
                location_id: self.entity.location_id().to_string(),
                register_id: self.register_id,
            },
            vat: self.vat.clone().map(|taxes| TaxSummary { taxes }),
            consumption_tax: self
                .consumption_tax
                .clone()
                .map(|taxes| TaxSummary { taxes }),
            other_taxes: self.other_taxes.clone().map(|taxes| NamedTaxSummary { taxes }),
            vat_exempt_amount: self.vat_exempt_amount.clone(),
            margin_amount: self.margin_amount.clone(),
            untaxable_amount: self.untaxable_amount.clone(),
            fees: self.fees.clone().map(|fees| FeeSummary { fees }),
            total_amount: self.total_amount.clone(),
            payment_method: self.payment_method.code().to_string(),
            operator_oib: self.operator_oib.clone(),
            protection_code: self.protection_code.clone(),
            late_delivery: self.late_delivery,
            paragon_number: self.paragon_number.clone(),
            special_purpose: self.special_purpose.clone(),
        }
    }

    /// Submits the invoice after validating its ZKI against `old_bundle`
    /// instead of the entity's current key. Signing and transport still use
    /// the current credentials. See
    /// [`Invoice::set_late_delivery_with_old_key`] for when this applies.
    pub fn send_with_validation_key(
        &mut self,
        old_bundle: &IdentityBundle,
    ) -> Result<String, Error> {
        self.check_code_against(old_bundle, &self.protection_code)?;
        self.old_key_validated = true;
        self.send()
    }

    /// Submits the invoice and returns the assigned JIR.
    ///
    /// The ZKI is revalidated against the entity's signing key before
    /// anything leaves the machine (unless it was already validated against
    /// an explicitly supplied old key); a mismatch is a hard error and the
    /// invoice stays fingerprinted. Transport and protocol failures move
    /// the invoice to [`InvoiceStatus::SubmissionFailed`], a structured
    /// rejection to [`InvoiceStatus::Rejected`].
    pub fn send(&mut self) -> Result<String, Error> {
        if self
            .special_purpose
            .as_deref()
            .is_some_and(|s| !s.is_empty())
        {
            return Err(InvoiceError::SpecialPurposeSet.into());
        }
        if !self.old_key_validated {
            self.check_code_against(self.entity.bundle(), &self.protection_code)?;
        }

        let request = InvoiceRequest {
            xmlns: CIS_NAMESPACE,
            id: xmldsig::generate_unique_id(),
            header: MessageHeader::new(),
            invoice: self.to_body(),
        };
        let message_id = request.header.message_id.clone();

        let xml = quick_xml::se::to_string(&request).map_err(InvoiceError::Serialize)?;
        let signed = xmldsig::sign_enveloped(xml.as_bytes(), self.entity.bundle())?;

        tracing::debug!(
            invoice_number = self.invoice_number,
            message_id = %message_id,
            "submitting invoice"
        );

        let (body, status) =
            match comm::post_to_cis(self.entity.endpoint_url(), self.entity.trust_store(), &signed)
            {
                Ok(result) => result,
                Err(err) => {
                    self.status = InvoiceStatus::SubmissionFailed;
                    return Err(err.into());
                }
            };

        xmldsig::verify_response(&body)?;

        let response = match InvoiceResponse::from_element(&body) {
            Ok(response) => response,
            Err(err) => {
                self.status = InvoiceStatus::SubmissionFailed;
                return Err(CisError::MalformedResponse(err.to_string()).into());
            }
        };

        if response.message_id != message_id {
            self.status = InvoiceStatus::SubmissionFailed;
            return Err(CisError::MessageIdMismatch.into());
        }

        let (status_after, outcome) = interpret_response(status, response);
        self.status = status_after;
        match outcome {
            Ok(jir) => {
                self.jir = Some(jir.clone());
                tracing::info!(
                    invoice_number = self.invoice_number,
                    jir = %jir,
                    "invoice accepted"
                );
                Ok(jir)
            }
            Err(err) => {
                if let CisError::Rejected(ref faults) = err {
                    tracing::warn!(
                        invoice_number = self.invoice_number,
                        faults = faults.len(),
                        "invoice rejected by CIS"
                    );
                }
                Err(err.into())
            }
        }
    }
}

/// Maps a parsed response and its HTTP status to the invoice outcome.
///
/// A structured fault list is definitive whatever the status: the service
/// sometimes reports errors on a 200 response, and a rejection must never be
/// misread as a retryable failure. Without faults, a non-200 status is a
/// protocol failure; a 200 must carry a well-formed JIR.
fn interpret_response(
    status: u16,
    response: InvoiceResponse,
) -> (InvoiceStatus, Result<String, CisError>) {
    if !response.faults.is_empty() {
        return (
            InvoiceStatus::Rejected,
            Err(CisError::Rejected(response.faults)),
        );
    }
    if status != 200 {
        return (
            InvoiceStatus::SubmissionFailed,
            Err(CisError::UnexpectedStatus(status)),
        );
    }
    match response.jir {
        Some(jir) if is_valid_jir(&jir) => (InvoiceStatus::Accepted, Ok(jir)),
        _ => (InvoiceStatus::SubmissionFailed, Err(CisError::InvalidJir)),
    }
}
