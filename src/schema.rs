//! Wire types for the fiscalization service.
//!
//! Requests are serialized with serde into the `tns`-prefixed element names
//! the service schema dictates, field order matching the XSD sequence.
//! Responses come back with arbitrary namespace prefixes, so they are read
//! through the element tree by local name instead of deserialized.

use serde::Serialize;

use crate::invoice::{Fee, NamedTaxLine, TaxLine};
use crate::xmldsig::{Element, XmlError};

/// Namespace of the fiscalization schema, declared as `tns` on requests.
pub const CIS_NAMESPACE: &str = "http://www.apis-it.hr/fin/2012/types/f73";

/// Timestamp layout of the message header's `DatumVrijeme`.
const HEADER_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// `RacunZahtjev`, the top level invoice submission request.
#[derive(Debug, Serialize)]
#[serde(rename = "tns:RacunZahtjev")]
pub struct InvoiceRequest {
    #[serde(rename = "@xmlns:tns")]
    pub xmlns: &'static str,
    #[serde(rename = "@Id")]
    pub id: String,
    #[serde(rename = "tns:Zaglavlje")]
    pub header: MessageHeader,
    #[serde(rename = "tns:Racun")]
    pub invoice: InvoiceBody,
}

/// `Zaglavlje`: a unique message id plus the time of sending. The service
/// echoes the id back in its response header.
#[derive(Debug, Clone, Serialize)]
pub struct MessageHeader {
    #[serde(rename = "tns:IdPoruke")]
    pub message_id: String,
    #[serde(rename = "tns:DatumVrijeme")]
    pub sent_at: String,
}

impl MessageHeader {
    pub fn new() -> Self {
        MessageHeader {
            message_id: uuid::Uuid::new_v4().to_string(),
            sent_at: chrono::Local::now().format(HEADER_TIME_FORMAT).to_string(),
        }
    }
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// `Racun`: the invoice element. Field order follows the schema sequence.
#[derive(Debug, Serialize)]
pub struct InvoiceBody {
    #[serde(rename = "tns:Oib")]
    pub oib: String,
    #[serde(rename = "tns:USustPdv")]
    pub in_vat_system: bool,
    #[serde(rename = "tns:DatVrijeme")]
    pub issued_at: String,
    #[serde(rename = "tns:OznSlijed")]
    pub sequence_mark: String,
    #[serde(rename = "tns:BrRac")]
    pub invoice_number: InvoiceNumber,
    #[serde(rename = "tns:Pdv", skip_serializing_if = "Option::is_none")]
    pub vat: Option<TaxSummary>,
    #[serde(rename = "tns:Pnp", skip_serializing_if = "Option::is_none")]
    pub consumption_tax: Option<TaxSummary>,
    #[serde(rename = "tns:OstaliPor", skip_serializing_if = "Option::is_none")]
    pub other_taxes: Option<NamedTaxSummary>,
    #[serde(rename = "tns:IznosOslobPdv", skip_serializing_if = "Option::is_none")]
    pub vat_exempt_amount: Option<String>,
    #[serde(rename = "tns:IznosMarza", skip_serializing_if = "Option::is_none")]
    pub margin_amount: Option<String>,
    #[serde(rename = "tns:IznosNePodlOpor", skip_serializing_if = "Option::is_none")]
    pub untaxable_amount: Option<String>,
    #[serde(rename = "tns:Naknade", skip_serializing_if = "Option::is_none")]
    pub fees: Option<FeeSummary>,
    #[serde(rename = "tns:IznosUkupno")]
    pub total_amount: String,
    #[serde(rename = "tns:NacinPlac")]
    pub payment_method: String,
    #[serde(rename = "tns:OibOper")]
    pub operator_oib: String,
    #[serde(rename = "tns:ZastKod")]
    pub protection_code: String,
    #[serde(rename = "tns:NakDost")]
    pub late_delivery: bool,
    #[serde(rename = "tns:ParagonBrRac", skip_serializing_if = "Option::is_none")]
    pub paragon_number: Option<String>,
    #[serde(rename = "tns:SpecNamj", skip_serializing_if = "Option::is_none")]
    pub special_purpose: Option<String>,
}

/// `BrRac`: invoice number, business location and cash register.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceNumber {
    #[serde(rename = "tns:BrOznRac")]
    pub number: u32,
    #[serde(rename = "tns:OznPosPr")]
    pub location_id: String,
    #[serde(rename = "tns:OznNapUr")]
    pub register_id: u32,
}

/// `Pdv` / `Pnp`: a list of rated tax lines.
#[derive(Debug, Serialize)]
pub struct TaxSummary {
    #[serde(rename = "tns:Porez")]
    pub taxes: Vec<TaxLine>,
}

/// `OstaliPor`: a list of named tax lines.
#[derive(Debug, Serialize)]
pub struct NamedTaxSummary {
    #[serde(rename = "tns:Porez")]
    pub taxes: Vec<NamedTaxLine>,
}

/// `Naknade`: a list of fees.
#[derive(Debug, Serialize)]
pub struct FeeSummary {
    #[serde(rename = "tns:Naknada")]
    pub fees: Vec<Fee>,
}

/// An `EchoRequest` document with the given text content.
pub fn echo_request(text: &str) -> String {
    format!(
        r#"<tns:EchoRequest xmlns:tns="{CIS_NAMESPACE}">{}</tns:EchoRequest>"#,
        quick_xml::escape::escape(text)
    )
}

/// One `Greska` entry from a rejection response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CisFault {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for CisFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Parsed `RacunOdgovor`.
#[derive(Debug)]
pub struct InvoiceResponse {
    /// The request's message id, echoed back by the service.
    pub message_id: String,
    /// The assigned JIR on success.
    pub jir: Option<String>,
    /// Rejection details, empty on success.
    pub faults: Vec<CisFault>,
}

impl InvoiceResponse {
    /// Reads a response out of a parsed document, matching elements by
    /// local name regardless of prefix.
    pub fn from_element(el: &Element) -> Result<Self, XmlError> {
        let response = el
            .find("RacunOdgovor")
            .ok_or(XmlError::MissingElement("RacunOdgovor"))?;
        let message_id = response
            .child("Zaglavlje")
            .and_then(|z| z.child("IdPoruke"))
            .map(|id| id.text())
            .ok_or(XmlError::MissingElement("IdPoruke"))?;
        let jir = response.child("Jir").map(|j| j.text()).filter(|j| !j.is_empty());
        let faults = response
            .child("Greske")
            .map(|greske| {
                greske
                    .child_elements()
                    .filter(|g| g.local_name() == "Greska")
                    .map(|g| CisFault {
                        code: g.child("SifraGreske").map(|c| c.text()).unwrap_or_default(),
                        message: g
                            .child("PorukaGreske")
                            .map(|m| m.text())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(InvoiceResponse {
            message_id,
            jir,
            faults,
        })
    }
}
