//! HTTPS transport to the CIS service.
//!
//! Requests are wrapped in a SOAP 1.1 envelope and posted over TLS 1.3.
//! Only the roots selected by the [`TrustStore`] are trusted, never the
//! system store, because the service endpoints chain to the tax authority's
//! own CAs.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::config::CIS_TIMEOUT;
use crate::schema::{CisFault, CIS_NAMESPACE};
use crate::trust::TrustStore;
use crate::xmldsig::{self, Element};

const SOAP_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Errors raised while talking to the CIS service.
#[derive(Debug, Error)]
pub enum CisError {
    #[error("request to CIS failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to pin CIS trust roots: {0}")]
    TlsConfig(String),
    #[error("malformed CIS response: {0}")]
    MalformedResponse(String),
    #[error("response message id does not match the request")]
    MessageIdMismatch,
    #[error("request rejected by CIS: {}", format_faults(.0))]
    Rejected(Vec<CisFault>),
    #[error("CIS returned status {0} without structured errors")]
    UnexpectedStatus(u16),
    #[error("CIS response carries a missing or malformed JIR")]
    InvalidJir,
}

fn format_faults(faults: &[CisFault]) -> String {
    faults
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn soap_envelope(payload: &[u8]) -> Vec<u8> {
    let mut envelope = Vec::with_capacity(payload.len() + 256);
    envelope.extend_from_slice(
        format!(
            r#"<soapenv:Envelope xmlns:tns="{CIS_NAMESPACE}" xmlns:soapenv="{SOAP_NAMESPACE}"><soapenv:Body>"#
        )
        .as_bytes(),
    );
    envelope.extend_from_slice(payload);
    envelope.extend_from_slice(b"</soapenv:Body></soapenv:Envelope>");
    envelope
}

fn pinned_client(trust: &TrustStore) -> Result<Client, CisError> {
    let mut builder = Client::builder()
        .timeout(CIS_TIMEOUT)
        .min_tls_version(reqwest::tls::Version::TLS_1_3)
        .tls_built_in_root_certs(false);
    for root in trust.roots() {
        let der = root
            .to_der()
            .map_err(|e| CisError::TlsConfig(e.to_string()))?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_der(&der)?);
    }
    Ok(builder.build()?)
}

/// Posts `payload` (already signed where required) to `url` wrapped in a
/// SOAP envelope. Returns the first element inside the response's SOAP
/// `Body` along with the HTTP status; the caller decides what a non-200
/// status means once it has looked at the content.
pub(crate) fn post_to_cis(
    url: &str,
    trust: &TrustStore,
    payload: &[u8],
) -> Result<(Element, u16), CisError> {
    let client = pinned_client(trust)?;
    let envelope = soap_envelope(payload);

    tracing::debug!(url, bytes = envelope.len(), "posting request to CIS");

    let response = client
        .post(url)
        .header(CONTENT_TYPE, "text/xml")
        .body(envelope)
        .send()?;
    let status = response.status().as_u16();
    let body = response.bytes()?;

    let doc = xmldsig::parse(&body).map_err(|e| CisError::MalformedResponse(e.to_string()))?;
    let content = doc
        .find("Body")
        .and_then(|body| body.child_elements().next())
        .cloned()
        .ok_or_else(|| CisError::MalformedResponse("SOAP Body missing or empty".to_string()))?;

    if status != 200 {
        tracing::warn!(url, status, "CIS returned a non-success status");
    }

    Ok((content, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wraps_payload() {
        let envelope = soap_envelope(b"<tns:EchoRequest>hi</tns:EchoRequest>");
        let text = String::from_utf8(envelope).expect("utf8");
        assert_eq!(
            text,
            "<soapenv:Envelope xmlns:tns=\"http://www.apis-it.hr/fin/2012/types/f73\" xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\"><soapenv:Body><tns:EchoRequest>hi</tns:EchoRequest></soapenv:Body></soapenv:Envelope>"
        );
    }

    #[test]
    fn fault_formatting() {
        let err = CisError::Rejected(vec![
            CisFault {
                code: "s004".to_string(),
                message: "Neispravan digitalni potpis.".to_string(),
            },
            CisFault {
                code: "s005".to_string(),
                message: "OIB iz poruke nije jednak OIB-u iz certifikata.".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "request rejected by CIS: s004: Neispravan digitalni potpis.; s005: OIB iz poruke nije jednak OIB-u iz certifikata."
        );
    }
}
