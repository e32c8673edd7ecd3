//! Enveloped XML-DSig signing of CIS requests.
//!
//! The service expects an RSA-SHA1 enveloped signature over the exclusive
//! canonical form of the request, referenced through the root element's `Id`
//! attribute. Signing is a two stage hash-sign-hash: the canonicalized
//! document is digested into the `Reference`, the `SignedInfo` built around
//! that digest is canonicalized and digested itself, and that second digest
//! is what the RSA key signs.

use base64ct::{Base64, Encoding};
use rsa::Pkcs1v15Sign;
use sha1::{Digest, Sha1};
use thiserror::Error;

use super::c14n::{Canonicalizer, EXC_C14N_ALGORITHM};
use super::tree::{self, Element, XmlError};
use crate::cert::IdentityBundle;

/// XML-DSig namespace.
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// RSA-SHA1 signature method identifier.
pub const RSA_SHA1_SIGNATURE_METHOD: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

/// SHA-1 digest method identifier.
pub const SHA1_DIGEST_METHOD: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

/// Enveloped signature transform identifier.
pub const ENVELOPED_SIGNATURE_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Errors raised while producing an enveloped signature.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("root element has no Id attribute to reference")]
    MissingReferenceId,
    #[error("RSA signing failed: {0}")]
    Sign(String),
}

/// Generates a request identifier from the current time, hex encoded.
pub fn generate_unique_id() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{nanos:x}")
}

fn build_signed_info(reference_id: &str, digest_value: &str) -> Element {
    let mut signed_info = Element::new("SignedInfo");
    signed_info.set_attr("xmlns", DSIG_NS);

    let mut canonicalization_method = Element::new("CanonicalizationMethod");
    canonicalization_method.set_attr("Algorithm", EXC_C14N_ALGORITHM);
    signed_info.push_element(canonicalization_method);

    let mut signature_method = Element::new("SignatureMethod");
    signature_method.set_attr("Algorithm", RSA_SHA1_SIGNATURE_METHOD);
    signed_info.push_element(signature_method);

    let mut reference = Element::new("Reference");
    reference.set_attr("URI", format!("#{reference_id}"));

    let mut transforms = Element::new("Transforms");
    let mut enveloped = Element::new("Transform");
    enveloped.set_attr("Algorithm", ENVELOPED_SIGNATURE_TRANSFORM);
    transforms.push_element(enveloped);
    let mut exclusive = Element::new("Transform");
    exclusive.set_attr("Algorithm", EXC_C14N_ALGORITHM);
    transforms.push_element(exclusive);
    reference.push_element(transforms);

    let mut digest_method = Element::new("DigestMethod");
    digest_method.set_attr("Algorithm", SHA1_DIGEST_METHOD);
    reference.push_element(digest_method);

    let mut digest_value_element = Element::new("DigestValue");
    digest_value_element.push_text(digest_value);
    reference.push_element(digest_value_element);

    signed_info.push_element(reference);
    signed_info
}

fn build_signature(
    signed_info: Element,
    signature_value: &str,
    bundle: &IdentityBundle,
) -> Element {
    let mut signature = Element::new("Signature");
    signature.set_attr("xmlns", DSIG_NS);
    signature.push_element(signed_info);

    let mut signature_value_element = Element::new("SignatureValue");
    signature_value_element.push_text(signature_value);
    signature.push_element(signature_value_element);

    let mut x509_certificate = Element::new("X509Certificate");
    x509_certificate.push_text(Base64::encode_string(bundle.certificate_der()));

    let mut issuer_name = Element::new("X509IssuerName");
    issuer_name.push_text(bundle.issuer());
    let mut serial_number = Element::new("X509SerialNumber");
    serial_number.push_text(bundle.serial());
    let mut issuer_serial = Element::new("X509IssuerSerial");
    issuer_serial.push_element(issuer_name);
    issuer_serial.push_element(serial_number);

    let mut x509_data = Element::new("X509Data");
    x509_data.push_element(x509_certificate);
    x509_data.push_element(issuer_serial);

    let mut key_info = Element::new("KeyInfo");
    key_info.push_element(x509_data);
    signature.push_element(key_info);

    signature
}

/// Signs `xml` with the bundle's private key and returns the document with
/// the `Signature` element appended as the last child of the root. The root
/// element must carry an `Id` attribute.
pub fn sign_enveloped(xml: &[u8], bundle: &IdentityBundle) -> Result<Vec<u8>, SigningError> {
    let mut doc = tree::parse(xml)?;
    let reference_id = doc
        .attr("Id")
        .ok_or(SigningError::MissingReferenceId)?
        .to_string();

    let canonicalizer = Canonicalizer::exclusive_1_0("");
    let document_digest = Sha1::digest(canonicalizer.canonicalize(&doc));
    let digest_value = Base64::encode_string(&document_digest);

    let signed_info = build_signed_info(&reference_id, &digest_value);
    let signed_info_digest = Sha1::digest(canonicalizer.canonicalize(&signed_info));

    let signature = bundle
        .signing_key()
        .sign(Pkcs1v15Sign::new::<Sha1>(), &signed_info_digest)
        .map_err(|e| SigningError::Sign(e.to_string()))?;
    let signature_value = Base64::encode_string(&signature);

    doc.push_element(build_signature(signed_info, &signature_value, bundle));
    Ok(doc.to_bytes())
}

/// Placeholder verification of signed CIS responses. Always succeeds.
///
/// Responses are signed with inclusive canonicalization
/// (`http://www.w3.org/TR/2001/REC-xml-c14n-20010315`) over context that
/// includes the SOAP envelope, which this crate cannot yet reconstruct
/// faithfully enough to recompute the signed digest. Until that is resolved
/// the transport layer's pinned TLS roots are the integrity guarantee.
pub fn verify_response(_el: &Element) -> Result<(), SigningError> {
    Ok(())
}
