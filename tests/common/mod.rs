//! Shared fixtures: generated RSA keys, self-signed CA hierarchies and
//! PKCS#12 identity containers resembling the FINA-issued ones.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Builder, X509NameBuilder, X509NameRef, X509};

pub const TEST_PASSWORD: &str = "test-password";

/// A freshly generated RSA keypair.
pub fn rsa_pkey() -> PKey<Private> {
    let rsa = Rsa::generate(2048).expect("generate RSA key");
    PKey::from_rsa(rsa).expect("wrap RSA key")
}

/// Appends a valid Mod 11,10 check digit to ten digits.
pub fn valid_oib(first_ten: &str) -> String {
    assert_eq!(first_ten.len(), 10);
    let mut remainder: u32 = 10;
    for b in first_ten.bytes() {
        assert!(b.is_ascii_digit());
        remainder = (remainder + u32::from(b - b'0')) % 10;
        if remainder == 0 {
            remainder = 10;
        }
        remainder = (remainder * 2) % 11;
    }
    let check = (11 - remainder) % 10;
    format!("{first_ten}{check}")
}

fn unix_time_offset_days(days: i64) -> i64 {
    chrono::Utc::now().timestamp() + days * 86_400
}

fn subject(common_name: &str, organization: Option<&str>, country: Option<&str>) -> openssl::x509::X509Name {
    let mut name = X509NameBuilder::new().expect("name builder");
    if let Some(country) = country {
        name.append_entry_by_nid(Nid::COUNTRYNAME, country)
            .expect("country");
    }
    if let Some(organization) = organization {
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, organization)
            .expect("organization");
    }
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)
        .expect("common name");
    name.build()
}

fn base_builder(
    subject_name: &openssl::x509::X509Name,
    issuer_name: &X509NameRef,
    pubkey: &PKeyRef<impl openssl::pkey::HasPublic>,
    not_before_days: i64,
    not_after_days: i64,
) -> X509Builder {
    let mut builder = X509Builder::new().expect("builder");
    builder.set_version(2).expect("version");
    let mut serial = BigNum::new().expect("bignum");
    serial
        .rand(128, MsbOption::MAYBE_ZERO, false)
        .expect("random serial");
    let serial = serial.to_asn1_integer().expect("serial");
    builder.set_serial_number(&serial).expect("set serial");
    builder.set_subject_name(subject_name).expect("subject");
    builder.set_issuer_name(issuer_name).expect("issuer");
    builder.set_pubkey(pubkey).expect("pubkey");
    let not_before =
        Asn1Time::from_unix(unix_time_offset_days(not_before_days)).expect("not before");
    let not_after = Asn1Time::from_unix(unix_time_offset_days(not_after_days)).expect("not after");
    builder.set_not_before(&not_before).expect("set not before");
    builder.set_not_after(&not_after).expect("set not after");
    builder
}

/// A self-signed CA valid for the given window (days relative to now).
pub fn make_ca(common_name: &str, not_before_days: i64, not_after_days: i64) -> (PKey<Private>, X509) {
    let key = rsa_pkey();
    let name = subject(common_name, None, None);
    let mut builder = base_builder(&name, &name, &key, not_before_days, not_after_days);
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().expect("bc"))
        .expect("append bc");
    builder.sign(&key, MessageDigest::sha256()).expect("sign ca");
    (key, builder.build())
}

/// An end-entity certificate issued by `ca` for the given subject.
pub fn make_leaf(
    ca_key: &PKeyRef<Private>,
    ca_cert: &X509,
    common_name: &str,
    organization: Option<&str>,
    country: Option<&str>,
    pubkey: &PKey<Private>,
    not_before_days: i64,
    not_after_days: i64,
) -> X509 {
    let name = subject(common_name, organization, country);
    let mut builder = base_builder(
        &name,
        ca_cert.subject_name(),
        pubkey,
        not_before_days,
        not_after_days,
    );
    builder.sign(ca_key, MessageDigest::sha256()).expect("sign leaf");
    builder.build()
}

/// A PKCS#12 container holding a key and certificate whose subject carries
/// `oib` the way fiscalization certificates do (`O = <name> <country><oib>`),
/// valid for the given window. Returns the DER blob and the key inside it.
pub fn identity_p12(
    oib: &str,
    not_before_days: i64,
    not_after_days: i64,
) -> (Vec<u8>, PKey<Private>) {
    let (ca_key, ca_cert) = make_ca("Fiskal Test CA", -3650, 3650);
    let key = rsa_pkey();
    let organization = format!("TEST TVRTKA D.O.O. HR{oib}");
    let leaf = make_leaf(
        &ca_key,
        &ca_cert,
        "FISKAL 1",
        Some(&organization),
        Some("HR"),
        &key,
        not_before_days,
        not_after_days,
    );

    let mut ca_stack = Stack::new().expect("stack");
    ca_stack.push(ca_cert).expect("push ca");
    let p12 = Pkcs12::builder()
        .name("fiskal test identity")
        .pkey(&key)
        .cert(&leaf)
        .ca(ca_stack)
        .build2(TEST_PASSWORD)
        .expect("build pkcs12");
    (p12.to_der().expect("pkcs12 der"), key)
}

/// A PEM chain bundle, leaf first and root last.
pub fn chain_pem(certs: &[&X509]) -> Vec<u8> {
    let mut pem = Vec::new();
    for cert in certs {
        pem.extend_from_slice(&cert.to_pem().expect("cert pem"));
    }
    pem
}

/// A complete CIS-style trust bundle: root CA plus a leaf with the given
/// common name and validity window. Returns the PEM bytes.
pub fn cis_bundle(common_name: &str, not_before_days: i64, not_after_days: i64) -> Vec<u8> {
    let (ca_key, ca_cert) = make_ca("CIS Test Root", -3650, 3650);
    let key = rsa_pkey();
    let leaf = make_leaf(
        &ca_key,
        &ca_cert,
        common_name,
        None,
        Some("HR"),
        &key,
        not_before_days,
        not_after_days,
    );
    chain_pem(&[&leaf, &ca_cert])
}
