//! CIS trust anchors.
//!
//! The service's TLS endpoints and response signatures chain up to CA
//! certificates published by the tax authority. A [`TrustStore`] is built
//! from one or more PEM bundles, each laid out leaf first and root last.
//! Every bundle is chain-verified and checked against the clock; of the
//! survivors, the one whose leaf has the latest `notBefore` wins. Its RSA
//! public key is kept for response verification and its roots become the
//! pinned TLS trust for [`crate::comm`].

use std::cmp::Ordering;
use std::path::Path;

use openssl::asn1::Asn1Time;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509StoreContext, X509};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use thiserror::Error;

use crate::cert::{asn1_time_string, name_to_string};

/// Errors raised while building a [`TrustStore`].
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("failed to read trust anchor files: {0}")]
    Io(#[from] std::io::Error),
    #[error("no suitable CIS certificate found")]
    NoValidAnchor,
    #[error("public key of the selected certificate is not an RSA key")]
    NotRsa,
    #[error(transparent)]
    Provider(#[from] openssl::error::ErrorStack),
}

/// The selected CIS signing certificate and its root pool.
pub struct TrustStore {
    public_key: RsaPublicKey,
    subject: String,
    issuer: String,
    serial: String,
    valid_from: String,
    valid_until: String,
    roots: Vec<X509>,
}

impl TrustStore {
    /// Builds a trust store from every `<prefix>*.pem` file in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>, prefix: &str) -> Result<Self, TrustError> {
        let mut bundles = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .collect();
        entries.sort();
        for path in entries {
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".pem"));
            if matches {
                bundles.push(std::fs::read(&path)?);
            }
        }
        Self::from_pem_bundles(&bundles)
    }

    /// Builds a trust store from PEM bundles held in memory. Each bundle
    /// must contain a full chain, leaf first and root last; bundles that
    /// fail to parse or verify are discarded. Fails only if no bundle
    /// survives.
    pub fn from_pem_bundles<B: AsRef<[u8]>>(bundles: &[B]) -> Result<Self, TrustError> {
        let now = Asn1Time::days_from_now(0)?;
        let mut best: Option<(X509, Vec<X509>)> = None;

        for bundle in bundles {
            let certs = match X509::stack_from_pem(bundle.as_ref()) {
                Ok(certs) if !certs.is_empty() => certs,
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unparseable trust bundle");
                    continue;
                }
            };

            if !chain_verifies(&certs)? {
                tracing::warn!(
                    subject = %name_to_string(certs[0].subject_name()),
                    "discarding trust bundle with invalid chain"
                );
                continue;
            }

            let leaf = &certs[0];
            let started = leaf.not_before().compare(&now)? != Ordering::Greater;
            let unexpired = leaf.not_after().compare(&now)? != Ordering::Less;
            if !started || !unexpired {
                continue;
            }

            let newer = match &best {
                None => true,
                Some((current, _)) => {
                    leaf.not_before().compare(current.not_before())? == Ordering::Greater
                }
            };
            if newer {
                let root = certs[certs.len() - 1].clone();
                best = Some((leaf.clone(), vec![root]));
            }
        }

        let (leaf, roots) = best.ok_or(TrustError::NoValidAnchor)?;

        let spki = leaf.public_key()?.public_key_to_der()?;
        let public_key =
            RsaPublicKey::from_public_key_der(&spki).map_err(|_| TrustError::NotRsa)?;

        Ok(TrustStore {
            public_key,
            subject: name_to_string(leaf.subject_name()),
            issuer: name_to_string(leaf.issuer_name()),
            serial: leaf
                .serial_number()
                .to_bn()
                .and_then(|bn| bn.to_dec_str().map(|s| s.to_string()))?,
            valid_from: asn1_time_string(leaf.not_before()),
            valid_until: asn1_time_string(leaf.not_after()),
            roots,
        })
    }

    /// RSA public key of the selected CIS signing certificate.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn valid_from(&self) -> &str {
        &self.valid_from
    }

    pub fn valid_until(&self) -> &str {
        &self.valid_until
    }

    /// Root certificates to pin for TLS connections to the service.
    pub fn roots(&self) -> &[X509] {
        &self.roots
    }
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .field("valid_from", &self.valid_from)
            .field("valid_until", &self.valid_until)
            .finish_non_exhaustive()
    }
}

/// Verifies `certs[0]` against the last certificate as root with everything
/// in between as intermediates.
fn chain_verifies(certs: &[X509]) -> Result<bool, TrustError> {
    let leaf = &certs[0];
    let root = &certs[certs.len() - 1];

    let mut store = X509StoreBuilder::new()?;
    store.add_cert(root.clone())?;
    let store = store.build();

    let mut intermediates = Stack::new()?;
    if certs.len() > 2 {
        for cert in &certs[1..certs.len() - 1] {
            intermediates.push(cert.clone())?;
        }
    }

    let mut context = X509StoreContext::new()?;
    let valid = context.init(&store, leaf, &intermediates, |ctx| ctx.verify_cert())?;
    Ok(valid)
}
