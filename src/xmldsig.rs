//! XML tooling for CIS requests: an element tree, canonicalization and
//! enveloped XML-DSig signing.

pub mod c14n;
pub mod sign;
pub mod tree;

pub use c14n::{inherit_ancestor_context, Canonicalizer};
pub use sign::{generate_unique_id, sign_enveloped, verify_response, SigningError};
pub use tree::{parse, Attr, Element, Node, XmlError};
