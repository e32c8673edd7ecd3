//! XML canonicalization.
//!
//! Implements exclusive canonical XML 1.0 (with an optional
//! `InclusiveNamespaces` prefix list) plus inclusive canonical XML 1.0 and
//! 1.1, each with and without comments. Exclusive canonicalization emits a
//! namespace declaration at the first element where the prefix is visibly
//! utilized; the inclusive forms keep declarations in place and only strip
//! re-declarations that are identical to an ancestor binding.
//!
//! Canonical attribute order is: the default `xmlns` declaration, prefixed
//! `xmlns:*` declarations sorted by prefix, then regular attributes sorted
//! by resolved namespace URI and local name (unprefixed attributes have the
//! empty URI).

use std::collections::{BTreeMap, BTreeSet};

use super::tree::{Attr, Element, Node};

/// Algorithm identifier of exclusive canonical XML 1.0.
pub const EXC_C14N_ALGORITHM: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Algorithm identifier of exclusive canonical XML 1.0 with comments.
pub const EXC_C14N_WITH_COMMENTS_ALGORITHM: &str =
    "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

/// Algorithm identifier of canonical XML 1.1.
pub const C14N11_ALGORITHM: &str = "http://www.w3.org/2006/12/xml-c14n11";

/// Algorithm identifier of canonical XML 1.1 with comments.
pub const C14N11_WITH_COMMENTS_ALGORITHM: &str =
    "http://www.w3.org/2006/12/xml-c14n11#WithComments";

/// Algorithm identifier of canonical XML 1.0.
pub const C14N10_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

/// Algorithm identifier of canonical XML 1.0 with comments.
pub const C14N10_WITH_COMMENTS_ALGORITHM: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A canonicalization algorithm. Construct one with the `exclusive_1_0*` or
/// `inclusive_1_*` constructors, then call [`Canonicalizer::canonicalize`].
#[derive(Debug, Clone)]
pub enum Canonicalizer {
    Exclusive10 {
        with_comments: bool,
        prefix_list: Vec<String>,
    },
    Inclusive10 {
        with_comments: bool,
    },
    Inclusive11 {
        with_comments: bool,
    },
}

impl Canonicalizer {
    /// Exclusive canonical XML 1.0. `prefix_list` is an NMTOKENS list
    /// (whitespace separated) of prefixes to treat as visibly utilized; pass
    /// an empty string for none.
    pub fn exclusive_1_0(prefix_list: &str) -> Self {
        Canonicalizer::Exclusive10 {
            with_comments: false,
            prefix_list: split_prefix_list(prefix_list),
        }
    }

    /// Exclusive canonical XML 1.0, keeping comment nodes.
    pub fn exclusive_1_0_with_comments(prefix_list: &str) -> Self {
        Canonicalizer::Exclusive10 {
            with_comments: true,
            prefix_list: split_prefix_list(prefix_list),
        }
    }

    pub fn inclusive_1_0() -> Self {
        Canonicalizer::Inclusive10 {
            with_comments: false,
        }
    }

    pub fn inclusive_1_0_with_comments() -> Self {
        Canonicalizer::Inclusive10 {
            with_comments: true,
        }
    }

    pub fn inclusive_1_1() -> Self {
        Canonicalizer::Inclusive11 {
            with_comments: false,
        }
    }

    pub fn inclusive_1_1_with_comments() -> Self {
        Canonicalizer::Inclusive11 {
            with_comments: true,
        }
    }

    /// The algorithm identifier to record in a `CanonicalizationMethod` or
    /// `Transform` element.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Canonicalizer::Exclusive10 {
                with_comments: false,
                ..
            } => EXC_C14N_ALGORITHM,
            Canonicalizer::Exclusive10 {
                with_comments: true,
                ..
            } => EXC_C14N_WITH_COMMENTS_ALGORITHM,
            Canonicalizer::Inclusive10 {
                with_comments: false,
            } => C14N10_ALGORITHM,
            Canonicalizer::Inclusive10 {
                with_comments: true,
            } => C14N10_WITH_COMMENTS_ALGORITHM,
            Canonicalizer::Inclusive11 {
                with_comments: false,
            } => C14N11_ALGORITHM,
            Canonicalizer::Inclusive11 {
                with_comments: true,
            } => C14N11_WITH_COMMENTS_ALGORITHM,
        }
    }

    /// Produces the canonical serialization of `el` treated as a document
    /// root. For inclusive 1.0 canonicalization of a subtree that inherits
    /// namespace context from ancestors, apply
    /// [`inherit_ancestor_context`] first.
    pub fn canonicalize(&self, el: &Element) -> Vec<u8> {
        let prepped = match self {
            Canonicalizer::Exclusive10 {
                with_comments,
                prefix_list,
            } => exclusive_prep(
                el,
                &BTreeMap::new(),
                &BTreeMap::new(),
                prefix_list,
                *with_comments,
            ),
            Canonicalizer::Inclusive10 { with_comments }
            | Canonicalizer::Inclusive11 { with_comments } => inclusive_prep(
                el,
                &BTreeMap::new(),
                &BTreeMap::new(),
                *with_comments,
            ),
        };
        prepped.to_bytes()
    }
}

/// Copies `el` and inserts the namespace declarations and `xml:*` attributes
/// that are in scope from `ancestors` (outermost first) but not declared on
/// `el` itself. Used to canonicalize a subtree under inclusive rules, where
/// the ancestor context is part of the canonical form.
pub fn inherit_ancestor_context(el: &Element, ancestors: &[&Element]) -> Element {
    let mut inherited: BTreeMap<String, String> = BTreeMap::new();
    for ancestor in ancestors {
        for attr in &ancestor.attrs {
            let is_ns = attr.name == "xmlns" || attr.name.starts_with("xmlns:");
            let is_xml = attr.name.starts_with("xml:");
            if attr.name == "xmlns:xml" && attr.value == XML_NAMESPACE {
                continue;
            }
            if is_ns || is_xml {
                inherited.insert(attr.name.clone(), attr.value.clone());
            }
        }
    }

    let mut copy = el.clone();
    for (name, value) in inherited {
        if copy.attr(&name).is_none() {
            copy.attrs.push(Attr { name, value });
        }
    }
    copy
}

fn split_prefix_list(prefix_list: &str) -> Vec<String> {
    prefix_list
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// prefix ("" for the default namespace) -> URI
type NsScope = BTreeMap<String, String>;

fn declarations(el: &Element) -> Vec<(String, String)> {
    el.attrs
        .iter()
        .filter_map(|a| {
            if a.name == "xmlns" {
                Some((String::new(), a.value.clone()))
            } else {
                a.name
                    .strip_prefix("xmlns:")
                    .map(|p| (p.to_string(), a.value.clone()))
            }
        })
        .collect()
}

fn is_ns_decl(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

/// Canonical attribute sort key. `scope` must contain all in-scope prefix
/// bindings so regular prefixed attributes can be ordered by namespace URI.
fn attr_sort_key(attr: &Attr, scope: &NsScope) -> (u8, String, String) {
    if attr.name == "xmlns" {
        return (0, String::new(), String::new());
    }
    if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
        return (1, prefix.to_string(), String::new());
    }
    match attr.name.split_once(':') {
        Some((prefix, local)) => {
            let uri = if prefix == "xml" {
                XML_NAMESPACE.to_string()
            } else {
                scope.get(prefix).cloned().unwrap_or_default()
            };
            (2, uri, local.to_string())
        }
        None => (2, String::new(), attr.name.clone()),
    }
}

fn sort_attrs(attrs: &mut [Attr], scope: &NsScope) {
    attrs.sort_by_key(|a| attr_sort_key(a, scope));
}

/// Exclusive canonical form: a namespace declaration is rendered at the
/// first element where its prefix is visibly utilized (by the element tag,
/// a prefixed attribute, or membership in the prefix list) and not already
/// rendered with the same URI by an output ancestor.
fn exclusive_prep(
    el: &Element,
    declared: &NsScope,
    rendered: &NsScope,
    prefix_list: &[String],
    comments: bool,
) -> Element {
    let mut scope = declared.clone();
    for (prefix, uri) in declarations(el) {
        scope.insert(prefix, uri);
    }

    let mut utilized: BTreeSet<String> = BTreeSet::new();
    match el.prefix() {
        Some(prefix) => {
            utilized.insert(prefix.to_string());
        }
        None => {
            utilized.insert(String::new());
        }
    }
    for attr in &el.attrs {
        if is_ns_decl(&attr.name) {
            continue;
        }
        if let Some((prefix, _)) = attr.name.split_once(':') {
            if prefix != "xml" {
                utilized.insert(prefix.to_string());
            }
        }
    }
    for prefix in prefix_list {
        if scope.contains_key(prefix) {
            utilized.insert(prefix.clone());
        }
    }

    let mut out = Element::new(el.tag.clone());
    let mut child_rendered = rendered.clone();
    for prefix in &utilized {
        if let Some(uri) = scope.get(prefix) {
            let current = child_rendered.get(prefix).map(String::as_str).unwrap_or("");
            if current != uri {
                let name = if prefix.is_empty() {
                    "xmlns".to_string()
                } else {
                    format!("xmlns:{prefix}")
                };
                out.attrs.push(Attr {
                    name,
                    value: uri.clone(),
                });
                child_rendered.insert(prefix.clone(), uri.clone());
            }
        }
    }
    for attr in &el.attrs {
        if !is_ns_decl(&attr.name) {
            out.attrs.push(attr.clone());
        }
    }
    sort_attrs(&mut out.attrs, &scope);

    for child in &el.children {
        match child {
            Node::Element(child_el) => out.push_element(exclusive_prep(
                child_el,
                &scope,
                &child_rendered,
                prefix_list,
                comments,
            )),
            Node::Text(t) => out.push_text(t.clone()),
            Node::Comment(c) => {
                if comments {
                    out.children.push(Node::Comment(c.clone()));
                }
            }
        }
    }
    out
}

/// Inclusive canonical form: declarations stay where they are written, but
/// a declaration identical to the nearest rendered binding of the same name
/// is stripped. `seen` is keyed by the literal attribute name (`xmlns` or
/// `xmlns:prefix`).
fn inclusive_prep(
    el: &Element,
    seen: &BTreeMap<String, String>,
    declared: &NsScope,
    comments: bool,
) -> Element {
    let mut scope = declared.clone();
    for (prefix, uri) in declarations(el) {
        scope.insert(prefix, uri);
    }

    let mut seen_here = seen.clone();
    let mut out = Element::new(el.tag.clone());
    for attr in &el.attrs {
        if attr.name == "xmlns" {
            let keep = match seen_here.get("xmlns") {
                None => !attr.value.is_empty(),
                Some(uri) => &attr.value != uri,
            };
            if keep {
                out.attrs.push(attr.clone());
                seen_here.insert("xmlns".to_string(), attr.value.clone());
            }
        } else if attr.name.starts_with("xmlns:") {
            if seen_here.get(&attr.name) != Some(&attr.value) {
                out.attrs.push(attr.clone());
                seen_here.insert(attr.name.clone(), attr.value.clone());
            }
        } else {
            out.attrs.push(attr.clone());
        }
    }
    sort_attrs(&mut out.attrs, &scope);

    for child in &el.children {
        match child {
            Node::Element(child_el) => {
                out.push_element(inclusive_prep(child_el, &seen_here, &scope, comments))
            }
            Node::Text(t) => out.push_text(t.clone()),
            Node::Comment(c) => {
                if comments {
                    out.children.push(Node::Comment(c.clone()));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::tree::parse;
    use super::*;

    const ASSERTION: &str = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_88a93ebe-abdf-48cd-9ed0-b0dd1b252909" Version="2.0" ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" AssertionConsumerServiceURL="https://saml2.test.astuart.co/sso/saml2" AssertionConsumerServiceIndex="0" AttributeConsumingServiceIndex="0" IssueInstant="2016-04-28T15:37:17" Destination="http://idp.astuart.co/idp/profile/SAML2/Redirect/SSO"><!-- Some Comment --><saml:Issuer>https://saml2.test.astuart.co/sso/saml2</saml:Issuer><samlp:NameIDPolicy AllowCreate="true" Format=""/><samlp:RequestedAuthnContext Comparison="exact"><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></samlp:RequestedAuthnContext></samlp:AuthnRequest>"#;

    const ASSERTION_EXCLUSIVE: &str = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" AssertionConsumerServiceIndex="0" AssertionConsumerServiceURL="https://saml2.test.astuart.co/sso/saml2" AttributeConsumingServiceIndex="0" Destination="http://idp.astuart.co/idp/profile/SAML2/Redirect/SSO" ID="_88a93ebe-abdf-48cd-9ed0-b0dd1b252909" IssueInstant="2016-04-28T15:37:17" ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Version="2.0"><saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://saml2.test.astuart.co/sso/saml2</saml:Issuer><samlp:NameIDPolicy AllowCreate="true" Format=""></samlp:NameIDPolicy><samlp:RequestedAuthnContext Comparison="exact"><saml:AuthnContextClassRef xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></samlp:RequestedAuthnContext></samlp:AuthnRequest>"#;

    const ASSERTION_EXCLUSIVE_COMMENTS: &str = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" AssertionConsumerServiceIndex="0" AssertionConsumerServiceURL="https://saml2.test.astuart.co/sso/saml2" AttributeConsumingServiceIndex="0" Destination="http://idp.astuart.co/idp/profile/SAML2/Redirect/SSO" ID="_88a93ebe-abdf-48cd-9ed0-b0dd1b252909" IssueInstant="2016-04-28T15:37:17" ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Version="2.0"><!-- Some Comment --><saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">https://saml2.test.astuart.co/sso/saml2</saml:Issuer><samlp:NameIDPolicy AllowCreate="true" Format=""></samlp:NameIDPolicy><samlp:RequestedAuthnContext Comparison="exact"><saml:AuthnContextClassRef xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></samlp:RequestedAuthnContext></samlp:AuthnRequest>"#;

    const ASSERTION_INCLUSIVE: &str = r#"<samlp:AuthnRequest xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" AssertionConsumerServiceIndex="0" AssertionConsumerServiceURL="https://saml2.test.astuart.co/sso/saml2" AttributeConsumingServiceIndex="0" Destination="http://idp.astuart.co/idp/profile/SAML2/Redirect/SSO" ID="_88a93ebe-abdf-48cd-9ed0-b0dd1b252909" IssueInstant="2016-04-28T15:37:17" ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Version="2.0"><saml:Issuer>https://saml2.test.astuart.co/sso/saml2</saml:Issuer><samlp:NameIDPolicy AllowCreate="true" Format=""></samlp:NameIDPolicy><samlp:RequestedAuthnContext Comparison="exact"><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></samlp:RequestedAuthnContext></samlp:AuthnRequest>"#;

    const ASSERTION_INCLUSIVE_COMMENTS: &str = r#"<samlp:AuthnRequest xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" AssertionConsumerServiceIndex="0" AssertionConsumerServiceURL="https://saml2.test.astuart.co/sso/saml2" AttributeConsumingServiceIndex="0" Destination="http://idp.astuart.co/idp/profile/SAML2/Redirect/SSO" ID="_88a93ebe-abdf-48cd-9ed0-b0dd1b252909" IssueInstant="2016-04-28T15:37:17" ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Version="2.0"><!-- Some Comment --><saml:Issuer>https://saml2.test.astuart.co/sso/saml2</saml:Issuer><samlp:NameIDPolicy AllowCreate="true" Format=""></samlp:NameIDPolicy><samlp:RequestedAuthnContext Comparison="exact"><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></samlp:RequestedAuthnContext></samlp:AuthnRequest>"#;

    fn run(canonicalizer: Canonicalizer, input: &str, expected: &str) {
        let doc = parse(input.as_bytes()).expect("parse input");
        let out = canonicalizer.canonicalize(&doc);
        assert_eq!(String::from_utf8(out).expect("utf8"), expected);
    }

    #[test]
    fn exclusive_moves_declarations_to_first_use() {
        run(
            Canonicalizer::exclusive_1_0(""),
            ASSERTION,
            ASSERTION_EXCLUSIVE,
        );
    }

    #[test]
    fn exclusive_with_comments() {
        run(
            Canonicalizer::exclusive_1_0_with_comments(""),
            ASSERTION,
            ASSERTION_EXCLUSIVE_COMMENTS,
        );
    }

    #[test]
    fn inclusive_1_1_keeps_declarations_in_place() {
        run(
            Canonicalizer::inclusive_1_1(),
            ASSERTION,
            ASSERTION_INCLUSIVE,
        );
    }

    #[test]
    fn inclusive_1_1_with_comments() {
        run(
            Canonicalizer::inclusive_1_1_with_comments(),
            ASSERTION,
            ASSERTION_INCLUSIVE_COMMENTS,
        );
    }

    #[test]
    fn exclusive_default_namespace_and_id() {
        run(
            Canonicalizer::exclusive_1_0(""),
            r#"<Foo ID="id1619705532971228558789260" xmlns:bar="urn:bar" xmlns="urn:foo"><bar:Baz></bar:Baz></Foo>"#,
            r#"<Foo xmlns="urn:foo" ID="id1619705532971228558789260"><bar:Baz xmlns:bar="urn:bar"></bar:Baz></Foo>"#,
        );
    }

    #[test]
    fn inclusive_1_1_default_namespace_and_id() {
        run(
            Canonicalizer::inclusive_1_1(),
            r#"<Foo ID="id1619705532971228558789260" xmlns:bar="urn:bar" xmlns="urn:foo"><bar:Baz></bar:Baz></Foo>"#,
            r#"<Foo xmlns="urn:foo" xmlns:bar="urn:bar" ID="id1619705532971228558789260"><bar:Baz></bar:Baz></Foo>"#,
        );
    }

    #[test]
    fn inclusive_1_1_strips_identical_redeclarations() {
        run(
            Canonicalizer::inclusive_1_1(),
            r#"<X xmlns:x="x" xmlns:y="y"><Y xmlns:x="x" xmlns:y="y" xmlns:z="z"/></X>"#,
            r#"<X xmlns:x="x" xmlns:y="y"><Y xmlns:z="z"></Y></X>"#,
        );
    }

    #[test]
    fn exclusive_drops_unused_default_namespace() {
        run(
            Canonicalizer::exclusive_1_0(""),
            r#"<foo:Foo xmlns="urn:baz" xmlns:foo="urn:foo"><foo:Bar></foo:Bar></foo:Foo>"#,
            r#"<foo:Foo xmlns:foo="urn:foo"><foo:Bar></foo:Bar></foo:Foo>"#,
        );
    }

    #[test]
    fn exclusive_prefix_list_forces_emission() {
        run(
            Canonicalizer::exclusive_1_0("xs"),
            r#"<foo:Foo xmlns:foo="urn:foo" xmlns:xs="http://www.w3.org/2001/XMLSchema"><foo:Bar xmlns:xs="http://www.w3.org/2001/XMLSchema"></foo:Bar></foo:Foo>"#,
            r#"<foo:Foo xmlns:foo="urn:foo" xmlns:xs="http://www.w3.org/2001/XMLSchema"><foo:Bar></foo:Bar></foo:Foo>"#,
        );
    }

    #[test]
    fn exclusive_keeps_redeclared_default_namespace() {
        run(
            Canonicalizer::exclusive_1_0(""),
            r#"<Foo xmlns="urn:foo"><Bar xmlns="uri:bar"></Bar></Foo>"#,
            r#"<Foo xmlns="urn:foo"><Bar xmlns="uri:bar"></Bar></Foo>"#,
        );
    }

    #[test]
    fn inclusive_1_0_w3c_example() {
        let input = "<doc>\n   <e1   />\n   <e2   ></e2>\n   <e3   name = \"elem3\"   id=\"elem3\"   />\n   <e4   name=\"elem4\"   id=\"elem4\"   ></e4>\n   <e5 a:attr=\"out\" b:attr=\"sorted\" attr2=\"all\" attr=\"I'm\"\n      xmlns:b=\"http://www.ietf.org\"\n      xmlns:a=\"http://www.w3.org\"\n      xmlns=\"http://example.org\"/>\n   <e6 xmlns=\"\" xmlns:a=\"http://www.w3.org\">\n      <e7 xmlns=\"http://www.ietf.org\">\n         <e8 xmlns=\"\" xmlns:a=\"http://www.w3.org\">\n            <e9 xmlns=\"\" xmlns:a=\"http://www.ietf.org\"/>\n         </e8>\n      </e7>\n   </e6>\n</doc>";
        let expected = "<doc>\n   <e1></e1>\n   <e2></e2>\n   <e3 id=\"elem3\" name=\"elem3\"></e3>\n   <e4 id=\"elem4\" name=\"elem4\"></e4>\n   <e5 xmlns=\"http://example.org\" xmlns:a=\"http://www.w3.org\" xmlns:b=\"http://www.ietf.org\" attr=\"I'm\" attr2=\"all\" b:attr=\"sorted\" a:attr=\"out\"></e5>\n   <e6 xmlns:a=\"http://www.w3.org\">\n      <e7 xmlns=\"http://www.ietf.org\">\n         <e8 xmlns=\"\">\n            <e9 xmlns:a=\"http://www.ietf.org\"></e9>\n         </e8>\n      </e7>\n   </e6>\n</doc>";
        run(Canonicalizer::inclusive_1_0(), input, expected);
    }

    #[test]
    fn inclusive_1_0_subtree_inherits_context() {
        let input = "<RootElement xmlns=\"http://www.example.com/ns1\" xmlns:ns2=\"http://www.example.com/ns2\">\n\t\t<ns2:ChildElement>\n\t\t\t<ns2:GrandChildElement>Hello, World!</ns2:GrandChildElement>\n\t\t</ns2:ChildElement>\n\t</RootElement>";
        let doc = parse(input.as_bytes()).expect("parse");
        let child = doc.child("ChildElement").expect("child element");

        let with_context = inherit_ancestor_context(child, &[&doc]);
        let out = Canonicalizer::inclusive_1_0().canonicalize(&with_context);
        let expected = "<ns2:ChildElement xmlns=\"http://www.example.com/ns1\" xmlns:ns2=\"http://www.example.com/ns2\">\n\t\t\t<ns2:GrandChildElement>Hello, World!</ns2:GrandChildElement>\n\t\t</ns2:ChildElement>";
        assert_eq!(String::from_utf8(out).expect("utf8"), expected);
    }

    #[test]
    fn inherit_does_not_override_own_declarations() {
        let doc = parse(br#"<r xmlns:p="urn:outer"><c xmlns:p="urn:inner"/></r>"#).expect("parse");
        let child = doc.child("c").expect("child");
        let merged = inherit_ancestor_context(child, &[&doc]);
        assert_eq!(merged.attr("xmlns:p"), Some("urn:inner"));
    }

    #[test]
    fn canonical_form_is_idempotent() {
        let canonicalizer = Canonicalizer::exclusive_1_0("");
        let doc = parse(ASSERTION.as_bytes()).expect("parse");
        let once = canonicalizer.canonicalize(&doc);
        let reparsed = parse(&once).expect("reparse");
        let twice = canonicalizer.canonicalize(&reparsed);
        assert_eq!(once, twice);
    }

    #[test]
    fn algorithm_identifiers() {
        assert_eq!(
            Canonicalizer::exclusive_1_0("").algorithm(),
            "http://www.w3.org/2001/10/xml-exc-c14n#"
        );
        assert_eq!(
            Canonicalizer::inclusive_1_1_with_comments().algorithm(),
            "http://www.w3.org/2006/12/xml-c14n11#WithComments"
        );
        assert_eq!(
            Canonicalizer::inclusive_1_0().algorithm(),
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315"
        );
    }
}
