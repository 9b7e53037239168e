//! Verification of enveloped signatures produced by [`super::XmlSigner`].

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use openssl::x509::X509;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use tracing::{debug, info, instrument, warn};

use super::constants::*;
use super::locator::{ElementLocator, PatternLocator, declared_default_namespace, with_default_namespace};
use super::transforms::{Tag, TagKind, Tags, canonicalize, digest_value, element_span, is_signature_name, local_name};
use crate::crypto::rsa::{self, RsaPublicKey, RsaSignature};
use crate::pki::CertificateInfo;

/// Outcome of a signature verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Verification {
    Valid,
    Invalid(String),
    MissingSignature,
    CertificateError(String),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Valid => write!(f, "signature is valid"),
            Verification::Invalid(reason) => write!(f, "signature is invalid: {reason}"),
            Verification::MissingSignature => write!(f, "no XML signature found"),
            Verification::CertificateError(reason) => write!(f, "certificate error: {reason}"),
        }
    }
}

/// Values read from a `Signature` element
#[derive(Debug)]
struct SignatureComponents {
    signed_info: String,
    canonicalization_algorithm: String,
    signature_algorithm: String,
    digest_algorithm: String,
    transforms: Vec<String>,
    reference_uri: String,
    digest_value: String,
    signature_value: String,
    certificate: String,
}

/// Checks the first XMLDSIG signature of a document against the element it references.
///
/// Only the signature profile produced by the signer is accepted. The embedded
/// certificate's validity window is checked; its chain of trust is not.
#[derive(Debug, Clone)]
pub struct XmlSignatureVerifier<L = PatternLocator> {
    locator: L,
}

impl XmlSignatureVerifier {
    pub fn new() -> Self {
        Self::with_locator(PatternLocator)
    }
}

impl Default for XmlSignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ElementLocator> XmlSignatureVerifier<L> {
    pub fn with_locator(locator: L) -> Self {
        Self { locator }
    }

    #[instrument(skip_all)]
    pub fn verify(&self, xml: &str) -> Verification {
        self.verify_at(xml, Utc::now())
    }

    /// Like [`XmlSignatureVerifier::verify`], checking the certificate validity window against `now`.
    pub fn verify_at(&self, xml: &str, now: DateTime<Utc>) -> Verification {
        match self.check(xml, now) {
            Ok(()) => {
                info!("XML signature verified");
                Verification::Valid
            }
            Err(outcome) => {
                warn!("XML signature verification failed: {outcome}");
                outcome
            }
        }
    }

    fn check(&self, xml: &str, now: DateTime<Utc>) -> Result<(), Verification> {
        let span = find_signature(xml).ok_or(Verification::MissingSignature)?;
        let components = SignatureComponents::extract(&xml[span]).map_err(Verification::Invalid)?;
        components.check_algorithms().map_err(Verification::Invalid)?;

        let public_key = certificate_public_key(&components.certificate, now)
            .map_err(Verification::CertificateError)?;

        let element_id = components
            .reference_uri
            .strip_prefix('#')
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Verification::Invalid(format!(
                    "Unsupported reference URI: '{}'",
                    components.reference_uri
                ))
            })?;
        let element = self
            .locator
            .locate(xml, element_id)
            .map_err(|err| Verification::Invalid(format!("Referenced element not found: {err}")))?;

        let digest = digest_value(&element.xml)
            .map_err(|err| Verification::Invalid(format!("Digest computation failed: {err}")))?;
        debug!(element_id, expected = %components.digest_value, computed = %digest, "Comparing digests");
        if digest != components.digest_value {
            return Err(Verification::Invalid(format!(
                "Digest mismatch for element '{element_id}'"
            )));
        }

        let signature = RsaSignature::from_base64(&components.signature_value)
            .map_err(|err| Verification::Invalid(format!("Malformed signature value: {err}")))?;
        let signed_info = canonical_signed_info(&components.signed_info);

        match rsa::verify(&public_key, signed_info.as_bytes(), &signature) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Verification::Invalid(
                "Signature value does not match SignedInfo".to_string(),
            )),
            Err(err) => Err(Verification::Invalid(format!("Signature check failed: {err}"))),
        }
    }
}

impl SignatureComponents {
    fn extract(signature: &str) -> Result<Self, String> {
        let signed_info_span = child_span(signature, SIGNED_INFO_ELEMENT)
            .ok_or_else(|| format!("Missing {SIGNED_INFO_ELEMENT} element"))?;
        let signed_info = &signature[signed_info_span];

        let transforms = Tags::new(signed_info)
            .filter(|tag| tag.kind != TagKind::Close && local_name(tag.name) == TRANSFORM_ELEMENT)
            .map(|tag| attribute_value(tag.text, ALGORITHM_ATTRIBUTE).unwrap_or_default())
            .collect();

        Ok(Self {
            signed_info: signed_info.to_string(),
            canonicalization_algorithm: algorithm_of(signed_info, CANONICALIZATION_METHOD_ELEMENT)?,
            signature_algorithm: algorithm_of(signed_info, SIGNATURE_METHOD_ELEMENT)?,
            digest_algorithm: algorithm_of(signed_info, DIGEST_METHOD_ELEMENT)?,
            transforms,
            reference_uri: first_tag(signed_info, REFERENCE_ELEMENT)
                .and_then(|tag| attribute_value(tag.text, URI_ATTRIBUTE))
                .ok_or_else(|| format!("Missing {REFERENCE_ELEMENT} URI"))?,
            digest_value: child_text(signed_info, DIGEST_VALUE_ELEMENT)?,
            signature_value: child_text(signature, SIGNATURE_VALUE_ELEMENT)?,
            certificate: child_text(signature, X509_CERTIFICATE_ELEMENT)?,
        })
    }

    fn check_algorithms(&self) -> Result<(), String> {
        if self.canonicalization_algorithm != algorithms::C14N {
            return Err(format!(
                "Unsupported canonicalization algorithm: {}",
                self.canonicalization_algorithm
            ));
        }
        if self.signature_algorithm != algorithms::RSA_SHA256 {
            return Err(format!(
                "Unsupported signature algorithm: {}",
                self.signature_algorithm
            ));
        }
        if self.digest_algorithm != algorithms::SHA256 {
            return Err(format!(
                "Unsupported digest algorithm: {}",
                self.digest_algorithm
            ));
        }
        if let Some(transform) = self
            .transforms
            .iter()
            .find(|uri| *uri != algorithms::ENVELOPED_SIGNATURE && *uri != algorithms::C14N)
        {
            return Err(format!("Unsupported transform algorithm: {transform}"));
        }
        Ok(())
    }
}

/// Span of the first `Signature` element that declares the XMLDSIG namespace.
fn find_signature(xml: &str) -> Option<Range<usize>> {
    let open = Tags::new(xml).find(|tag| {
        tag.kind != TagKind::Close && is_signature_name(tag.name) && tag.text.contains(ns::XMLDSIG)
    })?;
    element_span(xml, &open)
}

fn first_tag<'a>(xml: &'a str, local: &str) -> Option<Tag<'a>> {
    Tags::new(xml).find(|tag| tag.kind != TagKind::Close && local_name(tag.name) == local)
}

fn child_span(xml: &str, local: &str) -> Option<Range<usize>> {
    first_tag(xml, local).and_then(|open| element_span(xml, &open))
}

/// Text content of the first element with the given local name, whitespace removed.
fn child_text(xml: &str, local: &str) -> Result<String, String> {
    let open = first_tag(xml, local)
        .filter(|tag| tag.kind == TagKind::Open)
        .ok_or_else(|| format!("Missing {local} element"))?;
    let span = element_span(xml, &open).ok_or_else(|| format!("Unterminated {local} element"))?;
    let inner = &xml[open.end..span.end];
    let close_start = inner.rfind("</").unwrap_or(inner.len());
    Ok(inner[..close_start]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect())
}

fn algorithm_of(xml: &str, local: &str) -> Result<String, String> {
    first_tag(xml, local)
        .and_then(|tag| attribute_value(tag.text, ALGORITHM_ATTRIBUTE))
        .ok_or_else(|| format!("Missing {local} algorithm"))
}

/// Value of a named attribute on a single start or empty-element tag.
fn attribute_value(tag: &str, name: &str) -> Option<String> {
    let mut reader = Reader::from_str(tag);
    let start = match reader.read_event().ok()? {
        Event::Start(start) | Event::Empty(start) => start,
        _ => return None,
    };
    start
        .attributes()
        .with_checks(false)
        .filter_map(Result::ok)
        .find(|attribute| attribute.key.as_ref() == name.as_bytes())
        .and_then(|attribute| attribute.unescape_value().ok())
        .map(|value| value.into_owned())
}

/// SignedInfo in the form that was signed: namespace declared on the element itself, whitespace collapsed.
fn canonical_signed_info(signed_info: &str) -> String {
    let opening_end = signed_info.find('>').map_or(signed_info.len(), |idx| idx + 1);
    let declared = declared_default_namespace(&signed_info[..opening_end]).is_some();
    let name = Tags::new(signed_info).next().map(|tag| tag.name).unwrap_or(SIGNED_INFO_ELEMENT);

    if declared || name.contains(':') {
        canonicalize(signed_info)
    } else {
        canonicalize(&with_default_namespace(signed_info, name, ns::XMLDSIG))
    }
}

fn certificate_public_key(certificate: &str, now: DateTime<Utc>) -> Result<RsaPublicKey, String> {
    let der = BASE64
        .decode(certificate)
        .map_err(|err| format!("Malformed certificate encoding: {err}"))?;

    let info = CertificateInfo::from_der(&der).map_err(|err| err.to_string())?;
    info.validate_at(now).map_err(|err| err.to_string())?;
    debug!(subject = %info.subject, "Embedded certificate accepted");

    let x509 = X509::from_der(&der).map_err(|err| err.to_string())?;
    RsaPublicKey::from_certificate(&x509).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: &str = concat!(
        r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#,
        r#"<SignedInfo>"#,
        r#"<CanonicalizationMethod Algorithm="http://www.w3.org/TR/2001/REC-xml-c14n-20010315"/>"#,
        r#"<SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#,
        r##"<Reference URI="#x1"><Transforms>"##,
        r#"<Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>"#,
        r#"</Transforms>"#,
        r#"<DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
        r#"<DigestValue> ZGln ZXN0 </DigestValue></Reference>"#,
        r#"</SignedInfo>"#,
        "<SignatureValue>\n  c2ln\n</SignatureValue>",
        r#"<KeyInfo><X509Data><X509Certificate>Y2VydA==</X509Certificate></X509Data></KeyInfo>"#,
        r#"</Signature>"#
    );

    #[test]
    fn test_extract_components() {
        let components = SignatureComponents::extract(SIGNATURE).unwrap();
        assert_eq!(components.reference_uri, "#x1");
        assert_eq!(components.digest_value, "ZGlnZXN0");
        assert_eq!(components.signature_value, "c2ln");
        assert_eq!(components.certificate, "Y2VydA==");
        assert_eq!(components.transforms, vec![algorithms::ENVELOPED_SIGNATURE]);
        assert!(components.check_algorithms().is_ok());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let xml = SIGNATURE.replace(algorithms::RSA_SHA256, "http://www.w3.org/2000/09/xmldsig#rsa-sha1");
        let components = SignatureComponents::extract(&xml).unwrap();
        assert!(
            components
                .check_algorithms()
                .unwrap_err()
                .contains("Unsupported signature algorithm")
        );
    }

    #[test]
    fn test_missing_signature() {
        let verifier = XmlSignatureVerifier::new();
        assert_eq!(
            verifier.verify("<Doc><Body Id=\"x1\">V</Body></Doc>"),
            Verification::MissingSignature
        );
        // a Signature element outside the XMLDSIG namespace does not count
        assert_eq!(
            verifier.verify("<Doc><Signature>x</Signature></Doc>"),
            Verification::MissingSignature
        );
    }

    #[test]
    fn test_malformed_certificate() {
        let xml = format!("<Doc><Body Id=\"x1\">V</Body>{SIGNATURE}</Doc>");
        let outcome = XmlSignatureVerifier::new().verify(&xml);
        assert!(matches!(outcome, Verification::CertificateError(_)));
    }

    #[test]
    fn test_canonical_signed_info_gets_namespace() {
        assert_eq!(
            canonical_signed_info("<SignedInfo>\n  <A></A>\n</SignedInfo>"),
            r#"<SignedInfo xmlns="http://www.w3.org/2000/09/xmldsig#"><A></A></SignedInfo>"#
        );
        let declared = r#"<SignedInfo xmlns="urn:x"><A></A></SignedInfo>"#;
        assert_eq!(canonical_signed_info(declared), declared);
    }

    #[test]
    fn test_verification_serializes_with_status() {
        let json = serde_json::to_value(Verification::Invalid("bad".to_string())).unwrap();
        assert_eq!(json["status"], "invalid");
        assert_eq!(json["reason"], "bad");
        assert!(!Verification::MissingSignature.is_valid());
    }
}
