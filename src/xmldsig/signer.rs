//! Enveloped XML signature creation.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use quick_xml::SeError;
use quick_xml::se::Serializer;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::constants::{SIGNATURE_ELEMENT, SIGNED_INFO_ELEMENT, algorithms, ns};
use super::injector::insert_signature;
use super::locator::{ElementLocator, PatternLocator};
use super::transforms::{canonicalize, digest_value, normalize_document};
use super::types::*;
use super::{Error, LocateError, Result};
use crate::crypto::rsa::{self, RsaPrivateKey};
use crate::pki::{CertificateBundle, CertificateError, CertificateInfo};

/// Behaviour switches of the signer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerOptions {
    /// Refuse requests without an element id instead of signing the first element carrying one
    pub require_element_id: bool,
    /// Closing tag used when a request names none; inferred from the document otherwise
    pub default_tag: Option<String>,
}

/// Produces enveloped XMLDSIG signatures (RSA-SHA256, SHA-256 digest) over
/// one element of a document, using the key and certificate of a PKCS#12 archive.
#[derive(Debug, Clone)]
pub struct XmlSigner<L = PatternLocator> {
    locator: L,
    options: SignerOptions,
}

impl XmlSigner {
    pub fn new(options: SignerOptions) -> Self {
        Self::with_locator(PatternLocator, options)
    }
}

impl Default for XmlSigner {
    fn default() -> Self {
        Self::new(SignerOptions::default())
    }
}

impl<L: ElementLocator> XmlSigner<L> {
    pub fn with_locator(locator: L, options: SignerOptions) -> Self {
        Self { locator, options }
    }

    /// Metadata of the archive's leaf certificate. The validity window is not enforced.
    pub fn certificate_info(
        &self,
        bundle: &CertificateBundle,
    ) -> std::result::Result<CertificateInfo, CertificateError> {
        bundle.certificate_info()
    }

    /// Sign the requested element and insert the signature into the document.
    ///
    /// Failures are reported through [`SignatureResult::error`] with an empty signed document.
    #[instrument(skip_all)]
    pub fn sign(&self, request: &SignatureRequest) -> SignatureResult {
        self.sign_at(request, Utc::now())
    }

    /// Like [`XmlSigner::sign`], checking the certificate validity window against `now`.
    pub fn sign_at(&self, request: &SignatureRequest, now: DateTime<Utc>) -> SignatureResult {
        match self.sign_document(request, now) {
            Ok(signed_xml) => {
                info!("XML document signed successfully");
                SignatureResult::succeeded(request.xml_content.as_str(), signed_xml)
            }
            Err(err) => {
                warn!(error = %err, "XML signing failed");
                SignatureResult::failed(request.xml_content.as_str(), err)
            }
        }
    }

    /// Signed document, or the error that stopped signing.
    pub fn try_sign(&self, request: &SignatureRequest) -> Result<String> {
        self.sign(request).into_result()
    }

    fn sign_document(&self, request: &SignatureRequest, now: DateTime<Utc>) -> Result<String> {
        let xml = normalize_document(&request.xml_content);
        validate_input(&xml, &request.certificate)?;

        let material = request.certificate.load()?;
        material.info().validate_at(now)?;
        info!(subject = %material.info().subject, "Signing certificate loaded");

        let element_id = self.resolve_element_id(&xml, request.element_id.as_deref())?;
        let element = self.locator.locate(&xml, &element_id)?;

        let digest = digest_value(&element.xml)?;
        debug!(element_id = %element_id, digest = %digest, "Element digest computed");

        let signed_info = build_signed_info(&element_id, digest);
        let canonical_signed_info = canonicalize(&to_canonical_xml(&signed_info, SIGNED_INFO_ELEMENT)?);

        let private_key = RsaPrivateKey::from_pkey(material.private_key().clone())?;
        let signature_value = rsa::sign(&private_key, canonical_signed_info.as_bytes())?.to_base64();

        let signature = build_signature_element(
            signed_info,
            &canonical_signed_info,
            signature_value,
            BASE64.encode(material.certificate_der()),
        )?;

        let tag = request
            .signature_tag
            .as_deref()
            .or(self.options.default_tag.as_deref());
        insert_signature(&xml, &signature, tag)
    }

    fn resolve_element_id(&self, xml: &str, requested: Option<&str>) -> Result<String> {
        if let Some(id) = requested.map(str::trim).filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        if self.options.require_element_id {
            return Err(Error::InvalidInput("an element id is required"));
        }

        let id = self
            .locator
            .first_id(xml)?
            .ok_or(LocateError::ElementNotFound(None))?;
        warn!("No element id given, signing the first element with Id \"{id}\"");
        Ok(id)
    }
}

fn validate_input(xml: &str, certificate: &CertificateBundle) -> Result<()> {
    if xml.trim().is_empty() {
        return Err(Error::InvalidInput("XML content cannot be empty"));
    }
    if certificate.is_empty() {
        return Err(Error::InvalidInput("certificate archive cannot be empty"));
    }
    if certificate.has_blank_passphrase() {
        return Err(Error::InvalidInput("certificate passphrase cannot be empty"));
    }
    Ok(())
}

/// SignedInfo referencing `#element_id` with the enveloped-signature and C14N transforms.
pub fn build_signed_info(element_id: &str, digest_value: String) -> SignedInfo {
    SignedInfo {
        xmlns: Some(ns::XMLDSIG.to_string()),
        canonicalization_method: CanonicalizationMethod::new(algorithms::C14N),
        signature_method: SignatureMethod::new(algorithms::RSA_SHA256),
        reference: Reference {
            uri: format!("#{element_id}"),
            transforms: Transforms {
                transforms: vec![
                    Transform::new(algorithms::ENVELOPED_SIGNATURE),
                    Transform::new(algorithms::C14N),
                ],
            },
            digest_method: DigestMethod::new(algorithms::SHA256),
            digest_value,
        },
    }
}

/// Signature element around the signed SignedInfo, its value and the signing certificate.
///
/// `canonical_signed_info` must appear unchanged in the output, since that is
/// the text the signature value covers.
pub fn build_signature_element(
    signed_info: SignedInfo,
    canonical_signed_info: &str,
    signature_value: String,
    certificate_base64: String,
) -> std::result::Result<String, SeError> {
    let signature = Signature {
        xmlns: ns::XMLDSIG.to_string(),
        signed_info,
        signature_value,
        key_info: KeyInfo {
            x509_data: X509Data {
                x509_certificate: certificate_base64,
            },
        },
    };

    let xml = to_canonical_xml(&signature, SIGNATURE_ELEMENT)?;
    if !xml.contains(canonical_signed_info) {
        return Err(SeError::Custom(
            "serialized Signature does not embed the signed SignedInfo".to_string(),
        ));
    }
    Ok(xml)
}

/// Serialize without indentation, rendering empty elements as start/end pairs.
pub fn to_canonical_xml<T: Serialize>(value: &T, root: &str) -> std::result::Result<String, SeError> {
    let mut xml = String::new();
    let mut serializer = Serializer::with_root(&mut xml, Some(root))?;
    serializer.expand_empty_elements(true);
    value.serialize(serializer)?;
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_signed_info() {
        let signed_info = build_signed_info("x1", "ZGlnZXN0".to_string());
        let xml = to_canonical_xml(&signed_info, SIGNED_INFO_ELEMENT).unwrap();

        assert_eq!(
            xml,
            concat!(
                r#"<SignedInfo xmlns="http://www.w3.org/2000/09/xmldsig#">"#,
                r#"<CanonicalizationMethod Algorithm="http://www.w3.org/TR/2001/REC-xml-c14n-20010315"></CanonicalizationMethod>"#,
                r#"<SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"></SignatureMethod>"#,
                r##"<Reference URI="#x1">"##,
                r#"<Transforms>"#,
                r#"<Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"></Transform>"#,
                r#"<Transform Algorithm="http://www.w3.org/TR/2001/REC-xml-c14n-20010315"></Transform>"#,
                r#"</Transforms>"#,
                r#"<DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"></DigestMethod>"#,
                r#"<DigestValue>ZGlnZXN0</DigestValue>"#,
                r#"</Reference>"#,
                r#"</SignedInfo>"#
            )
        );
        assert_eq!(canonicalize(&xml), xml);
    }

    #[test]
    fn test_signature_element_layout() {
        let signed_info = build_signed_info("x1", "ZGlnZXN0".to_string());
        let canonical = to_canonical_xml(&signed_info, SIGNED_INFO_ELEMENT).unwrap();

        let xml = build_signature_element(
            signed_info,
            &canonical,
            "c2lnbmF0dXJl".to_string(),
            "Y2VydA==".to_string(),
        )
        .unwrap();

        let expected = format!(
            concat!(
                r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">{}"#,
                r#"<SignatureValue>c2lnbmF0dXJl</SignatureValue>"#,
                r#"<KeyInfo><X509Data><X509Certificate>Y2VydA==</X509Certificate></X509Data></KeyInfo>"#,
                r#"</Signature>"#
            ),
            canonical
        );
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_signature_element_must_embed_signed_info() {
        let signed_info = build_signed_info("x1", "ZGlnZXN0".to_string());
        let result = build_signature_element(
            signed_info,
            "<SignedInfo>other</SignedInfo>",
            "c2ln".to_string(),
            "Y2VydA==".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_require_element_id() {
        let signer = XmlSigner::new(SignerOptions {
            require_element_id: true,
            ..SignerOptions::default()
        });
        let result = signer.resolve_element_id(r#"<Doc Id="a"/>"#, None);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(signer.resolve_element_id("<Doc/>", Some("b")).unwrap(), "b");
    }

    #[test]
    fn test_implicit_element_id() {
        let signer = XmlSigner::default();
        assert_eq!(
            signer.resolve_element_id(r#"<Doc><A Id="a"/><B Id="b"/></Doc>"#, Some(" ")).unwrap(),
            "a"
        );
        assert!(matches!(
            signer.resolve_element_id("<Doc/>", None),
            Err(Error::Locate(LocateError::ElementNotFound(None)))
        ));
    }

    #[test]
    fn test_validate_input() {
        let bundle = CertificateBundle::new(vec![1], "secret");
        assert!(matches!(
            validate_input("  ", &bundle),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validate_input("<a/>", &CertificateBundle::new(Vec::new(), "secret")),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validate_input("<a/>", &CertificateBundle::new(vec![1], " ")),
            Err(Error::InvalidInput(_))
        ));
        assert!(validate_input("<a/>", &bundle).is_ok());
    }
}
