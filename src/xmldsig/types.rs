//! Data structures for XML signature processing

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::Error;
use crate::pki::CertificateBundle;

/// Generic XML element with algorithm attribute, used for several signature components
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmElement {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

impl AlgorithmElement {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
        }
    }
}

pub type CanonicalizationMethod = AlgorithmElement;
pub type SignatureMethod = AlgorithmElement;
pub type DigestMethod = AlgorithmElement;
pub type Transform = AlgorithmElement;

/// XML transforms container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transforms {
    #[serde(rename = "Transform")]
    pub transforms: Vec<Transform>,
}

/// XML reference element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    #[serde(rename = "@URI")]
    pub uri: String,
    #[serde(rename = "Transforms")]
    pub transforms: Transforms,
    #[serde(rename = "DigestMethod")]
    pub digest_method: DigestMethod,
    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

/// XML SignedInfo element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedInfo {
    #[serde(rename = "@xmlns", skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    #[serde(rename = "CanonicalizationMethod")]
    pub canonicalization_method: CanonicalizationMethod,
    #[serde(rename = "SignatureMethod")]
    pub signature_method: SignatureMethod,
    #[serde(rename = "Reference")]
    pub reference: Reference,
}

/// XML X509Data element
#[derive(Debug, Clone, Serialize)]
pub struct X509Data {
    #[serde(rename = "X509Certificate")]
    pub x509_certificate: String,
}

/// XML KeyInfo element
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    #[serde(rename = "X509Data")]
    pub x509_data: X509Data,
}

/// Complete XML Signature element
#[derive(Debug, Clone, Serialize)]
pub struct Signature {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "SignedInfo")]
    pub signed_info: SignedInfo,
    #[serde(rename = "SignatureValue")]
    pub signature_value: String,
    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}

/// Input of one signing call
#[derive(Debug, Clone)]
pub struct SignatureRequest {
    pub xml_content: String,
    pub certificate: CertificateBundle,
    /// Id of the element to sign; the first Id in the document when absent
    pub element_id: Option<String>,
    /// Closing tag the signature is inserted before
    pub signature_tag: Option<String>,
}

impl SignatureRequest {
    pub fn new(xml_content: impl Into<String>, certificate: CertificateBundle) -> Self {
        Self {
            xml_content: xml_content.into(),
            certificate,
            element_id: None,
            signature_tag: None,
        }
    }

    pub fn element_id(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    pub fn signature_tag(mut self, signature_tag: impl Into<String>) -> Self {
        self.signature_tag = Some(signature_tag.into());
        self
    }
}

/// Outcome of one signing call
#[derive(Debug, Serialize)]
pub struct SignatureResult {
    /// Signed document, empty when signing failed
    pub signed_xml: String,
    /// Document as received
    pub original_xml: String,
    pub success: bool,
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Error>,
    pub timestamp: DateTime<Utc>,
}

impl SignatureResult {
    pub fn succeeded(original_xml: impl Into<String>, signed_xml: String) -> Self {
        Self {
            signed_xml,
            original_xml: original_xml.into(),
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(original_xml: impl Into<String>, error: Error) -> Self {
        Self {
            signed_xml: String::new(),
            original_xml: original_xml.into(),
            success: false,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Signed document, or the error that stopped signing
    pub fn into_result(self) -> Result<String, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.signed_xml),
        }
    }
}

fn serialize_error<S: Serializer>(error: &Option<Error>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}
