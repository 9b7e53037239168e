//! XML signature namespaces, algorithm URIs and element names

/// XML namespace URIs
pub mod ns {
    pub const XMLDSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
}

/// Algorithm URIs
pub mod algorithms {
    // Canonicalization algorithms
    pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

    // Signature algorithms
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    // Digest algorithms
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    // Transform algorithms
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

/// XML element names
pub const SIGNATURE_ELEMENT: &str = "Signature";
pub const SIGNED_INFO_ELEMENT: &str = "SignedInfo";
pub const SIGNATURE_VALUE_ELEMENT: &str = "SignatureValue";
pub const X509_CERTIFICATE_ELEMENT: &str = "X509Certificate";
pub const DIGEST_VALUE_ELEMENT: &str = "DigestValue";
pub const REFERENCE_ELEMENT: &str = "Reference";
pub const TRANSFORM_ELEMENT: &str = "Transform";
pub const SIGNATURE_METHOD_ELEMENT: &str = "SignatureMethod";
pub const CANONICALIZATION_METHOD_ELEMENT: &str = "CanonicalizationMethod";
pub const DIGEST_METHOD_ELEMENT: &str = "DigestMethod";

/// XML attribute names
pub const ALGORITHM_ATTRIBUTE: &str = "Algorithm";
pub const URI_ATTRIBUTE: &str = "URI";

/// Attribute names that identify a signable element, in lookup order
pub const ID_ATTRIBUTES: [&str; 2] = ["Id", "id"];
