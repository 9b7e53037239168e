use crate::crypto;
use crate::pki::CertificateError;
use thiserror::Error;

/// Errors raised while looking up the element to sign.
#[derive(Debug, Error)]
pub enum LocateError {
    /// No element carries the requested Id; `None` when the document has no Id at all.
    #[error("{}", match .0 {
        Some(id) => format!("Element with ID '{id}' not found"),
        None => "No element with an Id attribute found in the document".to_string(),
    })]
    ElementNotFound(Option<String>),

    #[error("Unable to extract the complete content of element '{0}'")]
    IncompleteElement(String),

    #[error("XML processing error: {0}")]
    Xml(String),

    #[error("Invalid element pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors raised while producing the signature value.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Unsupported key type: {0}, the private key must be RSA")]
    UnsupportedKeyType(&'static str),

    #[error("Signing failed: {0}")]
    Crypto(crypto::Error),
}

impl From<crypto::Error> for SigningError {
    fn from(err: crypto::Error) -> Self {
        match err {
            crypto::Error::UnsupportedKeyType(kind) => SigningError::UnsupportedKeyType(kind),
            other => SigningError::Crypto(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("Unable to determine where to insert the signature: {0}")]
    InsertionPointNotFound(String),

    #[error("XML serialization error: {0}")]
    Serialization(#[from] quick_xml::SeError),
}

impl From<crypto::Error> for Error {
    fn from(err: crypto::Error) -> Self {
        Error::Signing(err.into())
    }
}
