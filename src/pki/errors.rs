use chrono::{DateTime, Utc};
use openssl::error::ErrorStack;
use std::path::PathBuf;
use thiserror::Error;
use x509_parser::error::X509Error;

/// Errors raised while loading or validating a certificate archive.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The archive could not be decoded: corrupt data or wrong passphrase.
    #[error("Failed to decode certificate archive: {0}")]
    Decode(#[source] ErrorStack),

    #[error("Private key not found in certificate archive")]
    KeyNotFound,

    #[error("Certificate not found in certificate archive")]
    CertificateNotFound,

    #[error("Certificate is not yet valid, valid from {not_before}")]
    NotYetValid { not_before: DateTime<Utc> },

    #[error("Certificate expired on {not_after}")]
    Expired { not_after: DateTime<Utc> },

    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),

    #[error("Invalid certificate: {0}")]
    Invalid(String),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    #[error("Failed to read certificate archive {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
