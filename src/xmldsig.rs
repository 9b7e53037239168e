//! Enveloped XML digital signatures (XMLDSIG).
//!
//! [`XmlSigner`] runs the whole pipeline: the PKCS#12 archive is decoded and its
//! certificate checked, the element carrying the requested `Id` is located,
//! stripped of earlier signatures, canonicalized and digested with SHA-256. The
//! resulting SignedInfo is canonicalized, signed with RSA PKCS#1 v1.5 and wrapped
//! into a `Signature` element that is spliced into the document.
//! [`XmlSignatureVerifier`] checks documents produced that way.

pub mod constants;
mod error;
mod injector;
mod locator;
mod signer;
mod transforms;
mod types;
mod verifier;

pub use error::{Error, LocateError, SigningError};
pub use injector::insert_signature;
pub use locator::{ElementLocator, EventLocator, LocatedElement, PatternLocator};
pub use signer::{SignerOptions, XmlSigner, build_signature_element, build_signed_info, to_canonical_xml};
pub use transforms::{apply_transforms, canonicalize, digest_value, normalize_document, remove_signatures};
pub use types::*;
pub use verifier::{Verification, XmlSignatureVerifier};

pub type Result<T> = std::result::Result<T, Error>;
