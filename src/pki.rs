mod archive;
pub mod cert_utils;
mod certificate;
mod errors;

pub use archive::{CertificateBundle, KeyMaterial, load_key_material};
pub use certificate::CertificateInfo;
pub use errors::CertificateError;
