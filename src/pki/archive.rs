use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{CertificateError, CertificateInfo};

/// A passphrase-protected PKCS#12 archive holding a private key and its certificate.
#[derive(Clone)]
pub struct CertificateBundle {
    archive: Vec<u8>,
    passphrase: SecretString,
}

impl CertificateBundle {
    /// Wrap archive bytes without decoding them.
    pub fn new(archive: impl Into<Vec<u8>>, passphrase: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            passphrase: SecretString::from(passphrase.into()),
        }
    }

    /// Wrap archive bytes after checking that they decode and hold a currently valid certificate.
    pub fn from_bytes(
        archive: impl Into<Vec<u8>>,
        passphrase: impl Into<String>,
    ) -> Result<Self, CertificateError> {
        let bundle = Self::new(archive, passphrase);
        bundle.load()?.info().validate()?;
        Ok(bundle)
    }

    /// Read an archive from disk, then check it like [`CertificateBundle::from_bytes`].
    pub fn from_path(
        path: impl AsRef<Path>,
        passphrase: impl Into<String>,
    ) -> Result<Self, CertificateError> {
        let path = path.as_ref();
        info!("Loading certificate archive from {}", path.display());

        let archive = fs::read(path).map_err(|source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(archive, passphrase)
    }

    /// Raw archive bytes
    pub fn archive(&self) -> &[u8] {
        &self.archive
    }

    /// Whether the archive holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Whether the passphrase is empty or only whitespace
    pub fn has_blank_passphrase(&self) -> bool {
        self.passphrase.expose_secret().trim().is_empty()
    }

    /// Decode the archive into its private key and leaf certificate.
    pub fn load(&self) -> Result<KeyMaterial, CertificateError> {
        load_key_material(&self.archive, self.passphrase.expose_secret())
    }

    /// Metadata of the leaf certificate, without any validity check.
    pub fn certificate_info(&self) -> Result<CertificateInfo, CertificateError> {
        Ok(self.load()?.info)
    }
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("archive_len", &self.archive.len())
            .finish_non_exhaustive()
    }
}

/// Private key and leaf certificate taken from an archive.
///
/// Lives for one signing call. The key is released on drop but not wiped.
pub struct KeyMaterial {
    private_key: PKey<Private>,
    certificate: X509,
    info: CertificateInfo,
}

impl KeyMaterial {
    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn info(&self) -> &CertificateInfo {
        &self.info
    }

    /// DER encoding of the leaf certificate
    pub fn certificate_der(&self) -> &[u8] {
        &self.info.der
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("subject", &self.info.subject)
            .field("serial_number", &self.info.serial_number)
            .finish_non_exhaustive()
    }
}

/// Decode a PKCS#12 archive into its private key and leaf certificate.
///
/// The leaf is the certificate paired with the key; when the archive has none,
/// the first additional certificate is taken. No chain is resolved.
pub fn load_key_material(archive: &[u8], passphrase: &str) -> Result<KeyMaterial, CertificateError> {
    debug!("Decoding certificate archive ({} bytes)", archive.len());

    let parsed = Pkcs12::from_der(archive)
        .and_then(|pkcs12| pkcs12.parse2(passphrase))
        .map_err(CertificateError::Decode)?;

    let private_key = parsed.pkey.ok_or(CertificateError::KeyNotFound)?;

    let certificate = match parsed.cert {
        Some(cert) => cert,
        None => parsed
            .ca
            .as_ref()
            .and_then(|extra| extra.iter().next())
            .map(|cert| cert.to_owned())
            .ok_or(CertificateError::CertificateNotFound)?,
    };

    let info = CertificateInfo::from_der(certificate.to_der()?)?;
    debug!(
        subject = %info.subject,
        serial_number = %info.serial_number,
        "Certificate archive decoded"
    );

    Ok(KeyMaterial {
        private_key,
        certificate,
        info,
    })
}
