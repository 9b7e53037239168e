use crate::crypto::errors::{CryptoResult, Error};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use openssl::hash::MessageDigest;
use openssl::pkey::{HasPublic, Id, PKey, PKeyRef, Private, Public};
use openssl::rsa::Padding;
use openssl::sign::{Signer, Verifier};
use openssl::x509::X509Ref;
use std::fmt;

/// Represents an RSA PKCS#1 v1.5 signature
#[derive(Clone, PartialEq, Eq)]
pub struct RsaSignature {
    data: Vec<u8>,
}

impl RsaSignature {
    /// Create a new RSA signature from raw bytes
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Decode a signature from standard base64
    pub fn from_base64(encoded: impl AsRef<[u8]>) -> CryptoResult<Self> {
        Ok(Self::new(BASE64.decode(encoded)?))
    }

    /// Get the signature data as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Encode the signature as standard base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Get the signature length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if signature is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for RsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSignature")
            .field("size", &self.len())
            .field("base64", &self.to_base64())
            .finish()
    }
}

/// RSA private key wrapper
#[derive(Clone)]
pub struct RsaPrivateKey {
    key: PKey<Private>,
}

impl RsaPrivateKey {
    /// Wrap an OpenSSL private key, rejecting anything that is not RSA.
    pub fn from_pkey(key: PKey<Private>) -> CryptoResult<Self> {
        ensure_rsa(&key)?;
        Ok(Self { key })
    }

    /// Modulus size in bits
    pub fn bits(&self) -> u32 {
        self.key.bits()
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> CryptoResult<RsaPublicKey> {
        let key = PKey::public_key_from_der(&self.key.public_key_to_der()?)?;
        Ok(RsaPublicKey { key })
    }
}

// Key material must never end up in logs.
impl fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// RSA public key wrapper
#[derive(Debug, Clone)]
pub struct RsaPublicKey {
    key: PKey<Public>,
}

impl RsaPublicKey {
    /// Extract the RSA public key from an X.509 certificate
    pub fn from_certificate(certificate: &X509Ref) -> CryptoResult<Self> {
        let key = certificate.public_key()?;
        ensure_rsa(&key)?;
        Ok(Self { key })
    }
}

fn ensure_rsa<T: HasPublic>(key: &PKeyRef<T>) -> CryptoResult<()> {
    let id = key.id();
    if id == Id::RSA {
        return Ok(());
    }
    let name = if id == Id::EC {
        "EC"
    } else if id == Id::DSA {
        "DSA"
    } else {
        "unknown"
    };
    Err(Error::UnsupportedKeyType(name))
}

/// Sign data with RSASSA-PKCS1-v1_5 over its SHA-256 digest
pub fn sign(private_key: &RsaPrivateKey, data: impl AsRef<[u8]>) -> CryptoResult<RsaSignature> {
    let mut signer = Signer::new(MessageDigest::sha256(), &private_key.key)?;
    signer.set_rsa_padding(Padding::PKCS1)?;
    let signature_data = signer.sign_oneshot_to_vec(data.as_ref())?;
    Ok(RsaSignature::new(signature_data))
}

/// Verify an RSASSA-PKCS1-v1_5 SHA-256 signature
pub fn verify(
    public_key: &RsaPublicKey,
    data: impl AsRef<[u8]>,
    signature: &RsaSignature,
) -> CryptoResult<bool> {
    if signature.is_empty() {
        return Err(Error::Invalid("Signature is empty".to_string()));
    }

    let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key.key)?;
    verifier.set_rsa_padding(Padding::PKCS1)?;
    // OpenSSL reports a malformed signature as an error, treat it as a mismatch.
    Ok(verifier
        .verify_oneshot(signature.as_bytes(), data.as_ref())
        .unwrap_or(false))
}
