//! Self-signed certificates and PKCS#12 archives for development and tests.

use chrono::{DateTime, Duration, Utc};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder, X509Ref};

/// Friendly name stored next to the key in generated archives.
const ARCHIVE_FRIENDLY_NAME: &str = "xml-signer";

/// Key algorithm of a generated certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA with the given modulus size in bits
    Rsa(u32),
    /// ECDSA on the NIST P-256 curve
    EcP256,
}

/// Parameters for a generated self-signed certificate
#[derive(Debug, Clone)]
pub struct CertificateSpec {
    pub common_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key_kind: KeyKind,
}

impl CertificateSpec {
    /// RSA-2048 certificate, valid from yesterday for one year
    pub fn new(common_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            common_name: common_name.into(),
            not_before: now - Duration::days(1),
            not_after: now + Duration::days(365),
            key_kind: KeyKind::Rsa(2048),
        }
    }

    pub fn valid_between(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn key_kind(mut self, key_kind: KeyKind) -> Self {
        self.key_kind = key_kind;
        self
    }
}

/// Generate a self-signed certificate and its private key
pub fn generate_self_signed(spec: &CertificateSpec) -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = generate_key(spec.key_kind)?;

    let mut cert_builder = X509Builder::new()?;
    cert_builder.set_version(2)?;

    let serial_number = generate_serial_number()?;
    cert_builder.set_serial_number(&serial_number)?;

    let subject_name = create_x509_name(&[
        ("C", "BR"),
        ("O", "XML Signer Development"),
        ("CN", &spec.common_name),
    ])?;
    cert_builder.set_subject_name(&subject_name)?;
    cert_builder.set_issuer_name(&subject_name)?;
    cert_builder.set_pubkey(&key_pair)?;

    let not_before = Asn1Time::from_unix(spec.not_before.timestamp())?;
    let not_after = Asn1Time::from_unix(spec.not_after.timestamp())?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;

    cert_builder.append_extension(BasicConstraints::new().build()?)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .non_repudiation()
            .build()?,
    )?;

    cert_builder.sign(&key_pair, MessageDigest::sha256())?;

    Ok((cert_builder.build(), key_pair))
}

/// Pack a certificate and an optional private key into a PKCS#12 archive
pub fn build_archive(
    certificate: &X509Ref,
    private_key: Option<&PKeyRef<Private>>,
    passphrase: &str,
) -> Result<Vec<u8>, ErrorStack> {
    let mut builder = Pkcs12::builder();
    builder.name(ARCHIVE_FRIENDLY_NAME).cert(certificate);
    if let Some(key) = private_key {
        builder.pkey(key);
    }
    builder.build2(passphrase)?.to_der()
}

/// Generate a self-signed certificate and return it packed with its key as a PKCS#12 archive
pub fn generate_archive(spec: &CertificateSpec, passphrase: &str) -> Result<Vec<u8>, ErrorStack> {
    let (certificate, private_key) = generate_self_signed(spec)?;
    build_archive(&certificate, Some(&private_key), passphrase)
}

fn generate_key(kind: KeyKind) -> Result<PKey<Private>, ErrorStack> {
    match kind {
        KeyKind::Rsa(bits) => PKey::from_rsa(Rsa::generate(bits)?),
        KeyKind::EcP256 => {
            let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
            PKey::from_ec_key(EcKey::generate(&group)?)
        }
    }
}

fn generate_serial_number() -> Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

fn create_x509_name(entries: &[(&str, &str)]) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value)?;
    }
    Ok(name_builder.build())
}
