mod common;

use chrono::Utc;
use xml_signer::pki::{CertificateBundle, CertificateError, load_key_material};
use xml_signer::xmldsig::{Error, SignatureRequest, XmlSigner};

#[test]
fn test_load_archive_from_path() {
    let file = common::archive_file(&common::archive());

    let bundle = CertificateBundle::from_path(file.path(), common::PASSPHRASE).unwrap();
    let info = bundle.certificate_info().unwrap();

    assert!(info.subject.contains("CN=Integration Signer"));
    assert!(info.is_self_signed());
    assert!(info.not_before < Utc::now());
    assert!(info.not_after > Utc::now());
    assert!(info.serial_number.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_expired_archive_is_rejected_on_load() {
    let file = common::archive_file(&common::expired_archive());

    let result = CertificateBundle::from_path(file.path(), common::PASSPHRASE);
    assert!(matches!(result, Err(CertificateError::Expired { .. })));
}

#[test]
fn test_expired_archive_is_rejected_on_sign() {
    let bundle = CertificateBundle::new(common::expired_archive(), common::PASSPHRASE);
    let result = XmlSigner::default().sign(&SignatureRequest::new(common::INVOICE, bundle).element_id("hdr"));

    assert!(!result.success);
    assert!(result.signed_xml.is_empty());
    assert!(matches!(
        result.error,
        Some(Error::Certificate(CertificateError::Expired { .. }))
    ));
}

#[test]
fn test_expired_certificate_metadata_is_readable() {
    let bundle = CertificateBundle::new(common::expired_archive(), common::PASSPHRASE);
    let info = XmlSigner::default().certificate_info(&bundle).unwrap();

    assert!(info.subject.contains("CN=Expired Signer"));
    assert!(info.not_after < Utc::now());

    let json = serde_json::to_value(&info).unwrap();
    assert!(json.get("der").is_none());
    assert!(json["subject"].as_str().unwrap().contains("Expired Signer"));
}

#[test]
fn test_wrong_passphrase() {
    let result = load_key_material(&common::archive(), "not-the-passphrase");
    assert!(matches!(result, Err(CertificateError::Decode(_))));

    let result = CertificateBundle::from_bytes(common::archive(), "not-the-passphrase");
    assert!(matches!(result, Err(CertificateError::Decode(_))));
}
