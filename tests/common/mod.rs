#![allow(dead_code)]

use chrono::{Duration, Utc};
use regex::Regex;
use std::io::Write;
use tempfile::NamedTempFile;
use xml_signer::pki::{
    CertificateBundle,
    cert_utils::{CertificateSpec, generate_archive},
};

pub const PASSPHRASE: &str = "integration-secret";

pub const INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:example:invoice">
    <Header Id="hdr">
        <Number>2024-0042</Number>
    </Header>
    <Lines Id="lines">
        <Line sku="A-1">
            <Quantity>2</Quantity>
        </Line>
    </Lines>
</Invoice>
"#;

// Archive for a freshly generated RSA certificate valid from yesterday for a year
pub fn archive() -> Vec<u8> {
    generate_archive(&CertificateSpec::new("Integration Signer"), PASSPHRASE)
        .expect("failed to generate archive")
}

pub fn bundle() -> CertificateBundle {
    CertificateBundle::new(archive(), PASSPHRASE)
}

pub fn expired_archive() -> Vec<u8> {
    let now = Utc::now();
    let spec = CertificateSpec::new("Expired Signer")
        .valid_between(now - Duration::days(30), now - Duration::days(2));
    generate_archive(&spec, PASSPHRASE).expect("failed to generate archive")
}

// Writes the archive to a temporary file that lives as long as the handle
pub fn archive_file(archive: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(archive).expect("failed to write archive");
    file
}

pub fn element_text(xml: &str, element: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"<{element}[^>]*>([^<]*)</{element}>")).ok()?;
    pattern
        .captures(xml)
        .map(|captures| captures[1].to_string())
}
