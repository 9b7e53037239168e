use chrono::{DateTime, Utc};
use serde::Serialize;
use x509_parser::prelude::*;

use super::CertificateError;

/// Certificates closer than this to their expiry are reported in the logs.
const EXPIRY_WARNING_DAYS: i64 = 30;

/// Metadata of an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    /// Serial number in decimal notation
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl CertificateInfo {
    /// Extract the metadata from a DER-encoded certificate
    pub fn from_der(der: impl AsRef<[u8]>) -> Result<Self, CertificateError> {
        let der_bytes = der.as_ref();
        let (_, cert) = X509Certificate::from_der(der_bytes).map_err(X509Error::from)?;

        let validity = cert.validity();
        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial_number: cert.tbs_certificate.serial.to_string(),
            not_before: to_datetime(&validity.not_before)?,
            not_after: to_datetime(&validity.not_after)?,
            der: der_bytes.to_vec(),
        })
    }

    /// Check the validity window against the current time.
    pub fn validate(&self) -> Result<(), CertificateError> {
        self.validate_at(Utc::now())
    }

    /// Check the validity window against the given instant.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), CertificateError> {
        if now < self.not_before {
            return Err(CertificateError::NotYetValid {
                not_before: self.not_before,
            });
        }
        if now > self.not_after {
            return Err(CertificateError::Expired {
                not_after: self.not_after,
            });
        }

        let days_left = self.days_until_expiry(now);
        if days_left < EXPIRY_WARNING_DAYS {
            tracing::warn!(
                subject = %self.subject,
                "Certificate expires in {days_left} days"
            );
        }
        Ok(())
    }

    /// Whole days between `now` and the end of the validity window, negative once expired.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_days()
    }

    /// Whether subject and issuer are the same distinguished name
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }
}

fn to_datetime(time: &ASN1Time) -> Result<DateTime<Utc>, CertificateError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| CertificateError::Invalid(format!("validity time out of range: {time}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::cert_utils::{CertificateSpec, generate_self_signed};
    use chrono::Duration;

    fn info_for(spec: &CertificateSpec) -> CertificateInfo {
        let (cert, _) = generate_self_signed(spec).unwrap();
        CertificateInfo::from_der(cert.to_der().unwrap()).unwrap()
    }

    #[test]
    fn test_certificate_metadata() {
        let info = info_for(&CertificateSpec::new("Signer Test"));

        assert!(info.subject.contains("CN=Signer Test"));
        assert!(info.is_self_signed());
        assert!(!info.serial_number.is_empty());
        assert!(info.serial_number.chars().all(|c| c.is_ascii_digit()));
        assert!(info.not_before < info.not_after);
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_expired_certificate() {
        let now = Utc::now();
        let spec = CertificateSpec::new("Expired")
            .valid_between(now - Duration::days(30), now - Duration::days(1));
        let info = info_for(&spec);

        assert!(matches!(
            info.validate(),
            Err(CertificateError::Expired { .. })
        ));
        assert!(info.days_until_expiry(now) < 0);
    }

    #[test]
    fn test_not_yet_valid_certificate() {
        let now = Utc::now();
        let spec = CertificateSpec::new("Future")
            .valid_between(now + Duration::days(2), now + Duration::days(30));
        let info = info_for(&spec);

        assert!(matches!(
            info.validate(),
            Err(CertificateError::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_validate_at_window_edges() {
        let info = info_for(&CertificateSpec::new("Window"));

        assert!(info.validate_at(info.not_before).is_ok());
        assert!(info.validate_at(info.not_after).is_ok());
        assert!(
            info.validate_at(info.not_after + Duration::seconds(1))
                .is_err()
        );
        assert!(
            info.validate_at(info.not_before - Duration::seconds(1))
                .is_err()
        );
    }

    #[test]
    fn test_invalid_der() {
        let result = CertificateInfo::from_der(b"not a certificate");
        assert!(matches!(result, Err(CertificateError::X509(_))));
    }
}
