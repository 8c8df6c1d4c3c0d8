// admin-revoker-rs/src/certificate.rs
//
// Decoding of stored DER certificates before they are handed to the
// registration authority.

use x509_parser::parse_x509_certificate;

use crate::error::RevokerError;

/// A certificate decoded from its stored DER bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    /// Serial number as lowercase hex, taken from the certificate itself
    pub serial: String,
    pub subject: String,
    /// Expiry as unix seconds
    pub not_after: i64,
    pub der: Vec<u8>,
}

impl ParsedCertificate {
    /// Decode a DER certificate stored under `stored_serial`
    pub fn from_der(stored_serial: &str, der: &[u8]) -> Result<Self, RevokerError> {
        let (rest, cert) = parse_x509_certificate(der).map_err(|e| {
            RevokerError::MalformedCertificate {
                serial: stored_serial.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !rest.is_empty() {
            return Err(RevokerError::MalformedCertificate {
                serial: stored_serial.to_string(),
                reason: format!("{} trailing bytes after certificate", rest.len()),
            });
        }

        let serial = cert
            .tbs_certificate
            .raw_serial()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();

        Ok(Self {
            serial,
            subject: cert.subject().to_string(),
            not_after: cert.validity().not_after.timestamp(),
            der: der.to_vec(),
        })
    }
}
