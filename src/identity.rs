//! The CA certificate being installed and the key that identifies it in the
//! trust database.

use std::path::{Path, PathBuf};

use x509_parser::{parse_x509_certificate, pem::parse_x509_pem};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct CertificateRecord {
    der: Vec<u8>,
    subject: String,
    path: PathBuf,
}

impl CertificateRecord {
    /// Loads a PEM or DER encoded certificate from disk. The path is kept
    /// because the OS trust tools take the certificate by filename.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;

        let der = if bytes.starts_with(b"-----BEGIN") {
            let (_, pem) = parse_x509_pem(&bytes).map_err(|e| {
                Error::Certificate(format!("{}: invalid PEM: {}", path.display(), e))
            })?;
            pem.contents
        } else {
            bytes
        };

        Self::from_der(der, path)
    }

    pub fn from_der(der: Vec<u8>, path: impl Into<PathBuf>) -> Result<Self> {
        let subject = {
            let (_, cert) = parse_x509_certificate(&der)
                .map_err(|e| Error::Certificate(format!("invalid DER certificate: {}", e)))?;
            cert.subject().to_string()
        };

        Ok(Self {
            der,
            subject,
            path: path.into(),
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Human readable subject, e.g. `CN=Zen Personal CA, O=Zen`.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path as handed to the trust tools. Non-UTF-8 paths are refused
    /// rather than passed on altered.
    pub fn path_str(&self) -> Result<&str> {
        self.path.to_str().ok_or_else(|| {
            Error::Certificate(format!("{} is not valid UTF-8", self.path.display()))
        })
    }
}

/// DER encoding of the certificate's subject as an RDN sequence.
///
/// The trust database tags entries with exactly these bytes in their
/// `issuerName` field, so this is compared byte for byte and never
/// normalised.
pub fn canonical_issuer_key(record: &CertificateRecord) -> Result<Vec<u8>> {
    let (_, cert) = parse_x509_certificate(record.der())
        .map_err(|e| Error::Certificate(format!("invalid DER certificate: {}", e)))?;

    Ok(cert.subject().as_raw().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use tempdir::TempDir;

    #[test]
    fn test_key_is_subject_der() {
        let cert = testutil::ca_certificate("Zen Personal CA");
        let dir = TempDir::new("identity").unwrap();
        let pem = dir.path().join("ca.pem");
        std::fs::write(&pem, cert.to_pem().unwrap()).unwrap();

        let record = CertificateRecord::from_path(&pem).unwrap();
        let key = canonical_issuer_key(&record).unwrap();

        assert_eq!(key, cert.subject_name().to_der().unwrap());
        assert_eq!(key[0], 0x30);
        assert_eq!(record.path(), pem.as_path());
        assert!(record.subject().contains("CN=Zen Personal CA"));
    }

    #[test]
    fn test_der_file_matches_pem_file() {
        let cert = testutil::ca_certificate("Zen Personal CA");
        let dir = TempDir::new("identity").unwrap();
        let pem = dir.path().join("ca.pem");
        let der = dir.path().join("ca.cer");
        std::fs::write(&pem, cert.to_pem().unwrap()).unwrap();
        std::fs::write(&der, cert.to_der().unwrap()).unwrap();

        let from_pem = CertificateRecord::from_path(&pem).unwrap();
        let from_der = CertificateRecord::from_path(&der).unwrap();

        assert_eq!(from_pem.der(), from_der.der());
        assert_eq!(
            canonical_issuer_key(&from_pem).unwrap(),
            canonical_issuer_key(&from_der).unwrap()
        );
    }

    #[test]
    fn test_different_subjects_give_different_keys() {
        let a = testutil::record(&testutil::ca_certificate("Zen Personal CA"));
        let b = testutil::record(&testutil::ca_certificate("Zen Personal CB"));

        assert_ne!(
            canonical_issuer_key(&a).unwrap(),
            canonical_issuer_key(&b).unwrap()
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            CertificateRecord::from_der(vec![0x30, 0x03, 0x02, 0x01, 0x01], "bogus.cer"),
            Err(Error::Certificate(_))
        ));

        let dir = TempDir::new("identity").unwrap();
        let pem = dir.path().join("broken.pem");
        std::fs::write(&pem, "-----BEGIN CERTIFICATE-----\n!!!\n").unwrap();
        assert!(matches!(
            CertificateRecord::from_path(&pem),
            Err(Error::Certificate(_))
        ));
    }
}
