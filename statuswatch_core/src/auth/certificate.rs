//! Client certificate decoding and chain verification

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use tracing::debug;

use super::Denial;

const PEM_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Verifies client certificates against a single configured root, requiring
/// the client-authentication extended key usage.
#[derive(Clone)]
pub struct RootVerifier {
    verifier: Arc<dyn ClientCertVerifier>,
}

impl fmt::Debug for RootVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootVerifier").finish_non_exhaustive()
    }
}

impl RootVerifier {
    /// Reads the root certificate (PEM or DER) once.
    ///
    /// Errors are the messages served with a 500 while the configuration
    /// stays in place.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let data = std::fs::read(path)
            .map_err(|e| format!("Root certificate cannot be read: {}", e))?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, String> {
        let root = if contains_pem_marker(&data) {
            let mut reader = data.as_slice();
            let first = rustls_pemfile::certs(&mut reader).next();
            match first {
                Some(Ok(cert)) => cert,
                _ => return Err("Root certificate cannot be used".to_string()),
            }
        } else {
            CertificateDer::from(data)
        };

        let mut roots = RootCertStore::empty();
        roots
            .add(root)
            .map_err(|_| "Root certificate cannot be used".to_string())?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .map_err(|_| "Root certificate cannot be used".to_string())?;

        Ok(Self { verifier })
    }

    pub fn verify(&self, certificate: &CertificateDer<'_>) -> Result<(), Denial> {
        self.verifier
            .verify_client_cert(certificate, &[], UnixTime::now())
            .map(|_| ())
            .map_err(|e| {
                debug!(error = %e, "client certificate failed verification");
                Denial::new(401, "Not authorized")
            })
    }
}

/// Decodes the base64 DER certificate a TLS-terminating proxy forwarded.
pub fn decode_certificate(encoded: &str) -> Result<CertificateDer<'static>, Denial> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(Denial::new(400, "Client certificate not available"));
    }

    STANDARD
        .decode(encoded.as_bytes())
        .map(CertificateDer::from)
        .map_err(|_| Denial::new(400, "Client certificate not available"))
}

/// Parses the certificate and returns its subject common name, if any.
pub fn common_name(certificate: &CertificateDer<'_>) -> Result<Option<String>, Denial> {
    let (_, parsed) = x509_parser::parse_x509_certificate(certificate.as_ref())
        .map_err(|_| Denial::new(400, "Client certificate not valid"))?;

    let name = parsed
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);

    Ok(name)
}

fn contains_pem_marker(data: &[u8]) -> bool {
    data.windows(PEM_MARKER.len()).any(|window| window == PEM_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_empty_and_garbage() {
        assert_eq!(decode_certificate("").unwrap_err().code, 400);
        assert_eq!(decode_certificate("   ").unwrap_err().code, 400);

        let denial = decode_certificate("%%% not base64 %%%").unwrap_err();
        assert_eq!(denial, Denial::new(400, "Client certificate not available"));
    }

    #[test]
    fn test_common_name_rejects_non_certificates() {
        let bytes = CertificateDer::from(b"definitely not DER".to_vec());
        let denial = common_name(&bytes).unwrap_err();
        assert_eq!(denial, Denial::new(400, "Client certificate not valid"));
    }

    #[test]
    fn test_root_from_garbage_is_unusable() {
        let err = RootVerifier::from_bytes(b"garbage".to_vec()).unwrap_err();
        assert_eq!(err, "Root certificate cannot be used");

        let err = RootVerifier::from_bytes(
            b"-----BEGIN CERTIFICATE-----\n!!!\n-----END CERTIFICATE-----\n".to_vec(),
        )
        .unwrap_err();
        assert_eq!(err, "Root certificate cannot be used");
    }

    #[test]
    fn test_root_file_missing() {
        let err = RootVerifier::from_file(Path::new("/nonexistent/root.pem")).unwrap_err();
        assert!(err.starts_with("Root certificate cannot be read"));
    }
}
