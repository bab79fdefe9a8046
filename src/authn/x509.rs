//! Client certificate authentication.
//!
//! The leaf certificate of the TLS peer must be signed directly by one of the
//! CAs in the configured bundle, be within its validity window and, if it
//! restricts its extended key usage, allow client authentication. The
//! subject's Common Name becomes the user name and every Organization becomes
//! a group.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;
use x509_parser::prelude::*;

use super::Authenticator;
use crate::config::X509Config;
use crate::error::{AuthnError, ConfigError};
use crate::identity::Identity;
use crate::request::{PeerCertificates, RequestView};

/// Authenticates callers by their TLS client certificate.
///
/// Reads the [`PeerCertificates`] extension of the request. Requests without
/// one are left unauthenticated for the next authenticator to try.
pub struct X509Authenticator {
    /// DER-encoded CA certificates
    roots: Vec<Vec<u8>>,
}

impl X509Authenticator {
    /// Loads the CA bundle named by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, and the errors of
    /// [`from_pem`](Self::from_pem) otherwise.
    pub fn from_config(config: &X509Config) -> Result<Self, ConfigError> {
        let path = &config.client_ca_file;
        let bundle = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let authenticator = Self::from_pem(&bundle)?;
        debug!(
            path = %path.display(),
            cas = authenticator.roots.len(),
            "loaded client CA bundle"
        );
        Ok(authenticator)
    }

    /// Builds an authenticator from a PEM bundle of CA certificates.
    ///
    /// Blocks other than `CERTIFICATE` are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidCaBundle` if the PEM or a certificate does
    /// not decode, and `ConfigError::EmptyCaBundle` if no certificate is found.
    pub fn from_pem(bundle: &str) -> Result<Self, ConfigError> {
        let blocks = ::pem::parse_many(bundle)
            .map_err(|e| ConfigError::InvalidCaBundle(format!("failed to parse PEM: {}", e)))?;

        let mut roots = Vec::new();
        for block in blocks.iter().filter(|b| b.tag() == "CERTIFICATE") {
            X509Certificate::from_der(block.contents()).map_err(|e| {
                ConfigError::InvalidCaBundle(format!("failed to parse CA certificate: {}", e))
            })?;
            roots.push(block.contents().to_vec());
        }

        if roots.is_empty() {
            return Err(ConfigError::EmptyCaBundle);
        }
        Ok(Self { roots })
    }

    /// Returns the number of CA certificates in the bundle.
    pub fn ca_count(&self) -> usize {
        self.roots.len()
    }

    /// Verifies a DER-encoded leaf certificate and extracts its identity.
    ///
    /// Returns `Ok(None)` for a valid certificate without a Common Name.
    ///
    /// # Errors
    ///
    /// Returns `AuthnError::InvalidCertificate` if the certificate does not
    /// parse, is not signed by a configured CA, is outside its validity
    /// window, or has an extended key usage without `clientAuth`.
    pub fn verify(&self, leaf: &[u8]) -> Result<Option<Identity>, AuthnError> {
        let (_, cert) = X509Certificate::from_der(leaf).map_err(|e| {
            AuthnError::InvalidCertificate(format!("failed to parse client certificate: {}", e))
        })?;

        if !self.is_signed_by_root(&cert) {
            return Err(AuthnError::InvalidCertificate(
                "signature verification failed".into(),
            ));
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        if now < cert.validity().not_before.timestamp() {
            return Err(AuthnError::InvalidCertificate(
                "certificate not yet valid".into(),
            ));
        }
        if now > cert.validity().not_after.timestamp() {
            return Err(AuthnError::InvalidCertificate("certificate expired".into()));
        }

        let usage = cert.extended_key_usage().map_err(|e| {
            AuthnError::InvalidCertificate(format!("invalid extended key usage: {}", e))
        })?;
        if let Some(usage) = usage {
            if !usage.value.client_auth && !usage.value.any {
                return Err(AuthnError::InvalidCertificate(
                    "certificate is not valid for client authentication".into(),
                ));
            }
        }

        let subject = cert.subject();
        let Some(name) = subject
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .filter(|cn| !cn.is_empty())
        else {
            return Ok(None);
        };

        let groups: Vec<String> = subject
            .iter_organization()
            .filter_map(|o| o.as_str().ok())
            .map(str::to_string)
            .collect();

        debug!(user = %name, groups = groups.len(), "verified client certificate");
        Ok(Some(Identity::new(name).with_groups(groups)))
    }

    fn is_signed_by_root(&self, cert: &X509Certificate<'_>) -> bool {
        self.roots.iter().any(|root| match X509Certificate::from_der(root) {
            Ok((_, ca)) => cert.verify_signature(Some(ca.public_key())).is_ok(),
            Err(_) => false,
        })
    }
}

impl std::fmt::Debug for X509Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X509Authenticator")
            .field("cas", &self.roots.len())
            .finish()
    }
}

#[async_trait]
impl Authenticator for X509Authenticator {
    async fn authenticate(&self, req: &RequestView<'_>) -> Result<Option<Identity>, AuthnError> {
        match req.peer_certificates().and_then(PeerCertificates::leaf) {
            Some(leaf) => self.verify(leaf),
            None => Ok(None),
        }
    }
}
