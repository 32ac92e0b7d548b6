//! Client-certificate TLS setup.
//!
//! The classifier only accepts clients presenting a certificate on its
//! whitelist. On the master the agent's own certificate is whitelisted, so
//! the default file locations are derived from the puppet ssl directory and
//! the host's certificate name.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ureq::tls::{Certificate, ClientCert, PrivateKey, RootCerts, TlsConfig};

/// PEM files used to authenticate against the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// CA certificate that signed the server certificate.
    pub ca_cert: PathBuf,
    /// Client certificate.
    pub cert: PathBuf,
    /// Private key of the client certificate.
    pub private_key: PathBuf,
}

impl TlsFiles {
    /// Standard puppet layout under `ssl_dir` for `certname`.
    pub fn from_ssl_dir(ssl_dir: &Path, certname: &str) -> Self {
        Self {
            ca_cert: ssl_dir.join("ca").join("ca_crt.pem"),
            cert: ssl_dir.join("certs").join(format!("{certname}.pem")),
            private_key: ssl_dir.join("private_keys").join(format!("{certname}.pem")),
        }
    }

    /// Load the PEM files and build a TLS configuration trusting only the CA.
    pub fn load(&self) -> Result<TlsConfig> {
        let ca = load_certificate(&self.ca_cert)?;
        let cert = load_certificate(&self.cert)?;
        let key = load_private_key(&self.private_key)?;

        Ok(TlsConfig::builder()
            .root_certs(RootCerts::Specific(Arc::new(vec![ca])))
            .client_cert(Some(ClientCert::new_with_certs(&[cert], key)))
            .build())
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    log::debug!("reading {}", path.display());
    fs::read(path).map_err(|e| Error::io(path, e))
}

fn load_certificate(path: &Path) -> Result<Certificate<'static>> {
    let pem = read_pem(path)?;
    Certificate::from_pem(&pem).map_err(|e| Error::Certificate {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn load_private_key(path: &Path) -> Result<PrivateKey<'static>> {
    let pem = read_pem(path)?;
    PrivateKey::from_pem(&pem).map_err(|e| Error::Certificate {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
