//! Settings for reaching the classifier
//!
//! Values come from, in increasing priority: built-in defaults, the
//! `ncedit.toml` settings file, then `NCEDIT_*` environment variables and
//! command line flags (clap merges those two).

use crate::cli::ConnectionArgs;
use crate::paths;
use crate::runner::DEFAULT_DEPLOY_COMMAND;
use anyhow::{Context, Result};
use classifier::{CLASSIFIER_PORT, DEFAULT_WAIT, PUPPET_PORT, TlsFiles};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default puppet ssl directory
pub const DEFAULT_SSL_DIR: &str = "/etc/puppetlabs/puppet/ssl";

/// Contents of `ncedit.toml`; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub hostname: Option<String>,
    pub classifier_port: Option<u16>,
    pub puppet_port: Option<u16>,
    pub ssl_dir: Option<String>,
    pub ca_cert: Option<String>,
    pub cert: Option<String>,
    pub private_key: Option<String>,
    pub wait_timeout_secs: Option<u64>,
    pub settle_secs: Option<u64>,
    pub deploy_command: Option<String>,
}

impl FileSettings {
    /// Load settings from `path`, or from the default location
    ///
    /// A missing default file means defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (paths::config_file()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok((Self::default(), None));
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok((settings, Some(path)))
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Host name; must match the classifier's certificate
    pub hostname: String,
    pub classifier_port: u16,
    pub puppet_port: u16,
    pub ssl_dir: PathBuf,
    pub tls: TlsFiles,
    /// How long to wait for the classifier port to open
    pub wait_timeout: Duration,
    /// Pause after a batch fast-path deploy
    pub settle: Duration,
    pub deploy_command: String,
    /// Settings file that was read, if any
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Load the settings file and apply command line overrides
    pub fn load(config: Option<&Path>, cli: &ConnectionArgs) -> Result<Self> {
        let (file, source) = FileSettings::load(config)?;
        let mut settings = Self::resolve(file, cli, crate::runner::facter_fqdn)?;
        settings.source = source;
        Ok(settings)
    }

    /// Merge file settings with overrides
    ///
    /// `detect_host` is only called when no hostname is configured.
    pub fn resolve(
        file: FileSettings,
        cli: &ConnectionArgs,
        detect_host: impl FnOnce() -> Result<String>,
    ) -> Result<Self> {
        let hostname = match cli.hostname.clone().or(file.hostname) {
            Some(host) => host.to_lowercase(),
            None => detect_host()?,
        };

        let ssl_dir = cli
            .ssl_dir
            .clone()
            .or_else(|| file.ssl_dir.as_deref().map(paths::expand))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SSL_DIR));

        let mut tls = TlsFiles::from_ssl_dir(&ssl_dir, &hostname);
        if let Some(ca_cert) = file.ca_cert.as_deref() {
            tls.ca_cert = paths::expand(ca_cert);
        }
        if let Some(cert) = file.cert.as_deref() {
            tls.cert = paths::expand(cert);
        }
        if let Some(private_key) = file.private_key.as_deref() {
            tls.private_key = paths::expand(private_key);
        }

        Ok(Self {
            hostname,
            classifier_port: cli
                .classifier_port
                .or(file.classifier_port)
                .unwrap_or(CLASSIFIER_PORT),
            puppet_port: cli.puppet_port.or(file.puppet_port).unwrap_or(PUPPET_PORT),
            ssl_dir,
            tls,
            wait_timeout: cli
                .wait_timeout
                .or(file.wait_timeout_secs)
                .map_or(DEFAULT_WAIT, Duration::from_secs),
            settle: file
                .settle_secs
                .map_or(reconcile::DEFAULT_SETTLE, Duration::from_secs),
            deploy_command: file
                .deploy_command
                .unwrap_or_else(|| DEFAULT_DEPLOY_COMMAND.to_string()),
            source: None,
        })
    }
}
