//! # classifier
//!
//! Blocking HTTPS client for the node classifier.
//!
//! This crate provides:
//! - [`HttpClassifier`], the live [`reconcile::ClassifierService`]
//! - Client-certificate TLS setup from the puppet ssl directory ([`TlsFiles`])
//! - Class refresh calls (environment cache flush, update-classes)
//! - A liveness wait for a classifier that is still starting ([`wait_for_port`])
//!
//! ## Example
//!
//! ```no_run
//! use classifier::{HttpClassifier, TlsFiles, wait_for_port, DEFAULT_WAIT, POLL_INTERVAL};
//! use std::path::Path;
//!
//! let host = "master.example.com";
//! wait_for_port(host, 4433, DEFAULT_WAIT, POLL_INTERVAL, |_| {}).expect("classifier down");
//!
//! let tls = TlsFiles::from_ssl_dir(Path::new("/etc/puppetlabs/puppet/ssl"), host);
//! let client = HttpClassifier::new(host, 4433, 8140, &tls).expect("bad certificates");
//! client.refresh_classes().expect("refresh failed");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod tls;
pub mod wait;

pub use client::{CLASSIFIER_PORT, GroupSummary, HttpClassifier, PUPPET_PORT};
pub use error::{Error, ErrorCategory, Result};
pub use tls::TlsFiles;
pub use wait::{DEFAULT_WAIT, POLL_INTERVAL, wait_for_port};
