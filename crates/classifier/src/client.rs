//! HTTPS client for the classifier API.
//!
//! This module provides [`HttpClassifier`], the live implementation of
//! [`reconcile::ClassifierService`], plus the two calls used to make the
//! classifier pick up newly deployed classes.
//!
//! # Endpoints
//!
//! | Call | Method and path |
//! |------|-----------------|
//! | list groups | `GET {api}/v1/groups` |
//! | create group | `POST {api}/v1/groups` |
//! | fetch group | `GET {api}/v1/groups/{id}` |
//! | update group | `POST {api}/v1/groups/{id}` |
//! | refresh classes | `POST {api}/v1/update-classes` |
//! | flush environment cache | `DELETE {puppet}/puppet-admin-api/v1/environment-cache` |

use crate::error::Result;
use crate::tls::TlsFiles;
use reconcile::{ClassifierService, GroupDelta, GroupRecord, NewGroup};
use serde::Deserialize;
use std::time::Duration;

/// Default classifier port.
pub const CLASSIFIER_PORT: u16 = 4433;

/// Default puppet server port.
pub const PUPPET_PORT: u16 = 8140;

/// Upper bound on any single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The fields of a listed group needed to resolve names to ids.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupSummary {
    /// Group id.
    pub id: String,
    /// Group name.
    pub name: String,
}

/// Classifier client.
///
/// # Example
///
/// ```no_run
/// use classifier::{HttpClassifier, TlsFiles};
/// use reconcile::ClassifierService;
/// use std::path::Path;
///
/// let tls = TlsFiles::from_ssl_dir(Path::new("/etc/puppetlabs/puppet/ssl"), "master.example.com");
/// let client = HttpClassifier::new("master.example.com", 4433, 8140, &tls).unwrap();
/// let id = client.group_id("All Nodes").unwrap();
/// ```
pub struct HttpClassifier {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Classifier API base URL.
    api_base: String,
    /// Puppet server base URL.
    puppet_base: String,
}

impl HttpClassifier {
    /// Create a client for `host` authenticating with `tls`.
    ///
    /// `host` must match the name on the server certificate, so `localhost`
    /// only works if the certificate says so.
    pub fn new(host: &str, classifier_port: u16, puppet_port: u16, tls: &TlsFiles) -> Result<Self> {
        let config = ureq::Agent::config_builder()
            .tls_config(tls.load()?)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .max_redirects(0)
            .build();
        Ok(Self::with_agent(
            ureq::Agent::new_with_config(config),
            format!("https://{host}:{classifier_port}/classifier-api"),
            format!("https://{host}:{puppet_port}"),
        ))
    }

    /// Create a client from a prepared agent and base URLs.
    #[must_use]
    pub fn with_agent(
        agent: ureq::Agent,
        api_base: impl Into<String>,
        puppet_base: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            api_base: api_base.into(),
            puppet_base: puppet_base.into(),
        }
    }

    /// Get the classifier API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the puppet server base URL.
    #[must_use]
    pub fn puppet_base(&self) -> &str {
        &self.puppet_base
    }

    fn groups_url(&self) -> String {
        format!("{}/v1/groups", self.api_base)
    }

    fn group_url(&self, id: &str) -> String {
        format!("{}/v1/groups/{}", self.api_base, id)
    }

    fn update_classes_url(&self) -> String {
        format!("{}/v1/update-classes", self.api_base)
    }

    fn environment_cache_url(&self) -> String {
        format!("{}/puppet-admin-api/v1/environment-cache", self.puppet_base)
    }

    /// List every group.
    pub fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        let url = self.groups_url();
        log::debug!("GET {url}");
        let groups: Vec<GroupSummary> = self.agent.get(&url).call()?.body_mut().read_json()?;
        Ok(groups)
    }

    fn find_group_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .list_groups()?
            .into_iter()
            .find(|group| group.name == name)
            .map(|group| group.id))
    }

    fn post_new_group(&self, group: &NewGroup) -> Result<()> {
        let url = self.groups_url();
        log::debug!("POST {url} ({})", group.name);
        self.agent.post(&url).send_json(group)?;
        Ok(())
    }

    fn get_group(&self, id: &str) -> Result<GroupRecord> {
        let url = self.group_url(id);
        log::debug!("GET {url}");
        let group: GroupRecord = self.agent.get(&url).call()?.body_mut().read_json()?;
        Ok(group)
    }

    fn post_delta(&self, delta: &GroupDelta) -> Result<()> {
        let url = self.group_url(&delta.id);
        log::debug!("POST {url}");
        self.agent.post(&url).send_json(delta)?;
        Ok(())
    }

    /// Ask the classifier to re-read the classes available in each environment.
    pub fn update_classes(&self) -> Result<()> {
        let url = self.update_classes_url();
        log::debug!("POST {url}");
        self.agent.post(&url).send_empty()?;
        Ok(())
    }

    /// Drop the puppet server's environment cache so new code is seen.
    pub fn flush_environment_cache(&self) -> Result<()> {
        let url = self.environment_cache_url();
        log::debug!("DELETE {url}");
        self.agent.delete(&url).call()?;
        Ok(())
    }

    /// Flush the environment cache, then refresh classes.
    pub fn refresh_classes(&self) -> Result<()> {
        self.flush_environment_cache()?;
        self.update_classes()
    }
}

impl ClassifierService for HttpClassifier {
    fn group_id(&self, name: &str) -> reconcile::Result<Option<String>> {
        Ok(self.find_group_id(name)?)
    }

    fn create_group(&self, group: &NewGroup) -> reconcile::Result<()> {
        Ok(self.post_new_group(group)?)
    }

    fn group(&self, id: &str) -> reconcile::Result<GroupRecord> {
        Ok(self.get_group(id)?)
    }

    fn update_group(&self, delta: &GroupDelta) -> reconcile::Result<()> {
        Ok(self.post_delta(delta)?)
    }
}
