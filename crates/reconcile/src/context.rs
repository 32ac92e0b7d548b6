//! Collaborator traits
//!
//! The engine never builds its own service client or deploy runner; callers
//! pass them in. This keeps the reconciliation logic testable against the
//! in-memory [`MockClassifier`].

use crate::error::{Error, Result};
use crate::types::{ClassEntry, GroupDelta, GroupRecord, NewGroup};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Access to the remote node classifier
///
/// Any error returned here is treated as fatal by the engine; implementations
/// own whatever connection handling they need.
pub trait ClassifierService {
    /// Look up a group id by name
    fn group_id(&self, name: &str) -> Result<Option<String>>;

    /// Create a group
    ///
    /// The response is not relied on; callers look the id up by name afterwards.
    fn create_group(&self, group: &NewGroup) -> Result<()>;

    /// Fetch a group by id
    fn group(&self, id: &str) -> Result<GroupRecord>;

    /// Send an update; the service gives no success payload
    fn update_group(&self, delta: &GroupDelta) -> Result<()>;
}

/// Out-of-band code deployment
pub trait DeploymentTrigger {
    /// Deploy code and block until it finishes
    fn deploy_code(&self) -> Result<()>;
}

/// Deployment trigger that does nothing
pub struct NoDeploy;

impl DeploymentTrigger for NoDeploy {
    fn deploy_code(&self) -> Result<()> {
        Ok(())
    }
}

/// Deployment trigger that only counts calls
#[derive(Debug, Default)]
pub struct RecordingDeploy {
    calls: AtomicUsize,
}

impl RecordingDeploy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `deploy_code` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DeploymentTrigger for RecordingDeploy {
    fn deploy_code(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Progress callback for batch runs
///
/// All methods default to no-ops.
pub trait BatchProgress {
    /// Called before a group's phases run
    fn on_group_start(&mut self, _group: &str) {}

    /// Called after a phase wrote and verified its changes
    fn on_phase_saved(&mut self, _group: &str, _phase: &str) {}

    /// Called when a phase found nothing to change
    fn on_phase_up_to_date(&mut self, _group: &str, _phase: &str) {}

    /// Called when the post-deploy settle interval starts
    fn on_settle_start(&mut self, _duration: Duration) {}

    /// Called when the settle interval is over
    fn on_settle_complete(&mut self) {}
}

/// No-op progress callback
pub struct NoProgress;

impl BatchProgress for NoProgress {}

#[derive(Debug, Default)]
struct MockState {
    groups: Vec<GroupRecord>,
    created: Vec<NewGroup>,
    writes: Vec<GroupDelta>,
    ignore_writes: bool,
    next_id: usize,
}

impl MockState {
    fn find_mut(&mut self, id: &str) -> Option<&mut GroupRecord> {
        self.groups
            .iter_mut()
            .find(|g| g.id.as_deref() == Some(id))
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("group-{}", self.next_id)
    }
}

/// In-memory classifier for tests
///
/// Applies updates the way the real service does: classes and parameters
/// sent as `null` are removed, other classes and parameters are merged in,
/// and every other field present in the delta replaces the stored value.
/// Seeded with the `All Nodes` and `All Environments` root groups.
#[derive(Debug)]
pub struct MockClassifier {
    state: Mutex<MockState>,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    /// Create a mock with only the root groups
    pub fn new() -> Self {
        let mock = Self {
            state: Mutex::new(MockState::default()),
        };
        mock.insert(GroupRecord::named("All Nodes"));
        mock.insert(GroupRecord::named("All Environments"));
        mock
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a group, assigning an id if it has none; returns the id
    pub fn insert(&self, mut group: GroupRecord) -> String {
        let mut state = self.state();
        let id = match group.id.clone() {
            Some(id) => id,
            None => state.allocate_id(),
        };
        group.id = Some(id.clone());
        state.groups.push(group);
        id
    }

    /// Builder form of [`MockClassifier::insert`]
    pub fn with_group(self, group: GroupRecord) -> Self {
        self.insert(group);
        self
    }

    /// Accept updates without applying them, as a silently failing server would
    pub fn ignore_writes(&self, ignore: bool) {
        self.state().ignore_writes = ignore;
    }

    /// Current stored copy of a group
    pub fn stored(&self, name: &str) -> Option<GroupRecord> {
        self.state().groups.iter().find(|g| g.name == name).cloned()
    }

    /// Every update payload received, in order
    pub fn writes(&self) -> Vec<GroupDelta> {
        self.state().writes.clone()
    }

    /// Every create payload received, in order
    pub fn created(&self) -> Vec<NewGroup> {
        self.state().created.clone()
    }
}

impl ClassifierService for MockClassifier {
    fn group_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .state()
            .groups
            .iter()
            .find(|g| g.name == name)
            .and_then(|g| g.id.clone()))
    }

    fn create_group(&self, group: &NewGroup) -> Result<()> {
        let mut state = self.state();
        if state.groups.iter().any(|g| g.name == group.name) {
            return Err(Error::RemoteUnavailable(format!(
                "HTTP 422: group '{}' already exists",
                group.name
            )));
        }
        let id = state.allocate_id();
        state.created.push(group.clone());
        state.groups.push(GroupRecord {
            id: Some(id),
            name: group.name.clone(),
            parent: Some(group.parent.clone()),
            classes: group.classes.clone(),
            ..GroupRecord::default()
        });
        Ok(())
    }

    fn group(&self, id: &str) -> Result<GroupRecord> {
        self.state()
            .find_mut(id)
            .map(|g| g.clone())
            .ok_or_else(|| Error::not_found(format!("group id {id}")))
    }

    fn update_group(&self, delta: &GroupDelta) -> Result<()> {
        let mut state = self.state();
        state.writes.push(delta.clone());
        if state.ignore_writes {
            return Ok(());
        }
        let group = state
            .find_mut(&delta.id)
            .ok_or_else(|| Error::not_found(format!("group id {}", delta.id)))?;

        if let Some(classes) = &delta.classes {
            for (class, entry) in classes {
                match entry {
                    ClassEntry::Delete => {
                        group.classes.remove(class);
                    }
                    ClassEntry::Params(params) => {
                        let stored = group
                            .classes
                            .entry(class.clone())
                            .or_insert_with(ClassEntry::empty);
                        if let Some(stored) = stored.params_mut() {
                            for (param, value) in params {
                                if value.is_delete() {
                                    stored.remove(param);
                                } else {
                                    stored.insert(param.clone(), value.clone());
                                }
                            }
                        }
                    }
                }
            }
        }
        if let Some(rule) = &delta.rule {
            group.rule = Some(rule.clone());
        }
        if let Some(environment) = &delta.environment {
            group.environment = Some(environment.clone());
        }
        if let Some(trumps) = delta.environment_trumps {
            group.environment_trumps = Some(trumps);
        }
        Ok(())
    }
}
