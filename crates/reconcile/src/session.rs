//! Read-modify-write-verify cycle for one group
//!
//! Records are never cached: every fetch and every update goes back to the
//! service, which is the only system of record.

use crate::context::ClassifierService;
use crate::error::{Error, Result};
use crate::types::{Classes, DEFAULT_PARENT, GroupDelta, GroupRecord, NewGroup, Rule};
use crate::verify::verify_update;

/// Fields to write; `None` keeps the group's current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub classes: Option<Classes>,
    pub rule: Option<Rule>,
    pub environment: Option<String>,
    pub environment_trumps: Option<bool>,
}

impl GroupUpdate {
    /// Update only the classes
    pub fn classes(classes: Classes) -> Self {
        Self {
            classes: Some(classes),
            ..Self::default()
        }
    }

    /// Update only the rule
    pub fn rule(rule: Option<Rule>) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }
}

/// Group operations against an injected service
pub struct Session<'a> {
    service: &'a dyn ClassifierService,
}

impl<'a> Session<'a> {
    pub fn new(service: &'a dyn ClassifierService) -> Self {
        Self { service }
    }

    /// Resolve a group id, creating the group under `parent` if it is missing
    ///
    /// `parent` defaults to [`DEFAULT_PARENT`].
    pub fn group_id(&self, name: &str, parent: Option<&str>) -> Result<String> {
        if let Some(id) = self.service.group_id(name)? {
            return Ok(id);
        }

        let parent_name = parent.unwrap_or(DEFAULT_PARENT);
        log::info!("Group: {name} does not exist, creating under {parent_name}...");
        let parent_id = self
            .service
            .group_id(parent_name)?
            .ok_or_else(|| Error::not_found(format!("parent group '{parent_name}'")))?;

        self.service.create_group(&NewGroup {
            name: name.to_string(),
            parent: parent_id,
            classes: Classes::new(),
        })?;

        self.service
            .group_id(name)?
            .ok_or_else(|| Error::not_found(format!("group '{name}' after creating it")))
    }

    /// Fetch a fresh copy of a group, creating it if needed
    pub fn fetch(&self, name: &str, parent: Option<&str>) -> Result<GroupRecord> {
        let id = self.group_id(name, parent)?;
        log::debug!("Group {name} found, getting definition");
        self.service.group(&id)
    }

    /// Write `update` to the group and confirm it took
    ///
    /// Fields not set in `update` are filled from a fresh read, so writing
    /// only the classes never drops the rule. Returns the re-read group.
    pub fn update(&self, name: &str, update: GroupUpdate) -> Result<GroupRecord> {
        let current = self.fetch(name, None)?;
        let id = current
            .id
            .clone()
            .ok_or_else(|| Error::not_found(format!("id of group '{name}'")))?;

        let delta = GroupDelta {
            id,
            classes: Some(update.classes.unwrap_or(current.classes)),
            rule: update.rule.or(current.rule),
            environment: update.environment.or(current.environment),
            environment_trumps: update.environment_trumps.or(current.environment_trumps),
        };

        log::info!("Updating group {name}");
        self.service.update_group(&delta)?;

        let observed = self.fetch(name, None)?;
        verify_update(name, &delta, &observed)?;
        log::info!("{name}: changes saved");
        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MockClassifier;
    use serde_json::json;

    fn group(value: serde_json::Value) -> GroupRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_group_id_existing() {
        let mock = MockClassifier::new().with_group(group(json!({"id": "g1", "name": "G"})));
        let session = Session::new(&mock);
        assert_eq!(session.group_id("G", None).unwrap(), "g1");
        assert!(mock.created().is_empty());
    }

    #[test]
    fn test_group_id_creates_under_default_parent() {
        let mock = MockClassifier::new();
        let session = Session::new(&mock);
        let id = session.group_id("New", None).unwrap();
        assert_eq!(mock.group_id("New").unwrap(), Some(id));
        let created = mock.created();
        assert_eq!(created.len(), 1);
        assert_eq!(Some(created[0].parent.clone()), mock.group_id("All Nodes").unwrap());
    }

    #[test]
    fn test_group_id_custom_parent() {
        let mock = MockClassifier::new();
        let session = Session::new(&mock);
        session.group_id("Env", Some("All Environments")).unwrap();
        assert_eq!(
            Some(mock.created()[0].parent.clone()),
            mock.group_id("All Environments").unwrap()
        );
    }

    #[test]
    fn test_group_id_missing_parent() {
        let mock = MockClassifier::new();
        let session = Session::new(&mock);
        assert!(matches!(
            session.group_id("G", Some("Nope")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_update_keeps_unwritten_fields() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G",
            "classes": {"a": {}},
            "rule": ["or", ["=", "name", "n1"]],
            "environment": "production"
        })));
        let session = Session::new(&mock);
        let classes: Classes = serde_json::from_value(json!({"a": {}, "b": {"p": 1}})).unwrap();
        let observed = session.update("G", GroupUpdate::classes(classes)).unwrap();

        assert!(observed.classes.contains_key("b"));
        let delta = &mock.writes()[0];
        assert_eq!(delta.environment.as_deref(), Some("production"));
        assert_eq!(delta.rule, observed.rule);
        assert!(observed.rule.is_some());
    }

    #[test]
    fn test_update_detects_lost_write() {
        let mock = MockClassifier::new().with_group(group(json!({"id": "g1", "name": "G"})));
        mock.ignore_writes(true);
        let session = Session::new(&mock);
        let update = GroupUpdate {
            environment: Some("production".into()),
            ..Default::default()
        };
        assert!(matches!(
            session.update("G", update),
            Err(Error::RemoteWriteUnverified { .. })
        ));
    }
}
