//! Single-group edits driven from the command line
//!
//! Each edit reads the group once, applies every requested change to the
//! in-memory copy and then writes at most once (class edits) or once per
//! concern (group edits), verifying each write.

use crate::batch::is_code_manager_param;
use crate::classes::{delete_class, delete_param, ensure_class_present, ensure_param};
use crate::context::{ClassifierService, DeploymentTrigger};
use crate::error::{Error, Result};
use crate::rules::{RuleMode, apply_rule_request};
use crate::session::{GroupUpdate, Session};
use crate::types::GroupRecord;
use serde_json::Value;

/// Parent used when `edit_group` has to create the group
pub const ENVIRONMENT_PARENT: &str = "All Environments";

/// Requested change to one class on one group
#[derive(Debug, Clone, Default)]
pub struct ClassEdit {
    pub group: String,
    pub class: Option<String>,
    pub param: Option<String>,
    pub value: Option<Value>,
    pub delete_class: bool,
    pub delete_param: bool,
    /// Rule as JSON text
    pub rule: Option<String>,
    pub rule_mode: RuleMode,
    /// Deploy code first so a newly referenced class exists on the server
    pub smart_update: bool,
}

/// Requested environment settings for one group
#[derive(Debug, Clone, Default)]
pub struct GroupEdit {
    pub group: String,
    pub environment: Option<String>,
    pub environment_trumps: Option<bool>,
    /// Rule as JSON text
    pub rule: Option<String>,
    pub rule_mode: RuleMode,
}

/// Result of an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Changes were written and verified
    Saved { writes: usize },
    /// Nothing needed changing
    UpToDate,
}

impl EditOutcome {
    fn from_writes(writes: usize) -> Self {
        if writes == 0 {
            Self::UpToDate
        } else {
            Self::Saved { writes }
        }
    }
}

fn require_group(group: &str) -> Result<()> {
    if group.trim().is_empty() {
        return Err(Error::invalid("all operations require a group name"));
    }
    Ok(())
}

impl ClassEdit {
    fn validate(&self) -> Result<()> {
        require_group(&self.group)?;
        if self.delete_class && self.delete_param {
            return Err(Error::invalid(
                "delete class and delete param cannot be combined",
            ));
        }
        if self.delete_param && self.value.is_some() {
            return Err(Error::invalid("delete param cannot be combined with a value"));
        }
        if self.value.is_some() && self.param.is_none() {
            return Err(Error::invalid("a parameter value needs a parameter name"));
        }
        if self.delete_param && self.param.is_none() {
            return Err(Error::invalid("delete param needs a parameter name"));
        }
        let class_needed =
            self.delete_class || self.delete_param || self.param.is_some() || self.value.is_some();
        if class_needed && self.class.is_none() {
            return Err(Error::invalid("a class name is required"));
        }
        Ok(())
    }

    fn apply_class_change(
        &self,
        record: &mut GroupRecord,
        deployer: &dyn DeploymentTrigger,
    ) -> Result<bool> {
        let Some(class) = self.class.as_deref() else {
            return Ok(false);
        };
        let group = record.name.clone();

        if self.delete_class {
            log::info!("Deleting class {class} from {group}");
            return Ok(delete_class(record, class));
        }

        match (self.param.as_deref(), &self.value) {
            (Some(param), None) if self.delete_param => {
                log::info!("Deleting parameter {param} on {class} from {group}");
                let added = ensure_class_present(record, class);
                Ok(delete_param(record, class, param)? || added)
            }
            (Some(param), Some(value)) => {
                // code manager settings have to be saved before a deploy can use them
                if self.smart_update && !is_code_manager_param(class, param) {
                    deployer.deploy_code()?;
                }
                log::info!("Setting parameter {param} to {value} on {class} in {group}");
                let added = ensure_class_present(record, class);
                Ok(ensure_param(record, class, param, value)? || added)
            }
            _ => {
                if self.smart_update {
                    deployer.deploy_code()?;
                }
                log::info!("Adding {class} to {group}");
                Ok(ensure_class_present(record, class))
            }
        }
    }
}

/// Apply a [`ClassEdit`]
///
/// The first matching form wins: delete class, delete param, set param, add
/// class. A rule change may accompany any of them. Everything goes out in a
/// single write.
pub fn edit_classes(
    service: &dyn ClassifierService,
    deployer: &dyn DeploymentTrigger,
    edit: &ClassEdit,
) -> Result<EditOutcome> {
    edit.validate()?;
    let session = Session::new(service);
    let mut record = session.fetch(&edit.group, None)?;

    let class_change = edit.apply_class_change(&mut record, deployer)?;
    let rule_change = match &edit.rule {
        Some(rule) => apply_rule_request(&mut record, rule, edit.rule_mode)?,
        None => false,
    };

    if !class_change && !rule_change {
        log::info!("{}: already up-to-date", edit.group);
        return Ok(EditOutcome::UpToDate);
    }

    let update = GroupUpdate {
        classes: Some(record.classes),
        rule: record.rule,
        ..GroupUpdate::default()
    };
    session.update(&edit.group, update)?;
    Ok(EditOutcome::Saved { writes: 1 })
}

/// Apply a [`GroupEdit`]
///
/// The group is created under [`ENVIRONMENT_PARENT`] if missing. Environment
/// settings and the rule are written separately since the rule mode needs
/// the freshly written group.
pub fn edit_group(service: &dyn ClassifierService, edit: &GroupEdit) -> Result<EditOutcome> {
    require_group(&edit.group)?;
    let session = Session::new(service);
    let current = session.fetch(&edit.group, Some(ENVIRONMENT_PARENT))?;
    let mut writes = 0;

    let environment = edit
        .environment
        .clone()
        .filter(|env| current.environment.as_ref() != Some(env));
    let environment_trumps = edit
        .environment_trumps
        .filter(|trumps| current.environment_trumps != Some(*trumps));
    if environment.is_some() || environment_trumps.is_some() {
        log::info!("Updating environment settings of {}", edit.group);
        session.update(
            &edit.group,
            GroupUpdate {
                environment,
                environment_trumps,
                ..GroupUpdate::default()
            },
        )?;
        writes += 1;
    }

    if let Some(rule) = &edit.rule {
        let mut record = session.fetch(&edit.group, None)?;
        if apply_rule_request(&mut record, rule, edit.rule_mode)? {
            session.update(&edit.group, GroupUpdate::rule(record.rule))?;
            writes += 1;
        }
    }

    Ok(EditOutcome::from_writes(writes))
}
