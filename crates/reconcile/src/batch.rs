//! Batch reconciliation from a desired-state document
//!
//! A document maps group names to the sections to apply:
//!
//! ```yaml
//! 'PE Master':
//!   delete_classes:
//!     - 'puppet_enterprise::profile::masterbad'
//!   delete_params:
//!     'puppet_enterprise::profile::redo':
//!       - 'badparam'
//!   classes:
//!     'puppet_enterprise::profile::master':
//!       r10k_remote: 'http://blah'
//!       r10k_private_key: '/etc/topsecret'
//!
//! 'Puppet Masters':
//!   classes:
//!     'role::puppet::master':
//!   append_rules:
//!     - 'or'
//!     - ['=', 'name', 'vmpump02.puppet.com']
//! ```
//!
//! Groups run in document order, one at a time. Within a group the phases
//! always run in the order delete_classes, delete_params, classes,
//! append_rules, and every phase that changes something is written and
//! verified before the next one starts.

use crate::classes::{
    DesiredClasses, delete_class, delete_param, ensure_class_present, ensure_classes_and_params,
};
use crate::context::{BatchProgress, ClassifierService, DeploymentTrigger};
use crate::error::{Error, Result};
use crate::rules::ensure_rules;
use crate::session::{GroupUpdate, Session};
use crate::types::{GroupRecord, Params, Rule};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Class holding the code manager settings
pub const CODE_MANAGER_CLASS: &str = "puppet_enterprise::profile::master";

/// Parameters of [`CODE_MANAGER_CLASS`] that must be live before anything
/// else can be deployed correctly
pub const CODE_MANAGER_PARAMS: [&str; 5] = [
    "code_manager_auto_configure",
    "r10k_remote",
    "r10k_private_key",
    "r10k_proxy",
    "r10k_postrun",
];

/// Time to let classes refresh after a deploy
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(60);

/// Reading the group before its phases run
pub const PHASE_FETCH: &str = "fetch";
/// Code deployment of the smart update fast path
pub const PHASE_DEPLOY: &str = "deploy";

/// Phase names, in execution order
pub const PHASE_DELETE_CLASSES: &str = "delete_classes";
pub const PHASE_DELETE_PARAMS: &str = "delete_params";
pub const PHASE_CLASSES: &str = "classes";
pub const PHASE_APPEND_RULES: &str = "append_rules";

/// Check if a class parameter is one of the code manager settings
pub fn is_code_manager_param(class: &str, param: &str) -> bool {
    class == CODE_MANAGER_CLASS && CODE_MANAGER_PARAMS.contains(&param)
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(list) => list,
    }))
}

fn param_lists<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<BTreeMap<String, Vec<String>>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let raw = Option::<BTreeMap<String, Option<OneOrMany>>>::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(class, params)| {
                let params = match params {
                    None => Vec::new(),
                    Some(OneOrMany::One(s)) => vec![s],
                    Some(OneOrMany::Many(list)) => list,
                };
                (class, params)
            })
            .collect()
    }))
}

fn requested_rule<'de, D>(deserializer: D) -> std::result::Result<Option<Rule>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer)?
        .map(Rule::requested)
        .transpose()
        .map_err(de::Error::custom)
}

/// Sections requested for one group; an absent section skips its phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    #[serde(default)]
    pub classes: Option<DesiredClasses>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub delete_classes: Option<Vec<String>>,
    #[serde(default, deserialize_with = "param_lists")]
    pub delete_params: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, deserialize_with = "requested_rule")]
    pub append_rules: Option<Rule>,
}

/// A desired-state document, groups kept in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDocument {
    pub groups: Vec<(String, GroupSpec)>,
}

impl<'de> Deserialize<'de> for BatchDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = BatchDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of group names to group sections")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut groups: Vec<(String, GroupSpec)> = Vec::new();
                while let Some((name, spec)) = map.next_entry::<String, Option<GroupSpec>>()? {
                    if groups.iter().any(|(existing, _)| *existing == name) {
                        return Err(de::Error::custom(format!("duplicate group '{name}'")));
                    }
                    groups.push((name, spec.unwrap_or_default()));
                }
                Ok(BatchDocument { groups })
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

impl BatchDocument {
    /// Parse a YAML document; `source` names it in error messages
    pub fn from_yaml_str(text: &str, source: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| Error::invalid(format!("syntax error parsing {source}: {e}")))
    }

    /// Parse a JSON document; `source` names it in error messages
    pub fn from_json_str(text: &str, source: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::invalid(format!("syntax error parsing {source}: {e}")))
    }

    /// Look up a group's sections by name
    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, spec)| spec)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Read a document from exactly one of a YAML or a JSON file
pub fn load_document(yaml_file: Option<&Path>, json_file: Option<&Path>) -> Result<BatchDocument> {
    let (path, is_yaml) = match (yaml_file, json_file) {
        (None, None) => {
            return Err(Error::invalid(
                "a YAML or JSON file must be specified for batch updates",
            ));
        }
        (Some(_), Some(_)) => {
            return Err(Error::invalid(
                "cannot process both YAML and JSON at the same time",
            ));
        }
        (Some(path), None) => (path, true),
        (None, Some(path)) => (path, false),
    };

    let kind = if is_yaml { "YAML" } else { "JSON" };
    if !path.is_file() {
        return Err(Error::not_found(format!("{kind} file: {}", path.display())));
    }
    log::debug!("reading batch document {}", path.display());
    let text = fs::read_to_string(path)
        .map_err(|e| Error::invalid(format!("cannot read {}: {e}", path.display())))?;
    let source = path.display().to_string();
    if is_yaml {
        BatchDocument::from_yaml_str(&text, &source)
    } else {
        BatchDocument::from_json_str(&text, &source)
    }
}

/// Copy of `doc` holding only code manager settings, or `None` if it has none
pub fn code_manager_settings(doc: &BatchDocument) -> Option<BatchDocument> {
    let groups: Vec<(String, GroupSpec)> = doc
        .groups
        .iter()
        .filter_map(|(name, spec)| {
            let params = spec.classes.as_ref()?.get(CODE_MANAGER_CLASS)?.as_ref()?;
            let wanted: Params = params
                .iter()
                .filter(|(param, _)| is_code_manager_param(CODE_MANAGER_CLASS, param))
                .map(|(param, value)| (param.clone(), value.clone()))
                .collect();
            if wanted.is_empty() {
                return None;
            }
            let classes = DesiredClasses::from([(CODE_MANAGER_CLASS.to_string(), Some(wanted))]);
            Some((
                name.clone(),
                GroupSpec {
                    classes: Some(classes),
                    ..GroupSpec::default()
                },
            ))
        })
        .collect();

    (!groups.is_empty()).then_some(BatchDocument { groups })
}

/// Options for a batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Apply code manager settings and deploy before everything else
    pub smart_update: bool,
    /// Pause after the fast-path deploy
    pub settle: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            smart_update: false,
            settle: DEFAULT_SETTLE,
        }
    }
}

/// Counts from a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Groups processed, fast path excluded
    pub groups: usize,
    /// Verified writes, fast path included
    pub writes: usize,
    /// Phases that needed no write
    pub up_to_date: usize,
}

/// Runs a [`BatchDocument`] against the classifier
pub struct BatchRunner<'a> {
    session: Session<'a>,
    deployer: &'a dyn DeploymentTrigger,
    options: BatchOptions,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        service: &'a dyn ClassifierService,
        deployer: &'a dyn DeploymentTrigger,
        options: BatchOptions,
    ) -> Self {
        Self {
            session: Session::new(service),
            deployer,
            options,
        }
    }

    /// Apply the whole document
    ///
    /// The first error stops the run; groups already processed stay applied.
    pub fn run<P: BatchProgress>(&self, doc: &BatchDocument, progress: &mut P) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        if self.options.smart_update {
            self.fast_path(doc, progress, &mut summary)?;
        }

        for (name, spec) in &doc.groups {
            log::info!("Processing {name}");
            progress.on_group_start(name);
            self.run_group(name, spec, progress, &mut summary)?;
            summary.groups += 1;
        }

        Ok(summary)
    }

    /// Apply code manager settings, deploy, then wait for classes to refresh
    fn fast_path<P: BatchProgress>(
        &self,
        doc: &BatchDocument,
        progress: &mut P,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        let settings = code_manager_settings(doc);
        if let Some(settings) = &settings {
            for (name, spec) in &settings.groups {
                log::info!("Setting up code manager for {name} immediately");
                let mut record = self
                    .session
                    .fetch(name, None)
                    .map_err(|e| e.in_phase(name, PHASE_CLASSES))?;
                if let Some(classes) = &spec.classes {
                    let changed = ensure_classes_and_params(&mut record, classes)
                        .map_err(|e| e.in_phase(name, PHASE_CLASSES))?;
                    self.commit(name, &record, PHASE_CLASSES, changed, false, progress, summary)?;
                }
            }
        }

        // deploy even without new settings so classes named in the document exist
        self.deployer.deploy_code().map_err(|e| {
            let groups = settings.as_ref().unwrap_or(doc);
            let names: Vec<&str> = groups.groups.iter().map(|(name, _)| name.as_str()).collect();
            e.in_phase(&names.join(", "), PHASE_DEPLOY)
        })?;

        if !self.options.settle.is_zero() {
            log::info!(
                "Sleeping {}s to let classes finish their refresh...",
                self.options.settle.as_secs()
            );
            progress.on_settle_start(self.options.settle);
            thread::sleep(self.options.settle);
            progress.on_settle_complete();
        }
        Ok(())
    }

    fn run_group<P: BatchProgress>(
        &self,
        name: &str,
        spec: &GroupSpec,
        progress: &mut P,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        let mut record = self
            .session
            .fetch(name, None)
            .map_err(|e| e.in_phase(name, PHASE_FETCH))?;

        if let Some(classes) = &spec.delete_classes {
            let results: Vec<bool> = classes
                .iter()
                .map(|class| delete_class(&mut record, class))
                .collect();
            let changed = results.contains(&true);
            self.commit(name, &record, PHASE_DELETE_CLASSES, changed, false, progress, summary)?;
        }

        if let Some(params) = &spec.delete_params {
            let changed = delete_params_phase(&mut record, params)
                .map_err(|e| e.in_phase(name, PHASE_DELETE_PARAMS))?;
            self.commit(name, &record, PHASE_DELETE_PARAMS, changed, false, progress, summary)?;
        }

        if let Some(classes) = &spec.classes {
            let changed = ensure_classes_and_params(&mut record, classes)
                .map_err(|e| e.in_phase(name, PHASE_CLASSES))?;
            self.commit(name, &record, PHASE_CLASSES, changed, false, progress, summary)?;
        }

        if let Some(rule) = &spec.append_rules {
            let changed =
                ensure_rules(&mut record, rule).map_err(|e| e.in_phase(name, PHASE_APPEND_RULES))?;
            // rule writes are their own call, never merged with class writes
            self.commit(name, &record, PHASE_APPEND_RULES, changed, true, progress, summary)?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn commit<P: BatchProgress>(
        &self,
        name: &str,
        record: &GroupRecord,
        phase: &'static str,
        changed: bool,
        rule_write: bool,
        progress: &mut P,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        if !changed {
            log::debug!("{name}: {phase} already up to date");
            summary.up_to_date += 1;
            progress.on_phase_up_to_date(name, phase);
            return Ok(());
        }

        let update = if rule_write {
            GroupUpdate::rule(record.rule.clone())
        } else {
            GroupUpdate::classes(record.classes.clone())
        };
        self.session
            .update(name, update)
            .map_err(|e| e.in_phase(name, phase))?;
        summary.writes += 1;
        progress.on_phase_saved(name, phase);
        Ok(())
    }
}

/// Delete the listed parameters
///
/// Precondition made explicit: a class named here is attached first if it is
/// missing, so a delete-param request always leaves the class present. A
/// class already marked for deletion is skipped since its parameters go with
/// it.
fn delete_params_phase(
    record: &mut GroupRecord,
    params: &BTreeMap<String, Vec<String>>,
) -> Result<bool> {
    let mut results = Vec::new();
    for (class, names) in params {
        results.push(ensure_class_present(record, class));
        if record.classes.get(class).is_some_and(|entry| entry.is_delete()) {
            log::debug!("{}: {class} is being deleted, skipping its params", record.name);
            continue;
        }
        for param in names {
            results.push(delete_param(record, class, param)?);
        }
    }
    Ok(results.contains(&true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MockClassifier, NoDeploy, NoProgress, RecordingDeploy};
    use crate::types::{ClassEntry, Classes, GroupDelta, NewGroup, ParamValue};
    use serde_json::{Value, json};

    fn group(value: Value) -> GroupRecord {
        serde_json::from_value(value).unwrap()
    }

    fn doc(value: Value) -> BatchDocument {
        serde_json::from_value(value).unwrap()
    }

    fn classes(value: Value) -> Classes {
        serde_json::from_value(value).unwrap()
    }

    fn no_settle() -> BatchOptions {
        BatchOptions {
            smart_update: false,
            settle: Duration::ZERO,
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl BatchProgress for Recorder {
        fn on_group_start(&mut self, group: &str) {
            self.events.push(format!("start {group}"));
        }
        fn on_phase_saved(&mut self, group: &str, phase: &str) {
            self.events.push(format!("saved {group} {phase}"));
        }
        fn on_phase_up_to_date(&mut self, group: &str, phase: &str) {
            self.events.push(format!("noop {group} {phase}"));
        }
    }

    #[test]
    fn test_document_keeps_group_order() {
        let yaml = "zeta:\n  classes:\n    a:\nalpha:\n  delete_classes: [b]\nmid:\n";
        let parsed = BatchDocument::from_yaml_str(yaml, "test.yaml").unwrap();
        let names: Vec<&str> = parsed.groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(parsed.group("mid"), Some(&GroupSpec::default()));
        assert_eq!(parsed.group("zeta").unwrap().classes.as_ref().unwrap()["a"], None);
    }

    #[test]
    fn test_document_accepts_single_strings() {
        let yaml = "G:\n  delete_classes: 'x'\n  delete_params:\n    'c': 'p'\n";
        let parsed = BatchDocument::from_yaml_str(yaml, "test.yaml").unwrap();
        let spec = parsed.group("G").unwrap();
        assert_eq!(spec.delete_classes, Some(vec!["x".to_string()]));
        assert_eq!(spec.delete_params.as_ref().unwrap()["c"], vec!["p".to_string()]);
    }

    #[test]
    fn test_document_rejects_unknown_section() {
        let err = BatchDocument::from_json_str(r#"{"G": {"rules": []}}"#, "doc.json").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("doc.json")));
    }

    #[test]
    fn test_document_rejects_bad_conjunction() {
        let result = BatchDocument::from_json_str(
            r#"{"G": {"append_rules": ["not", ["=", "name", "a"]]}}"#,
            "doc.json",
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_document_rejects_duplicate_group() {
        let result = BatchDocument::from_json_str(r#"{"G": {}, "G": {}}"#, "doc.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_code_manager_settings_filters_document() {
        let parsed = doc(json!({
            "PE Master": {
                "classes": {
                    "puppet_enterprise::profile::master": {
                        "r10k_remote": "git@git:puppet/control",
                        "r10k_private_key": "/etc/key",
                        "java_args": {"Xmx": "2g"}
                    },
                    "other": {"r10k_remote": "nope"}
                },
                "delete_classes": ["x"]
            },
            "Agents": {"classes": {"role::agent": {}}}
        }));
        let settings = code_manager_settings(&parsed).unwrap();
        assert_eq!(settings.groups.len(), 1);
        let (name, spec) = &settings.groups[0];
        assert_eq!(name, "PE Master");
        assert!(spec.delete_classes.is_none());
        let classes = spec.classes.as_ref().unwrap();
        assert_eq!(classes.len(), 1);
        let params = classes[CODE_MANAGER_CLASS].as_ref().unwrap();
        assert_eq!(params.len(), 2);
        assert!(params.contains_key("r10k_remote"));
        assert!(!params.contains_key("java_args"));
    }

    #[test]
    fn test_code_manager_settings_none() {
        let parsed = doc(json!({"G": {"classes": {"puppet_enterprise::profile::master": {"x": 1}}}}));
        assert!(code_manager_settings(&parsed).is_none());
        assert!(is_code_manager_param(CODE_MANAGER_CLASS, "r10k_postrun"));
        assert!(!is_code_manager_param("other", "r10k_postrun"));
    }

    #[test]
    fn test_end_to_end_delete_then_classes() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G", "classes": {"x": {}, "y": {}}
        })));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({"G": {"delete_classes": ["x"], "classes": {"y": {"p": "1"}}}}));

        let summary = runner.run(&input, &mut NoProgress).unwrap();

        assert_eq!(summary.writes, 2);
        assert_eq!(summary.groups, 1);
        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].classes, Some(classes(json!({"x": null, "y": {}}))));
        assert_eq!(writes[1].classes, Some(classes(json!({"x": null, "y": {"p": "1"}}))));
        assert_eq!(mock.stored("G").unwrap().classes, classes(json!({"y": {"p": "1"}})));
    }

    #[test]
    fn test_batch_is_idempotent() {
        let mock = MockClassifier::new().with_group(group(json!({"id": "g1", "name": "G"})));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({
            "G": {
                "classes": {"role::master": {"a": "1"}},
                "append_rules": ["or", ["=", "name", "m1"]]
            }
        }));

        let first = runner.run(&input, &mut NoProgress).unwrap();
        assert_eq!(first.writes, 2);
        let second = runner.run(&input, &mut NoProgress).unwrap();
        assert_eq!(second.writes, 0);
        assert_eq!(second.up_to_date, 2);
        assert_eq!(mock.writes().len(), 2);
    }

    #[test]
    fn test_rule_phase_writes_rule_separately() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G", "rule": ["or", ["=", "name", "a"]]
        })));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({"G": {
            "classes": {"c": {}},
            "append_rules": ["or", ["=", "name", "a"], ["=", "name", "b"]]
        }}));
        runner.run(&input, &mut NoProgress).unwrap();

        let stored = mock.stored("G").unwrap();
        assert_eq!(
            serde_json::to_value(stored.rule.unwrap()).unwrap(),
            json!(["or", ["=", "name", "a"], ["=", "name", "b"]])
        );
        assert_eq!(mock.writes().len(), 2);
    }

    #[test]
    fn test_delete_params_creates_missing_class() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G",
            "classes": {"foo": {"a": "a", "b": "b"}, "bar": {"a": "a"}}
        })));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({"G": {"delete_params": {"foo": ["a", "b"], "baz": ["q"]}}}));
        runner.run(&input, &mut NoProgress).unwrap();

        let stored = mock.stored("G").unwrap();
        assert_eq!(stored.classes, classes(json!({"foo": {}, "bar": {"a": "a"}, "baz": {}})));
    }

    #[test]
    fn test_delete_params_idempotent() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G", "classes": {"foo": {"a1": "a", "b1": "b"}}
        })));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({"G": {"delete_params": {"foo": ["a", "b"]}}}));
        let summary = runner.run(&input, &mut NoProgress).unwrap();
        assert_eq!(summary.writes, 0);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_missing_group_is_created() {
        let mock = MockClassifier::new();
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        runner
            .run(&doc(json!({"New": {"classes": {"c": {"p": true}}}})), &mut NoProgress)
            .unwrap();
        let stored = mock.stored("New").unwrap();
        assert_eq!(stored.classes["c"].params().unwrap()["p"], ParamValue::set(true));
    }

    #[test]
    fn test_unverified_write_aborts_remaining_phases() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G", "classes": {"x": {}}
        })));
        mock.ignore_writes(true);
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({
            "G": {"delete_classes": ["x"], "classes": {"y": {}}},
            "H": {"classes": {"z": {}}}
        }));

        let err = runner.run(&input, &mut NoProgress).unwrap_err();
        assert!(matches!(err.root(), Error::RemoteWriteUnverified { .. }));
        assert!(err.to_string().contains(PHASE_DELETE_CLASSES));
        assert_eq!(mock.writes().len(), 1);
        assert!(mock.stored("H").is_none());
    }

    #[test]
    fn test_progress_events_in_phase_order() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G", "classes": {"x": {}, "keep": {"p": "1"}}
        })));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({"G": {
            "append_rules": ["or", ["=", "name", "a"]],
            "classes": {"keep": {"p": "1"}},
            "delete_params": {"keep": ["gone"]},
            "delete_classes": ["x"]
        }}));
        let mut recorder = Recorder::default();
        runner.run(&input, &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            [
                "start G",
                "saved G delete_classes",
                "noop G delete_params",
                "noop G classes",
                "saved G append_rules",
            ]
        );
    }

    #[test]
    fn test_smart_update_applies_code_manager_first() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "PE Master",
            "classes": {CODE_MANAGER_CLASS: {}}
        })));
        let deploy = RecordingDeploy::new();
        let options = BatchOptions {
            smart_update: true,
            settle: Duration::ZERO,
        };
        let runner = BatchRunner::new(&mock, &deploy, options);
        let input = doc(json!({"PE Master": {"classes": {
            CODE_MANAGER_CLASS: {"r10k_remote": "git@git:control", "java_args": "-Xmx2g"}
        }}}));

        let summary = runner.run(&input, &mut NoProgress).unwrap();

        assert_eq!(deploy.calls(), 1);
        assert_eq!(summary.writes, 2);
        let writes = mock.writes();
        let first = writes[0].classes.as_ref().unwrap()[CODE_MANAGER_CLASS].params().unwrap();
        assert!(first.contains_key("r10k_remote"));
        assert!(!first.contains_key("java_args"));
        let stored = mock.stored("PE Master").unwrap();
        assert_eq!(
            stored.classes[CODE_MANAGER_CLASS],
            ClassEntry::Params(
                [
                    ("java_args".to_string(), ParamValue::set("-Xmx2g")),
                    ("r10k_remote".to_string(), ParamValue::set("git@git:control")),
                ]
                .into()
            )
        );
    }

    #[test]
    fn test_smart_update_deploys_without_settings() {
        let mock = MockClassifier::new();
        let deploy = RecordingDeploy::new();
        let options = BatchOptions {
            smart_update: true,
            settle: Duration::ZERO,
        };
        let runner = BatchRunner::new(&mock, &deploy, options);
        runner
            .run(&doc(json!({"G": {"classes": {"c": {}}}})), &mut NoProgress)
            .unwrap();
        assert_eq!(deploy.calls(), 1);
    }

    #[test]
    fn test_load_document_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("groups.yaml");
        fs::write(&yaml, "'PE Master':\n  classes:\n    'role::master':\n").unwrap();
        let parsed = load_document(Some(yaml.as_path()), None).unwrap();
        assert_eq!(parsed.groups[0].0, "PE Master");

        let json = dir.path().join("groups.json");
        fs::write(&json, r#"{"G": {"delete_classes": ["x"]}}"#).unwrap();
        let parsed = load_document(None, Some(json.as_path())).unwrap();
        assert_eq!(parsed.group("G").unwrap().delete_classes, Some(vec!["x".to_string()]));
    }

    #[test]
    fn test_load_document_needs_exactly_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("a.yaml");
        let json = dir.path().join("a.json");
        fs::write(&yaml, "{}").unwrap();
        fs::write(&json, "{}").unwrap();
        assert!(matches!(load_document(None, None), Err(Error::InvalidInput(_))));
        assert!(matches!(
            load_document(Some(yaml.as_path()), Some(json.as_path())),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_load_document_missing_or_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        let err = load_document(Some(missing.as_path()), None).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m.contains("missing.yaml")));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{\"G\": ").unwrap();
        let err = load_document(None, Some(broken.as_path())).unwrap_err();
        assert!(err.to_string().contains("syntax error"));
    }

    struct Unreachable;

    impl ClassifierService for Unreachable {
        fn group_id(&self, _name: &str) -> Result<Option<String>> {
            Err(Error::RemoteUnavailable("connection refused".into()))
        }
        fn create_group(&self, _group: &NewGroup) -> Result<()> {
            Err(Error::RemoteUnavailable("connection refused".into()))
        }
        fn group(&self, _id: &str) -> Result<GroupRecord> {
            Err(Error::RemoteUnavailable("connection refused".into()))
        }
        fn update_group(&self, _delta: &GroupDelta) -> Result<()> {
            Err(Error::RemoteUnavailable("connection refused".into()))
        }
    }

    struct FailingDeploy;

    impl DeploymentTrigger for FailingDeploy {
        fn deploy_code(&self) -> Result<()> {
            Err(Error::RemoteUnavailable("deploy: sh: not found".into()))
        }
    }

    #[test]
    fn test_group_with_nested_rule_is_reconciled() {
        let stored_rule = json!([
            "and",
            ["~", ["fact", "aio_agent_version"], ".+"],
            ["not", ["~", ["fact", "pe_server_version"], ".+"]]
        ]);
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "PE Agent", "classes": {}, "rule": stored_rule
        })));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({"PE Agent": {
            "classes": {"puppet_enterprise::profile::agent": {}},
            "append_rules": ["and", ["=", "name", "agent01"]]
        }}));

        let summary = runner.run(&input, &mut NoProgress).unwrap();

        assert_eq!(summary.writes, 2);
        let stored = mock.stored("PE Agent").unwrap();
        assert!(stored.classes.contains_key("puppet_enterprise::profile::agent"));
        assert_eq!(
            serde_json::to_value(stored.rule.unwrap()).unwrap(),
            json!([
                "and",
                ["~", ["fact", "aio_agent_version"], ".+"],
                ["not", ["~", ["fact", "pe_server_version"], ".+"]],
                ["=", "name", "agent01"]
            ])
        );
    }

    #[test]
    fn test_document_rejects_malformed_append_predicate() {
        let result = BatchDocument::from_json_str(
            r#"{"G": {"append_rules": ["or", ["not", ["=", "name", "a"]]]}}"#,
            "doc.json",
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_bare_class_after_its_deletion_is_up_to_date() {
        let mock = MockClassifier::new().with_group(group(json!({
            "id": "g1", "name": "G", "classes": {"x": {}}
        })));
        let runner = BatchRunner::new(&mock, &NoDeploy, no_settle());
        let input = doc(json!({"G": {"delete_classes": ["x"], "classes": {"x": null}}}));

        let summary = runner.run(&input, &mut NoProgress).unwrap();

        assert_eq!(summary.writes, 1);
        assert_eq!(summary.up_to_date, 1);
        assert!(!mock.stored("G").unwrap().classes.contains_key("x"));
    }

    #[test]
    fn test_fetch_failure_names_group() {
        let runner = BatchRunner::new(&Unreachable, &NoDeploy, no_settle());
        let err = runner
            .run(&doc(json!({"G": {"classes": {"c": {}}}})), &mut NoProgress)
            .unwrap_err();
        assert!(err.to_string().contains(&format!("group 'G', {PHASE_FETCH}")));
        assert_eq!(err.category(), crate::error::ErrorCategory::Remote);
    }

    #[test]
    fn test_deploy_failure_names_groups() {
        let mock = MockClassifier::new().with_group(group(json!({"id": "g1", "name": "PE Master"})));
        let options = BatchOptions {
            smart_update: true,
            settle: Duration::ZERO,
        };
        let runner = BatchRunner::new(&mock, &FailingDeploy, options);
        let input = doc(json!({"PE Master": {"classes": {
            CODE_MANAGER_CLASS: {"r10k_remote": "git@git:control"}
        }}}));

        let err = runner.run(&input, &mut NoProgress).unwrap_err();

        assert!(err.to_string().contains(&format!("group 'PE Master', {PHASE_DEPLOY}")));
        assert_eq!(mock.writes().len(), 1);
    }
}
