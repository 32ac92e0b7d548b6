//! Idempotent edits to a group's class → parameter map
//!
//! Every operation mutates the in-memory record only and reports whether it
//! changed anything. Nothing here talks to the service; the caller decides
//! whether a write is needed from the returned flags.

use crate::error::{Error, Result};
use crate::types::{ClassEntry, GroupRecord, ParamValue, Params};
use serde_json::Value;
use std::collections::BTreeMap;

/// Desired classes as they appear in a batch document
///
/// A class with no parameter section (`None`) only has to be present.
pub type DesiredClasses = BTreeMap<String, Option<Params>>;

/// Ensure `class` is attached to the group
///
/// An existing entry, including a pending deletion marker, is left alone.
pub fn ensure_class_present(record: &mut GroupRecord, class: &str) -> bool {
    if record.classes.contains_key(class) {
        return false;
    }
    log::debug!("{}: adding class {}", record.name, class);
    record.classes.insert(class.to_string(), ClassEntry::empty());
    true
}

/// Mark `class` for deletion
pub fn delete_class(record: &mut GroupRecord, class: &str) -> bool {
    match record.classes.get_mut(class) {
        Some(entry @ ClassEntry::Params(_)) => {
            log::debug!("{}: deleting class {}", record.name, class);
            *entry = ClassEntry::Delete;
            true
        }
        _ => false,
    }
}

fn class_params<'a>(record: &'a mut GroupRecord, class: &str) -> Result<&'a mut Params> {
    let group = record.name.clone();
    record
        .classes
        .get_mut(class)
        .and_then(ClassEntry::params_mut)
        .ok_or_else(|| Error::not_found(format!("class '{class}' is not present on group '{group}'")))
}

/// Set `param` on `class` to `value`
///
/// The class must already carry a parameter mapping; call
/// [`ensure_class_present`] first.
pub fn ensure_param(
    record: &mut GroupRecord,
    class: &str,
    param: &str,
    value: &Value,
) -> Result<bool> {
    let group = record.name.clone();
    let params = class_params(record, class)?;
    if let Some(ParamValue::Set(current)) = params.get(param)
        && current == value
    {
        return Ok(false);
    }
    log::debug!("{group}: setting {class}::{param} = {value}");
    params.insert(param.to_string(), ParamValue::Set(value.clone()));
    Ok(true)
}

/// Mark `param` on `class` for deletion
///
/// Same precondition as [`ensure_param`].
pub fn delete_param(record: &mut GroupRecord, class: &str, param: &str) -> Result<bool> {
    let group = record.name.clone();
    let params = class_params(record, class)?;
    match params.get_mut(param) {
        Some(slot @ ParamValue::Set(_)) => {
            log::debug!("{group}: deleting {class}::{param}");
            *slot = ParamValue::Delete;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Bring every class and parameter in `desired` into the record
///
/// A desired parameter of `null` is a deletion request.
pub fn ensure_classes_and_params(record: &mut GroupRecord, desired: &DesiredClasses) -> Result<bool> {
    let mut changed = false;
    for (class, params) in desired {
        log::debug!("ensuring class: {}->{}", record.name, class);
        changed = ensure_class_present(record, class) || changed;
        // a pending class deletion cannot also carry parameters
        let has_params = params.as_ref().is_some_and(|params| !params.is_empty());
        if has_params && record.classes.get(class).is_some_and(ClassEntry::is_delete) {
            return Err(Error::invalid(format!(
                "class '{class}' on group '{}' is marked for deletion",
                record.name
            )));
        }
        for (param, value) in params.iter().flatten() {
            let param_changed = match value {
                ParamValue::Set(value) => ensure_param(record, class, param, value)?,
                ParamValue::Delete => delete_param(record, class, param)?,
            };
            changed = param_changed || changed;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classes;
    use serde_json::json;

    fn record(classes: Value) -> GroupRecord {
        GroupRecord {
            name: "test".into(),
            classes: serde_json::from_value(classes).unwrap(),
            ..Default::default()
        }
    }

    fn desired(value: Value) -> DesiredClasses {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ensure_class_creates_new_class() {
        let mut group = record(json!({"foo": {}}));
        assert!(ensure_class_present(&mut group, "bar"));
        assert_eq!(group.classes["bar"], ClassEntry::empty());
    }

    #[test]
    fn test_ensure_class_existing_is_noop() {
        let mut group = record(json!({"bar": {"a": "a"}, "gone": null}));
        let before = group.clone();
        assert!(!ensure_class_present(&mut group, "bar"));
        assert!(!ensure_class_present(&mut group, "gone"));
        assert_eq!(group, before);
    }

    #[test]
    fn test_delete_class_marks_null() {
        let mut group = record(json!({"foo": {}}));
        assert!(delete_class(&mut group, "foo"));
        assert!(group.classes["foo"].is_delete());
    }

    #[test]
    fn test_delete_class_idempotent() {
        let mut group = record(json!({"foo": null}));
        let before = group.clone();
        assert!(!delete_class(&mut group, "bar"));
        assert!(!delete_class(&mut group, "foo"));
        assert_eq!(group, before);
    }

    #[test]
    fn test_ensure_param_creates_new_param() {
        let mut group = record(json!({"foo": {}}));
        ensure_class_present(&mut group, "bar");
        assert!(ensure_param(&mut group, "bar", "baz", &json!("clive")).unwrap());
        assert_eq!(group.classes["bar"].params().unwrap()["baz"], ParamValue::set("clive"));
    }

    #[test]
    fn test_ensure_param_existing_value_is_noop() {
        let mut group = record(json!({"foo": {"bar": "baz"}}));
        assert!(!ensure_param(&mut group, "foo", "bar", &json!("baz")).unwrap());
        assert!(ensure_param(&mut group, "foo", "bar", &json!("other")).unwrap());
    }

    #[test]
    fn test_ensure_param_compares_by_value() {
        let mut group = record(json!({"foo": {"list": ["a", "b"], "n": 3}}));
        assert!(!ensure_param(&mut group, "foo", "list", &json!(["a", "b"])).unwrap());
        assert!(!ensure_param(&mut group, "foo", "n", &json!(3)).unwrap());
        assert!(ensure_param(&mut group, "foo", "n", &json!("3")).unwrap());
    }

    #[test]
    fn test_ensure_param_requires_class() {
        let mut group = record(json!({"gone": null}));
        assert!(matches!(
            ensure_param(&mut group, "missing", "p", &json!(1)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            ensure_param(&mut group, "gone", "p", &json!(1)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_param_marks_null() {
        let mut group = record(json!({"foo": {"bar": "baz"}}));
        assert!(delete_param(&mut group, "foo", "bar").unwrap());
        assert_eq!(group.classes["foo"].params().unwrap()["bar"], ParamValue::Delete);
    }

    #[test]
    fn test_delete_param_idempotent() {
        let mut group = record(json!({"foo": {"bar": "baz", "gone": null}}));
        let before = group.clone();
        assert!(!delete_param(&mut group, "foo", "clive").unwrap());
        assert!(!delete_param(&mut group, "foo", "gone").unwrap());
        assert_eq!(group, before);
    }

    #[test]
    fn test_creates_params_and_classes() {
        let mut group = record(json!({}));
        let want = desired(json!({"foo": {"a": "a", "b": "b"}, "bar": {}}));
        assert!(ensure_classes_and_params(&mut group, &want).unwrap());
        let expected: Classes =
            serde_json::from_value(json!({"foo": {"a": "a", "b": "b"}, "bar": {}})).unwrap();
        assert_eq!(group.classes, expected);
    }

    #[test]
    fn test_ensure_classes_and_params_idempotent() {
        let mut group = record(json!({}));
        let want = desired(json!({"foo": {"a": "a", "b": "b"}, "bar": null}));
        assert!(ensure_classes_and_params(&mut group, &want).unwrap());
        let first = group.classes.clone();
        assert!(!ensure_classes_and_params(&mut group, &want).unwrap());
        assert_eq!(group.classes, first);
    }

    #[test]
    fn test_null_param_in_desired_deletes() {
        let mut group = record(json!({"foo": {"a": "a", "b": "b"}}));
        let want = desired(json!({"foo": {"a": null}}));
        assert!(ensure_classes_and_params(&mut group, &want).unwrap());
        assert_eq!(group.classes["foo"].params().unwrap()["a"], ParamValue::Delete);
        assert!(!ensure_classes_and_params(&mut group, &want).unwrap());
    }

    #[test]
    fn test_bare_class_pending_deletion_is_noop() {
        let mut group = record(json!({"foo": null}));
        let before = group.clone();
        assert!(!ensure_classes_and_params(&mut group, &desired(json!({"foo": null}))).unwrap());
        assert!(!ensure_classes_and_params(&mut group, &desired(json!({"foo": {}}))).unwrap());
        assert_eq!(group, before);
    }

    #[test]
    fn test_params_on_deleted_class_rejected() {
        let mut group = record(json!({"foo": null}));
        let want = desired(json!({"foo": {"a": "a"}}));
        assert!(matches!(
            ensure_classes_and_params(&mut group, &want),
            Err(Error::InvalidInput(_))
        ));
    }
}
