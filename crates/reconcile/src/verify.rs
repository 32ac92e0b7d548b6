//! Post-write verification
//!
//! The update call gives no usable success signal, so the only way to know a
//! write took is to re-read the group and compare. The service physically
//! removes nulled entries instead of storing them, which means the delta we
//! sent (with `null` deletion markers) and the group we read back (without
//! the deleted entries) have different shapes. Both are normalized to the
//! post-write shape before comparing:
//!
//! ```text
//! requested: {"puppet_enterprise": {"proxy": null, "keep": "keep"}, "b": null}
//! expected:  {"puppet_enterprise": {"keep": "keep"}}            ("b" must be gone)
//! ```

use crate::error::{Error, Result};
use crate::types::{ClassEntry, Classes, GroupDelta, GroupRecord};
use serde::Serialize;

/// Shape the requested classes should have after a successful write
///
/// Parameter-level deletions are dropped. Class-level deletions are dropped
/// too; [`deleted_classes_gone`] checks those.
pub fn normalize_classes(requested: &Classes) -> Classes {
    requested
        .iter()
        .filter_map(|(class, entry)| {
            entry.params().map(|params| {
                let kept = params
                    .iter()
                    .filter(|(_, value)| !value.is_delete())
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                (class.clone(), ClassEntry::Params(kept))
            })
        })
        .collect()
}

/// Check that the re-read classes reflect the requested classes
///
/// Only the classes named in the request are compared; each one must match
/// its normalized form exactly, so a parameter that should have been deleted
/// and is still present counts as a mismatch.
pub fn classes_saved(observed: &Classes, requested: &Classes) -> bool {
    normalize_classes(requested)
        .iter()
        .all(|(class, expected)| observed.get(class) == Some(expected))
}

/// Check that every class marked for deletion is absent from the re-read
pub fn deleted_classes_gone(observed: &Classes, requested: &Classes) -> bool {
    requested
        .iter()
        .filter(|(_, entry)| entry.is_delete())
        .all(|(class, _)| !observed.contains_key(class))
}

/// Check a single field; `None` in the delta means the field was not written
fn field_saved<T: PartialEq>(requested: Option<&T>, observed: Option<&T>) -> bool {
    requested.is_none_or(|want| observed == Some(want))
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

/// Confirm that `observed` (re-read after the write) reflects `delta`
///
/// A mismatch means either the write silently failed or someone else changed
/// the group in between; both are fatal and reported with the expected and
/// observed state.
pub fn verify_update(group: &str, delta: &GroupDelta, observed: &GroupRecord) -> Result<()> {
    let classes_ok = delta.classes.as_ref().is_none_or(|requested| {
        classes_saved(&observed.classes, requested)
            && deleted_classes_gone(&observed.classes, requested)
    });
    let saved = classes_ok
        && field_saved(delta.rule.as_ref(), observed.rule.as_ref())
        && field_saved(delta.environment.as_ref(), observed.environment.as_ref())
        && field_saved(
            delta.environment_trumps.as_ref(),
            observed.environment_trumps.as_ref(),
        );

    if saved {
        log::debug!("{group}: re-read matches requested delta");
        return Ok(());
    }

    log::error!("re-read of {group} does not match the requested delta");
    Err(Error::RemoteWriteUnverified {
        group: group.to_string(),
        expected: pretty(delta),
        observed: pretty(observed),
    })
}
