//! Annotation merge.
//!
//! An absent annotation map is installed whole in a single `add`; otherwise
//! each key is added or replaced individually so existing annotations are
//! preserved and repeated keys never overwrite each other.

use std::collections::BTreeMap;

use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use serde_json::Value;

use super::pointer;

/// Operations merging `added` into the annotations `current`.
///
/// Keys already holding the wanted value produce no operation.
pub fn merge_patch(
    current: Option<&BTreeMap<String, String>>,
    added: &BTreeMap<String, String>,
) -> Vec<PatchOperation> {
    let Some(current) = current else {
        if added.is_empty() {
            return Vec::new();
        }
        let map = added
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        return vec![PatchOperation::Add(AddOperation {
            path: pointer(["metadata", "annotations"]),
            value: Value::Object(map),
        })];
    };

    added
        .iter()
        .filter_map(|(key, value)| {
            let existing = current.get(key);
            if existing == Some(value) {
                return None;
            }
            let path = pointer(["metadata", "annotations", key.as_str()]);
            let value = Value::String(value.clone());
            Some(match existing {
                None => PatchOperation::Add(AddOperation { path, value }),
                Some(_) => PatchOperation::Replace(ReplaceOperation { path, value }),
            })
        })
        .collect()
}

/// Merge `added` into `target` in place.
pub fn merge(target: &mut Option<BTreeMap<String, String>>, added: &BTreeMap<String, String>) {
    if added.is_empty() {
        return;
    }
    target
        .get_or_insert_with(BTreeMap::new)
        .extend(added.iter().map(|(k, v)| (k.clone(), v.clone())));
}
