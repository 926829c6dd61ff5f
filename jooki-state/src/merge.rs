//! Sparse merge: the update rule applied to the persistent device state.
//!
//! The device never re-sends a full snapshot. Every notification carries only
//! the fields that changed, so the rule is overwrite-if-present and preserve
//! otherwise, applied recursively through the record tree. A field that is
//! explicitly reset to zero is indistinguishable on the wire from one that was
//! simply omitted; the `Option` wrappers keep that ambiguity visible instead
//! of collapsing it into default values.

use std::collections::HashMap;

/// Merge-if-present, applied uniformly to every record in the state tree.
pub trait SparseMerge {
    /// Fold `delta` into `self`, overwriting fields the delta carries and
    /// leaving everything else untouched.
    fn merge_from(&mut self, delta: Self);
}

/// Leaf field rule: a present delta value replaces the stored value.
pub(crate) fn overwrite<T>(slot: &mut Option<T>, delta: Option<T>) {
    if let Some(value) = delta {
        *slot = Some(value);
    }
}

/// Nested record rule: a present delta record merges into the stored record,
/// or installs itself when nothing was stored yet.
pub(crate) fn recurse<T: SparseMerge>(slot: &mut Option<T>, delta: Option<T>) {
    match (slot.as_mut(), delta) {
        (Some(current), Some(delta)) => current.merge_from(delta),
        (None, Some(delta)) => *slot = Some(delta),
        (_, None) => {}
    }
}

/// Map rule: delta entries replace stored entries key by key; stored keys the
/// delta does not mention are kept.
pub(crate) fn union<V>(slot: &mut Option<HashMap<String, V>>, delta: Option<HashMap<String, V>>) {
    if let Some(delta) = delta {
        let current = slot.get_or_insert_with(HashMap::new);
        for (key, value) in delta {
            current.insert(key, value);
        }
    }
}
