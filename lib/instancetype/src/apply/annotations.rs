// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::conflict::FieldPath;

use super::{MergeContext, Merger};

/// Copies instance type annotations onto the object metadata key by key.
/// A key already present with a different value is a conflict.
pub(super) struct InstancetypeAnnotations;

impl Merger for InstancetypeAnnotations {
    fn name(&self) -> &'static str {
        "instancetype-annotations"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(instancetype) = cx.instancetype else {
            return;
        };

        for (key, value) in &instancetype.annotations {
            match cx.meta.annotations.get(key) {
                Some(existing) if existing == value => {}
                Some(_) => {
                    // Annotations live in the metadata, not under the base.
                    let path = FieldPath::new(["annotations", key.as_str()]);
                    cx.conflict_at(path);
                }
                None => {
                    cx.meta.annotations.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Fills in preference annotations the metadata does not have yet.
pub(super) struct PreferenceAnnotations;

impl Merger for PreferenceAnnotations {
    fn name(&self) -> &'static str {
        "preference-annotations"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(preference) = cx.preference else {
            return;
        };

        for (key, value) in &preference.annotations {
            cx.meta
                .annotations
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}
