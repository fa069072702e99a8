// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Annotations recording which instance type and preference an object was
//! built from.

use instancetype_api_types::vm::{
    InstancetypeKind, KindParseError, PreferenceKind,
};
use instancetype_api_types::{
    InstancetypeMatcher, ObjectMeta, PreferenceMatcher,
};

pub const INSTANCETYPE_NAME: &str = "kubevirt.io/instancetype-name";
pub const CLUSTER_INSTANCETYPE_NAME: &str =
    "kubevirt.io/cluster-instancetype-name";
pub const PREFERENCE_NAME: &str = "kubevirt.io/preference-name";
pub const CLUSTER_PREFERENCE_NAME: &str = "kubevirt.io/cluster-preference-name";

/// Records the instance type named by `matcher` on `meta`.
///
/// Only the key matching the kind is written; an unset kind is a cluster
/// instance type.
pub fn stamp_instancetype(
    meta: &mut ObjectMeta,
    matcher: &InstancetypeMatcher,
) -> Result<(), KindParseError> {
    let key = match matcher.kind()? {
        InstancetypeKind::Namespaced => INSTANCETYPE_NAME,
        InstancetypeKind::Cluster => CLUSTER_INSTANCETYPE_NAME,
    };
    meta.annotations.insert(key.to_string(), matcher.name.clone());
    Ok(())
}

/// Records the preference named by `matcher` on `meta`.
pub fn stamp_preference(
    meta: &mut ObjectMeta,
    matcher: &PreferenceMatcher,
) -> Result<(), KindParseError> {
    let key = match matcher.kind()? {
        PreferenceKind::Namespaced => PREFERENCE_NAME,
        PreferenceKind::Cluster => CLUSTER_PREFERENCE_NAME,
    };
    meta.annotations.insert(key.to_string(), matcher.name.clone());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn instancetype(kind: Option<&str>) -> InstancetypeMatcher {
        InstancetypeMatcher {
            name: "u1.small".to_string(),
            kind: kind.map(str::to_string),
            ..Default::default()
        }
    }

    fn preference(kind: Option<&str>) -> PreferenceMatcher {
        PreferenceMatcher {
            name: "fedora".to_string(),
            kind: kind.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn instancetype_by_kind() {
        let cases = [
            (Some("VirtualMachineInstancetype"), INSTANCETYPE_NAME),
            (Some("virtualmachineinstancetypes"), INSTANCETYPE_NAME),
            (
                Some("VirtualMachineClusterInstancetype"),
                CLUSTER_INSTANCETYPE_NAME,
            ),
            (Some(""), CLUSTER_INSTANCETYPE_NAME),
            (None, CLUSTER_INSTANCETYPE_NAME),
        ];

        for (kind, key) in cases {
            let mut meta = ObjectMeta::default();
            stamp_instancetype(&mut meta, &instancetype(kind)).unwrap();
            assert_eq!(meta.annotations.len(), 1, "{kind:?}");
            assert_eq!(meta.annotations[key], "u1.small", "{kind:?}");
        }
    }

    #[test]
    fn preference_by_kind() {
        let cases = [
            (Some("VirtualMachinePreference"), PREFERENCE_NAME),
            (Some("VirtualMachineClusterPreference"), CLUSTER_PREFERENCE_NAME),
            (None, CLUSTER_PREFERENCE_NAME),
        ];

        for (kind, key) in cases {
            let mut meta = ObjectMeta::default();
            stamp_preference(&mut meta, &preference(kind)).unwrap();
            assert_eq!(meta.annotations.len(), 1, "{kind:?}");
            assert_eq!(meta.annotations[key], "fedora", "{kind:?}");
        }
    }

    #[test]
    fn existing_annotations_are_kept() {
        let mut meta = ObjectMeta::default();
        meta.annotations.insert("other".to_string(), "x".to_string());
        meta.annotations
            .insert(CLUSTER_INSTANCETYPE_NAME.to_string(), "old".to_string());

        stamp_instancetype(&mut meta, &instancetype(None)).unwrap();
        stamp_preference(&mut meta, &preference(None)).unwrap();

        assert_eq!(meta.annotations["other"], "x");
        assert_eq!(meta.annotations[CLUSTER_INSTANCETYPE_NAME], "u1.small");
        assert_eq!(meta.annotations[CLUSTER_PREFERENCE_NAME], "fedora");
    }

    #[test]
    fn unknown_kind() {
        let mut meta = ObjectMeta::default();
        assert!(stamp_instancetype(&mut meta, &instancetype(Some("Pod")))
            .is_err());
        assert!(stamp_preference(&mut meta, &preference(Some("Pod"))).is_err());
        assert!(meta.annotations.is_empty());
    }
}
