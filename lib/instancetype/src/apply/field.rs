// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use instancetype_api_types::{
    InstancetypeSpec, PreferenceSpec, VirtualMachineInstanceSpec,
};

use super::{MergeContext, Merger};

/// A single target field, merged with the default precedence.
pub(crate) struct FieldRule<T> {
    pub name: &'static str,
    /// Conflict path below the base path.
    pub path: &'static [&'static str],
    pub instancetype: fn(&InstancetypeSpec) -> Option<T>,
    pub preference: fn(&PreferenceSpec) -> Option<T>,
    pub is_set: fn(&VirtualMachineInstanceSpec) -> bool,
    pub write: fn(&mut VirtualMachineInstanceSpec, T),
}

impl<T> Merger for FieldRule<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let from_instancetype = cx.instancetype.and_then(self.instancetype);

        if (self.is_set)(cx.spec) {
            cx.conflict_if(from_instancetype.is_some(), self.path);
            return;
        }

        let value = from_instancetype
            .or_else(|| cx.preference.and_then(self.preference));
        if let Some(value) = value {
            (self.write)(cx.spec, value);
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use instancetype_api_types::preference::MachinePreferences;
    use instancetype_api_types::vmi::{
        Gpu, HostDevice, LaunchSecurity, Machine, Sev,
    };

    use crate::apply::test::apply;

    use super::*;

    fn node_selector() -> BTreeMap<String, String> {
        BTreeMap::from([("key".to_string(), "value".to_string())])
    }

    #[test]
    fn node_selector_and_scheduler_name() {
        let instancetype = InstancetypeSpec {
            node_selector: node_selector(),
            scheduler_name: Some("ultra-scheduler".to_string()),
            ..Default::default()
        };

        let mut spec = VirtualMachineInstanceSpec::default();
        assert!(apply(Some(&instancetype), None, &mut spec).is_empty());
        assert_eq!(spec.node_selector, node_selector());
        assert_eq!(spec.scheduler_name.as_deref(), Some("ultra-scheduler"));

        let mut spec = VirtualMachineInstanceSpec {
            node_selector: BTreeMap::from([("a".to_string(), "b".to_string())]),
            scheduler_name: Some("ultra-scheduler".to_string()),
            ..Default::default()
        };
        let conflicts = apply(Some(&instancetype), None, &mut spec);
        assert_eq!(
            conflicts.paths(),
            vec![
                "spec.template.spec.nodeSelector",
                "spec.template.spec.schedulerName"
            ]
        );
        assert_eq!(spec.node_selector["a"], "b");
    }

    #[test]
    fn devices_and_launch_security() {
        let gpus = vec![Gpu {
            name: "barfoo".to_string(),
            device_name: "vendor.com/gpu_name".to_string(),
            ..Default::default()
        }];
        let host_devices = vec![HostDevice {
            name: "foobar".to_string(),
            device_name: "vendor.com/device_name".to_string(),
            ..Default::default()
        }];
        let instancetype = InstancetypeSpec {
            launch_security: Some(LaunchSecurity { sev: Some(Sev::default()) }),
            gpus: gpus.clone(),
            host_devices: host_devices.clone(),
            ..Default::default()
        };

        let mut spec = VirtualMachineInstanceSpec::default();
        assert!(apply(Some(&instancetype), None, &mut spec).is_empty());
        assert_eq!(spec.domain.launch_security, instancetype.launch_security);
        assert_eq!(spec.domain.devices.gpus, gpus);
        assert_eq!(spec.domain.devices.host_devices, host_devices);

        let conflicts = apply(Some(&instancetype), None, &mut spec);
        assert_eq!(
            conflicts.paths(),
            vec![
                "spec.template.spec.domain.launchSecurity",
                "spec.template.spec.domain.devices.gpus",
                "spec.template.spec.domain.devices.hostDevices",
            ]
        );
    }

    #[test]
    fn preference_fields_never_conflict() {
        let preference = PreferenceSpec {
            machine: Some(MachinePreferences {
                preferred_machine_type: Some("q35".to_string()),
            }),
            preferred_subdomain: Some("sub".to_string()),
            preferred_termination_grace_period_seconds: Some(180),
            ..Default::default()
        };

        let mut spec = VirtualMachineInstanceSpec::default();
        assert!(apply(None, Some(&preference), &mut spec).is_empty());
        assert_eq!(
            spec.domain.machine,
            Some(Machine { machine_type: Some("q35".to_string()) })
        );
        assert_eq!(spec.subdomain.as_deref(), Some("sub"));
        assert_eq!(spec.termination_grace_period_seconds, Some(180));

        let mut spec = VirtualMachineInstanceSpec {
            subdomain: Some("mine".to_string()),
            termination_grace_period_seconds: Some(0),
            ..Default::default()
        };
        spec.domain.machine =
            Some(Machine { machine_type: Some("pc".to_string()) });
        assert!(apply(None, Some(&preference), &mut spec).is_empty());
        assert_eq!(spec.subdomain.as_deref(), Some("mine"));
        assert_eq!(spec.termination_grace_period_seconds, Some(0));
        assert_eq!(
            spec.domain.machine.and_then(|m| m.machine_type).as_deref(),
            Some("pc")
        );
    }
}
