// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application of instance types and preferences onto an instance spec.
//!
//! Each category of the spec is handled by a [`Merger`]. Most categories are
//! a single field and are described declaratively by a [`FieldRule`]; the
//! rest (CPU, memory, annotations, devices, features, firmware, clock) have
//! dedicated mergers. [`SpecApplier`] runs every merger in a fixed order and
//! collects the conflicts they report.
//!
//! The precedence for a single field is:
//!
//! - If the field is already set, a value from the instance type is never
//!   written and a conflict is recorded instead, even when the values are
//!   equal. A value from the preference is silently skipped.
//! - Otherwise the instance type's value is written if it has one, else the
//!   preference's.

use instancetype_api_types::{
    InstancetypeSpec, ObjectMeta, PreferenceSpec, VirtualMachineInstanceSpec,
};
use slog::{debug, info, Logger};

use crate::conflict::{Conflict, Conflicts, FieldPath};

mod annotations;
mod clock;
mod cpu;
mod devices;
mod features;
mod field;
mod firmware;
mod memory;

use field::FieldRule;

/// State shared by the mergers during one application.
pub(crate) struct MergeContext<'a> {
    base: &'a FieldPath,
    pub instancetype: Option<&'a InstancetypeSpec>,
    pub preference: Option<&'a PreferenceSpec>,
    pub spec: &'a mut VirtualMachineInstanceSpec,
    pub meta: &'a mut ObjectMeta,
    conflicts: Conflicts,
}

impl MergeContext<'_> {
    /// Records a conflict at `segments` below the base path.
    pub fn conflict(&mut self, segments: &[&str]) {
        self.conflicts.push(Conflict::new(self.base.child(segments)));
    }

    pub fn conflict_if(&mut self, set: bool, segments: &[&str]) {
        if set {
            self.conflict(segments);
        }
    }

    /// Records a conflict at an absolute path, ignoring the base path.
    pub fn conflict_at(&mut self, path: FieldPath) {
        self.conflicts.push(Conflict::new(path));
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Merges one category of an instance type and preference into a spec.
pub(crate) trait Merger: Send + Sync {
    fn name(&self) -> &'static str;
    fn merge(&self, cx: &mut MergeContext<'_>);
}

/// Applies instance types and preferences to instance specs.
///
/// An applier holds no per-call state and can be reused. The spec passed to
/// [`SpecApplier::apply`] is borrowed mutably for the duration of the call
/// only, so one spec can never be merged into by two calls at once.
pub struct SpecApplier {
    log: Logger,
    mergers: Vec<Box<dyn Merger>>,
}

impl SpecApplier {
    pub fn new(log: Logger) -> Self {
        Self { log, mergers: mergers() }
    }

    /// Applies `instancetype` and `preference` to `spec` and `meta`.
    ///
    /// Conflict paths for spec fields are rendered below `base`, e.g.
    /// `spec.template.spec`. A non-empty result means the combination should
    /// be rejected; the spec may have been partially updated.
    pub fn apply(
        &self,
        base: &FieldPath,
        instancetype: Option<&InstancetypeSpec>,
        preference: Option<&PreferenceSpec>,
        spec: &mut VirtualMachineInstanceSpec,
        meta: &mut ObjectMeta,
    ) -> Conflicts {
        if instancetype.is_none() && preference.is_none() {
            return Conflicts::new();
        }

        let mut cx = MergeContext {
            base,
            instancetype,
            preference,
            spec,
            meta,
            conflicts: Conflicts::new(),
        };

        for merger in &self.mergers {
            let before = cx.conflict_count();
            merger.merge(&mut cx);
            debug!(self.log, "merged {}", merger.name();
                "conflicts" => cx.conflict_count() - before);
        }

        if !cx.conflicts.is_empty() {
            info!(self.log, "instance type and preference rejected";
                "conflicts" => %cx.conflicts);
        }

        cx.conflicts
    }
}

fn none<S, T>(_: &S) -> Option<T> {
    None
}

/// The mergers in the order they are applied. Every instance type category
/// comes before the preference-only categories.
fn mergers() -> Vec<Box<dyn Merger>> {
    let mut mergers: Vec<Box<dyn Merger>> = Vec::new();

    mergers.push(Box::new(cpu::CpuMerger));
    mergers.push(Box::new(memory::MemoryMerger));
    mergers.push(Box::new(FieldRule {
        name: "io-threads-policy",
        path: &["domain", "ioThreadsPolicy"],
        instancetype: |it| it.io_threads_policy,
        preference: none,
        is_set: |spec| spec.domain.io_threads_policy.is_some(),
        write: |spec, v| spec.domain.io_threads_policy = Some(v),
    }));
    mergers.push(Box::new(FieldRule {
        name: "launch-security",
        path: &["domain", "launchSecurity"],
        instancetype: |it| it.launch_security.clone(),
        preference: none,
        is_set: |spec| spec.domain.launch_security.is_some(),
        write: |spec, v| spec.domain.launch_security = Some(v),
    }));
    mergers.push(Box::new(FieldRule {
        name: "gpus",
        path: &["domain", "devices", "gpus"],
        instancetype: |it| (!it.gpus.is_empty()).then(|| it.gpus.clone()),
        preference: none,
        is_set: |spec| !spec.domain.devices.gpus.is_empty(),
        write: |spec, v| spec.domain.devices.gpus = v,
    }));
    mergers.push(Box::new(FieldRule {
        name: "host-devices",
        path: &["domain", "devices", "hostDevices"],
        instancetype: |it| {
            (!it.host_devices.is_empty()).then(|| it.host_devices.clone())
        },
        preference: none,
        is_set: |spec| !spec.domain.devices.host_devices.is_empty(),
        write: |spec, v| spec.domain.devices.host_devices = v,
    }));
    mergers.push(Box::new(FieldRule {
        name: "node-selector",
        path: &["nodeSelector"],
        instancetype: |it| {
            (!it.node_selector.is_empty()).then(|| it.node_selector.clone())
        },
        preference: none,
        is_set: |spec| !spec.node_selector.is_empty(),
        write: |spec, v| spec.node_selector = v,
    }));
    mergers.push(Box::new(FieldRule {
        name: "scheduler-name",
        path: &["schedulerName"],
        instancetype: |it| it.scheduler_name.clone(),
        preference: none,
        is_set: |spec| spec.scheduler_name.is_some(),
        write: |spec, v| spec.scheduler_name = Some(v),
    }));
    mergers.push(Box::new(annotations::InstancetypeAnnotations));

    mergers.push(Box::new(cpu::PreferredCpuFeatures));
    mergers.push(Box::new(devices::DeviceMerger));
    mergers.push(Box::new(features::FeatureMerger));
    mergers.push(Box::new(firmware::FirmwareMerger));
    mergers.push(Box::new(FieldRule {
        name: "machine",
        path: &["domain", "machine", "type"],
        instancetype: none,
        preference: |pref| {
            pref.machine.as_ref()?.preferred_machine_type.clone()
        },
        is_set: |spec| {
            spec.domain
                .machine
                .as_ref()
                .is_some_and(|m| m.machine_type.is_some())
        },
        write: |spec, v| {
            spec.domain
                .machine
                .get_or_insert_with(Default::default)
                .machine_type = Some(v)
        },
    }));
    mergers.push(Box::new(clock::ClockMerger));
    mergers.push(Box::new(FieldRule {
        name: "subdomain",
        path: &["subdomain"],
        instancetype: none,
        preference: |pref| pref.preferred_subdomain.clone(),
        is_set: |spec| spec.subdomain.is_some(),
        write: |spec, v| spec.subdomain = Some(v),
    }));
    mergers.push(Box::new(FieldRule {
        name: "termination-grace-period",
        path: &["terminationGracePeriodSeconds"],
        instancetype: none,
        preference: |pref| pref.preferred_termination_grace_period_seconds,
        is_set: |spec| spec.termination_grace_period_seconds.is_some(),
        write: |spec, v| spec.termination_grace_period_seconds = Some(v),
    }));
    mergers.push(Box::new(annotations::PreferenceAnnotations));

    mergers
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use instancetype_api_types::instancetype::CpuInstancetype;
    use instancetype_api_types::vmi::IoThreadsPolicy;
    use slog::Discard;

    pub(crate) const BASE: &str = "spec.template.spec";

    pub(crate) fn applier() -> SpecApplier {
        SpecApplier::new(Logger::root(Discard, slog::o!()))
    }

    /// Applies to `spec` with a throwaway metadata block.
    pub(crate) fn apply(
        instancetype: Option<&InstancetypeSpec>,
        preference: Option<&PreferenceSpec>,
        spec: &mut VirtualMachineInstanceSpec,
    ) -> Conflicts {
        let mut meta = ObjectMeta::default();
        applier().apply(
            &FieldPath::from(BASE),
            instancetype,
            preference,
            spec,
            &mut meta,
        )
    }

    #[test]
    fn nothing_to_apply() {
        let mut spec = VirtualMachineInstanceSpec::default();
        assert!(apply(None, None, &mut spec).is_empty());
        assert_eq!(spec, VirtualMachineInstanceSpec::default());
    }

    #[test]
    fn merger_names_are_unique() {
        let mergers = mergers();
        let mut names: Vec<_> = mergers.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), mergers.len());
    }

    #[test]
    fn conflicts_do_not_stop_other_categories() {
        let instancetype = InstancetypeSpec {
            cpu: Some(CpuInstancetype { guest: 2, ..Default::default() }),
            io_threads_policy: Some(IoThreadsPolicy::Shared),
            ..Default::default()
        };
        let mut spec = VirtualMachineInstanceSpec::default();
        spec.domain.io_threads_policy = Some(IoThreadsPolicy::Auto);

        let conflicts = apply(Some(&instancetype), None, &mut spec);
        assert_eq!(
            conflicts.paths(),
            vec!["spec.template.spec.domain.ioThreadsPolicy"]
        );
        assert_eq!(spec.domain.io_threads_policy, Some(IoThreadsPolicy::Auto));
        assert_eq!(spec.domain.cpu.as_ref().and_then(|c| c.sockets), Some(2));
    }
}
