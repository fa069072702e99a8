// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use instancetype_api_types::vmi::ResourceName;

use super::{MergeContext, Merger};
use crate::topology;

/// Writes the instance type's vCPU layout and CPU options.
///
/// The category is all-or-nothing: if any field the instance type would
/// write (or a CPU resource request or limit) is already set, each such field
/// is reported and nothing is written.
pub(super) struct CpuMerger;

impl Merger for CpuMerger {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(guest) = cx.instancetype.and_then(|it| it.cpu.as_ref()) else {
            return;
        };

        let current = cx.spec.domain.cpu.clone().unwrap_or_default();
        let resources = &cx.spec.domain.resources;
        let has_request = resources.requests.contains_key(&ResourceName::Cpu);
        let has_limit = resources.limits.contains_key(&ResourceName::Cpu);

        let before = cx.conflict_count();
        cx.conflict_if(
            current.sockets.is_some(),
            &["domain", "cpu", "sockets"],
        );
        cx.conflict_if(current.cores.is_some(), &["domain", "cpu", "cores"]);
        cx.conflict_if(
            current.threads.is_some(),
            &["domain", "cpu", "threads"],
        );
        cx.conflict_if(
            has_request,
            &["domain", "resources", "requests", "cpu"],
        );
        cx.conflict_if(has_limit, &["domain", "resources", "limits", "cpu"]);
        cx.conflict_if(
            current.model.is_some() && guest.model.is_some(),
            &["domain", "cpu", "model"],
        );
        cx.conflict_if(
            current.dedicated_cpu_placement.is_some()
                && guest.dedicated_cpu_placement.is_some(),
            &["domain", "cpu", "dedicatedCpuPlacement"],
        );
        cx.conflict_if(
            current.isolate_emulator_thread.is_some()
                && guest.isolate_emulator_thread.is_some(),
            &["domain", "cpu", "isolateEmulatorThread"],
        );
        cx.conflict_if(
            current.numa.is_some() && guest.numa.is_some(),
            &["domain", "cpu", "numa"],
        );
        cx.conflict_if(
            current.realtime.is_some() && guest.realtime.is_some(),
            &["domain", "cpu", "realtime"],
        );
        cx.conflict_if(
            current.max_sockets.is_some() && guest.max_sockets.is_some(),
            &["domain", "cpu", "maxSockets"],
        );
        if cx.conflict_count() > before {
            return;
        }

        let layout = topology::resolve(guest.guest, cx.preference);
        let cpu = cx.spec.domain.cpu.get_or_insert_with(Default::default);
        cpu.sockets = Some(layout.sockets);
        cpu.cores = Some(layout.cores);
        cpu.threads = Some(layout.threads);

        if let Some(model) = &guest.model {
            cpu.model = Some(model.clone());
        }
        if let Some(dedicated) = guest.dedicated_cpu_placement {
            cpu.dedicated_cpu_placement = Some(dedicated);
        }
        if let Some(isolate) = guest.isolate_emulator_thread {
            cpu.isolate_emulator_thread = Some(isolate);
        }
        if let Some(numa) = &guest.numa {
            cpu.numa = Some(numa.clone());
        }
        if let Some(realtime) = &guest.realtime {
            cpu.realtime = Some(realtime.clone());
        }
        if let Some(max_sockets) = guest.max_sockets {
            cpu.max_sockets = Some(max_sockets);
        }
    }
}

/// Adds the preference's CPU features that the spec does not name yet.
/// Features the spec already names keep their policy.
pub(super) struct PreferredCpuFeatures;

impl Merger for PreferredCpuFeatures {
    fn name(&self) -> &'static str {
        "cpu-features"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(preferred) = cx
            .preference
            .and_then(|pref| pref.cpu.as_ref())
            .map(|cpu| &cpu.preferred_cpu_features)
            .filter(|features| !features.is_empty())
        else {
            return;
        };

        let cpu = cx.spec.domain.cpu.get_or_insert_with(Default::default);
        for feature in preferred {
            if !cpu.features.iter().any(|f| f.name == feature.name) {
                cpu.features.push(feature.clone());
            }
        }
    }
}
