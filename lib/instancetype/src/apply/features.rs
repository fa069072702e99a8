// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use instancetype_api_types::vmi::FeatureHyperv;

use super::{MergeContext, Merger};

/// Fills unset hypervisor features from the preference. Hyper-V
/// enlightenments are merged one by one.
pub(super) struct FeatureMerger;

impl Merger for FeatureMerger {
    fn name(&self) -> &'static str {
        "features"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(prefs) = cx.preference.and_then(|p| p.features.as_ref()) else {
            return;
        };

        let features =
            cx.spec.domain.features.get_or_insert_with(Default::default);

        if features.acpi.is_none() {
            features.acpi = prefs.preferred_acpi.clone();
        }
        if features.apic.is_none() {
            features.apic = prefs.preferred_apic.clone();
        }
        if let Some(preferred) = &prefs.preferred_hyperv {
            let hyperv = features.hyperv.get_or_insert_with(Default::default);
            merge_hyperv(hyperv, preferred);
        }
        if features.kvm.is_none() {
            features.kvm = prefs.preferred_kvm.clone();
        }
        if features.pvspinlock.is_none() {
            features.pvspinlock = prefs.preferred_pvspinlock.clone();
        }
        if features.smm.is_none() {
            features.smm = prefs.preferred_smm.clone();
        }
    }
}

fn merge_hyperv(target: &mut FeatureHyperv, preferred: &FeatureHyperv) {
    macro_rules! fill {
        ($($field:ident),* $(,)?) => {
            $(
                if target.$field.is_none() {
                    target.$field = preferred.$field.clone();
                }
            )*
        };
    }

    fill!(
        relaxed,
        vapic,
        spinlocks,
        vpindex,
        runtime,
        synic,
        synictimer,
        reset,
        vendorid,
        frequencies,
        reenlightenment,
        tlbflush,
        ipi,
        evmcs,
    );
}
