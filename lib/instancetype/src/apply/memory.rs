// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use instancetype_api_types::vmi::ResourceName;
use instancetype_api_types::Quantity;

use super::{MergeContext, Merger};

/// Writes the instance type's guest memory, hugepages and ceiling, and the
/// memory request implied by its overcommit percentage.
///
/// Like the CPU category this is all-or-nothing.
pub(super) struct MemoryMerger;

impl Merger for MemoryMerger {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(memory) = cx.instancetype.and_then(|it| it.memory.as_ref())
        else {
            return;
        };

        let current = cx.spec.domain.memory.clone().unwrap_or_default();
        let resources = &cx.spec.domain.resources;
        let has_request =
            resources.requests.contains_key(&ResourceName::Memory);
        let has_limit = resources.limits.contains_key(&ResourceName::Memory);

        let before = cx.conflict_count();
        cx.conflict_if(current.guest.is_some(), &["domain", "memory"]);
        cx.conflict_if(
            current.hugepages.is_some() && memory.hugepages.is_some(),
            &["domain", "memory", "hugepages"],
        );
        cx.conflict_if(
            current.max_guest.is_some() && memory.max_guest.is_some(),
            &["domain", "memory", "maxGuest"],
        );
        cx.conflict_if(
            has_request,
            &["domain", "resources", "requests", "memory"],
        );
        cx.conflict_if(has_limit, &["domain", "resources", "limits", "memory"]);
        if cx.conflict_count() > before {
            return;
        }

        let target = cx.spec.domain.memory.get_or_insert_with(Default::default);
        target.guest = Some(memory.guest);
        if let Some(hugepages) = &memory.hugepages {
            target.hugepages = Some(hugepages.clone());
        }
        if let Some(max_guest) = memory.max_guest {
            target.max_guest = Some(max_guest);
        }

        let overcommit = memory.overcommit_percent.unwrap_or(0);
        if overcommit > 0 && memory.hugepages.is_none() {
            cx.spec.domain.resources.requests.insert(
                ResourceName::Memory,
                overcommitted(memory.guest, overcommit),
            );
        }
    }
}

/// The share of `guest` left after overcommitting by `percent`, rounded down.
fn overcommitted(guest: Quantity, percent: u8) -> Quantity {
    let kept = u128::from(100u8.saturating_sub(percent));
    let value = u128::from(guest.value()) * kept / 100;
    // `value` never exceeds `guest`, so it always fits.
    Quantity::from_bytes(u64::try_from(value).unwrap_or(u64::MAX))
}
