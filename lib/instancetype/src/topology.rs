// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Derivation of a socket/core/thread layout from a vCPU count.

use instancetype_api_types::preference::{
    PreferredCpuTopology, SpreadAcross,
};
use instancetype_api_types::PreferenceSpec;

/// Threads per core used by the spread layouts that include threads.
pub const SPREAD_THREADS_PER_CORE: u32 = 2;

/// A guest CPU layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topology {
    pub sockets: u32,
    pub cores: u32,
    pub threads: u32,
}

impl Topology {
    pub const fn new(sockets: u32, cores: u32, threads: u32) -> Self {
        Self { sockets, cores, threads }
    }

    /// The total number of vCPUs this layout provides.
    pub fn vcpus(&self) -> u64 {
        u64::from(self.sockets)
            * u64::from(self.cores)
            * u64::from(self.threads)
    }
}

/// Lays out `vcpus` according to the preference's topology and spread
/// options, or as one core per socket when there is no preference.
pub fn resolve(vcpus: u32, preference: Option<&PreferenceSpec>) -> Topology {
    match preference {
        Some(pref) => {
            let (across, ratio) = pref.spread_options();
            resolve_with(vcpus, pref.cpu_topology(), across, ratio)
        }
        None => resolve_with(
            vcpus,
            PreferredCpuTopology::default(),
            SpreadAcross::default(),
            0,
        ),
    }
}

/// Lays out `vcpus` for an explicit topology choice.
///
/// `across` and `ratio` are only consulted for
/// [`PreferredCpuTopology::Spread`]. For spread layouts the count is divided
/// by the fixed dimensions with integer division, so a count that is not a
/// multiple of them yields a layout with fewer vCPUs than requested. A count
/// smaller than the fixed dimensions (or a zero ratio) falls back to one core
/// per socket.
pub fn resolve_with(
    vcpus: u32,
    topology: PreferredCpuTopology,
    across: SpreadAcross,
    ratio: u32,
) -> Topology {
    match topology {
        PreferredCpuTopology::Sockets | PreferredCpuTopology::Any => {
            Topology::new(vcpus, 1, 1)
        }
        PreferredCpuTopology::Cores => Topology::new(1, vcpus, 1),
        PreferredCpuTopology::Threads => Topology::new(1, 1, vcpus),
        PreferredCpuTopology::Spread => spread(vcpus, across, ratio),
    }
}

fn spread(vcpus: u32, across: SpreadAcross, ratio: u32) -> Topology {
    // The ratio does not apply to CoresThreads; cores absorb the remainder.
    let (cores, threads) = match across {
        SpreadAcross::SocketsCores => (ratio, 1),
        SpreadAcross::CoresThreads => (1, SPREAD_THREADS_PER_CORE),
        SpreadAcross::SocketsCoresThreads => (ratio, SPREAD_THREADS_PER_CORE),
    };

    let fixed = cores.checked_mul(threads);
    let Some(fixed) = fixed.filter(|f| (1..=vcpus).contains(f)) else {
        return Topology::new(vcpus, 1, 1);
    };

    match across {
        SpreadAcross::CoresThreads => Topology::new(1, vcpus / fixed, threads),
        _ => Topology::new(vcpus / fixed, cores, threads),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use instancetype_api_types::preference::{CpuPreferences, SpreadOptions};
    use proptest::prelude::*;

    fn spread_pref(
        across: Option<SpreadAcross>,
        ratio: Option<u32>,
    ) -> PreferenceSpec {
        PreferenceSpec {
            cpu: Some(CpuPreferences {
                preferred_cpu_topology: Some(PreferredCpuTopology::Spread),
                spread_options: Some(SpreadOptions { across, ratio }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn single_dimension_layouts() {
        let cases = [
            (PreferredCpuTopology::Sockets, Topology::new(4, 1, 1)),
            (PreferredCpuTopology::Any, Topology::new(4, 1, 1)),
            (PreferredCpuTopology::Cores, Topology::new(1, 4, 1)),
            (PreferredCpuTopology::Threads, Topology::new(1, 1, 4)),
        ];
        for (topology, expected) in cases {
            assert_eq!(
                resolve_with(4, topology, SpreadAcross::default(), 2),
                expected,
                "{topology}"
            );
        }
    }

    #[test]
    fn no_preference_uses_sockets() {
        assert_eq!(resolve(3, None), Topology::new(3, 1, 1));
        assert_eq!(
            resolve(3, Some(&PreferenceSpec::default())),
            Topology::new(3, 1, 1)
        );
    }

    #[test]
    fn spread_layouts() {
        use SpreadAcross::*;

        // (vcpus, across, ratio, sockets, cores, threads)
        let cases = [
            (1, None, None, 1, 1, 1),
            (2, None, None, 1, 2, 1),
            (4, None, None, 2, 2, 1),
            (6, None, None, 3, 2, 1),
            (8, None, None, 4, 2, 1),
            (3, None, Some(3), 1, 3, 1),
            (12, None, Some(3), 4, 3, 1),
            (16, None, Some(4), 4, 4, 1),
            (4, Some(SocketsCoresThreads), None, 1, 2, 2),
            (16, Some(SocketsCoresThreads), None, 4, 2, 2),
            (6, Some(SocketsCoresThreads), Some(3), 1, 3, 2),
            (24, Some(SocketsCoresThreads), Some(3), 4, 3, 2),
            (24, Some(SocketsCoresThreads), Some(4), 3, 4, 2),
            (2, Some(CoresThreads), None, 1, 1, 2),
            (4, Some(CoresThreads), None, 1, 2, 2),
            (6, Some(CoresThreads), None, 1, 3, 2),
            (6, Some(CoresThreads), Some(3), 1, 3, 2),
        ];

        for (vcpus, across, ratio, sockets, cores, threads) in cases {
            let pref = spread_pref(across, ratio);
            assert_eq!(
                resolve(vcpus, Some(&pref)),
                Topology::new(sockets, cores, threads),
                "{vcpus} vCPUs across {across:?} with ratio {ratio:?}"
            );
        }
    }

    #[test]
    fn spread_with_inexact_count_truncates() {
        let pref =
            spread_pref(Some(SpreadAcross::SocketsCoresThreads), Some(4));
        let topology = resolve(36, Some(&pref));
        assert_eq!(topology, Topology::new(4, 4, 2));
        assert_eq!(topology.vcpus(), 32);
    }

    #[test]
    fn spread_with_zero_ratio_falls_back() {
        let pref = spread_pref(None, Some(0));
        assert_eq!(resolve(4, Some(&pref)), Topology::new(4, 1, 1));
    }

    proptest! {
        #[test]
        fn sockets_cores_spread_preserves_count(
            sockets in 1u32..=64,
            ratio in 1u32..=16,
        ) {
            let vcpus = sockets * ratio;
            let topology = resolve_with(
                vcpus,
                PreferredCpuTopology::Spread,
                SpreadAcross::SocketsCores,
                ratio,
            );
            prop_assert_eq!(topology, Topology::new(vcpus / ratio, ratio, 1));
            prop_assert_eq!(topology.vcpus(), u64::from(vcpus));
        }

        #[test]
        fn sockets_cores_threads_spread_preserves_count(
            sockets in 1u32..=64,
            ratio in 1u32..=16,
        ) {
            let vcpus = sockets * ratio * SPREAD_THREADS_PER_CORE;
            let topology = resolve_with(
                vcpus,
                PreferredCpuTopology::Spread,
                SpreadAcross::SocketsCoresThreads,
                ratio,
            );
            prop_assert_eq!(topology, Topology::new(sockets, ratio, 2));
            prop_assert_eq!(topology.vcpus(), u64::from(vcpus));
        }

        #[test]
        fn every_dimension_is_positive(vcpus in 1u32..=512, ratio in 0u32..=8) {
            for topology in [
                PreferredCpuTopology::Sockets,
                PreferredCpuTopology::Cores,
                PreferredCpuTopology::Threads,
                PreferredCpuTopology::Spread,
                PreferredCpuTopology::Any,
            ] {
                for across in [
                    SpreadAcross::SocketsCores,
                    SpreadAcross::CoresThreads,
                    SpreadAcross::SocketsCoresThreads,
                ] {
                    let t = resolve_with(vcpus, topology, across, ratio);
                    prop_assert!(t.sockets >= 1);
                    prop_assert!(t.cores >= 1);
                    prop_assert!(t.threads >= 1);
                    prop_assert!(t.vcpus() <= u64::from(vcpus));
                }
            }
        }
    }
}
