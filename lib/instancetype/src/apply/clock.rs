// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{MergeContext, Merger};

/// Fills the clock offset and timer from the preference. The offset is only
/// applied when neither a UTC nor a timezone offset is set.
pub(super) struct ClockMerger;

impl Merger for ClockMerger {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(prefs) = cx.preference.and_then(|p| p.clock.as_ref()) else {
            return;
        };
        if prefs.preferred_clock_offset.is_none()
            && prefs.preferred_timer.is_none()
        {
            return;
        }

        let clock = cx.spec.domain.clock.get_or_insert_with(Default::default);
        if let Some(offset) = &prefs.preferred_clock_offset {
            if !clock.offset.is_set() {
                clock.offset = offset.clone();
            }
        }
        if clock.timer.is_none() {
            clock.timer = prefs.preferred_timer.clone();
        }
    }
}

#[cfg(test)]
mod test {
    use instancetype_api_types::preference::ClockPreferences;
    use instancetype_api_types::vmi::{
        Clock, ClockOffset, ClockOffsetUtc, Timer, TimerSource,
    };
    use instancetype_api_types::{PreferenceSpec, VirtualMachineInstanceSpec};

    use crate::apply::test::apply;

    fn preference() -> PreferenceSpec {
        PreferenceSpec {
            clock: Some(ClockPreferences {
                preferred_clock_offset: Some(ClockOffset {
                    utc: Some(ClockOffsetUtc { offset_seconds: Some(30) }),
                    timezone: None,
                }),
                preferred_timer: Some(Timer {
                    hyperv: Some(TimerSource::default()),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn apply_clock() {
        let preference = preference();
        let prefs = preference.clock.as_ref().unwrap();
        let mut spec = VirtualMachineInstanceSpec::default();

        assert!(apply(None, Some(&preference), &mut spec).is_empty());
        let clock = spec.domain.clock.as_ref().unwrap();
        assert_eq!(Some(&clock.offset), prefs.preferred_clock_offset.as_ref());
        assert_eq!(clock.timer, prefs.preferred_timer);
    }

    #[test]
    fn timezone_blocks_preferred_offset() {
        let preference = preference();
        let mut spec = VirtualMachineInstanceSpec::default();
        spec.domain.clock = Some(Clock {
            offset: ClockOffset {
                utc: None,
                timezone: Some("America/New_York".to_string()),
            },
            timer: None,
        });

        assert!(apply(None, Some(&preference), &mut spec).is_empty());
        let clock = spec.domain.clock.as_ref().unwrap();
        assert_eq!(clock.offset.utc, None);
        assert_eq!(clock.offset.timezone.as_deref(), Some("America/New_York"));
        assert!(clock.timer.is_some());
    }
}
