// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Preferences: named bundles of soft defaults, applied only where an
//! instance leaves a field unset.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::vmi::{
    BlockSize, ClockOffset, CpuFeature, DiskBus, DiskCache, DiskIo, Efi,
    FeatureApic, FeatureHyperv, FeatureKvm, FeatureState, InputBus, InputType,
    InterfaceMasquerade, Rng, Timer, Tpm,
};
use crate::Quantity;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PreferenceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuPreferences>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryPreferences>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<DevicePreferences>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeaturePreferences>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwarePreferences>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachinePreferences>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<ClockPreferences>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_subdomain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_termination_grace_period_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<PreferenceRequirements>,
}

impl PreferenceSpec {
    /// The preferred vCPU topology, defaulting to
    /// [`PreferredCpuTopology::Sockets`].
    pub fn cpu_topology(&self) -> PreferredCpuTopology {
        self.cpu
            .as_ref()
            .and_then(|cpu| cpu.preferred_cpu_topology)
            .unwrap_or_default()
    }

    /// The spread axes and ratio, with defaults filled in.
    pub fn spread_options(&self) -> (SpreadAcross, u32) {
        let opts =
            self.cpu.as_ref().and_then(|cpu| cpu.spread_options.as_ref());
        let across = opts.and_then(|o| o.across).unwrap_or_default();
        let ratio = opts.and_then(|o| o.ratio).unwrap_or(DEFAULT_SPREAD_RATIO);
        (across, ratio)
    }
}

/// The number of cores per socket used by a spread topology when no ratio
/// is given.
pub const DEFAULT_SPREAD_RATIO: u32 = 2;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    Display,
    EnumString,
    JsonSchema,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum PreferredCpuTopology {
    #[default]
    Sockets,
    Cores,
    Threads,
    Spread,
    Any,
}

/// The topology dimensions a spread preference distributes vCPUs across.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    Display,
    EnumString,
    JsonSchema,
)]
pub enum SpreadAcross {
    #[default]
    SocketsCores,
    CoresThreads,
    SocketsCoresThreads,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SpreadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub across: Option<SpreadAcross>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<u32>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CpuPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_cpu_topology: Option<PreferredCpuTopology>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_options: Option<SpreadOptions>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_cpu_features: Vec<CpuFeature>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MemoryPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_hugepages_page_size: Option<String>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DevicePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_graphics_device: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_mem_balloon: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_pod_interface: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_serial_console: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_autoattach_input_device: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_disable_hotplug: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_virtio_transitional: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_network_interface_multi_queue: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_block_multi_queue: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_disk_bus: Option<DiskBus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_disk_block_size: Option<BlockSize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_disk_cache: Option<DiskCache>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_disk_io: Option<DiskIo>,

    /// Only honoured for disks on the virtio bus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_disk_dedicated_io_thread: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_cdrom_bus: Option<DiskBus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_lun_bus: Option<DiskBus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_interface_model: Option<String>,

    /// Only honoured for pod network interfaces with no binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_interface_masquerade: Option<InterfaceMasquerade>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_input_bus: Option<InputBus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_input_type: Option<InputType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_sound_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_rng: Option<Rng>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_tpm: Option<Tpm>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FeaturePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_acpi: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_apic: Option<FeatureApic>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_hyperv: Option<FeatureHyperv>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_kvm: Option<FeatureKvm>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_pvspinlock: Option<FeatureState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_smm: Option<FeatureState>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FirmwarePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_bios: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_bios_serial: Option<bool>,

    /// Supersedes `preferred_use_efi` and `preferred_use_secure_boot`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_efi: Option<Efi>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_efi: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_use_secure_boot: Option<bool>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MachinePreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_machine_type: Option<String>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ClockPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_clock_offset: Option<ClockOffset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_timer: Option<Timer>,
}

/// Minimum resources an instance type, or the instance itself, must provide
/// for the preference to be usable.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PreferenceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuPreferenceRequirement>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryPreferenceRequirement>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CpuPreferenceRequirement {
    pub guest: u32,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MemoryPreferenceRequirement {
    pub guest: Quantity,
}
