// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Devices attached to a virtual machine instance.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Devices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_graphics_device: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_mem_balloon: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_pod_interface: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_serial_console: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoattach_input_device: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_hotplug: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_virtio_transitional: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interface_multiqueue: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_multi_queue: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<SoundDevice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng: Option<Rng>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm: Option<Tpm>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<Gpu>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_devices: Vec<HostDevice>,

    /// Fields this model does not interpret, kept so they survive a
    /// round trip.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SoundDevice {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A virtio entropy source.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct Rng {}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Tpm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
}

/// A disk attached to the instance.
///
/// At most one of `disk`, `cdrom` and `lun` describes how the volume is
/// presented to the guest; a disk with none of them is presented as a plain
/// disk.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdrom: Option<CdromTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lun: Option<LunTarget>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<BlockSize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<DiskCache>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io: Option<DiskIo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_io_thread: Option<bool>,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Disk {
    /// Returns true if the disk does not yet say how it is presented.
    pub fn has_no_target(&self) -> bool {
        self.disk.is_none() && self.cdrom.is_none() && self.lun.is_none()
    }
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct DiskTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<DiskBus>,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct CdromTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<DiskBus>,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct LunTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<DiskBus>,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum DiskBus {
    Virtio,
    Sata,
    Scsi,
    Usb,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum DiskCache {
    None,
    Writethrough,
    Writeback,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum DiskIo {
    Native,
    Threads,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BlockSize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomBlockSize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_volume: Option<super::FeatureState>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CustomBlockSize {
    pub logical: u32,
    pub physical: u32,
}

/// A guest network interface.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<InterfaceMasquerade>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<InterfaceBridge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sriov: Option<InterfaceSriov>,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Interface {
    /// Returns true if a binding method has been chosen for the interface.
    pub fn has_binding(&self) -> bool {
        self.masquerade.is_some()
            || self.bridge.is_some()
            || self.sriov.is_some()
    }
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct InterfaceMasquerade {}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct InterfaceBridge {}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct InterfaceSriov {}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Input {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<InputBus>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum InputBus {
    Usb,
    Virtio,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Tablet,
}

/// A GPU passed through to the guest.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Gpu {
    pub name: String,
    pub device_name: String,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// A host device passed through to the guest.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct HostDevice {
    pub name: String,
    pub device_name: String,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}
