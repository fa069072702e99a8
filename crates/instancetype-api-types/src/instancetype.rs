// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance types: named bundles of hard resource allocations.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::vmi::{
    Gpu, HostDevice, Hugepages, IoThreadsPolicy, LaunchSecurity, Numa,
    Realtime,
};
use crate::Quantity;

/// The resources an instance type allocates to every instance that uses it.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct InstancetypeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuInstancetype>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInstancetype>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_threads_policy: Option<IoThreadsPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_security: Option<LaunchSecurity>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<Gpu>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_devices: Vec<HostDevice>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CpuInstancetype {
    /// The number of vCPUs presented to the guest.
    pub guest: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_cpu_placement: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolate_emulator_thread: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numa: Option<Numa>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<Realtime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sockets: Option<u32>,
}

#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MemoryInstancetype {
    /// The amount of memory presented to the guest.
    pub guest: Quantity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<Hugepages>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_guest: Option<Quantity>,

    /// Percentage of guest memory the scheduler may leave unreserved.
    /// Ignored when hugepages are requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overcommit_percent: Option<u8>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_instancetype() {
        let raw = r#"{
            "cpu": { "guest": 4, "model": "host-passthrough" },
            "memory": { "guest": "8Gi", "overcommitPercent": 15 },
            "ioThreadsPolicy": "auto",
            "gpus": [{ "name": "gpu0", "deviceName": "nvidia.com/A100" }],
            "annotations": { "team": "storage" }
        }"#;

        let spec: InstancetypeSpec = serde_json::from_str(raw).unwrap();
        let cpu = spec.cpu.as_ref().unwrap();
        assert_eq!(cpu.guest, 4);
        assert_eq!(cpu.model.as_deref(), Some("host-passthrough"));
        let memory = spec.memory.as_ref().unwrap();
        assert_eq!(memory.guest, Quantity::from_bytes(8 << 30));
        assert_eq!(memory.overcommit_percent, Some(15));
        assert_eq!(spec.io_threads_policy, Some(IoThreadsPolicy::Auto));
        assert_eq!(spec.gpus[0].device_name, "nvidia.com/A100");
        assert_eq!(spec.annotations["team"], "storage");
        assert!(spec.scheduler_name.is_none());
    }

    #[test]
    fn guest_is_required() {
        let raw = r#"{ "cpu": { "model": "host-passthrough" } }"#;
        assert!(serde_json::from_str::<InstancetypeSpec>(raw).is_err());
    }

    #[test]
    fn typos_are_rejected() {
        for raw in [
            r#"{ "cpu": { "guest": 2 }, "nodeSelectr": { "a": "b" } }"#,
            r#"{ "cpu": { "guest": 2, "dedicatedCPUPlacement": true } }"#,
        ] {
            assert!(serde_json::from_str::<InstancetypeSpec>(raw).is_err());
        }
    }

    #[test]
    fn guest_memory_as_integer() {
        let raw = r#"{ "memory": { "guest": 2147483648 } }"#;
        let spec: InstancetypeSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec.memory.unwrap().guest, Quantity::from_bytes(2 << 30));
    }
}
