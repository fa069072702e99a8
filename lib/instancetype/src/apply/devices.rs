// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use instancetype_api_types::preference::DevicePreferences;
use instancetype_api_types::vmi::{
    Devices, DiskBus, DiskTarget, Interface, Network,
};

use super::{MergeContext, Merger};

/// Fills unset device attributes from the preference. Never conflicts.
pub(super) struct DeviceMerger;

impl Merger for DeviceMerger {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(prefs) = cx.preference.and_then(|p| p.devices.as_ref()) else {
            return;
        };

        let spec = &mut *cx.spec;
        let devices = &mut spec.domain.devices;
        apply_flags(prefs, devices);
        apply_disks(prefs, devices);
        apply_interfaces(prefs, &mut devices.interfaces, &spec.networks);
        apply_inputs(prefs, devices);

        if let (Some(sound), Some(model)) =
            (devices.sound.as_mut(), &prefs.preferred_sound_model)
        {
            sound.model.get_or_insert_with(|| model.clone());
        }
        if devices.rng.is_none() {
            devices.rng = prefs.preferred_rng.clone();
        }
        if devices.tpm.is_none() {
            devices.tpm = prefs.preferred_tpm.clone();
        }
    }
}

fn fill<T: Clone>(target: &mut Option<T>, preferred: &Option<T>) {
    if target.is_none() {
        *target = preferred.clone();
    }
}

fn apply_flags(prefs: &DevicePreferences, devices: &mut Devices) {
    fill(
        &mut devices.autoattach_graphics_device,
        &prefs.preferred_autoattach_graphics_device,
    );
    fill(
        &mut devices.autoattach_mem_balloon,
        &prefs.preferred_autoattach_mem_balloon,
    );
    fill(
        &mut devices.autoattach_pod_interface,
        &prefs.preferred_autoattach_pod_interface,
    );
    fill(
        &mut devices.autoattach_serial_console,
        &prefs.preferred_autoattach_serial_console,
    );
    fill(
        &mut devices.autoattach_input_device,
        &prefs.preferred_autoattach_input_device,
    );
    fill(&mut devices.disable_hotplug, &prefs.preferred_disable_hotplug);
    fill(
        &mut devices.use_virtio_transitional,
        &prefs.preferred_use_virtio_transitional,
    );
    fill(
        &mut devices.network_interface_multiqueue,
        &prefs.preferred_network_interface_multi_queue,
    );
    fill(&mut devices.block_multi_queue, &prefs.preferred_block_multi_queue);
}

fn apply_disks(prefs: &DevicePreferences, devices: &mut Devices) {
    for disk in devices.disks.iter_mut() {
        if disk.has_no_target() {
            disk.disk = Some(DiskTarget::default());
        }

        if let Some(target) = disk.disk.as_mut() {
            fill(&mut target.bus, &prefs.preferred_disk_bus);
            if prefs.preferred_disk_dedicated_io_thread == Some(true)
                && target.bus == Some(DiskBus::Virtio)
            {
                disk.dedicated_io_thread.get_or_insert(true);
            }
        }
        if let Some(target) = disk.cdrom.as_mut() {
            fill(&mut target.bus, &prefs.preferred_cdrom_bus);
        }
        if let Some(target) = disk.lun.as_mut() {
            fill(&mut target.bus, &prefs.preferred_lun_bus);
        }

        fill(&mut disk.block_size, &prefs.preferred_disk_block_size);
        fill(&mut disk.cache, &prefs.preferred_disk_cache);
        fill(&mut disk.io, &prefs.preferred_disk_io);
    }
}

fn apply_interfaces(
    prefs: &DevicePreferences,
    interfaces: &mut [Interface],
    networks: &[Network],
) {
    for iface in interfaces.iter_mut() {
        fill(&mut iface.model, &prefs.preferred_interface_model);

        if prefs.preferred_interface_masquerade.is_some()
            && !iface.has_binding()
            && on_pod_network(iface, networks)
        {
            iface.masquerade = prefs.preferred_interface_masquerade.clone();
        }
    }
}

fn on_pod_network(iface: &Interface, networks: &[Network]) -> bool {
    networks.iter().any(|net| net.name == iface.name && net.pod.is_some())
}

fn apply_inputs(prefs: &DevicePreferences, devices: &mut Devices) {
    for input in devices.inputs.iter_mut() {
        fill(&mut input.bus, &prefs.preferred_input_bus);
        fill(&mut input.input_type, &prefs.preferred_input_type);
    }
}

#[cfg(test)]
mod test {
    use instancetype_api_types::vmi::{
        BlockSize, CdromTarget, CustomBlockSize, Disk, DiskCache, DiskIo,
        Input, InputBus, InputType, InterfaceMasquerade, InterfaceSriov,
        LunTarget, PodNetwork, Rng, SoundDevice, Tpm,
    };
    use instancetype_api_types::{PreferenceSpec, VirtualMachineInstanceSpec};

    use crate::apply::test::apply;

    use super::*;

    fn block_size(size: u32) -> BlockSize {
        BlockSize {
            custom: Some(CustomBlockSize { logical: size, physical: size }),
            match_volume: None,
        }
    }

    fn disk(name: &str) -> Disk {
        Disk { name: name.to_string(), ..Default::default() }
    }

    fn spec() -> VirtualMachineInstanceSpec {
        let mut spec = VirtualMachineInstanceSpec::default();
        let devices = &mut spec.domain.devices;
        devices.autoattach_graphics_device = Some(false);
        devices.autoattach_mem_balloon = Some(false);
        devices.disks = vec![
            Disk {
                cache: Some(DiskCache::Writeback),
                io: Some(DiskIo::Native),
                block_size: Some(block_size(512)),
                disk: Some(DiskTarget {
                    bus: Some(DiskBus::Scsi),
                    ..Default::default()
                }),
                ..disk("scsi")
            },
            Disk { disk: Some(DiskTarget::default()), ..disk("plain") },
            Disk {
                cdrom: Some(CdromTarget {
                    bus: Some(DiskBus::Sata),
                    ..Default::default()
                }),
                ..disk("cdrom-sata")
            },
            Disk { cdrom: Some(CdromTarget::default()), ..disk("cdrom") },
            Disk {
                lun: Some(LunTarget {
                    bus: Some(DiskBus::Sata),
                    ..Default::default()
                }),
                ..disk("lun-sata")
            },
            Disk { lun: Some(LunTarget::default()), ..disk("lun") },
        ];
        devices.inputs = vec![
            Input {
                name: "tablet".to_string(),
                bus: Some(InputBus::Usb),
                input_type: Some(InputType::Tablet),
            },
            Input::default(),
        ];
        devices.interfaces = vec![
            Interface {
                name: "primary".to_string(),
                model: Some("e1000".to_string()),
                ..Default::default()
            },
            Interface { name: "secondary".to_string(), ..Default::default() },
        ];
        devices.sound = Some(SoundDevice::default());
        spec
    }

    fn preference() -> PreferenceSpec {
        PreferenceSpec {
            devices: Some(DevicePreferences {
                preferred_autoattach_graphics_device: Some(true),
                preferred_autoattach_mem_balloon: Some(true),
                preferred_autoattach_pod_interface: Some(true),
                preferred_autoattach_serial_console: Some(true),
                preferred_autoattach_input_device: Some(true),
                preferred_disable_hotplug: Some(true),
                preferred_use_virtio_transitional: Some(true),
                preferred_network_interface_multi_queue: Some(true),
                preferred_block_multi_queue: Some(true),
                preferred_disk_bus: Some(DiskBus::Virtio),
                preferred_disk_block_size: Some(block_size(4096)),
                preferred_disk_cache: Some(DiskCache::Writethrough),
                preferred_disk_io: Some(DiskIo::Native),
                preferred_disk_dedicated_io_thread: Some(true),
                preferred_cdrom_bus: Some(DiskBus::Scsi),
                preferred_lun_bus: Some(DiskBus::Sata),
                preferred_interface_model: Some("virtio".to_string()),
                preferred_interface_masquerade: Some(InterfaceMasquerade {}),
                preferred_input_bus: Some(InputBus::Virtio),
                preferred_input_type: Some(InputType::Tablet),
                preferred_sound_model: Some("ac97".to_string()),
                preferred_rng: Some(Rng {}),
                preferred_tpm: Some(Tpm::default()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn user_values_are_kept() {
        let mut spec = spec();
        assert!(apply(None, Some(&preference()), &mut spec).is_empty());

        let devices = &spec.domain.devices;
        assert_eq!(devices.autoattach_graphics_device, Some(false));
        assert_eq!(devices.autoattach_mem_balloon, Some(false));

        let scsi = &devices.disks[0];
        assert_eq!(scsi.cache, Some(DiskCache::Writeback));
        assert_eq!(scsi.io, Some(DiskIo::Native));
        assert_eq!(scsi.block_size, Some(block_size(512)));
        assert_eq!(scsi.disk.as_ref().unwrap().bus, Some(DiskBus::Scsi));
        assert_eq!(
            devices.disks[2].cdrom.as_ref().unwrap().bus,
            Some(DiskBus::Sata)
        );
        assert_eq!(
            devices.disks[4].lun.as_ref().unwrap().bus,
            Some(DiskBus::Sata)
        );
        assert_eq!(devices.inputs[0].bus, Some(InputBus::Usb));
        assert_eq!(devices.interfaces[0].model.as_deref(), Some("e1000"));
    }

    #[test]
    fn unset_values_use_preference() {
        let mut spec = spec();
        assert!(apply(None, Some(&preference()), &mut spec).is_empty());

        let devices = &spec.domain.devices;
        assert_eq!(devices.autoattach_pod_interface, Some(true));
        assert_eq!(devices.autoattach_serial_console, Some(true));
        assert_eq!(devices.autoattach_input_device, Some(true));
        assert_eq!(devices.disable_hotplug, Some(true));
        assert_eq!(devices.use_virtio_transitional, Some(true));
        assert_eq!(devices.network_interface_multiqueue, Some(true));
        assert_eq!(devices.block_multi_queue, Some(true));

        let plain = &devices.disks[1];
        assert_eq!(plain.cache, Some(DiskCache::Writethrough));
        assert_eq!(plain.io, Some(DiskIo::Native));
        assert_eq!(plain.block_size, Some(block_size(4096)));
        assert_eq!(plain.disk.as_ref().unwrap().bus, Some(DiskBus::Virtio));
        assert_eq!(
            devices.disks[3].cdrom.as_ref().unwrap().bus,
            Some(DiskBus::Scsi)
        );
        assert_eq!(
            devices.disks[5].lun.as_ref().unwrap().bus,
            Some(DiskBus::Sata)
        );

        assert_eq!(devices.inputs[1].bus, Some(InputBus::Virtio));
        assert_eq!(devices.inputs[1].input_type, Some(InputType::Tablet));
        assert_eq!(devices.interfaces[1].model.as_deref(), Some("virtio"));
        assert_eq!(
            devices.sound.as_ref().unwrap().model.as_deref(),
            Some("ac97")
        );
        assert_eq!(devices.rng, Some(Rng {}));
        assert_eq!(devices.tpm, Some(Tpm::default()));
    }

    #[test]
    fn disk_without_target_becomes_disk() {
        let mut spec = spec();
        spec.domain.devices.disks[1].disk = None;

        assert!(apply(None, Some(&preference()), &mut spec).is_empty());
        let target = spec.domain.devices.disks[1].disk.as_ref().unwrap();
        assert_eq!(target.bus, Some(DiskBus::Virtio));
    }

    #[test]
    fn sound_model_needs_sound_device() {
        let mut spec = spec();
        spec.domain.devices.sound = None;

        assert!(apply(None, Some(&preference()), &mut spec).is_empty());
        assert_eq!(spec.domain.devices.sound, None);
    }

    #[test]
    fn dedicated_io_thread_only_for_virtio() {
        let mut spec = spec();
        assert!(apply(None, Some(&preference()), &mut spec).is_empty());

        for disk in &spec.domain.devices.disks {
            let Some(target) = &disk.disk else { continue };
            if target.bus == Some(DiskBus::Virtio) {
                assert_eq!(
                    disk.dedicated_io_thread,
                    Some(true),
                    "{}",
                    disk.name
                );
            } else {
                assert_eq!(disk.dedicated_io_thread, None, "{}", disk.name);
            }
        }
    }

    #[test]
    fn dedicated_io_thread_ignored_unless_true() {
        for preferred in [None, Some(false)] {
            let preference = PreferenceSpec {
                devices: Some(DevicePreferences {
                    preferred_disk_dedicated_io_thread: preferred,
                    ..Default::default()
                }),
                ..Default::default()
            };
            let mut spec = spec();
            spec.domain.devices.disks[1].disk = Some(DiskTarget {
                bus: Some(DiskBus::Virtio),
                ..Default::default()
            });

            assert!(apply(None, Some(&preference), &mut spec).is_empty());
            assert!(spec
                .domain
                .devices
                .disks
                .iter()
                .all(|d| d.dedicated_io_thread.is_none()));
        }
    }

    #[test]
    fn masquerade_on_pod_network() {
        let mut spec = spec();
        spec.networks = vec![Network {
            name: "primary".to_string(),
            pod: Some(PodNetwork::default()),
            ..Default::default()
        }];

        assert!(apply(None, Some(&preference()), &mut spec).is_empty());
        let interfaces = &spec.domain.devices.interfaces;
        assert!(interfaces[0].masquerade.is_some());
        assert!(interfaces[1].masquerade.is_none());
    }

    #[test]
    fn masquerade_skips_bound_interfaces() {
        let mut spec = spec();
        spec.networks = vec![Network {
            name: "primary".to_string(),
            pod: Some(PodNetwork::default()),
            ..Default::default()
        }];
        spec.domain.devices.interfaces[0].sriov = Some(InterfaceSriov {});

        assert!(apply(None, Some(&preference()), &mut spec).is_empty());
        let primary = &spec.domain.devices.interfaces[0];
        assert!(primary.masquerade.is_none());
        assert!(primary.sriov.is_some());
    }

    #[test]
    fn masquerade_skips_other_networks() {
        let mut spec = spec();
        spec.networks = vec![Network {
            name: "primary".to_string(),
            ..Default::default()
        }];

        assert!(apply(None, Some(&preference()), &mut spec).is_empty());
        assert!(spec.domain.devices.interfaces[0].masquerade.is_none());
    }
}
