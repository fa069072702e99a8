// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use instancetype_api_types::preference::FirmwarePreferences;
use instancetype_api_types::vmi::{Bios, Bootloader, Efi, Firmware};

use super::{MergeContext, Merger};

/// Selects a bootloader from the preference when the spec has not chosen
/// one, and fills the unset options of the chosen bootloader.
///
/// A preferred EFI block takes precedence over the deprecated EFI and secure
/// boot flags and is only ever installed whole.
pub(super) struct FirmwareMerger;

impl Merger for FirmwareMerger {
    fn name(&self) -> &'static str {
        "firmware"
    }

    fn merge(&self, cx: &mut MergeContext<'_>) {
        let Some(prefs) = cx.preference.and_then(|p| p.firmware.as_ref()) else {
            return;
        };

        let mut bootloader = cx
            .spec
            .domain
            .firmware
            .as_ref()
            .and_then(|fw| fw.bootloader.clone())
            .unwrap_or_default();

        apply_bios(prefs, &mut bootloader);
        if let Some(efi) = &prefs.preferred_efi {
            if bootloader.bios.is_none() && bootloader.efi.is_none() {
                bootloader.efi = Some(efi.clone());
            }
        } else {
            apply_deprecated_efi(prefs, &mut bootloader);
        }

        if bootloader != Bootloader::default() {
            cx.spec
                .domain
                .firmware
                .get_or_insert_with(Firmware::default)
                .bootloader = Some(bootloader);
        }
    }
}

fn apply_bios(prefs: &FirmwarePreferences, bootloader: &mut Bootloader) {
    if prefs.preferred_use_bios == Some(true)
        && bootloader.bios.is_none()
        && bootloader.efi.is_none()
    {
        bootloader.bios = Some(Bios::default());
    }

    if let Some(bios) = bootloader.bios.as_mut() {
        if bios.use_serial.is_none() {
            bios.use_serial = prefs.preferred_use_bios_serial;
        }
    }
}

fn apply_deprecated_efi(
    prefs: &FirmwarePreferences,
    bootloader: &mut Bootloader,
) {
    if prefs.preferred_use_efi == Some(true)
        && bootloader.bios.is_none()
        && bootloader.efi.is_none()
    {
        bootloader.efi = Some(Efi::default());
    }

    if let Some(efi) = bootloader.efi.as_mut() {
        if efi.secure_boot.is_none() {
            efi.secure_boot = prefs.preferred_use_secure_boot;
        }
    }
}
