// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Checks that the resources given to an instance satisfy the minimums its
//! preference asks for.

use std::fmt::Display;

use instancetype_api_types::preference::{
    PreferenceRequirements, PreferredCpuTopology, SpreadAcross,
};
use instancetype_api_types::vmi::Cpu;
use instancetype_api_types::{
    InstancetypeSpec, PreferenceSpec, Quantity, VirtualMachineInstanceSpec,
};
use thiserror::Error;

use crate::conflict::{Conflict, Conflicts, FieldPath};

/// Where the instance type is referenced from a virtual machine.
const INSTANCETYPE_PATH: &[&str] = &["spec", "instancetype"];

/// Where the instance's own domain lives within a virtual machine.
const DOMAIN_PATH: &[&str] = &["spec", "template", "spec", "domain"];

/// One unmet requirement.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Insufficiency {
    #[error(
        "insufficient CPU resources of {provided} vCPU provided by instance \
         type, preference requires {required} vCPU"
    )]
    InstancetypeCpu { provided: u32, required: u32 },

    #[error(
        "insufficient CPU resources of {provided} vCPU provided by \
         VirtualMachine, preference requires {required} vCPU provided as \
         {dimensions}"
    )]
    VirtualMachineCpu { provided: u64, required: u32, dimensions: String },

    #[error(
        "insufficient Memory resources of {provided} provided by instance \
         type, preference requires {required}"
    )]
    InstancetypeMemory { provided: Quantity, required: Quantity },

    #[error(
        "insufficient Memory resources of {provided} provided by \
         VirtualMachine, preference requires {required}"
    )]
    VirtualMachineMemory { provided: Quantity, required: Quantity },
}

/// The requirements of a preference are not met.
///
/// Carries the fields responsible alongside a description of every
/// shortfall, so both can be reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsufficientResources {
    conflicts: Conflicts,
    violations: Vec<Insufficiency>,
}

impl InsufficientResources {
    pub fn conflicts(&self) -> &Conflicts {
        &self.conflicts
    }

    pub fn violations(&self) -> &[Insufficiency] {
        &self.violations
    }
}

impl Display for InsufficientResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InsufficientResources {}

#[derive(Default)]
struct Report {
    conflicts: Conflicts,
    violations: Vec<Insufficiency>,
}

impl Report {
    fn add(&mut self, paths: Vec<FieldPath>, violation: Insufficiency) {
        self.conflicts.extend(paths.into_iter().map(Conflict::new));
        self.violations.push(violation);
    }
}

/// Checks the preference's requirements against the instance type, or
/// against the instance spec itself when no instance type is used.
///
/// The spec is expected to already hold its final topology and memory.
pub fn check(
    instancetype: Option<&InstancetypeSpec>,
    preference: Option<&PreferenceSpec>,
    spec: &VirtualMachineInstanceSpec,
) -> Result<(), InsufficientResources> {
    let Some(preference) = preference else {
        return Ok(());
    };
    let Some(requirements) = preference.requirements.as_ref() else {
        return Ok(());
    };

    let mut report = Report::default();
    match instancetype {
        Some(instancetype) => {
            check_instancetype(instancetype, requirements, &mut report)
        }
        None => check_vm(preference, requirements, spec, &mut report),
    }

    if report.violations.is_empty() {
        Ok(())
    } else {
        Err(InsufficientResources {
            conflicts: report.conflicts,
            violations: report.violations,
        })
    }
}

fn check_instancetype(
    instancetype: &InstancetypeSpec,
    requirements: &PreferenceRequirements,
    report: &mut Report,
) {
    let path = || vec![FieldPath::new(INSTANCETYPE_PATH.iter().copied())];

    if let Some(cpu) = &requirements.cpu {
        let provided = instancetype.cpu.as_ref().map_or(0, |c| c.guest);
        if provided < cpu.guest {
            report.add(
                path(),
                Insufficiency::InstancetypeCpu {
                    provided,
                    required: cpu.guest,
                },
            );
        }
    }

    if let Some(memory) = &requirements.memory {
        let provided = instancetype
            .memory
            .as_ref()
            .map_or_else(Quantity::default, |m| m.guest);
        if provided < memory.guest {
            report.add(
                path(),
                Insufficiency::InstancetypeMemory {
                    provided,
                    required: memory.guest,
                },
            );
        }
    }
}

fn check_vm(
    preference: &PreferenceSpec,
    requirements: &PreferenceRequirements,
    spec: &VirtualMachineInstanceSpec,
    report: &mut Report,
) {
    let domain = FieldPath::new(DOMAIN_PATH.iter().copied());

    if let Some(cpu) = &requirements.cpu {
        let (provided, dims, dimensions) = vm_vcpus(preference, spec);
        if provided < u64::from(cpu.guest) {
            let paths =
                dims.iter().map(|dim| domain.child(&["cpu", *dim])).collect();
            report.add(
                paths,
                Insufficiency::VirtualMachineCpu {
                    provided,
                    required: cpu.guest,
                    dimensions,
                },
            );
        }
    }

    if let Some(memory) = &requirements.memory {
        let guest = spec.domain.memory.as_ref().and_then(|m| m.guest);
        if let Some(provided) = guest.filter(|g| *g < memory.guest) {
            report.add(
                vec![domain.child(&["memory"])],
                Insufficiency::VirtualMachineMemory {
                    provided,
                    required: memory.guest,
                },
            );
        }
    }
}

const SOCKETS: &[&str] = &["sockets"];
const CORES: &[&str] = &["cores"];
const THREADS: &[&str] = &["threads"];
const SOCKETS_CORES: &[&str] = &["sockets", "cores"];
const CORES_THREADS: &[&str] = &["cores", "threads"];
const SOCKETS_CORES_THREADS: &[&str] = &["sockets", "cores", "threads"];
const ANY: &[&str] = &["cores", "sockets", "threads"];

/// The vCPUs the spec provides in the dimensions the preferred topology
/// uses, those dimensions, and how to name them in an error.
fn vm_vcpus(
    preference: &PreferenceSpec,
    spec: &VirtualMachineInstanceSpec,
) -> (u64, &'static [&'static str], String) {
    let cpu = spec.domain.cpu.as_ref();
    let dim = |get: fn(&Cpu) -> Option<u32>| {
        u64::from(cpu.and_then(get).unwrap_or(1))
    };
    let sockets = dim(|c| c.sockets);
    let cores = dim(|c| c.cores);
    let threads = dim(|c| c.threads);

    let (provided, dims, name) = match preference.cpu_topology() {
        PreferredCpuTopology::Sockets => (sockets, SOCKETS, "sockets"),
        PreferredCpuTopology::Cores => (cores, CORES, "cores"),
        PreferredCpuTopology::Threads => (threads, THREADS, "threads"),
        PreferredCpuTopology::Spread => {
            let (across, _) = preference.spread_options();
            let (provided, dims) = match across {
                SpreadAcross::SocketsCores => (sockets * cores, SOCKETS_CORES),
                SpreadAcross::CoresThreads => (cores * threads, CORES_THREADS),
                SpreadAcross::SocketsCoresThreads => {
                    (sockets * cores * threads, SOCKETS_CORES_THREADS)
                }
            };
            return (provided, dims, across.to_string());
        }
        PreferredCpuTopology::Any => (
            sockets * cores * threads,
            ANY,
            "cores, sockets and threads",
        ),
    };
    (provided, dims, name.to_string())
}
