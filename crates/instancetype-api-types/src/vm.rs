// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The virtual machine object that references instance types and
//! preferences by name.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::vmi::{ObjectMeta, VirtualMachineInstanceSpec};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub metadata: ObjectMeta,

    pub spec: VirtualMachineSpec,

    /// Fields this model does not interpret, kept so they survive a
    /// round trip.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instancetype: Option<InstancetypeMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<PreferenceMatcher>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,

    #[serde(default)]
    pub template: VirtualMachineInstanceTemplate,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceTemplate {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {1} kind {0:?}")]
pub struct KindParseError(String, &'static str);

/// The kind of object an [`InstancetypeMatcher`] refers to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstancetypeKind {
    /// Scoped to the namespace of the virtual machine.
    Namespaced,
    #[default]
    Cluster,
}

impl InstancetypeKind {
    pub const NAMESPACED: &'static str = "VirtualMachineInstancetype";
    pub const CLUSTER: &'static str = "VirtualMachineClusterInstancetype";
}

impl FromStr for InstancetypeKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "virtualmachineclusterinstancetype"
            | "virtualmachineclusterinstancetypes" => Ok(Self::Cluster),
            "virtualmachineinstancetype" | "virtualmachineinstancetypes" => {
                Ok(Self::Namespaced)
            }
            _ => Err(KindParseError(s.to_owned(), "instance type")),
        }
    }
}

impl Display for InstancetypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespaced => f.write_str(Self::NAMESPACED),
            Self::Cluster => f.write_str(Self::CLUSTER),
        }
    }
}

/// The kind of object a [`PreferenceMatcher`] refers to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PreferenceKind {
    Namespaced,
    #[default]
    Cluster,
}

impl PreferenceKind {
    pub const NAMESPACED: &'static str = "VirtualMachinePreference";
    pub const CLUSTER: &'static str = "VirtualMachineClusterPreference";
}

impl FromStr for PreferenceKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "virtualmachineclusterpreference"
            | "virtualmachineclusterpreferences" => Ok(Self::Cluster),
            "virtualmachinepreference" | "virtualmachinepreferences" => {
                Ok(Self::Namespaced)
            }
            _ => Err(KindParseError(s.to_owned(), "preference")),
        }
    }
}

impl Display for PreferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespaced => f.write_str(Self::NAMESPACED),
            Self::Cluster => f.write_str(Self::CLUSTER),
        }
    }
}

/// A reference from a virtual machine to an instance type.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct InstancetypeMatcher {
    pub name: String,

    /// The raw kind string. Use [`InstancetypeMatcher::kind`] to interpret it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl InstancetypeMatcher {
    pub fn kind(&self) -> Result<InstancetypeKind, KindParseError> {
        self.kind.as_deref().unwrap_or_default().parse()
    }
}

/// A reference from a virtual machine to a preference.
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceMatcher {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_name: Option<String>,

    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl PreferenceMatcher {
    pub fn kind(&self) -> Result<PreferenceKind, KindParseError> {
        self.kind.as_deref().unwrap_or_default().parse()
    }
}
