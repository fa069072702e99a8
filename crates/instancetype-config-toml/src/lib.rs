// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A catalogue of instance types and preferences read from TOML.
//!
//! ```toml
//! [cluster_instancetype."u1.small"]
//! cpu = { guest = 1 }
//! memory = { guest = "2Gi" }
//!
//! [preference.fedora]
//! cpu = { preferredCpuTopology = "spread" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use instancetype_api_types::vm::{
    InstancetypeKind, KindParseError, PreferenceKind,
};
use instancetype_api_types::{
    InstancetypeMatcher, InstancetypeSpec, PreferenceMatcher, PreferenceSpec,
};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// The set of profiles available to virtual machines.
#[derive(Default, Serialize, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, rename = "instancetype")]
    pub instancetypes: BTreeMap<String, InstancetypeSpec>,

    #[serde(default, rename = "cluster_instancetype")]
    pub cluster_instancetypes: BTreeMap<String, InstancetypeSpec>,

    #[serde(default, rename = "preference")]
    pub preferences: BTreeMap<String, PreferenceSpec>,

    #[serde(default, rename = "cluster_preference")]
    pub cluster_preferences: BTreeMap<String, PreferenceSpec>,
}

impl Config {
    /// Looks up the instance type a matcher refers to.
    pub fn instancetype(
        &self,
        matcher: &InstancetypeMatcher,
    ) -> Result<&InstancetypeSpec, ParseError> {
        let (table, name) = match matcher.kind()? {
            InstancetypeKind::Namespaced => {
                (&self.instancetypes, "instancetype")
            }
            InstancetypeKind::Cluster => {
                (&self.cluster_instancetypes, "cluster_instancetype")
            }
        };
        table.get(&matcher.name).ok_or_else(|| {
            ParseError::KeyNotFound(matcher.name.clone(), name.to_string())
        })
    }

    /// Looks up the preference a matcher refers to.
    pub fn preference(
        &self,
        matcher: &PreferenceMatcher,
    ) -> Result<&PreferenceSpec, ParseError> {
        let (table, name) = match matcher.kind()? {
            PreferenceKind::Namespaced => (&self.preferences, "preference"),
            PreferenceKind::Cluster => {
                (&self.cluster_preferences, "cluster_preference")
            }
        };
        table.get(&matcher.name).ok_or_else(|| {
            ParseError::KeyNotFound(matcher.name.clone(), name.to_string())
        })
    }
}

/// Errors which may be returned when reading the catalogue.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Cannot parse toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key {0} not found in {1}")]
    KeyNotFound(String, String),

    #[error(transparent)]
    Kind(#[from] KindParseError),
}

/// Parses a TOML file into a catalogue.
pub fn parse<P: AsRef<Path>>(path: P) -> Result<Config, ParseError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let cfg = toml::from_str::<Config>(&contents)?;
    Ok(cfg)
}
