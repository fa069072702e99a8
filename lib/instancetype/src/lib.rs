// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application of instance types and preferences to virtual machine
//! instance specs.
//!
//! An instance type fixes the resources of an instance (vCPUs, memory and
//! a handful of scheduling and device options); a preference supplies
//! defaults for everything else. [`SpecApplier`] merges both into a spec and
//! reports the fields where they collide with what the spec already says,
//! and [`requirements::check`] verifies that the result satisfies the
//! minimums a preference asks for.

pub mod annotations;
pub mod apply;
pub mod conflict;
pub mod requirements;
pub mod topology;

pub use apply::SpecApplier;
pub use conflict::{Conflict, Conflicts, FieldPath};
pub use requirements::{InsufficientResources, Insufficiency};
pub use topology::Topology;
