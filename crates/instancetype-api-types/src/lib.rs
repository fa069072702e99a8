// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types for instance types, preferences and the virtual machine
//! specs they are applied to.

pub mod instancetype;
pub mod preference;
mod quantity;
pub mod vm;
pub mod vmi;

pub use instancetype::InstancetypeSpec;
pub use preference::PreferenceSpec;
pub use quantity::{Quantity, QuantityFormat, QuantityParseError};
pub use vm::{InstancetypeMatcher, PreferenceMatcher, VirtualMachine};
pub use vmi::{ObjectMeta, VirtualMachineInstanceSpec};
