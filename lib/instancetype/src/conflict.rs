// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field paths and the conflicts recorded against them.

use std::fmt::Display;

use serde::{Serialize, Serializer};

/// A path to one field of a spec, rendered as dot-separated segments such as
/// `spec.template.spec.domain.cpu.sockets`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Returns a new path with `segments` appended to this one.
    pub fn child(&self, segments: &[&str]) -> Self {
        let mut child = self.clone();
        child.segments.extend(segments.iter().map(|s| s.to_string()));
        child
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Splits a dotted path. Empty segments are dropped, so `""` is the empty
/// path.
impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::new(value.split('.').filter(|s| !s.is_empty()))
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// A field that was already set by the user when an instance type tried to
/// set it, or that fails a preference's requirements.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Conflict(FieldPath);

impl Conflict {
    pub fn new(path: FieldPath) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &FieldPath {
        &self.0
    }
}

impl Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Conflict {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Conflicts in the order they were detected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Conflicts(Vec<Conflict>);

impl Conflicts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, conflict: Conflict) {
        self.0.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Conflict> {
        self.0.iter()
    }

    /// The rendered path of every conflict, in detection order.
    pub fn paths(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl std::ops::Index<usize> for Conflicts {
    type Output = Conflict;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl Extend<Conflict> for Conflicts {
    fn extend<T: IntoIterator<Item = Conflict>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl FromIterator<Conflict> for Conflicts {
    fn from_iter<T: IntoIterator<Item = Conflict>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Conflicts {
    type Item = Conflict;
    type IntoIter = std::vec::IntoIter<Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Conflicts {
    type Item = &'a Conflict;
    type IntoIter = std::slice::Iter<'a, Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Conflicts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, conflict) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            conflict.fmt(f)?;
        }
        Ok(())
    }
}
