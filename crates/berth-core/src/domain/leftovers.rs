//! Leftover instances found during discovery.

use serde::{Deserialize, Serialize};

use super::names::InstanceName;

/// Instances sharing the naming-convention prefix, in runtime listing order.
///
/// Ordering contract: the first entry is the most recently created
/// instance. Container runtimes list newest first by default and the
/// fallback path depends on that, so the order reported by the runtime is
/// kept as-is and never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeftoverSet {
    names: Vec<InstanceName>,
}

impl LeftoverSet {
    pub fn new(names: Vec<InstanceName>) -> Self {
        Self { names }
    }

    /// Build from raw runtime listing output.
    ///
    /// Keeps only names that *start with* `prefix`. Some runtimes print
    /// names with a leading `/`; that is stripped first. Blank lines and
    /// duplicates are dropped, first occurrence wins.
    pub fn from_listing<I, S>(prefix: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<InstanceName> = Vec::new();
        for line in lines {
            let raw = line.as_ref().trim();
            let raw = raw.strip_prefix('/').unwrap_or(raw);
            let name = InstanceName::new(raw);
            if name.is_empty() || !name.has_prefix(prefix) {
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Most recently created instance.
    pub fn newest(&self) -> Option<&InstanceName> {
        self.names.first()
    }

    pub fn contains(&self, name: &InstanceName) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceName> {
        self.names.iter()
    }

    /// Every leftover except `keep`, order preserved.
    pub fn without(&self, keep: &InstanceName) -> Vec<InstanceName> {
        self.names.iter().filter(|n| *n != keep).cloned().collect()
    }

    pub fn into_vec(self) -> Vec<InstanceName> {
        self.names
    }
}

impl FromIterator<InstanceName> for LeftoverSet {
    fn from_iter<T: IntoIterator<Item = InstanceName>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
