use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::ResourceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Read => "read",
            Capability::Write => "write",
        };
        f.write_str(s)
    }
}

/// Set of capabilities held on one resource. Only ever grows.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn read() -> Self {
        Self::from_iter([Capability::Read])
    }

    pub fn write() -> Self {
        Self::from_iter([Capability::Write])
    }

    pub fn read_write() -> Self {
        Self::from_iter([Capability::Read, Capability::Write])
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_superset(&self, other: &CapabilitySet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds `other` to this set. Returns true if anything new was added.
    pub fn union_with(&mut self, other: &CapabilitySet) -> bool {
        let before = self.0.len();
        self.0.extend(other.0.iter().copied());
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for capability in self.iter() {
            if !first {
                f.write_str("+")?;
            }
            first = false;
            write!(f, "{capability}")?;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub principal: ResourceId,
    pub resource: ResourceId,
    pub capabilities: CapabilitySet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_monotonic() {
        let mut set = CapabilitySet::read_write();
        assert!(!set.union_with(&CapabilitySet::read()));
        assert_eq!(set, CapabilitySet::read_write());

        let mut set = CapabilitySet::read();
        assert!(set.union_with(&CapabilitySet::write()));
        assert!(set.is_superset(&CapabilitySet::read_write()));
    }

    #[test]
    fn display_joins_capabilities() {
        assert_eq!(CapabilitySet::read_write().to_string(), "read+write");
        assert_eq!(CapabilitySet::empty().to_string(), "none");
    }
}
