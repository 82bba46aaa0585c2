use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    property::{Attr, Property},
};

pub(crate) fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('A'..='Z'))
        && chars.all(|c| matches!(c, 'A'..='Z' | '0'..='9' | '_'))
}

/// Environment injected into a compute unit: variable name to deferred value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentContract(BTreeMap<String, Attr>);

impl EnvironmentContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`. `component` is only used to label errors.
    pub fn insert(
        &mut self,
        component: &str,
        name: impl Into<String>,
        value: Attr,
    ) -> Result<(), Error> {
        let name = name.into();
        if !is_valid_env_name(&name) {
            return Err(Error::InvalidEnvironmentName {
                component: component.to_string(),
                name,
            });
        }
        self.0.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Attr> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attr)> {
        self.0.iter().map(|(name, attr)| (name.as_str(), attr))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_property(&self) -> Property {
        Property::map(self.0.iter().map(|(name, attr)| (name.clone(), *attr)))
    }

    /// Reads a contract back out of a property produced by [`Self::to_property`].
    pub fn from_property(property: &Property) -> Option<Self> {
        let entries = property.as_map()?;
        let mut out = BTreeMap::new();
        for (name, value) in entries {
            out.insert(name.clone(), *value.as_attr()?);
        }
        Some(Self(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceId;

    #[test]
    fn rejects_lowercase_names() {
        let mut env = EnvironmentContract::new();
        env.insert("/api/fn", "NOTES_TABLE_NAME", Attr::name(ResourceId(0)))
            .unwrap();
        let err = env
            .insert("/api/fn", "notes_table", Attr::name(ResourceId(0)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEnvironmentName { .. }));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn property_form_reads_back() {
        let mut env = EnvironmentContract::new();
        env.insert("/api/fn", "A", Attr::name(ResourceId(1))).unwrap();
        env.insert("/api/fn", "B", Attr::arn(ResourceId(2))).unwrap();
        let property = env.to_property();
        assert_eq!(EnvironmentContract::from_property(&property), Some(env));
    }
}
