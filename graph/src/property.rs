use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// Attribute of a resource that only exists once the resource is provisioned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Physical name (table name, bucket name, function name).
    Name,
    Arn,
    /// Provider-assigned id (subnet id, root resource id, ...).
    Id,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Attribute::Name => "name",
            Attribute::Arn => "arn",
            Attribute::Id => "id",
        };
        f.write_str(s)
    }
}

/// Deferred value: "attribute X of resource Y", resolved by the provisioning side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Attr {
    pub resource: ResourceId,
    pub attribute: Attribute,
}

impl Attr {
    pub fn new(resource: ResourceId, attribute: Attribute) -> Self {
        Self {
            resource,
            attribute,
        }
    }

    pub fn name(resource: ResourceId) -> Self {
        Self::new(resource, Attribute::Name)
    }

    pub fn arn(resource: ResourceId) -> Self {
        Self::new(resource, Attribute::Arn)
    }

    pub fn id(resource: ResourceId) -> Self {
        Self::new(resource, Attribute::Id)
    }
}

/// Declared property value of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Property {
    String(String),
    Number(i64),
    Bool(bool),
    List(Vec<Property>),
    Map(BTreeMap<String, Property>),
    Attr(Attr),
}

impl Property {
    /// Enumerated policy value, stored as its display form.
    pub fn policy(value: impl fmt::Display) -> Self {
        Self::String(value.to_string())
    }

    pub fn list<T: Into<Property>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<K: Into<String>, V: Into<Property>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Property::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Property::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_attr(&self) -> Option<&Attr> {
        match self {
            Property::Attr(attr) => Some(attr),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Property]> {
        match self {
            Property::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Property>> {
        match self {
            Property::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Every deferred value nested in this property.
    pub fn attrs(&self) -> Vec<Attr> {
        let mut out = Vec::new();
        self.collect_attrs(&mut out);
        out
    }

    pub(crate) fn referenced_resources(&self, out: &mut BTreeSet<ResourceId>) {
        let mut attrs = Vec::new();
        self.collect_attrs(&mut attrs);
        out.extend(attrs.into_iter().map(|attr| attr.resource));
    }

    fn collect_attrs(&self, out: &mut Vec<Attr>) {
        match self {
            Property::Attr(attr) => out.push(*attr),
            Property::List(items) => {
                for item in items {
                    item.collect_attrs(out);
                }
            }
            Property::Map(entries) => {
                for value in entries.values() {
                    value.collect_attrs(out);
                }
            }
            Property::String(_) | Property::Number(_) | Property::Bool(_) => {}
        }
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Property {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for Property {
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Attr> for Property {
    fn from(value: Attr) -> Self {
        Self::Attr(value)
    }
}
