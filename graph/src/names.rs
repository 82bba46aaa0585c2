use std::{borrow::Borrow, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub(crate) fn ensure_logical_id(id: &str) -> Result<(), Error> {
    let message = if id.is_empty() {
        "must not be empty"
    } else if id.contains('/') {
        "`/` is reserved as the path separator"
    } else if id.chars().any(char::is_control) {
        "control characters are not allowed"
    } else {
        return Ok(());
    };
    Err(Error::InvalidLogicalId {
        id: id.to_string(),
        message,
    })
}

/// Identifier of a stack or resource, unique within its enclosing scope.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(Arc<str>);

impl LogicalId {
    pub fn new(id: String) -> Result<Self, Error> {
        ensure_logical_id(&id)?;
        Ok(Self(Arc::from(id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LogicalId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for LogicalId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ensure_logical_id(value)?;
        Ok(Self(Arc::from(value)))
    }
}

impl From<LogicalId> for String {
    fn from(value: LogicalId) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for LogicalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Slash-separated location of a node in the stack tree, like `/network/vpc`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodePath(Arc<str>);

impl NodePath {
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    pub fn join(&self, id: &LogicalId) -> Self {
        if self.is_root() {
            Self(Arc::from(format!("/{id}")))
        } else {
            Self(Arc::from(format!("{}/{id}", self.0)))
        }
    }

    pub fn is_root(&self) -> bool {
        &*self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|seg| !seg.is_empty())
    }

    pub fn local_name(&self) -> Option<&str> {
        self.segments().last()
    }
}

impl From<String> for NodePath {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<NodePath> for String {
    fn from(value: NodePath) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
