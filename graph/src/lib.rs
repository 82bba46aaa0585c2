use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
};

use serde::{Deserialize, Serialize};

pub mod env;
pub mod error;
pub mod grants;
pub mod graph;
pub mod ir;
pub mod names;
pub mod property;
pub mod routes;

pub use env::EnvironmentContract;
pub use error::Error;
pub use grants::{Capability, CapabilitySet, PermissionGrant};
pub use ir::{GRAPH_IR_SCHEMA, GRAPH_IR_VERSION, GraphIr, GraphIrError};
pub use names::{LogicalId, NodePath};
pub use property::{Attr, Attribute, Property};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Network,
    Subnet,
    GatewayEndpoint,
    UserDirectory,
    KeyValueTable,
    BlobStore,
    ComputeUnit,
    Role,
    RestApi,
    RestResource,
    RestMethod,
    InvokePermission,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::GatewayEndpoint => "gateway-endpoint",
            ResourceKind::UserDirectory => "user-directory",
            ResourceKind::KeyValueTable => "key-value-table",
            ResourceKind::BlobStore => "blob-store",
            ResourceKind::ComputeUnit => "compute-unit",
            ResourceKind::Role => "role",
            ResourceKind::RestApi => "rest-api",
            ResourceKind::RestResource => "rest-resource",
            ResourceKind::RestMethod => "rest-method",
            ResourceKind::InvokePermission => "invoke-permission",
        }
    }

    pub fn is_store(self) -> bool {
        matches!(self, ResourceKind::KeyValueTable | ResourceKind::BlobStore)
    }

    pub fn is_principal(self) -> bool {
        matches!(self, ResourceKind::ComputeUnit | ResourceKind::Role)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What teardown tooling may do with a resource once it leaves the graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    #[default]
    Destroy,
    Retain,
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemovalPolicy::Destroy => "destroy",
            RemovalPolicy::Retain => "retain",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct Stack {
    pub id: StackId,
    pub parent: Option<StackId>,
    pub logical_id: LogicalId,
    pub path: NodePath,

    /// Nested stacks, in declaration order.
    pub children: Vec<StackId>,

    /// Resources declared directly in this stack, in declaration order.
    pub resources: Vec<ResourceId>,
}

#[derive(Clone, Debug)]
pub struct Resource {
    pub id: ResourceId,
    pub stack: StackId,
    pub logical_id: LogicalId,
    pub path: NodePath,
    pub kind: ResourceKind,
    pub properties: BTreeMap<String, Property>,

    /// Resources this one depends on: explicit dependencies plus every deferred value in
    /// `properties`.
    pub references: BTreeSet<ResourceId>,
    pub removal: RemovalPolicy,
}

impl Resource {
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }
}

/// Declaration of a resource, handed to [`Graph::add_resource`].
#[derive(Clone, Debug)]
pub struct ResourceDecl {
    pub logical_id: String,
    pub kind: ResourceKind,
    pub properties: BTreeMap<String, Property>,
    pub depends_on: BTreeSet<ResourceId>,
    pub removal: RemovalPolicy,
}

impl ResourceDecl {
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
            removal: RemovalPolicy::default(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, resource: ResourceId) -> Self {
        self.depends_on.insert(resource);
        self
    }

    pub fn removal(mut self, removal: RemovalPolicy) -> Self {
        self.removal = removal;
        self
    }
}

/// The composed tree of stacks and the resources they declare.
#[derive(Clone, Debug)]
pub struct Graph {
    root: StackId,
    stacks: Vec<Stack>,
    resources: Vec<Resource>,
    grants: BTreeMap<(ResourceId, ResourceId), CapabilitySet>,
}

impl Graph {
    pub fn new(root: LogicalId) -> Self {
        Self {
            root: StackId(0),
            stacks: vec![Stack {
                id: StackId(0),
                parent: None,
                logical_id: root,
                path: NodePath::root(),
                children: Vec::new(),
                resources: Vec::new(),
            }],
            resources: Vec::new(),
            grants: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> StackId {
        self.root
    }

    pub fn stack(&self, id: StackId) -> &Stack {
        self.stacks.get(id.0).expect("stack should exist")
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        self.resources.get(id.0).expect("resource should exist")
    }

    pub fn stacks_iter(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.iter()
    }

    pub fn resources_iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn resources_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn find_stack(&self, path: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.path.as_str() == path)
    }

    pub fn find_resource(&self, path: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.path.as_str() == path)
    }

    /// True if `id` is a valid logical id not yet taken in `scope`.
    pub fn is_logical_id_free(&self, scope: StackId, id: &str) -> bool {
        LogicalId::try_from(id).is_ok_and(|id| self.ensure_unique_in_scope(scope, &id).is_ok())
    }

    /// Adds a nested stack under `parent`.
    pub fn add_stack(&mut self, parent: StackId, logical_id: &str) -> Result<StackId, Error> {
        let logical_id = LogicalId::try_from(logical_id)?;
        self.ensure_unique_in_scope(parent, &logical_id)?;

        let id = StackId(self.stacks.len());
        let path = self.stacks[parent.0].path.join(&logical_id);
        self.stacks.push(Stack {
            id,
            parent: Some(parent),
            logical_id,
            path,
            children: Vec::new(),
            resources: Vec::new(),
        });
        self.stacks[parent.0].children.push(id);
        Ok(id)
    }

    /// Declares a resource in `stack`. Every referenced resource must already exist.
    pub fn add_resource(
        &mut self,
        stack: StackId,
        decl: ResourceDecl,
    ) -> Result<ResourceId, Error> {
        let logical_id = LogicalId::new(decl.logical_id)?;
        self.ensure_unique_in_scope(stack, &logical_id)?;
        let path = self.stacks[stack.0].path.join(&logical_id);

        let mut references = decl.depends_on;
        for value in decl.properties.values() {
            value.referenced_resources(&mut references);
        }
        if let Some(&target) = references.iter().find(|r| r.0 >= self.resources.len()) {
            return Err(Error::UnknownReference {
                from: path.to_string(),
                target: target.0,
            });
        }

        let id = ResourceId(self.resources.len());
        self.resources.push(Resource {
            id,
            stack,
            logical_id,
            path,
            kind: decl.kind,
            properties: decl.properties,
            references,
            removal: decl.removal,
        });
        self.stacks[stack.0].resources.push(id);
        Ok(id)
    }

    /// Records that `from` must be provisioned after `to`.
    pub fn add_dependency(&mut self, from: ResourceId, to: ResourceId) -> Result<(), Error> {
        self.ensure_resource(from, to)?;
        self.ensure_resource(to, from)?;
        if from == to || self.reaches(to, from) {
            return Err(Error::ReferenceCycle {
                from: self.resources[from.0].path.to_string(),
                to: self.resources[to.0].path.to_string(),
            });
        }
        self.resources[from.0].references.insert(to);
        Ok(())
    }

    /// Grants `capabilities` on a store to a compute unit or role.
    ///
    /// Grants only ever widen: returns `true` if the principal gained anything.
    pub fn grant(
        &mut self,
        principal: ResourceId,
        resource: ResourceId,
        capabilities: &CapabilitySet,
    ) -> Result<bool, Error> {
        self.ensure_resource(principal, resource)?;
        self.ensure_resource(resource, principal)?;

        let p = &self.resources[principal.0];
        let r = &self.resources[resource.0];
        let invalid = |message| Error::InvalidGrant {
            principal: p.path.to_string(),
            resource: r.path.to_string(),
            message,
        };
        if !p.kind.is_principal() {
            return Err(invalid("principal must be a compute unit or role"));
        }
        if !r.kind.is_store() {
            return Err(invalid("grants may only target a store"));
        }
        if capabilities.is_empty() {
            return Err(invalid("capability set is empty"));
        }

        if !self.resources[principal.0].references.contains(&resource) {
            self.add_dependency(principal, resource)?;
        }
        Ok(self
            .grants
            .entry((principal, resource))
            .or_default()
            .union_with(capabilities))
    }

    pub fn capabilities(&self, principal: ResourceId, resource: ResourceId) -> CapabilitySet {
        self.grants
            .get(&(principal, resource))
            .cloned()
            .unwrap_or_default()
    }

    pub fn grants_iter(&self) -> impl Iterator<Item = PermissionGrant> + '_ {
        self.grants
            .iter()
            .map(|(&(principal, resource), capabilities)| PermissionGrant {
                principal,
                resource,
                capabilities: capabilities.clone(),
            })
    }

    fn ensure_unique_in_scope(&self, scope: StackId, id: &LogicalId) -> Result<(), Error> {
        let Some(stack) = self.stacks.get(scope.0) else {
            return Err(Error::UnknownStack { stack: scope.0 });
        };
        let taken = stack
            .children
            .iter()
            .any(|c| self.stacks[c.0].logical_id == *id)
            || stack
                .resources
                .iter()
                .any(|r| self.resources[r.0].logical_id == *id);
        if taken {
            return Err(Error::DuplicateLogicalId {
                scope: stack.path.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_resource(&self, id: ResourceId, from: ResourceId) -> Result<(), Error> {
        if id.0 < self.resources.len() {
            return Ok(());
        }
        let from = self
            .resources
            .get(from.0)
            .map_or_else(|| format!("#{}", from.0), |r| r.path.to_string());
        Err(Error::UnknownReference { from, target: id.0 })
    }

    /// Does `from` transitively reference `to`?
    fn reaches(&self, from: ResourceId, to: ResourceId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.resources[id.0].references.iter().copied());
        }
        false
    }

    /// Debug-only validation of the tree and reference invariants.
    pub fn assert_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }

        for stack in &self.stacks {
            if let Some(parent) = stack.parent {
                debug_assert!(
                    self.stack(parent).children.contains(&stack.id),
                    "parent missing child edge"
                );
            }
            let mut seen = HashSet::new();
            for &child in &stack.children {
                debug_assert_eq!(self.stack(child).parent, Some(stack.id));
                debug_assert!(
                    seen.insert(self.stack(child).logical_id.clone()),
                    "duplicate logical id in scope"
                );
            }
            for &resource in &stack.resources {
                debug_assert_eq!(self.resource(resource).stack, stack.id);
                debug_assert!(
                    seen.insert(self.resource(resource).logical_id.clone()),
                    "duplicate logical id in scope"
                );
            }
        }

        for resource in &self.resources {
            for &target in &resource.references {
                let _ = self.resource(target);
            }
        }
        debug_assert!(graph::topo_order(self).is_ok(), "reference cycle");
    }
}

#[cfg(test)]
mod tests;
