use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    CapabilitySet, Graph, LogicalId, NodePath, Property, RemovalPolicy, Resource, ResourceId,
    ResourceKind, Stack, StackId, graph,
};

pub const GRAPH_IR_SCHEMA: &str = "mynotes.graph.ir";
pub const GRAPH_IR_VERSION: u32 = 1;

/// Serialized form of a [`Graph`], the document handed to the deployment side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphIr {
    pub schema: String,
    pub version: u32,
    pub root: usize,
    pub stacks: Vec<StackIr>,
    pub resources: Vec<ResourceIr>,
    #[serde(default)]
    pub grants: Vec<GrantIr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackIr {
    pub id: usize,
    pub logical_id: LogicalId,
    pub path: NodePath,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceIr {
    pub id: usize,
    pub stack: usize,
    pub logical_id: LogicalId,
    pub path: NodePath,
    pub kind: ResourceKind,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default)]
    pub references: BTreeSet<ResourceId>,
    #[serde(default)]
    pub removal: RemovalPolicy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrantIr {
    pub principal: usize,
    pub resource: usize,
    pub capabilities: CapabilitySet,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphIrError {
    #[error("graph ir schema mismatch (expected {expected}, got {actual})")]
    SchemaMismatch {
        expected: &'static str,
        actual: String,
    },
    #[error("graph ir version mismatch (expected {expected}, got {actual})")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("graph ir has {kind} ids out of order at position {position}")]
    NonDenseIds { kind: &'static str, position: usize },
    #[error("graph ir references missing {kind} #{id} ({context})")]
    MissingNode {
        kind: &'static str,
        id: usize,
        context: String,
    },
    #[error("graph ir declares logical id `{id}` twice in {scope}")]
    DuplicateLogicalId { scope: String, id: String },
    #[error("graph ir parent/child links disagree for stack #{id}")]
    BrokenTree { id: usize },
    #[error(transparent)]
    Cycle(#[from] graph::CycleError),
}

impl From<&Graph> for GraphIr {
    fn from(g: &Graph) -> Self {
        Self {
            schema: GRAPH_IR_SCHEMA.to_string(),
            version: GRAPH_IR_VERSION,
            root: g.root.0,
            stacks: g
                .stacks
                .iter()
                .map(|s| StackIr {
                    id: s.id.0,
                    logical_id: s.logical_id.clone(),
                    path: s.path.clone(),
                    parent: s.parent.map(|p| p.0),
                    children: s.children.iter().map(|c| c.0).collect(),
                })
                .collect(),
            resources: g
                .resources
                .iter()
                .map(|r| ResourceIr {
                    id: r.id.0,
                    stack: r.stack.0,
                    logical_id: r.logical_id.clone(),
                    path: r.path.clone(),
                    kind: r.kind,
                    properties: r.properties.clone(),
                    references: r.references.clone(),
                    removal: r.removal,
                })
                .collect(),
            grants: g
                .grants_iter()
                .map(|grant| GrantIr {
                    principal: grant.principal.0,
                    resource: grant.resource.0,
                    capabilities: grant.capabilities,
                })
                .collect(),
        }
    }
}

impl GraphIr {
    pub fn find_resource(&self, path: &str) -> Option<&ResourceIr> {
        self.resources.iter().find(|r| r.path.as_str() == path)
    }
}

impl TryFrom<GraphIr> for Graph {
    type Error = GraphIrError;

    fn try_from(ir: GraphIr) -> Result<Self, Self::Error> {
        if ir.schema != GRAPH_IR_SCHEMA {
            return Err(GraphIrError::SchemaMismatch {
                expected: GRAPH_IR_SCHEMA,
                actual: ir.schema,
            });
        }
        if ir.version != GRAPH_IR_VERSION {
            return Err(GraphIrError::VersionMismatch {
                expected: GRAPH_IR_VERSION,
                actual: ir.version,
            });
        }

        for (position, stack) in ir.stacks.iter().enumerate() {
            if stack.id != position {
                return Err(GraphIrError::NonDenseIds {
                    kind: "stack",
                    position,
                });
            }
        }
        for (position, resource) in ir.resources.iter().enumerate() {
            if resource.id != position {
                return Err(GraphIrError::NonDenseIds {
                    kind: "resource",
                    position,
                });
            }
        }

        let n_stacks = ir.stacks.len();
        let n_resources = ir.resources.len();
        let ensure_stack = |id: usize, context: &dyn Fn() -> String| {
            if id < n_stacks {
                Ok(())
            } else {
                Err(GraphIrError::MissingNode {
                    kind: "stack",
                    id,
                    context: context(),
                })
            }
        };
        let ensure_resource = |id: usize, context: &dyn Fn() -> String| {
            if id < n_resources {
                Ok(())
            } else {
                Err(GraphIrError::MissingNode {
                    kind: "resource",
                    id,
                    context: context(),
                })
            }
        };

        ensure_stack(ir.root, &|| "root".to_string())?;
        for stack in &ir.stacks {
            if let Some(parent) = stack.parent {
                ensure_stack(parent, &|| format!("parent of {}", stack.path))?;
                if !ir.stacks[parent].children.contains(&stack.id) {
                    return Err(GraphIrError::BrokenTree { id: stack.id });
                }
            } else if stack.id != ir.root {
                return Err(GraphIrError::BrokenTree { id: stack.id });
            }
            for &child in &stack.children {
                ensure_stack(child, &|| format!("child of {}", stack.path))?;
                if ir.stacks[child].parent != Some(stack.id) {
                    return Err(GraphIrError::BrokenTree { id: child });
                }
            }
        }
        if ir.stacks[ir.root].parent.is_some() {
            return Err(GraphIrError::BrokenTree { id: ir.root });
        }
        // Every parent chain must end at the root.
        for stack in &ir.stacks {
            let mut visited = HashSet::new();
            let mut current = stack.id;
            while current != ir.root {
                if !visited.insert(current) {
                    return Err(GraphIrError::BrokenTree { id: stack.id });
                }
                match ir.stacks[current].parent {
                    Some(parent) => current = parent,
                    None => return Err(GraphIrError::BrokenTree { id: stack.id }),
                }
            }
        }

        let mut stack_resources: Vec<Vec<ResourceId>> = vec![Vec::new(); n_stacks];
        for resource in &ir.resources {
            ensure_stack(resource.stack, &|| format!("stack of {}", resource.path))?;
            stack_resources[resource.stack].push(ResourceId(resource.id));
            for target in &resource.references {
                ensure_resource(target.0, &|| format!("reference from {}", resource.path))?;
            }
        }
        for grant in &ir.grants {
            ensure_resource(grant.principal, &|| "grant principal".to_string())?;
            ensure_resource(grant.resource, &|| "grant resource".to_string())?;
        }

        for stack in &ir.stacks {
            let mut seen = HashSet::new();
            let names = stack
                .children
                .iter()
                .map(|&c| &ir.stacks[c].logical_id)
                .chain(
                    stack_resources[stack.id]
                        .iter()
                        .map(|r| &ir.resources[r.0].logical_id),
                );
            for name in names {
                if !seen.insert(name) {
                    return Err(GraphIrError::DuplicateLogicalId {
                        scope: stack.path.to_string(),
                        id: name.to_string(),
                    });
                }
            }
        }

        let grants = ir
            .grants
            .into_iter()
            .map(|g| {
                (
                    (ResourceId(g.principal), ResourceId(g.resource)),
                    g.capabilities,
                )
            })
            .collect();
        let stacks = ir
            .stacks
            .into_iter()
            .map(|s| Stack {
                id: StackId(s.id),
                parent: s.parent.map(StackId),
                logical_id: s.logical_id,
                path: s.path,
                children: s.children.into_iter().map(StackId).collect(),
                resources: std::mem::take(&mut stack_resources[s.id]),
            })
            .collect();
        let resources = ir
            .resources
            .into_iter()
            .map(|r| Resource {
                id: ResourceId(r.id),
                stack: StackId(r.stack),
                logical_id: r.logical_id,
                path: r.path,
                kind: r.kind,
                properties: r.properties,
                references: r.references,
                removal: r.removal,
            })
            .collect();

        let g = Graph {
            root: StackId(ir.root),
            stacks,
            resources,
            grants,
        };
        graph::topo_order(&g)?;
        Ok(g)
    }
}
