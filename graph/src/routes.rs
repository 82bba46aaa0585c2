use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ResourceId, error::Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let method = match input.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            _ => return Err(Error::UnknownHttpMethod(input.to_string())),
        };
        Ok(method)
    }
}

/// One segment of a route path: `note` or `{id}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    Literal(String),
    Param(String),
}

impl PathSegment {
    fn parse(raw: &str) -> Result<Self, &'static str> {
        if raw.is_empty() {
            return Err("segment must not be empty");
        }
        if raw.contains('/') {
            return Err("segment must not contain `/`");
        }
        if let Some(inner) = raw.strip_prefix('{') {
            let Some(name) = inner.strip_suffix('}') else {
                return Err("unterminated path parameter");
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err("path parameter names must be alphanumeric");
            }
            return Ok(Self::Param(name.to_string()));
        }
        if raw.contains(['{', '}']) {
            return Err("braces are only allowed around a whole segment");
        }
        Ok(Self::Literal(raw.to_string()))
    }

    pub fn is_param(&self) -> bool {
        matches!(self, PathSegment::Param(_))
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Literal(value) => f.write_str(value),
            PathSegment::Param(name) => write!(f, "{{{name}}}"),
        }
    }
}

/// Backend a route method forwards to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    /// Proxy the request to a compute unit.
    Function(ResourceId),
    /// Forward straight to the blob store under a role.
    Storage(StorageIntegration),
}

impl Integration {
    pub fn function(&self) -> Option<ResourceId> {
        match self {
            Integration::Function(id) => Some(*id),
            Integration::Storage(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageIntegration {
    pub role: ResourceId,
    pub bucket: ResourceId,
    /// Verb used against the storage service.
    pub method: HttpMethod,
    /// Object key template below the bucket, e.g. `{folder}/{key}`.
    pub key_template: String,
    /// Integration request parameter to method request parameter.
    pub request_parameters: BTreeMap<String, String>,
    /// Response headers passed through from storage on success.
    pub response_headers: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteNodeId(pub usize);

#[derive(Clone, Debug)]
pub struct RouteNode {
    pub id: RouteNodeId,
    pub parent: Option<RouteNodeId>,
    /// `None` for the root.
    pub segment: Option<PathSegment>,
    pub path: String,
    pub children: Vec<RouteNodeId>,
    pub methods: BTreeMap<HttpMethod, Integration>,
}

#[derive(Clone, Debug)]
pub struct RouteMatch<'a> {
    pub node: RouteNodeId,
    pub integration: &'a Integration,
    pub params: BTreeMap<String, String>,
}

/// Path-segment tree of the REST surface with per-verb bindings.
#[derive(Clone, Debug)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
}

impl Default for RouteTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![RouteNode {
                id: RouteNodeId(0),
                parent: None,
                segment: None,
                path: "/".to_string(),
                children: Vec::new(),
                methods: BTreeMap::new(),
            }],
        }
    }

    pub fn root(&self) -> RouteNodeId {
        RouteNodeId(0)
    }

    pub fn node(&self, id: RouteNodeId) -> &RouteNode {
        self.nodes.get(id.0).expect("route node should exist")
    }

    fn get(&self, id: RouteNodeId) -> Result<&RouteNode, Error> {
        self.nodes
            .get(id.0)
            .ok_or(Error::UnknownRouteNode { node: id.0 })
    }

    pub fn child(&self, parent: RouteNodeId, segment: &str) -> Option<RouteNodeId> {
        let segment = PathSegment::parse(segment).ok()?;
        self.get(parent).ok()?.children.iter().copied().find(|&c| {
            self.nodes[c.0]
                .segment
                .as_ref()
                .is_some_and(|s| *s == segment)
        })
    }

    /// Adds a child segment under `parent`.
    pub fn add_child(&mut self, parent: RouteNodeId, raw: &str) -> Result<RouteNodeId, Error> {
        let parent_node = self.get(parent)?;
        let segment = PathSegment::parse(raw).map_err(|message| Error::InvalidPathSegment {
            parent: parent_node.path.clone(),
            segment: raw.to_string(),
            message,
        })?;

        for &child in &parent_node.children {
            let existing = self.nodes[child.0]
                .segment
                .as_ref()
                .expect("non-root route node has a segment");
            if *existing == segment {
                return Err(Error::DuplicatePathSegment {
                    parent: parent_node.path.clone(),
                    segment: segment.to_string(),
                });
            }
            if let (PathSegment::Param(existing), PathSegment::Param(name)) = (existing, &segment)
            {
                return Err(Error::AmbiguousPathParameter {
                    parent: parent_node.path.clone(),
                    segment: name.clone(),
                    existing: existing.clone(),
                });
            }
        }

        let path = if parent_node.path == "/" {
            format!("/{segment}")
        } else {
            format!("{}/{segment}", parent_node.path)
        };
        let id = RouteNodeId(self.nodes.len());
        self.nodes.push(RouteNode {
            id,
            parent: Some(parent),
            segment: Some(segment),
            path,
            children: Vec::new(),
            methods: BTreeMap::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Binds `method` on `node`. A second binding for the same verb is an error.
    pub fn add_method(
        &mut self,
        node: RouteNodeId,
        method: HttpMethod,
        integration: Integration,
    ) -> Result<(), Error> {
        let path = self.get(node)?.path.clone();
        let methods = &mut self.nodes[node.0].methods;
        if methods.contains_key(&method) {
            return Err(Error::DuplicateRouteBinding {
                path,
                method: method.to_string(),
            });
        }
        methods.insert(method, integration);
        Ok(())
    }

    /// Undoes the most recent `add_child` when it left an unbound leaf.
    pub fn remove_leaf(&mut self, node: RouteNodeId) -> bool {
        let is_last_leaf = node.0 != 0
            && node.0 + 1 == self.nodes.len()
            && self.nodes[node.0].children.is_empty()
            && self.nodes[node.0].methods.is_empty();
        if !is_last_leaf {
            return false;
        }
        if let Some(removed) = self.nodes.pop()
            && let Some(parent) = removed.parent
        {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
        true
    }

    pub fn remove_method(&mut self, node: RouteNodeId, method: HttpMethod) -> Option<Integration> {
        self.nodes.get_mut(node.0)?.methods.remove(&method)
    }

    /// Finds the node declared at a path template such as `/note/{id}`.
    pub fn find(&self, template: &str) -> Option<RouteNodeId> {
        let mut cur = self.root();
        for raw in template.split('/').filter(|seg| !seg.is_empty()) {
            cur = self.child(cur, raw)?;
        }
        Some(cur)
    }

    /// Matches a concrete request path, literal segments first.
    pub fn route(&self, method: HttpMethod, path: &str) -> Option<RouteMatch<'_>> {
        let segments: Vec<&str> = path.split('/').filter(|seg| !seg.is_empty()).collect();
        let mut params = BTreeMap::new();
        let node = self.match_segments(self.root(), &segments, &mut params)?;
        let integration = self.nodes[node.0].methods.get(&method)?;
        Some(RouteMatch {
            node,
            integration,
            params,
        })
    }

    fn match_segments(
        &self,
        node: RouteNodeId,
        segments: &[&str],
        params: &mut BTreeMap<String, String>,
    ) -> Option<RouteNodeId> {
        let Some((head, rest)) = segments.split_first() else {
            return Some(node);
        };
        let children = &self.nodes[node.0].children;

        for &child in children {
            if let Some(PathSegment::Literal(value)) = &self.nodes[child.0].segment
                && value == head
                && let Some(found) = self.match_segments(child, rest, params)
            {
                return Some(found);
            }
        }

        for &child in children {
            if let Some(PathSegment::Param(name)) = &self.nodes[child.0].segment {
                let previous = params.insert(name.clone(), (*head).to_string());
                if let Some(found) = self.match_segments(child, rest, params) {
                    return Some(found);
                }
                match previous {
                    Some(value) => params.insert(name.clone(), value),
                    None => params.remove(name),
                };
            }
        }

        None
    }

    /// Nodes in depth-first declaration order, root first.
    pub fn nodes_depth_first(&self) -> Vec<RouteNodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Every `(path, verb, integration)` binding, depth-first.
    pub fn bindings(&self) -> Vec<(&str, HttpMethod, &Integration)> {
        self.nodes_depth_first()
            .into_iter()
            .flat_map(|id| {
                let node = &self.nodes[id.0];
                node.methods
                    .iter()
                    .map(move |(method, integration)| (node.path.as_str(), *method, integration))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }
}
