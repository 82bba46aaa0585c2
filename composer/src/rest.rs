use std::collections::BTreeMap;

use mynotes_graph::{
    Attr, Graph, Property, ResourceDecl, ResourceId, ResourceKind, StackId,
    routes::{HttpMethod, Integration, RouteNodeId, RouteTree},
};

use crate::{Error, provider};

/// Service principal allowed to invoke bound compute units.
pub const API_SERVICE_PRINCIPAL: &str = "apigateway.amazonaws.com";

#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct RestApiProps {
    pub rest_api_name: String,
    #[builder(default)]
    pub description: String,
    #[builder(default)]
    pub binary_media_types: Vec<String>,
    pub minimum_compression_size: Option<u32>,
}

/// The REST API resource together with its route tree. Every route node and binding is
/// mirrored as a resource in the graph.
#[derive(Clone, Debug)]
pub struct RestSurface {
    pub api: ResourceId,
    pub stack: StackId,
    routes: RouteTree,
    resources: BTreeMap<RouteNodeId, ResourceId>,
    methods: BTreeMap<(RouteNodeId, HttpMethod), ResourceId>,
}

impl RestSurface {
    pub fn declare(
        graph: &mut Graph,
        stack: StackId,
        logical_id: &str,
        props: &RestApiProps,
    ) -> Result<Self, Error> {
        if props.rest_api_name.is_empty() {
            return Err(Error::invalid_props("rest api", "rest_api_name", "must not be empty"));
        }

        let mut decl = ResourceDecl::new(logical_id, ResourceKind::RestApi)
            .property("rest_api_name", props.rest_api_name.as_str())
            .property("description", props.description.as_str())
            .property(
                "binary_media_types",
                Property::list(props.binary_media_types.iter().map(String::as_str)),
            );
        if let Some(size) = props.minimum_compression_size {
            decl = decl.property("minimum_compression_size", size);
        }
        let api = graph.add_resource(stack, decl)?;

        Ok(Self {
            api,
            stack,
            routes: RouteTree::new(),
            resources: BTreeMap::new(),
            methods: BTreeMap::new(),
        })
    }

    pub fn routes(&self) -> &RouteTree {
        &self.routes
    }

    /// Graph resource backing a route node. `None` for the root.
    pub fn resource_for(&self, node: RouteNodeId) -> Option<ResourceId> {
        self.resources.get(&node).copied()
    }

    pub fn method_for(&self, node: RouteNodeId, method: HttpMethod) -> Option<ResourceId> {
        self.methods.get(&(node, method)).copied()
    }

    /// Adds one path segment under `parent`. The route tree is left unchanged if the
    /// backing resource cannot be declared.
    pub fn add_resource(
        &mut self,
        graph: &mut Graph,
        parent: RouteNodeId,
        segment: &str,
    ) -> Result<RouteNodeId, Error> {
        let node = self.routes.add_child(parent, segment)?;
        let path = self.routes.node(node).path.clone();
        let name = self.free_name(graph, &path, "", &["Resource"]);

        let mut decl = ResourceDecl::new(format!("{name}Resource"), ResourceKind::RestResource)
            .property("rest_api_id", Attr::id(self.api))
            .property("path_part", segment)
            .property("path", path.as_str());
        if let Some(parent) = self.resource_for(parent) {
            decl = decl.property("parent_id", Attr::id(parent));
        }
        match graph.add_resource(self.stack, decl) {
            Ok(id) => {
                self.resources.insert(node, id);
                Ok(node)
            }
            Err(e) => {
                self.routes.remove_leaf(node);
                Err(e.into())
            }
        }
    }

    /// Walks `template` from the root, adding whatever segments are missing.
    pub fn ensure_path(&mut self, graph: &mut Graph, template: &str) -> Result<RouteNodeId, Error> {
        let mut cur = self.routes.root();
        for segment in template.split('/').filter(|s| !s.is_empty()) {
            cur = match self.routes.child(cur, segment) {
                Some(existing) => existing,
                None => self.add_resource(graph, cur, segment)?,
            };
        }
        Ok(cur)
    }

    /// Binds `method` on `node`. Function integrations also get an invoke permission for
    /// the API service.
    pub fn add_method(
        &mut self,
        graph: &mut Graph,
        node: RouteNodeId,
        method: HttpMethod,
        integration: Integration,
    ) -> Result<ResourceId, Error> {
        self.routes.add_method(node, method, integration.clone())?;
        let path = self.routes.node(node).path.clone();
        let name = self.free_name(
            graph,
            &path,
            &verb_name(method),
            &["Method", "Permission"],
        );

        let mut decl = ResourceDecl::new(format!("{name}Method"), ResourceKind::RestMethod)
            .property("rest_api_id", Attr::id(self.api))
            .property("http_method", method.as_str())
            .property("path", path.as_str())
            .property("authorization_type", "NONE")
            .property("integration", integration_property(&integration));
        if let Some(resource) = self.resource_for(node) {
            decl = decl.property("resource_id", Attr::id(resource));
        }
        let id = match graph.add_resource(self.stack, decl) {
            Ok(id) => id,
            Err(e) => {
                self.routes.remove_method(node, method);
                return Err(e.into());
            }
        };
        self.methods.insert((node, method), id);

        if let Integration::Function(function) = integration {
            graph.add_resource(
                self.stack,
                ResourceDecl::new(format!("{name}Permission"), ResourceKind::InvokePermission)
                    .property("action", "lambda:InvokeFunction")
                    .property("function_name", Attr::arn(function))
                    .property("principal", API_SERVICE_PRINCIPAL)
                    .property("source_api", Attr::id(self.api))
                    .property("source_route", format!("{method} {path}")),
            )?;
        }

        tracing::trace!(%method, %path, "bound route");
        Ok(id)
    }

    /// `<RouteName><infix>` when every `<name><suffix>` is still free in the stack.
    /// Otherwise a digest of the route path is appended to the route name, since distinct
    /// routes such as `/note/id` and `/note/{id}` share a readable name.
    fn free_name(&self, graph: &Graph, path: &str, infix: &str, suffixes: &[&str]) -> String {
        let readable = format!("{}{infix}", route_name(path));
        let is_free = |name: &str| {
            suffixes
                .iter()
                .all(|suffix| graph.is_logical_id_free(self.stack, &format!("{name}{suffix}")))
        };
        if is_free(&readable) {
            return readable;
        }
        let digest = provider::path_digest(path, 8).to_ascii_uppercase();
        format!("{}{digest}{infix}", route_name(path))
    }
}

fn integration_property(integration: &Integration) -> Property {
    match integration {
        Integration::Function(function) => Property::map([
            ("type", Property::from("AWS_PROXY")),
            ("integration_http_method", Property::from("POST")),
            ("function_arn", Property::from(Attr::arn(*function))),
        ]),
        Integration::Storage(storage) => Property::map([
            ("type", Property::from("AWS")),
            ("service", Property::from("s3")),
            (
                "integration_http_method",
                Property::from(storage.method.as_str()),
            ),
            ("bucket", Property::from(Attr::name(storage.bucket))),
            ("key_template", Property::from(storage.key_template.as_str())),
            ("credentials", Property::from(Attr::arn(storage.role))),
            (
                "request_parameters",
                Property::map(
                    storage
                        .request_parameters
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str())),
                ),
            ),
            (
                "response_headers",
                Property::list(storage.response_headers.iter().map(String::as_str)),
            ),
        ]),
    }
}

/// `/note/{id}` -> `NoteId`, the root -> `Root`.
fn route_name(path: &str) -> String {
    let mut out = String::new();
    for word in path
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() {
        out.push_str("Root");
    }
    out
}

fn verb_name(method: HttpMethod) -> String {
    let verb = method.as_str();
    let mut out = verb[..1].to_string();
    out.push_str(&verb[1..].to_ascii_lowercase());
    out
}
