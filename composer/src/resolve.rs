//! Local stand-in for the deployment side: provisions the graph in plan order, assigning
//! physical names, ids and ARNs, so deferred values can be resolved and checked.

use std::collections::BTreeMap;

use miette::Diagnostic;
use mynotes_graph::{
    Attr, Attribute, Graph, Property, Resource, ResourceId, ResourceKind, graph::CycleError,
};
use thiserror::Error;

use crate::{compute, plan::DeploymentPlan, provider};

const MAX_GENERATED_NAME: usize = 63;

#[allow(unused_assignments)]
#[derive(Clone, Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("cannot resolve {attribute} of {resource}: it has not been provisioned")]
    #[diagnostic(
        code(resolve::unresolved_attribute),
        help("Deferred values only resolve after the referenced resource is provisioned.")
    )]
    UnresolvedAttribute {
        resource: String,
        attribute: Attribute,
    },

    #[error("{path} is not a compute unit")]
    #[diagnostic(code(resolve::not_a_compute_unit))]
    NotAComputeUnit { path: String },

    #[error("{0}")]
    #[diagnostic(code(resolve::cycle))]
    Cycle(#[from] CycleError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionedResource {
    pub path: String,
    pub kind: ResourceKind,
    pub name: String,
    pub id: String,
    pub arn: String,
}

impl ProvisionedResource {
    pub fn attribute(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::Name => &self.name,
            Attribute::Arn => &self.arn,
            Attribute::Id => &self.id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProvisionedState {
    region: String,
    account: String,
    resources: BTreeMap<ResourceId, ProvisionedResource>,
}

impl ProvisionedState {
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
            resources: BTreeMap::new(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn record(&mut self, id: ResourceId, resource: ProvisionedResource) {
        self.resources.insert(id, resource);
    }

    pub fn get(&self, id: ResourceId) -> Option<&ProvisionedResource> {
        self.resources.get(&id)
    }

    pub fn is_provisioned(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn attribute(&self, attr: &Attr) -> Option<&str> {
        self.get(attr.resource).map(|r| r.attribute(attr.attribute))
    }

    pub fn resolve(&self, graph: &Graph, attr: &Attr) -> Result<&str, ResolveError> {
        self.attribute(attr)
            .ok_or_else(|| ResolveError::UnresolvedAttribute {
                resource: graph.resource(attr.resource).path.to_string(),
                attribute: attr.attribute,
            })
    }

    /// Concrete environment of a compute unit.
    pub fn environment(
        &self,
        graph: &Graph,
        function: ResourceId,
    ) -> Result<BTreeMap<String, String>, ResolveError> {
        let Some(contract) = compute::environment_of(graph, function) else {
            return Err(ResolveError::NotAComputeUnit {
                path: graph.resource(function).path.to_string(),
            });
        };
        contract
            .iter()
            .map(|(name, attr)| Ok((name.to_string(), self.resolve(graph, attr)?.to_string())))
            .collect()
    }

    fn provision(&mut self, graph: &Graph, resource: &Resource) -> Result<(), ResolveError> {
        for value in resource.properties.values() {
            for attr in value.attrs() {
                self.resolve(graph, &attr)?;
            }
        }

        let path = resource.path.as_str();
        let name = match provider::name_property(resource.kind)
            .and_then(|key| resource.property(key))
            .and_then(Property::as_str)
        {
            Some(declared) => declared.to_string(),
            None => generated_name(graph, resource),
        };
        let id = format!(
            "{}-{}",
            provider::id_prefix(resource.kind),
            provider::path_digest(path, 17)
        );
        let arn = provider::arn(resource.kind, &self.region, &self.account, &name, &id);

        tracing::trace!(%path, %name, "provisioned");
        self.record(
            resource.id,
            ProvisionedResource {
                path: path.to_string(),
                kind: resource.kind,
                name,
                id,
                arn,
            },
        );
        Ok(())
    }
}

/// Provisions every resource of `graph` in plan order.
pub fn simulate(graph: &Graph, region: &str) -> Result<ProvisionedState, ResolveError> {
    let plan = DeploymentPlan::for_graph(graph)?;
    let mut state = ProvisionedState::new(region, provider::DEFAULT_ACCOUNT);
    for id in plan.order() {
        state.provision(graph, graph.resource(id))?;
    }
    Ok(state)
}

/// `<root>-<path without separators>-<DIGEST>`, lower-cased for blob stores.
fn generated_name(graph: &Graph, resource: &Resource) -> String {
    let root: String = graph
        .stack(graph.root())
        .logical_id
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let compact: String = resource
        .path
        .segments()
        .flat_map(str::chars)
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let digest = provider::path_digest(resource.path.as_str(), 8).to_ascii_uppercase();

    let mut name = format!("{root}-{compact}");
    name.truncate(MAX_GENERATED_NAME - digest.len() - 1);
    name.push('-');
    name.push_str(&digest);
    if resource.kind == ResourceKind::BlobStore {
        name.make_ascii_lowercase();
    }
    name
}

#[cfg(test)]
mod tests {
    use mynotes_graph::{LogicalId, ResourceDecl};

    use super::*;

    fn graph() -> (Graph, ResourceId, ResourceId, ResourceId) {
        let mut g = Graph::new(LogicalId::try_from("App").unwrap());
        let root = g.root();
        let table = g
            .add_resource(
                root,
                ResourceDecl::new("Table", ResourceKind::KeyValueTable)
                    .property("table_name", "Notes"),
            )
            .unwrap();
        let bucket = g
            .add_resource(root, ResourceDecl::new("Bucket", ResourceKind::BlobStore))
            .unwrap();
        let function = g
            .add_resource(
                root,
                ResourceDecl::new("Fn", ResourceKind::ComputeUnit).property(
                    "environment",
                    Property::map([("TABLE", Attr::name(table)), ("BUCKET", Attr::name(bucket))]),
                ),
            )
            .unwrap();
        (g, table, bucket, function)
    }

    #[test]
    fn environment_resolves_to_physical_names() {
        let (g, _, bucket, function) = graph();
        let state = simulate(&g, "eu-west-1").unwrap();
        let env = state.environment(&g, function).unwrap();

        assert_eq!(env["TABLE"], "Notes");
        let bucket_name = &state.get(bucket).unwrap().name;
        assert_eq!(&env["BUCKET"], bucket_name);
        assert!(bucket_name.starts_with("app-bucket-"), "{bucket_name}");
        assert_eq!(*bucket_name, bucket_name.to_ascii_lowercase());
    }

    #[test]
    fn simulation_is_deterministic() {
        let (g, _, _, function) = graph();
        let a = simulate(&g, "eu-west-1").unwrap();
        let b = simulate(&g, "eu-west-1").unwrap();
        assert_eq!(a.get(function), b.get(function));
        assert_eq!(
            a.get(function).unwrap().arn,
            "arn:aws:lambda:eu-west-1:123456789012:function:App-Fn-".to_string()
                + &provider::path_digest("/Fn", 8).to_ascii_uppercase()
        );
    }

    #[test]
    fn unprovisioned_references_do_not_resolve() {
        let (g, table, _, function) = graph();
        let state = ProvisionedState::new("eu-west-1", provider::DEFAULT_ACCOUNT);
        let err = state.resolve(&g, &Attr::name(table)).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnresolvedAttribute { ref resource, attribute: Attribute::Name }
                if resource == "/Table"
        ));
        assert!(state.environment(&g, function).is_err());
    }

    #[test]
    fn only_compute_units_have_an_environment() {
        let (g, table, _, _) = graph();
        let state = simulate(&g, "eu-west-1").unwrap();
        assert!(matches!(
            state.environment(&g, table),
            Err(ResolveError::NotAComputeUnit { .. })
        ));
    }
}
