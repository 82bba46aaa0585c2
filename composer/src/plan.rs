use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use mynotes_graph::{
    Graph, GraphIr, Property, RemovalPolicy, ResourceId, ResourceKind,
    graph::{self, CycleError},
    ir::ResourceIr,
};
use serde_json::{Value, json};

/// Provisioning order: each wave only references resources from earlier waves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub waves: Vec<Vec<ResourceId>>,
}

impl DeploymentPlan {
    pub fn for_graph(graph: &Graph) -> Result<Self, CycleError> {
        Ok(Self {
            waves: graph::waves(graph)?,
        })
    }

    /// Every resource, wave by wave.
    pub fn order(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.waves.iter().flatten().copied()
    }

    pub fn wave_of(&self, id: ResourceId) -> Option<usize> {
        self.waves.iter().position(|wave| wave.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.iter().all(Vec::is_empty)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    Create,
    /// Names of the properties (or `kind`, `removal`, `depends_on`, `grants`) that differ.
    Update { properties: Vec<String> },
    Delete,
    /// Gone from the graph but retained: the deployment side keeps it and stops managing it.
    Orphan,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceChange {
    pub path: String,
    pub kind: ResourceKind,
    pub change: Change,
}

/// Differences between two graphs, keyed by resource path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<ResourceChange>,
}

impl ChangeSet {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Change> {
        self.changes
            .iter()
            .find(|c| c.path == path)
            .map(|c| &c.change)
    }

    pub fn count(&self, matches: impl Fn(&Change) -> bool) -> usize {
        self.changes.iter().filter(|c| matches(&c.change)).count()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return writeln!(f, "no changes");
        }
        for c in &self.changes {
            match &c.change {
                Change::Create => writeln!(f, "+ {} ({})", c.path, c.kind)?,
                Change::Update { properties } => {
                    writeln!(f, "~ {} ({}): {}", c.path, c.kind, properties.join(", "))?
                }
                Change::Delete => writeln!(f, "- {} ({})", c.path, c.kind)?,
                Change::Orphan => {
                    writeln!(f, "! {} ({}) retained, no longer managed", c.path, c.kind)?
                }
            }
        }
        Ok(())
    }
}

/// Compares `previous` against `next`.
///
/// Deferred values are compared by the path of the resource they point at, so resource
/// ids may differ between the two graphs.
pub fn diff(previous: &GraphIr, next: &GraphIr) -> ChangeSet {
    let before = index(previous);
    let after = index(next);

    let mut changes = Vec::new();
    for (path, old) in &before {
        if after.contains_key(path) {
            continue;
        }
        let change = match old.resource.removal {
            RemovalPolicy::Retain => Change::Orphan,
            RemovalPolicy::Destroy => Change::Delete,
        };
        changes.push(ResourceChange {
            path: (*path).to_string(),
            kind: old.resource.kind,
            change,
        });
    }

    for (path, new) in &after {
        let change = match before.get(path) {
            None => Change::Create,
            Some(old) => {
                let properties = changed_fields(old, new);
                if properties.is_empty() {
                    continue;
                }
                Change::Update { properties }
            }
        };
        changes.push(ResourceChange {
            path: (*path).to_string(),
            kind: new.resource.kind,
            change,
        });
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    ChangeSet { changes }
}

/// A resource with everything id-based rewritten in terms of paths.
struct Normalized<'a> {
    resource: &'a ResourceIr,
    properties: BTreeMap<&'a str, Value>,
    depends_on: BTreeSet<&'a str>,
    grants: BTreeMap<&'a str, String>,
}

fn index(ir: &GraphIr) -> BTreeMap<&str, Normalized<'_>> {
    let path_of = |id: ResourceId| {
        ir.resources
            .get(id.0)
            .map_or("<missing>", |r| r.path.as_str())
    };

    let mut out: BTreeMap<&str, Normalized<'_>> = ir
        .resources
        .iter()
        .map(|r| {
            let mut attr_targets = BTreeSet::new();
            for value in r.properties.values() {
                attr_targets.extend(value.attrs().into_iter().map(|a| a.resource));
            }
            let normalized = Normalized {
                resource: r,
                properties: r
                    .properties
                    .iter()
                    .map(|(k, v)| (k.as_str(), normalize(v, &path_of)))
                    .collect(),
                depends_on: r
                    .references
                    .iter()
                    .filter(|id| !attr_targets.contains(*id))
                    .map(|id| path_of(*id))
                    .collect(),
                grants: BTreeMap::new(),
            };
            (r.path.as_str(), normalized)
        })
        .collect();

    for grant in &ir.grants {
        let principal = path_of(ResourceId(grant.principal));
        let resource = path_of(ResourceId(grant.resource));
        if let Some(entry) = out.get_mut(principal) {
            entry
                .grants
                .insert(resource, grant.capabilities.to_string());
        }
    }
    out
}

fn normalize<'a>(value: &Property, path_of: &impl Fn(ResourceId) -> &'a str) -> Value {
    match value {
        Property::String(s) => Value::String(s.clone()),
        Property::Number(n) => json!(n),
        Property::Bool(b) => Value::Bool(*b),
        Property::List(items) => {
            Value::Array(items.iter().map(|v| normalize(v, path_of)).collect())
        }
        Property::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v, path_of)))
                .collect(),
        ),
        Property::Attr(attr) => json!({
            "ref": path_of(attr.resource),
            "attribute": attr.attribute.to_string(),
        }),
    }
}

fn changed_fields(old: &Normalized<'_>, new: &Normalized<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if old.resource.kind != new.resource.kind {
        out.push("kind".to_string());
    }
    let keys: BTreeSet<&str> = old
        .properties
        .keys()
        .chain(new.properties.keys())
        .copied()
        .collect();
    for key in keys {
        if old.properties.get(key) != new.properties.get(key) {
            out.push(key.to_string());
        }
    }
    if old.resource.removal != new.resource.removal {
        out.push("removal".to_string());
    }
    if old.depends_on != new.depends_on {
        out.push("depends_on".to_string());
    }
    if old.grants != new.grants {
        out.push("grants".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use mynotes_graph::{Attr, CapabilitySet, LogicalId, ResourceDecl};

    use super::*;

    fn base() -> (Graph, ResourceId, ResourceId) {
        let mut g = Graph::new(LogicalId::try_from("App").unwrap());
        let root = g.root();
        let table = g
            .add_resource(
                root,
                ResourceDecl::new("Table", ResourceKind::KeyValueTable)
                    .property("table_name", "Notes")
                    .removal(RemovalPolicy::Retain),
            )
            .unwrap();
        let function = g
            .add_resource(
                root,
                ResourceDecl::new("Fn", ResourceKind::ComputeUnit)
                    .property("environment", Property::map([("TABLE", Attr::name(table))])),
            )
            .unwrap();
        (g, table, function)
    }

    #[test]
    fn waves_respect_references() {
        let (g, table, function) = base();
        let plan = DeploymentPlan::for_graph(&g).unwrap();
        assert_eq!(plan.wave_of(table), Some(0));
        assert_eq!(plan.wave_of(function), Some(1));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.order().collect::<Vec<_>>(), vec![table, function]);
    }

    #[test]
    fn identical_graphs_diff_to_nothing() {
        let (g, _, _) = base();
        let ir = GraphIr::from(&g);
        let changes = diff(&ir, &ir);
        assert!(changes.is_noop());
        assert_eq!(changes.to_string(), "no changes\n");
    }

    #[test]
    fn removed_resources_are_deleted_or_orphaned() {
        let (g, _, _) = base();
        let empty = Graph::new(LogicalId::try_from("App").unwrap());
        let changes = diff(&GraphIr::from(&g), &GraphIr::from(&empty));
        assert_eq!(changes.get("/Table"), Some(&Change::Orphan));
        assert_eq!(changes.get("/Fn"), Some(&Change::Delete));

        let changes = diff(&GraphIr::from(&empty), &GraphIr::from(&g));
        assert_eq!(changes.count(|c| *c == Change::Create), 2);
    }

    #[test]
    fn property_and_grant_changes_are_named() {
        let (before, _, _) = base();
        let (mut after, table, function) = base();
        after.grant(function, table, &CapabilitySet::read()).unwrap();

        let changes = diff(&GraphIr::from(&before), &GraphIr::from(&after));
        assert_eq!(
            changes.get("/Fn"),
            Some(&Change::Update {
                properties: vec!["grants".to_string()]
            })
        );
        assert_eq!(changes.changes.len(), 1);
    }

    #[test]
    fn shifted_ids_do_not_count_as_changes() {
        let (g, _, _) = base();

        // Same resources, declared with an unrelated one in front.
        let mut shifted = Graph::new(LogicalId::try_from("App").unwrap());
        let root = shifted.root();
        shifted
            .add_resource(root, ResourceDecl::new("Extra", ResourceKind::Role))
            .unwrap();
        let table = shifted
            .add_resource(
                root,
                ResourceDecl::new("Table", ResourceKind::KeyValueTable)
                    .property("table_name", "Notes")
                    .removal(RemovalPolicy::Retain),
            )
            .unwrap();
        shifted
            .add_resource(
                root,
                ResourceDecl::new("Fn", ResourceKind::ComputeUnit)
                    .property("environment", Property::map([("TABLE", Attr::name(table))])),
            )
            .unwrap();

        let changes = diff(&GraphIr::from(&g), &GraphIr::from(&shifted));
        assert_eq!(changes.changes.len(), 1);
        assert_eq!(changes.get("/Extra"), Some(&Change::Create));
    }
}
