use std::collections::BTreeSet;

use mynotes_graph::{
    Attribute, Graph, NodePath, PermissionGrant, Property, RemovalPolicy, ResourceKind,
};
use serde_json::{Map, Value, json};

use super::{Reporter, ReporterError};
use crate::provider;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";
const POLICY_VERSION: &str = "2012-10-17";

#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateReporter;

impl Reporter for TemplateReporter {
    type Artifact = String;

    fn emit(&self, graph: &Graph) -> Result<Self::Artifact, ReporterError> {
        render_template(graph)
    }
}

pub fn render_template(graph: &Graph) -> Result<String, ReporterError> {
    let mut out = serde_json::to_string_pretty(&template_value(graph))
        .map_err(|e| ReporterError::Other(format!("failed to render template: {e}")))?;
    out.push('\n');
    Ok(out)
}

/// Provisioning template for the whole graph. Resources are keyed by a logical id
/// derived from their path; deferred values become `Ref` / `Fn::GetAtt`.
pub fn template_value(g: &Graph) -> Value {
    let ids: Vec<String> = g
        .resources_iter()
        .map(|r| template_logical_id(&r.path))
        .collect();

    let mut resources = Map::new();
    for r in g.resources_iter() {
        let properties: Map<String, Value> = r
            .properties
            .iter()
            .map(|(k, v)| (pascal_case(k), render_property(v, &ids)))
            .collect();

        let attr_targets: BTreeSet<_> = r
            .properties
            .values()
            .flat_map(Property::attrs)
            .map(|a| a.resource)
            .collect();
        let depends_on: Vec<Value> = r
            .references
            .iter()
            .filter(|id| !attr_targets.contains(*id))
            .map(|id| Value::String(ids[id.0].clone()))
            .collect();

        let mut entry = Map::new();
        entry.insert("Type".into(), provider::template_type(r.kind).into());
        entry.insert("Properties".into(), Value::Object(properties));
        if !depends_on.is_empty() {
            entry.insert("DependsOn".into(), Value::Array(depends_on));
        }
        if r.removal == RemovalPolicy::Retain {
            entry.insert("DeletionPolicy".into(), "Retain".into());
            entry.insert("UpdateReplacePolicy".into(), "Retain".into());
        }
        entry.insert(
            "Metadata".into(),
            json!({ "mynotes:path": r.path.as_str(), "mynotes:kind": r.kind.as_str() }),
        );
        resources.insert(ids[r.id.0].clone(), Value::Object(entry));
    }

    for grant in g.grants_iter() {
        let (id, policy) = render_grant(g, &grant, &ids);
        resources.insert(id, policy);
    }

    let root = g.stack(g.root());
    let stacks: Vec<&str> = g.stacks_iter().map(|s| s.path.as_str()).collect();
    json!({
        "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
        "Description": format!("{} (composed by mynotes)", root.logical_id),
        "Metadata": { "mynotes:stacks": stacks },
        "Resources": resources,
    })
}

/// `/mynotes-api/NotesTable` -> `mynotesapiNotesTable` plus a digest of the full path.
pub fn template_logical_id(path: &NodePath) -> String {
    let mut out: String = path
        .segments()
        .flat_map(str::chars)
        .filter(char::is_ascii_alphanumeric)
        .collect();
    out.push_str(&provider::path_digest(path.as_str(), 8).to_ascii_uppercase());
    out
}

fn render_grant(g: &Graph, grant: &PermissionGrant, ids: &[String]) -> (String, Value) {
    let principal = g.resource(grant.principal);
    let store = g.resource(grant.resource);

    let actions: Vec<&str> = grant
        .capabilities
        .iter()
        .filter_map(|c| provider::store_actions(store.kind, c))
        .flatten()
        .copied()
        .collect();
    let store_arn = json!({ "Fn::GetAtt": [ids[store.id.0], "Arn"] });
    let mut targets = vec![store_arn.clone()];
    if store.kind == ResourceKind::BlobStore {
        targets.push(json!({ "Fn::Join": ["", [store_arn, "/*"]] }));
    }

    let edge = format!("{}->{}", principal.path, store.path);
    let principal_id = &ids[principal.id.0];
    let id = format!(
        "{principal_id}Policy{}",
        provider::path_digest(&edge, 8).to_ascii_uppercase()
    );
    let policy = json!({
        "Type": "AWS::IAM::Policy",
        "Properties": {
            "PolicyName": id,
            "Principal": { "Ref": principal_id },
            "PolicyDocument": {
                "Version": POLICY_VERSION,
                "Statement": [{
                    "Effect": "Allow",
                    "Action": actions,
                    "Resource": targets,
                }],
            },
        },
        "Metadata": {
            "mynotes:grant": edge,
            "mynotes:capabilities": grant.capabilities.to_string(),
        },
    });
    (id, policy)
}

fn render_property(value: &Property, ids: &[String]) -> Value {
    match value {
        Property::String(s) => Value::String(s.clone()),
        Property::Number(n) => json!(n),
        Property::Bool(b) => Value::Bool(*b),
        Property::List(items) => {
            Value::Array(items.iter().map(|v| render_property(v, ids)).collect())
        }
        Property::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), render_property(v, ids)))
                .collect(),
        ),
        Property::Attr(attr) => {
            let target = &ids[attr.resource.0];
            match attr.attribute {
                Attribute::Arn => json!({ "Fn::GetAtt": [target, "Arn"] }),
                Attribute::Name | Attribute::Id => json!({ "Ref": target }),
            }
        }
    }
}

fn pascal_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for word in key.split('_').filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
