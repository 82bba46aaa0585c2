use std::fmt::Write as _;

use mynotes_graph::{Graph, StackId};

use super::{Reporter, ReporterError};

#[derive(Clone, Copy, Debug, Default)]
pub struct DotReporter;

impl Reporter for DotReporter {
    type Artifact = String;

    fn emit(&self, graph: &Graph) -> Result<Self::Artifact, ReporterError> {
        Ok(render_dot(graph))
    }
}

/// Graphviz rendering: one cluster per stack, solid edges from a resource to what it
/// references, dashed edges from a principal to the store it was granted.
pub fn render_dot(g: &Graph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph stacks {{");
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  compound=true;");

    render_stack(g, g.root(), 1, &mut out);

    for resource in g.resources_iter() {
        for target in &resource.references {
            if g.capabilities(resource.id, *target).is_empty() {
                write_indent(&mut out, 1);
                let _ = writeln!(out, "r{} -> r{};", resource.id.0, target.0);
            }
        }
    }

    for grant in g.grants_iter() {
        write_indent(&mut out, 1);
        let _ = write!(
            out,
            "r{} -> r{} [label=\"",
            grant.principal.0, grant.resource.0
        );
        write_escaped_label(&mut out, &grant.capabilities.to_string());
        let _ = writeln!(out, "\", style=dashed];");
    }

    let _ = writeln!(out, "}}");
    out
}

fn render_stack(g: &Graph, id: StackId, indent: usize, out: &mut String) {
    let stack = g.stack(id);

    write_indent(out, indent);
    let _ = writeln!(out, "subgraph cluster_{} {{", id.0);
    write_indent(out, indent + 1);
    let _ = writeln!(out, "penwidth={};", if stack.parent.is_none() { 2 } else { 1 });
    write_indent(out, indent + 1);
    let _ = write!(out, "label=\"");
    write_escaped_label(out, stack.logical_id.as_str());
    let _ = writeln!(out, "\";");

    for &resource in &stack.resources {
        let r = g.resource(resource);
        write_indent(out, indent + 1);
        let _ = write!(out, "r{} [label=\"", resource.0);
        write_escaped_label(out, &format!("{}\n{}", r.logical_id, r.kind));
        let _ = writeln!(out, "\"];");
    }

    for &child in &stack.children {
        render_stack(g, child, indent + 1, out);
    }

    write_indent(out, indent);
    let _ = writeln!(out, "}}");
}

fn write_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

fn write_escaped_label(out: &mut String, label: &str) {
    for ch in label.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use mynotes_graph::{Attr, CapabilitySet, LogicalId, ResourceDecl, ResourceKind};

    use super::*;

    #[test]
    fn dot_renders_clusters_references_and_grants() {
        let mut g = Graph::new(LogicalId::try_from("App").unwrap());
        let root = g.root();
        let network = g.add_stack(root, "network").unwrap();
        let api = g.add_stack(root, "api").unwrap();
        let vpc = g
            .add_resource(network, ResourceDecl::new("vpc", ResourceKind::Network))
            .unwrap();
        let table = g
            .add_resource(api, ResourceDecl::new("Table", ResourceKind::KeyValueTable))
            .unwrap();
        let function = g
            .add_resource(
                api,
                ResourceDecl::new("Fn", ResourceKind::ComputeUnit).property("vpc", Attr::id(vpc)),
            )
            .unwrap();
        g.grant(function, table, &CapabilitySet::read_write())
            .unwrap();

        let dot = DotReporter.emit(&g).unwrap();
        let expected = r#"digraph stacks {
  rankdir=LR;
  compound=true;
  subgraph cluster_0 {
    penwidth=2;
    label="App";
    subgraph cluster_1 {
      penwidth=1;
      label="network";
      r0 [label="vpc\nnetwork"];
    }
    subgraph cluster_2 {
      penwidth=1;
      label="api";
      r1 [label="Table\nkey-value-table"];
      r2 [label="Fn\ncompute-unit"];
    }
  }
  r2 -> r0;
  r2 -> r1 [label="read+write", style=dashed];
}
"#;
        assert_eq!(dot, expected);
    }

    #[test]
    fn labels_are_escaped() {
        let mut out = String::new();
        write_escaped_label(&mut out, "a\"b\\c\nd");
        assert_eq!(out, "a\\\"b\\\\c\\nd");
    }
}
