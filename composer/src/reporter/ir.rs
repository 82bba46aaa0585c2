use mynotes_graph::{Graph, GraphIr};

use super::{Reporter, ReporterError};

#[derive(Clone, Copy, Debug, Default)]
pub struct GraphIrReporter;

impl Reporter for GraphIrReporter {
    type Artifact = String;

    fn emit(&self, graph: &Graph) -> Result<Self::Artifact, ReporterError> {
        render_graph_ir(graph)
    }
}

/// Render the graph as its stable JSON IR.
pub fn render_graph_ir(graph: &Graph) -> Result<String, ReporterError> {
    let ir = GraphIr::from(graph);
    let mut out = serde_json::to_string_pretty(&ir)
        .map_err(|e| ReporterError::Other(format!("failed to render graph IR: {e}")))?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use mynotes_graph::{LogicalId, ResourceDecl, ResourceKind, GRAPH_IR_SCHEMA};

    use super::*;

    #[test]
    fn rendered_ir_parses_back_into_the_same_graph() {
        let mut g = Graph::new(LogicalId::try_from("App").unwrap());
        let root = g.root();
        g.add_resource(root, ResourceDecl::new("Table", ResourceKind::KeyValueTable))
            .unwrap();

        let out = GraphIrReporter.emit(&g).unwrap();
        assert!(out.ends_with('\n'));
        let parsed: GraphIr = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.schema, GRAPH_IR_SCHEMA);
        assert_eq!(parsed, GraphIr::from(&g));
    }
}
