use miette::Diagnostic;
use mynotes_graph::Graph;
use thiserror::Error;

pub mod dot;
pub mod ir;
pub mod template;

pub use dot::DotReporter;
pub use ir::GraphIrReporter;
pub use template::TemplateReporter;

#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum ReporterError {
    #[error("reporter error: {0}")]
    #[diagnostic(code(reporter::error))]
    Other(String),
}

pub trait Reporter {
    type Artifact;

    fn emit(&self, graph: &Graph) -> Result<Self::Artifact, ReporterError>;
}
