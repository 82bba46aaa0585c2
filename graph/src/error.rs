use miette::Diagnostic;
use thiserror::Error;

#[allow(unused_assignments)]
#[derive(Clone, Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid logical id `{id}`: {message}")]
    #[diagnostic(code(graph::invalid_logical_id))]
    InvalidLogicalId { id: String, message: &'static str },

    #[error("logical id `{id}` is already used in {scope}")]
    #[diagnostic(
        code(graph::duplicate_logical_id),
        help("Logical ids must be unique among the stacks and resources of a scope.")
    )]
    DuplicateLogicalId { scope: String, id: String },

    #[error("unknown stack #{stack}")]
    #[diagnostic(code(graph::unknown_stack))]
    UnknownStack { stack: usize },

    #[error("{from} references unknown resource #{target}")]
    #[diagnostic(code(graph::unknown_reference))]
    UnknownReference { from: String, target: usize },

    #[error("reference from {from} to {to} would create a dependency cycle")]
    #[diagnostic(code(graph::reference_cycle))]
    ReferenceCycle { from: String, to: String },

    #[error("cannot grant {principal} access to {resource}: {message}")]
    #[diagnostic(code(graph::invalid_grant))]
    InvalidGrant {
        principal: String,
        resource: String,
        message: &'static str,
    },

    #[error("invalid environment variable name `{name}` on {component}")]
    #[diagnostic(
        code(graph::invalid_environment_name),
        help("Environment variable names must match ^[A-Z][A-Z0-9_]*$.")
    )]
    InvalidEnvironmentName { component: String, name: String },

    #[error("invalid path segment `{segment}` under {parent}: {message}")]
    #[diagnostic(code(graph::invalid_path_segment))]
    InvalidPathSegment {
        parent: String,
        segment: String,
        message: &'static str,
    },

    #[error("path segment `{segment}` already exists under {parent}")]
    #[diagnostic(code(graph::duplicate_path_segment))]
    DuplicatePathSegment { parent: String, segment: String },

    #[error(
        "path parameter `{{{segment}}}` under {parent} conflicts with existing parameter \
         `{{{existing}}}`"
    )]
    #[diagnostic(
        code(graph::ambiguous_path_parameter),
        help("A route node may have at most one parameter child.")
    )]
    AmbiguousPathParameter {
        parent: String,
        segment: String,
        existing: String,
    },

    #[error("`{method} {path}` is bound more than once")]
    #[diagnostic(code(graph::duplicate_route_binding))]
    DuplicateRouteBinding { path: String, method: String },

    #[error("unknown route node #{node}")]
    #[diagnostic(code(graph::unknown_route_node))]
    UnknownRouteNode { node: usize },

    #[error("unknown http method `{0}`")]
    #[diagnostic(code(graph::unknown_http_method))]
    UnknownHttpMethod(String),
}
