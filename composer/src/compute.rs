use std::fmt;

use mynotes_graph::{
    Attr, EnvironmentContract, Graph, Property, ResourceDecl, ResourceId, ResourceKind, StackId,
    routes::HttpMethod,
};

use crate::{Error, network::NetworkHandle};

pub const DEFAULT_MEMORY_MB: u32 = 256;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Runtime {
    #[default]
    Python38,
    Python39,
    Python312,
}

impl Runtime {
    pub fn as_str(self) -> &'static str {
        match self {
            Runtime::Python38 => "python3.8",
            Runtime::Python39 => "python3.9",
            Runtime::Python312 => "python3.12",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a compute unit's code comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodeSource {
    /// Module bundled from a source tree: `entry` directory, `index` module file inside it.
    Bundle { entry: String, index: String },
    /// Directory shipped as-is.
    Asset { path: String },
}

impl CodeSource {
    fn to_property(&self) -> Property {
        match self {
            CodeSource::Bundle { entry, index } => Property::map([
                ("kind", "bundle"),
                ("entry", entry.as_str()),
                ("index", index.as_str()),
            ]),
            CodeSource::Asset { path } => {
                Property::map([("kind", "asset"), ("path", path.as_str())])
            }
        }
    }
}

/// The note operations, one compute unit each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Create,
    DeleteById,
    FindById,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::DeleteById, Operation::FindById];

    pub fn logical_id(self) -> &'static str {
        match self {
            Operation::Create => "CreateNoteFunction",
            Operation::DeleteById => "DeleteNoteFunction",
            Operation::FindById => "FindNoteByIdFunction",
        }
    }

    pub fn function_name(self) -> &'static str {
        match self {
            Operation::Create => "CreateNote",
            Operation::DeleteById => "DeleteNote",
            Operation::FindById => "FindNoteById",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::Create => "Create note",
            Operation::DeleteById => "Delete note",
            Operation::FindById => "Find note by id",
        }
    }

    /// Entry symbol inside the handler module.
    pub fn handler_symbol(self) -> &'static str {
        match self {
            Operation::Create => "handler_create_note",
            Operation::DeleteById => "handler_delete_by_id",
            Operation::FindById => "handler_find_by_id",
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            Operation::Create => HttpMethod::Post,
            Operation::DeleteById => HttpMethod::Delete,
            Operation::FindById => HttpMethod::Get,
        }
    }

    /// Bound on `/{collection}/{id}` rather than on the collection itself.
    pub fn targets_item(self) -> bool {
        !matches!(self, Operation::Create)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::DeleteById => "delete-by-id",
            Operation::FindById => "find-by-id",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct FunctionProps {
    pub function_name: String,
    pub description: Option<String>,
    #[builder(default)]
    pub runtime: Runtime,
    pub code: CodeSource,
    pub handler: String,
    #[builder(default = DEFAULT_MEMORY_MB)]
    pub memory_size: u32,
    #[builder(default)]
    pub environment: EnvironmentContract,
}

/// Declares a compute unit placed in every private subnet of `network`.
pub fn declare_function(
    graph: &mut Graph,
    stack: StackId,
    logical_id: &str,
    props: &FunctionProps,
    network: &NetworkHandle,
) -> Result<ResourceId, Error> {
    if props.handler.is_empty() {
        return Err(Error::invalid_props("function", "handler", "must not be empty"));
    }
    if network.subnets.is_empty() {
        return Err(Error::invalid_props(
            "function",
            "subnet_ids",
            "network exposes no private subnets",
        ));
    }

    let mut decl = ResourceDecl::new(logical_id, ResourceKind::ComputeUnit)
        .property("function_name", props.function_name.as_str())
        .property("runtime", Property::policy(props.runtime))
        .property("handler", props.handler.as_str())
        .property("code", props.code.to_property())
        .property("memory_size", props.memory_size)
        .property("environment", props.environment.to_property())
        .property("vpc_id", Attr::id(network.vpc))
        .property(
            "subnet_ids",
            Property::list(network.subnets.iter().map(|s| Attr::id(s.id))),
        );
    if let Some(description) = &props.description {
        decl = decl.property("description", description.as_str());
    }

    let id = graph.add_resource(stack, decl)?;
    tracing::trace!(
        function = %props.function_name,
        handler = %props.handler,
        "declared compute unit"
    );
    Ok(id)
}

/// Reads back the environment declared on a compute unit.
pub fn environment_of(graph: &Graph, function: ResourceId) -> Option<EnvironmentContract> {
    let resource = graph.resource(function);
    if resource.kind != ResourceKind::ComputeUnit {
        return None;
    }
    resource
        .property("environment")
        .and_then(EnvironmentContract::from_property)
}
