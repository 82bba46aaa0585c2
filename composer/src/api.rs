use std::collections::BTreeMap;

use mynotes_config::ApiConfig;
use mynotes_graph::{
    Attr, EnvironmentContract, Graph, RemovalPolicy, ResourceId, StackId,
    routes::{Integration, RouteNodeId},
};

use crate::{
    Error,
    assets::{self, AssetPassthrough},
    compute::{self, CodeSource, FunctionProps, Operation, Runtime},
    grants::{self, GrantPolicy, StoreAccess},
    identity::IdentityHandle,
    network::NetworkHandle,
    rest::{RestApiProps, RestSurface},
    storage::{self, BucketEncryption, BucketProps, KeyAttribute, TableProps},
};

pub const TABLE_LOGICAL_ID: &str = "NotesTable";
pub const TABLE_NAME: &str = "Notes";
pub const PARTITION_KEY: &str = "id";
pub const BUCKET_LOGICAL_ID: &str = "NotesContentBucket";
pub const REST_API_LOGICAL_ID: &str = "note-api";

pub const ENV_TABLE_NAME: &str = "NOTES_TABLE_NAME";
pub const ENV_BUCKET_NAME: &str = "NOTES_CONTENT_BUCKET_NAME";

/// Handler of the create unit when it ships as a plain code asset.
pub const ASSET_CREATE_HANDLER: &str = "mynotes.port.note.handler_create_note";

#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct ApiProps {
    #[builder(default = "My Notes REST API".to_string())]
    pub rest_api_name: String,
    #[builder(default = "API for managing notes".to_string())]
    pub description: String,
    #[builder(default = "note".to_string())]
    pub collection: String,
    #[builder(default = compute::DEFAULT_MEMORY_MB)]
    pub memory_size: u32,
    #[builder(default)]
    pub runtime: Runtime,
    #[builder(default = "../lambda".to_string())]
    pub code_entry: String,
    #[builder(default = "mynotes/port/notes.py".to_string())]
    pub handler_index: String,
    #[builder(default)]
    pub grant_policy: GrantPolicy,
    #[builder(default)]
    pub asset_passthrough: bool,
    #[builder(default)]
    pub asset_packaged_create: bool,
}

impl Default for ApiProps {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&ApiConfig> for ApiProps {
    fn from(config: &ApiConfig) -> Self {
        Self::builder()
            .rest_api_name(config.rest_api_name.as_str())
            .description(config.description.as_str())
            .collection(config.collection.as_str())
            .memory_size(config.memory_size)
            .code_entry(config.code_entry.as_str())
            .handler_index(config.handler_index.as_str())
            .grant_policy(config.grant_policy)
            .asset_passthrough(config.features.asset_passthrough)
            .asset_packaged_create(config.features.asset_packaged_create)
            .build()
    }
}

/// Handles the API unit consumes from sibling units.
#[derive(Clone, Copy, Debug)]
pub struct ApiInputs<'a> {
    pub network: &'a NetworkHandle,
    /// Typed slot for the user directory. Accepted but not wired into any resource.
    pub user_directory: Option<&'a IdentityHandle>,
}

#[derive(Clone, Debug)]
pub struct ApiHandle {
    pub stack: StackId,
    pub table: ResourceId,
    pub bucket: ResourceId,
    pub rest: RestSurface,
    pub collection: RouteNodeId,
    pub item: RouteNodeId,
    pub functions: BTreeMap<Operation, ResourceId>,
    pub access: BTreeMap<Operation, StoreAccess>,
    pub environment: EnvironmentContract,
    pub user_directory: Option<ResourceId>,
    pub assets: Option<AssetPassthrough>,
}

/// Stores, REST surface and one compute unit per note operation.
pub struct ApiUnit;

impl ApiUnit {
    pub fn build(
        graph: &mut Graph,
        parent: StackId,
        logical_id: &str,
        props: &ApiProps,
        inputs: ApiInputs<'_>,
    ) -> Result<ApiHandle, Error> {
        let stack = graph.add_stack(parent, logical_id)?;

        let table = storage::declare_table(
            graph,
            stack,
            TABLE_LOGICAL_ID,
            &TableProps::builder()
                .table_name(TABLE_NAME)
                .partition_key(KeyAttribute::string(PARTITION_KEY))
                .removal(RemovalPolicy::Retain)
                .build(),
        )?;
        let bucket = storage::declare_bucket(
            graph,
            stack,
            BUCKET_LOGICAL_ID,
            &BucketProps::builder()
                .versioned(true)
                .encryption(BucketEncryption::S3Managed)
                .build(),
        )?;

        let mut rest = RestSurface::declare(
            graph,
            stack,
            REST_API_LOGICAL_ID,
            &RestApiProps::builder()
                .rest_api_name(props.rest_api_name.as_str())
                .description(props.description.as_str())
                .binary_media_types(vec!["*/*".to_string()])
                .minimum_compression_size(0)
                .build(),
        )?;

        let mut environment = EnvironmentContract::new();
        environment.insert(logical_id, ENV_BUCKET_NAME, Attr::name(bucket))?;
        environment.insert(logical_id, ENV_TABLE_NAME, Attr::name(table))?;

        let root = rest.routes().root();
        let collection = rest.add_resource(graph, root, &props.collection)?;

        let assets = if props.asset_passthrough {
            Some(assets::declare(graph, stack, &mut rest, collection, bucket)?)
        } else {
            None
        };

        let item = rest.add_resource(graph, collection, "{id}")?;

        let mut functions = BTreeMap::new();
        let mut access = BTreeMap::new();
        for operation in Operation::ALL {
            let function = compute::declare_function(
                graph,
                stack,
                operation.logical_id(),
                &function_props(props, operation, &environment),
                inputs.network,
            )?;
            let granted = grants::wire_grants(
                graph,
                function,
                operation,
                props.grant_policy,
                table,
                bucket,
            )?;

            let node = if operation.targets_item() {
                item
            } else {
                collection
            };
            rest.add_method(
                graph,
                node,
                operation.method(),
                Integration::Function(function),
            )?;

            functions.insert(operation, function);
            access.insert(operation, granted);
        }

        tracing::debug!(
            stack = %graph.stack(stack).path,
            grant_policy = %props.grant_policy,
            asset_passthrough = props.asset_passthrough,
            asset_packaged_create = props.asset_packaged_create,
            "composed api unit"
        );
        Ok(ApiHandle {
            stack,
            table,
            bucket,
            rest,
            collection,
            item,
            functions,
            access,
            environment,
            user_directory: inputs.user_directory.map(|h| h.user_pool),
            assets,
        })
    }
}

fn function_props(
    props: &ApiProps,
    operation: Operation,
    environment: &EnvironmentContract,
) -> FunctionProps {
    let (code, handler) = if operation == Operation::Create && props.asset_packaged_create {
        (
            CodeSource::Asset {
                path: props.code_entry.clone(),
            },
            ASSET_CREATE_HANDLER.to_string(),
        )
    } else {
        (
            CodeSource::Bundle {
                entry: props.code_entry.clone(),
                index: props.handler_index.clone(),
            },
            operation.handler_symbol().to_string(),
        )
    };

    FunctionProps::builder()
        .function_name(operation.function_name())
        .description(operation.description().to_string())
        .runtime(props.runtime)
        .code(code)
        .handler(handler)
        .memory_size(props.memory_size)
        .environment(environment.clone())
        .build()
}
