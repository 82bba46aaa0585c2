//! Read-only passthrough from the REST surface straight to the blob store.

use std::collections::BTreeMap;

use mynotes_graph::{
    CapabilitySet, Graph, ResourceDecl, ResourceId, ResourceKind, StackId,
    routes::{HttpMethod, Integration, RouteNodeId, StorageIntegration},
};

use crate::{
    Error,
    rest::{API_SERVICE_PRINCIPAL, RestSurface},
};

pub const ROLE_LOGICAL_ID: &str = "api-gateway-s3-assumer-role";
pub const ROLE_NAME: &str = "API-Gateway-S3-Integration-Role";
pub const PASSED_THROUGH_HEADERS: [&str; 1] = ["Content-Type"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssetPassthrough {
    pub role: ResourceId,
    pub node: RouteNodeId,
    pub method: ResourceId,
}

/// Declares `GET <collection>/assets/{folder}/{key}` served from `bucket` under a role
/// that may only read it.
pub fn declare(
    graph: &mut Graph,
    stack: StackId,
    surface: &mut RestSurface,
    collection: RouteNodeId,
    bucket: ResourceId,
) -> Result<AssetPassthrough, Error> {
    let role = graph.add_resource(
        stack,
        ResourceDecl::new(ROLE_LOGICAL_ID, ResourceKind::Role)
            .property("role_name", ROLE_NAME)
            .property("assumed_by", API_SERVICE_PRINCIPAL),
    )?;
    graph.grant(role, bucket, &CapabilitySet::read())?;

    let assets = surface.add_resource(graph, collection, "assets")?;
    let folder = surface.add_resource(graph, assets, "{folder}")?;
    let node = surface.add_resource(graph, folder, "{key}")?;

    let request_parameters = ["folder", "key"]
        .into_iter()
        .map(|param| {
            (
                format!("integration.request.path.{param}"),
                format!("method.request.path.{param}"),
            )
        })
        .collect::<BTreeMap<_, _>>();
    let integration = Integration::Storage(StorageIntegration {
        role,
        bucket,
        method: HttpMethod::Get,
        key_template: "{folder}/{key}".to_string(),
        request_parameters,
        response_headers: PASSED_THROUGH_HEADERS.map(String::from).to_vec(),
    });
    let method = surface.add_method(graph, node, HttpMethod::Get, integration)?;

    tracing::debug!(path = %surface.routes().node(node).path, "declared asset passthrough");
    Ok(AssetPassthrough { role, node, method })
}
