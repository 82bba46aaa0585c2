use mynotes_config::AppConfig;
use mynotes_graph::{Graph, LogicalId};

use crate::{
    Error,
    addressing::Ipv4Block,
    api::{ApiHandle, ApiInputs, ApiProps, ApiUnit},
    identity::{IdentityHandle, IdentityProps, IdentityUnit},
    network::{NetworkHandle, NetworkProps, NetworkUnit},
};

pub const NETWORK_STACK: &str = "network";
pub const AUTH_STACK: &str = "auth";
pub const API_STACK: &str = "mynotes-api";

/// The finished graph and the handles of the units that built it.
#[derive(Clone, Debug)]
pub struct Composition {
    pub graph: Graph,
    pub network: NetworkHandle,
    pub identity: IdentityHandle,
    pub api: ApiHandle,
}

/// Composition root: network, then identity, then the API on top of the network.
pub struct ApplicationRoot;

impl ApplicationRoot {
    pub fn compose(config: &AppConfig) -> Result<Composition, Error> {
        let cidr: Ipv4Block = config.network.cidr.parse()?;
        let network_props = NetworkProps::builder()
            .cidr(cidr)
            .max_azs(config.network.max_azs)
            .subnet_prefix(config.network.subnet_prefix)
            .region(config.region.as_str())
            .build();
        let identity_props = IdentityProps::builder()
            .user_pool_name(config.auth.user_pool_name.as_str())
            .build();
        let api_props = ApiProps::from(&config.api);

        let mut graph = Graph::new(LogicalId::try_from(config.stack_name.as_str())?);
        let root = graph.root();

        let network = NetworkUnit::build(&mut graph, root, NETWORK_STACK, &network_props)?;
        let identity = IdentityUnit::build(&mut graph, root, AUTH_STACK, &identity_props)?;
        let api = ApiUnit::build(
            &mut graph,
            root,
            API_STACK,
            &api_props,
            ApiInputs {
                network: &network,
                user_directory: None,
            },
        )?;

        graph.assert_invariants();
        tracing::debug!(
            root = %config.stack_name,
            resources = graph.resource_count(),
            "composed application"
        );
        Ok(Composition {
            graph,
            network,
            identity,
            api,
        })
    }
}

pub fn compose(config: &AppConfig) -> Result<Composition, Error> {
    ApplicationRoot::compose(config)
}
