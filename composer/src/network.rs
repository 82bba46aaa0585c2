use std::{collections::BTreeMap, fmt};

use mynotes_graph::{
    Attr, Graph, LogicalId, Property, ResourceDecl, ResourceId, ResourceKind, StackId,
};

use crate::{Error, addressing::Ipv4Block};

pub const VPC_LOGICAL_ID: &str = "vpc";

/// Zone suffixes run `a`..`z`.
const MAX_ZONES: u8 = 26;

#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct NetworkProps {
    #[builder(default)]
    pub cidr: Ipv4Block,
    #[builder(default = 3)]
    pub max_azs: u8,
    /// Prefix length of each per-zone subnet.
    #[builder(default = 18)]
    pub subnet_prefix: u8,
    #[builder(default = "eu-west-1".to_string())]
    pub region: String,
}

impl Default for NetworkProps {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Storage services reachable from the private subnets through gateway endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageService {
    KeyValueTable,
    BlobStore,
}

impl StorageService {
    pub const ALL: [StorageService; 2] = [StorageService::KeyValueTable, StorageService::BlobStore];

    pub fn service_name(self, region: &str) -> String {
        let service = match self {
            StorageService::KeyValueTable => "dynamodb",
            StorageService::BlobStore => "s3",
        };
        format!("com.amazonaws.{region}.{service}")
    }

    fn logical_id(self) -> &'static str {
        match self {
            StorageService::KeyValueTable => "DynamoDbEndpoint",
            StorageService::BlobStore => "S3Endpoint",
        }
    }
}

impl fmt::Display for StorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageService::KeyValueTable => "key-value-table",
            StorageService::BlobStore => "blob-store",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubnetHandle {
    pub id: ResourceId,
    pub zone: String,
    pub block: Ipv4Block,
}

/// What the network unit exposes to its consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkHandle {
    pub stack: StackId,
    pub vpc: ResourceId,
    pub block: Ipv4Block,
    pub subnets: Vec<SubnetHandle>,
    pub endpoints: BTreeMap<StorageService, ResourceId>,
}

impl NetworkHandle {
    pub fn subnet_ids(&self) -> Vec<ResourceId> {
        self.subnets.iter().map(|s| s.id).collect()
    }
}

/// Isolated network: private subnets only, no NAT, gateway endpoints for storage.
pub struct NetworkUnit;

impl NetworkUnit {
    pub fn build(
        graph: &mut Graph,
        parent: StackId,
        logical_id: &str,
        props: &NetworkProps,
    ) -> Result<NetworkHandle, Error> {
        if props.max_azs == 0 || props.max_azs > MAX_ZONES {
            return Err(Error::invalid_props(
                "network",
                "max_azs",
                format!("must be between 1 and {MAX_ZONES} (got {})", props.max_azs),
            ));
        }
        if props.region.is_empty() {
            return Err(Error::invalid_props("network", "region", "must not be empty"));
        }

        // Sizing is checked before anything lands in the graph.
        let label = graph
            .stack(parent)
            .path
            .join(&LogicalId::try_from(logical_id)?)
            .join(&LogicalId::try_from(VPC_LOGICAL_ID)?);
        let blocks = props.cidr.carve(
            label.as_str(),
            usize::from(props.max_azs),
            props.subnet_prefix,
        )?;

        let stack = graph.add_stack(parent, logical_id)?;
        let vpc = graph.add_resource(
            stack,
            ResourceDecl::new(VPC_LOGICAL_ID, ResourceKind::Network)
                .property("cidr_block", props.cidr.to_string())
                .property("max_azs", u32::from(props.max_azs))
                .property("nat_gateways", 0i64)
                .property("enable_dns_hostnames", true)
                .property("enable_dns_support", true),
        )?;

        let mut subnets = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.into_iter().enumerate() {
            let zone = format!("{}{}", props.region, char::from(b'a' + i as u8));
            let id = graph.add_resource(
                stack,
                ResourceDecl::new(format!("PrivateSubnet{}", i + 1), ResourceKind::Subnet)
                    .property("vpc_id", Attr::id(vpc))
                    .property("cidr_block", block.to_string())
                    .property("availability_zone", zone.as_str())
                    .property("subnet_type", "private_isolated")
                    .property("map_public_ip_on_launch", false),
            )?;
            tracing::trace!(subnet = %block, %zone, "declared private subnet");
            subnets.push(SubnetHandle { id, zone, block });
        }

        let subnet_refs = Property::list(subnets.iter().map(|s| Attr::id(s.id)));
        let mut endpoints = BTreeMap::new();
        for service in StorageService::ALL {
            let id = graph.add_resource(
                stack,
                ResourceDecl::new(service.logical_id(), ResourceKind::GatewayEndpoint)
                    .property("vpc_id", Attr::id(vpc))
                    .property("service_name", service.service_name(&props.region))
                    .property("vpc_endpoint_type", "Gateway")
                    .property("subnet_ids", subnet_refs.clone()),
            )?;
            endpoints.insert(service, id);
        }

        tracing::debug!(
            stack = %graph.stack(stack).path,
            cidr = %props.cidr,
            zones = subnets.len(),
            "composed network unit"
        );
        Ok(NetworkHandle {
            stack,
            vpc,
            block: props.cidr,
            subnets,
            endpoints,
        })
    }
}
