use mynotes_graph::{CapabilitySet, Graph, ResourceId};
pub use mynotes_config::GrantPolicy;

use crate::{Error, compute::Operation};

/// Capabilities one compute unit receives on the two stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreAccess {
    pub table: CapabilitySet,
    pub bucket: CapabilitySet,
}

/// What each operation actually touches.
pub fn minimum_needed(operation: Operation) -> StoreAccess {
    match operation {
        Operation::Create => StoreAccess {
            table: CapabilitySet::write(),
            bucket: CapabilitySet::write(),
        },
        Operation::DeleteById => StoreAccess {
            table: CapabilitySet::read_write(),
            bucket: CapabilitySet::write(),
        },
        Operation::FindById => StoreAccess {
            table: CapabilitySet::read(),
            bucket: CapabilitySet::read(),
        },
    }
}

pub fn access_for(policy: GrantPolicy, operation: Operation) -> StoreAccess {
    match policy {
        GrantPolicy::Full => StoreAccess {
            table: CapabilitySet::read_write(),
            bucket: CapabilitySet::read_write(),
        },
        GrantPolicy::MinimumNeeded => minimum_needed(operation),
    }
}

/// Grants `function` access to both stores according to `policy`.
pub fn wire_grants(
    graph: &mut Graph,
    function: ResourceId,
    operation: Operation,
    policy: GrantPolicy,
    table: ResourceId,
    bucket: ResourceId,
) -> Result<StoreAccess, Error> {
    let access = access_for(policy, operation);
    graph.grant(function, table, &access.table)?;
    graph.grant(function, bucket, &access.bucket)?;
    tracing::trace!(
        %operation,
        %policy,
        table = %access.table,
        bucket = %access.bucket,
        "wired store grants"
    );
    Ok(access)
}
