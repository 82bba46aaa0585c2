use mynotes_graph::{Graph, ResourceDecl, ResourceId, ResourceKind, StackId};

use crate::Error;

pub const USER_POOL_LOGICAL_ID: &str = "UserPool";

#[derive(Clone, Debug, PartialEq, Eq, bon::Builder)]
#[builder(on(String, into))]
pub struct IdentityProps {
    pub user_pool_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityHandle {
    pub stack: StackId,
    pub user_pool: ResourceId,
}

/// User directory for the application.
pub struct IdentityUnit;

impl IdentityUnit {
    pub fn build(
        graph: &mut Graph,
        parent: StackId,
        logical_id: &str,
        props: &IdentityProps,
    ) -> Result<IdentityHandle, Error> {
        if props.user_pool_name.trim().is_empty() {
            return Err(Error::invalid_props(
                "identity",
                "user_pool_name",
                "must not be empty",
            ));
        }

        let stack = graph.add_stack(parent, logical_id)?;
        let user_pool = graph.add_resource(
            stack,
            ResourceDecl::new(USER_POOL_LOGICAL_ID, ResourceKind::UserDirectory)
                .property("user_pool_name", props.user_pool_name.as_str()),
        )?;

        tracing::debug!(user_pool_name = %props.user_pool_name, "composed identity unit");
        Ok(IdentityHandle { stack, user_pool })
    }
}
