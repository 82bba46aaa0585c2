//! Composition of the My Notes backend: network, identity and API units assembled into a
//! single stack graph, plus the deployment-side views of that graph (plan, change set,
//! provisioning simulation, rendered artifacts).

use miette::Diagnostic;
use thiserror::Error;

pub mod addressing;
pub mod api;
pub mod app;
pub mod assets;
pub mod compute;
pub mod grants;
pub mod identity;
pub mod lint;
pub mod network;
pub mod plan;
pub mod provider;
pub mod reporter;
pub mod resolve;
pub mod rest;
pub mod storage;

pub use addressing::{Ipv4Block, SizingError};
pub use api::{ApiHandle, ApiInputs, ApiProps, ApiUnit};
pub use app::{ApplicationRoot, Composition, compose};
pub use identity::{IdentityHandle, IdentityProps, IdentityUnit};
pub use lint::{CompositionLint, lint_composition};
pub use network::{NetworkHandle, NetworkProps, NetworkUnit};
pub use plan::{Change, ChangeSet, DeploymentPlan, diff};
pub use resolve::{ProvisionedState, ResolveError, simulate};

#[allow(unused_assignments)]
#[derive(Clone, Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] mynotes_graph::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sizing(#[from] SizingError),

    #[error("invalid {unit} properties: `{field}` {message}")]
    #[diagnostic(code(composer::invalid_props))]
    InvalidProps {
        unit: &'static str,
        field: &'static str,
        message: String,
    },
}

impl Error {
    pub(crate) fn invalid_props(
        unit: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Error::InvalidProps {
            unit,
            field,
            message: message.into(),
        }
    }
}
