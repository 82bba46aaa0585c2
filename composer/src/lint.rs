#![allow(unused_assignments)]

use miette::Diagnostic;
use mynotes_graph::{ResourceKind, graph::dependents_of};
use thiserror::Error;

use crate::{Composition, grants::minimum_needed};

#[allow(unused_assignments)]
#[derive(Clone, Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum CompositionLint {
    #[error("user directory {path} is never referenced by another resource")]
    #[diagnostic(
        code(composer::unused_user_directory),
        severity(Warning),
        help("Pass the identity handle to the API unit, or drop the identity unit.")
    )]
    UnusedUserDirectory { path: String },

    #[error("{principal} holds {granted} on {store} but only needs {needed}")]
    #[diagnostic(
        code(composer::over_grant),
        severity(Warning),
        help("Set `api.grant_policy` to `minimum_needed` to narrow the grant.")
    )]
    OverGrant {
        principal: String,
        store: String,
        granted: String,
        needed: String,
    },
}

impl CompositionLint {
    pub fn lint_code(&self) -> &'static str {
        match self {
            CompositionLint::UnusedUserDirectory { .. } => "composer::unused_user_directory",
            CompositionLint::OverGrant { .. } => "composer::over_grant",
        }
    }
}

/// Warnings about a composed graph. None of them stop synthesis.
pub fn lint_composition(c: &Composition) -> Vec<CompositionLint> {
    let g = &c.graph;
    let mut lints = Vec::new();

    for directory in g.resources_of_kind(ResourceKind::UserDirectory) {
        if dependents_of(g, directory.id).is_empty() {
            lints.push(CompositionLint::UnusedUserDirectory {
                path: directory.path.to_string(),
            });
        }
    }

    for (&operation, &function) in &c.api.functions {
        let needed = minimum_needed(operation);
        for (store, needed) in [(c.api.table, needed.table), (c.api.bucket, needed.bucket)] {
            let granted = g.capabilities(function, store);
            if granted != needed && granted.is_superset(&needed) {
                lints.push(CompositionLint::OverGrant {
                    principal: g.resource(function).path.to_string(),
                    store: g.resource(store).path.to_string(),
                    granted: granted.to_string(),
                    needed: needed.to_string(),
                });
            }
        }
    }

    lints
}

#[cfg(test)]
mod tests {
    use mynotes_config::{AppConfig, GrantPolicy};

    use super::*;
    use crate::compose;

    #[test]
    fn default_composition_warns_about_the_idle_directory_and_over_grants() {
        let c = compose(&AppConfig::default()).unwrap();
        let lints = lint_composition(&c);

        let unused: Vec<_> = lints
            .iter()
            .filter_map(|l| match l {
                CompositionLint::UnusedUserDirectory { path } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(unused, ["/auth/UserPool"]);

        // Create: table and bucket. Delete: bucket. Find: table and bucket.
        let over = lints
            .iter()
            .filter(|l| l.lint_code() == "composer::over_grant")
            .count();
        assert_eq!(over, 5);
        assert!(lints.iter().any(|l| l.to_string()
            == "/mynotes-api/FindNoteByIdFunction holds read+write on /mynotes-api/NotesTable \
                but only needs read"));
    }

    #[test]
    fn minimum_needed_policy_leaves_only_the_directory_warning() {
        let mut config = AppConfig::default();
        config.api.grant_policy = GrantPolicy::MinimumNeeded;
        let c = compose(&config).unwrap();
        let codes: Vec<_> = lint_composition(&c).iter().map(CompositionLint::lint_code).collect();
        assert_eq!(codes, ["composer::unused_user_directory"]);
    }
}
