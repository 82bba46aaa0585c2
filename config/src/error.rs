use miette::Diagnostic;
use thiserror::Error;

#[allow(unused_assignments)]
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    #[diagnostic(code(config::unreadable))]
    Unreadable { path: String, message: String },

    #[error("malformed config: {0}")]
    #[diagnostic(code(config::parse))]
    Parse(String),

    #[error("{var}: {message}")]
    #[diagnostic(
        code(config::env_override),
        help(
            "Override variables are `MYNOTES_CONFIG_` followed by the upper-cased config path \
             with sections joined by `__`, e.g. `MYNOTES_CONFIG_API__GRANT_POLICY`."
        )
    )]
    EnvOverride { var: String, message: String },

    #[error("invalid config path {path:?}: {message}")]
    #[diagnostic(code(config::invalid_path))]
    InvalidPath { path: String, message: String },

    #[error("invalid configuration: {}", .0.join("; "))]
    #[diagnostic(code(config::invalid))]
    Validation(Vec<String>),
}

impl ConfigError {
    pub(crate) fn env_override(var: &str, message: impl Into<String>) -> Self {
        Self::EnvOverride {
            var: var.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_path(path: &str, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
