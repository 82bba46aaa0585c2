mod env;
mod error;

use std::{collections::BTreeMap, fmt, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use env::{
    CONFIG_ENV_PREFIX, apply_env_overrides, config_env_vars, env_var_for_path, env_var_to_path,
    parse_env_value,
};
pub use error::{ConfigError, Result};

pub const MIN_MEMORY_MB: u32 = 128;
pub const MAX_MEMORY_MB: u32 = 10_240;
pub const MAX_AVAILABILITY_ZONES: u8 = 6;

/// Everything the composition root needs to build the application graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Logical id of the root stack.
    pub stack_name: String,
    pub region: String,
    pub network: NetworkConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stack_name: "MyNotesApplicationStack".to_string(),
            region: "eu-west-1".to_string(),
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Parent address block, e.g. `10.0.0.0/16`.
    pub cidr: String,
    pub max_azs: u8,
    /// Prefix length of each per-zone subnet.
    pub subnet_prefix: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 3,
            subnet_prefix: 18,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub user_pool_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_pool_name: "MyNotes User Pool".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub rest_api_name: String,
    pub description: String,
    /// First path segment of every route (`/note`, `/note/{id}`).
    pub collection: String,
    pub memory_size: u32,
    /// Directory holding the handler code, relative to the infrastructure project.
    pub code_entry: String,
    /// Module file containing the handler symbols.
    pub handler_index: String,
    pub grant_policy: GrantPolicy,
    pub features: FeatureFlags,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_api_name: "My Notes REST API".to_string(),
            description: "API for managing notes".to_string(),
            collection: "note".to_string(),
            memory_size: 256,
            code_entry: "../lambda".to_string(),
            handler_index: "mynotes/port/notes.py".to_string(),
            grant_policy: GrantPolicy::default(),
            features: FeatureFlags::default(),
        }
    }
}

/// How much access compute units receive on the stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPolicy {
    /// Read and write on every store for every compute unit.
    #[default]
    Full,
    /// Only what each operation needs.
    MinimumNeeded,
}

impl fmt::Display for GrantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GrantPolicy::Full => "full",
            GrantPolicy::MinimumNeeded => "minimum_needed",
        };
        f.write_str(s)
    }
}

/// Optional sub-graphs. Both are off by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    /// Serve blob content straight from storage at `/{collection}/assets/{folder}/{key}`.
    pub asset_passthrough: bool,
    /// Package the create handler as a plain code asset instead of a bundled module.
    pub asset_packaged_create: bool,
}

impl AppConfig {
    pub fn from_json_str(input: &str) -> Result<Self> {
        Self::from_value(parse_object(input)?, &BTreeMap::new())
    }

    /// Loads an optional JSON file and applies `MYNOTES_CONFIG_*` overrides from `env`.
    pub fn load(path: Option<&Path>, env: &BTreeMap<String, String>) -> Result<Self> {
        let base = match path {
            Some(path) => {
                let raw =
                    std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                parse_object(&raw).map_err(|e| match e {
                    ConfigError::Parse(message) => {
                        ConfigError::Parse(format!("{}: {message}", path.display()))
                    }
                    other => other,
                })?
            }
            None => Map::new(),
        };
        Self::from_value(base, env)
    }

    fn from_value(mut base: Map<String, Value>, env: &BTreeMap<String, String>) -> Result<Self> {
        if !env.is_empty() {
            let defaults = serde_json::to_value(Self::default())
                .map_err(|e| ConfigError::Parse(format!("failed to encode defaults: {e}")))?;
            apply_env_overrides(&mut base, &defaults, env)?;
        }
        let config: Self = serde_json::from_value(Value::Object(base))
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.stack_name.is_empty() || self.stack_name.contains('/') {
            problems.push(format!("stack_name {:?} is not a valid id", self.stack_name));
        }
        if self.region.is_empty() {
            problems.push("region must not be empty".to_string());
        }
        if self.network.max_azs == 0 || self.network.max_azs > MAX_AVAILABILITY_ZONES {
            problems.push(format!(
                "network.max_azs must be between 1 and {MAX_AVAILABILITY_ZONES} (got {})",
                self.network.max_azs
            ));
        }
        if self.auth.user_pool_name.trim().is_empty() {
            problems.push("auth.user_pool_name must not be empty".to_string());
        }
        let collection = &self.api.collection;
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            problems.push(format!(
                "api.collection {collection:?} must be a plain path segment"
            ));
        }
        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&self.api.memory_size) {
            problems.push(format!(
                "api.memory_size must be between {MIN_MEMORY_MB} and {MAX_MEMORY_MB} MB (got {})",
                self.api.memory_size
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }
}

fn parse_object(input: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::Parse("config must be a JSON object".to_string())),
        Err(e) => Err(ConfigError::Parse(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn defaults_describe_the_notes_application() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.auth.user_pool_name, "MyNotes User Pool");
        assert_eq!(config.network.max_azs, 3);
        assert_eq!(config.api.grant_policy, GrantPolicy::Full);
        assert!(!config.api.features.asset_passthrough);
        assert!(!config.api.features.asset_packaged_create);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_json_str(
            r#"{
                "api": {
                    "grant_policy": "minimum_needed",
                    "features": { "asset_passthrough": true }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.api.grant_policy, GrantPolicy::MinimumNeeded);
        assert!(config.api.features.asset_passthrough);
        assert_eq!(config.api.collection, "note");
        assert_eq!(config.network, NetworkConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_json_str(r#"{ "api": { "colection": "x" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn validation_reports_every_problem() {
        let err = AppConfig::from_json_str(
            r#"{ "auth": { "user_pool_name": " " }, "api": { "memory_size": 64 } }"#,
        )
        .unwrap_err();
        let ConfigError::Validation(problems) = &err else {
            panic!("expected validation error, got {err}");
        };
        assert_eq!(problems.len(), 2, "{err}");
        assert!(problems[0].contains("user_pool_name"), "{err}");
        assert!(problems[1].contains("memory_size"), "{err}");
        assert!(err.to_string().starts_with("invalid configuration: "));
    }

    #[test]
    fn file_and_env_are_layered() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "api": {{ "memory_size": 512 }} }}"#).unwrap();

        let env = config_env_vars([
            (
                "MYNOTES_CONFIG_API__FEATURES__ASSET_PACKAGED_CREATE".to_string(),
                "true".to_string(),
            ),
            ("MYNOTES_CONFIG_NETWORK__MAX_AZS".to_string(), "2".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]);
        let config = AppConfig::load(Some(file.path()), &env).unwrap();
        assert_eq!(config.api.memory_size, 512);
        assert!(config.api.features.asset_packaged_create);
        assert_eq!(config.network.max_azs, 2);
    }

    #[test]
    fn env_overrides_win_over_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "api": {{ "grant_policy": "full" }} }}"#).unwrap();
        let env = BTreeMap::from([(
            "MYNOTES_CONFIG_API__GRANT_POLICY".to_string(),
            "minimum_needed".to_string(),
        )]);
        let config = AppConfig::load(Some(file.path()), &env).unwrap();
        assert_eq!(config.api.grant_policy, GrantPolicy::MinimumNeeded);
    }
}
