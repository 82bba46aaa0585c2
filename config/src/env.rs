use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::{ConfigError, Result};

pub const CONFIG_ENV_PREFIX: &str = "MYNOTES_CONFIG_";

pub(crate) fn is_valid_config_key(seg: &str) -> bool {
    let mut chars = seg.chars();
    matches!(chars.next(), Some('a'..='z'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
        && !seg.contains("__")
}

pub fn env_var_for_path(path: &str) -> Result<String> {
    let segs = path
        .split('.')
        .map(|seg| {
            is_valid_config_key(seg)
                .then(|| seg.to_ascii_uppercase())
                .ok_or_else(|| {
                    ConfigError::invalid_path(
                        path,
                        format!("segment {seg:?} must be lower-case snake case without `__`"),
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{CONFIG_ENV_PREFIX}{}", segs.join("__")))
}

pub fn env_var_to_path(var: &str) -> Result<String> {
    let Some(rest) = var.strip_prefix(CONFIG_ENV_PREFIX) else {
        return Err(ConfigError::env_override(
            var,
            format!("not a {CONFIG_ENV_PREFIX}* variable"),
        ));
    };
    if rest.is_empty() {
        return Err(ConfigError::env_override(var, "missing config path"));
    }
    Ok(rest.to_ascii_lowercase().replace("__", "."))
}

/// Parses an env var value using the type of the default value at the same path.
pub fn parse_env_value(raw: &str, like: &Value) -> Result<Value> {
    let parsed = match like {
        Value::Bool(_) => match raw {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(_) => raw.parse::<u64>().ok().map(|n| Value::Number(n.into())),
        Value::String(_) => Some(
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::String(s)) => Value::String(s),
                _ => Value::String(raw.to_string()),
            },
        ),
        _ => serde_json::from_str::<Value>(raw).ok(),
    };
    parsed.ok_or_else(|| {
        ConfigError::Parse(format!(
            "cannot interpret {raw:?} as {}",
            match like {
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a non-negative integer",
                _ => "a JSON value",
            }
        ))
    })
}

/// Collects `MYNOTES_CONFIG_*` variables from an environment listing.
pub fn config_env_vars(
    vars: impl IntoIterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
    vars.into_iter()
        .filter(|(k, _)| k.starts_with(CONFIG_ENV_PREFIX))
        .collect()
}

/// Applies env overrides onto `target`. `defaults` decides which paths exist and what
/// type each leaf has.
pub fn apply_env_overrides(
    target: &mut Map<String, Value>,
    defaults: &Value,
    config_env: &BTreeMap<String, String>,
) -> Result<()> {
    let mut leaves = BTreeMap::new();
    collect_leaves(defaults, String::new(), &mut leaves);
    let leaf_paths: BTreeSet<&str> = leaves.keys().map(String::as_str).collect();

    for (k, v) in config_env {
        let path = env_var_to_path(k)?;
        let Some(like) = leaves.get(&path) else {
            return Err(ConfigError::env_override(
                k,
                format!(
                    "does not correspond to a config key (known: {})",
                    leaf_paths.iter().copied().collect::<Vec<_>>().join(", ")
                ),
            ));
        };
        if v.is_empty() {
            continue;
        }
        let parsed = parse_env_value(v, like).map_err(|e| match e {
            ConfigError::Parse(message) => ConfigError::env_override(k, message),
            other => other,
        })?;
        insert_path(target, &path, parsed)?;
    }
    Ok(())
}

fn collect_leaves(value: &Value, prefix: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                collect_leaves(v, path, out);
            }
        }
        other => {
            out.insert(prefix, other.clone());
        }
    }
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) -> Result<()> {
    let segs = path.split('.').collect::<Vec<_>>();
    let mut cur = root;
    for (idx, seg) in segs.iter().enumerate() {
        if idx == segs.len() - 1 {
            cur.insert(seg.to_string(), value);
            return Ok(());
        }

        let entry = cur
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        let Value::Object(m) = entry else {
            return Err(ConfigError::invalid_path(
                path,
                format!("parent segment {seg:?} is not an object"),
            ));
        };
        cur = m;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn env_names_round_trip_paths() {
        let var = env_var_for_path("api.features.asset_passthrough").unwrap();
        assert_eq!(var, "MYNOTES_CONFIG_API__FEATURES__ASSET_PASSTHROUGH");
        assert_eq!(
            env_var_to_path(&var).unwrap(),
            "api.features.asset_passthrough"
        );
        assert!(env_var_for_path("").is_err());
        assert!(env_var_for_path("api..x").is_err());
        assert!(env_var_for_path("Api").is_err());
        assert!(env_var_to_path("OTHER_VAR").is_err());
    }

    #[test]
    fn values_follow_the_default_type() {
        assert_eq!(parse_env_value("512", &json!(256)).unwrap(), json!(512));
        assert_eq!(parse_env_value("true", &json!(false)).unwrap(), json!(true));
        assert_eq!(parse_env_value("123", &json!("x")).unwrap(), json!("123"));
        assert_eq!(
            parse_env_value("\"quoted\"", &json!("x")).unwrap(),
            json!("quoted")
        );
        assert!(parse_env_value("lots", &json!(256)).is_err());
        assert!(parse_env_value("maybe", &json!(true)).is_err());
    }

    #[test]
    fn overrides_only_known_leaves() {
        let defaults = json!({ "api": { "memory_size": 256, "collection": "note" } });
        let mut target = Map::new();
        let env = BTreeMap::from([
            ("MYNOTES_CONFIG_API__MEMORY_SIZE".to_string(), "512".to_string()),
            ("MYNOTES_CONFIG_API__COLLECTION".to_string(), String::new()),
        ]);
        apply_env_overrides(&mut target, &defaults, &env).unwrap();
        assert_eq!(Value::Object(target), json!({ "api": { "memory_size": 512 } }));

        let env = BTreeMap::from([("MYNOTES_CONFIG_API__NOPE".to_string(), "1".to_string())]);
        let err = apply_env_overrides(&mut Map::new(), &defaults, &env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::EnvOverride { ref var, .. } if var == "MYNOTES_CONFIG_API__NOPE"
        ));
        assert!(err.to_string().contains("does not correspond"), "{err}");
    }
}
