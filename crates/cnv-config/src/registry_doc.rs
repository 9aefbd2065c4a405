//! Loading and canonicalizing the target registry document.
//!
//! Documents may be layered (base + environment overlay); later documents
//! deep-merge over earlier ones. The merged document is canonicalized
//! (recursively sorted keys, compact rendering) and hashed so the running
//! configuration is identifiable in logs.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use cnv_packager::TargetConfig;

use crate::error::ConfigError;

/// The parsed registry plus its canonical form and hash.
#[derive(Debug)]
pub struct LoadedRegistry {
    pub targets: BTreeMap<String, TargetConfig>,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load one registry document from a path, `file://` URI, or `http(s)` URL.
pub async fn load_registry(location: &str) -> Result<LoadedRegistry, ConfigError> {
    load_layered(&[location]).await
}

/// Load and deep-merge registry documents in order; later locations
/// override earlier ones.
pub async fn load_layered(locations: &[&str]) -> Result<LoadedRegistry, ConfigError> {
    let mut merged = Value::Object(Default::default());
    for location in locations {
        let text = fetch(location).await?;
        let parsed = parse_document(location, &text)?;
        deep_merge(&mut merged, parsed);
    }

    let canonical = canonicalize_json(&merged);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let config_hash = hex::encode(hasher.finalize());

    let Value::Object(entries) = merged else {
        return Err(ConfigError::MalformedDocument {
            location: locations.join(","),
            detail: "top level must be a mapping of target-key to configuration".into(),
        });
    };

    let mut targets = BTreeMap::new();
    for (key, value) in entries {
        let config: TargetConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::MalformedDocument {
                location: locations.join(","),
                detail: format!("target {key}: {e}"),
            })?;
        targets.insert(key, config);
    }

    info!(
        targets = targets.len(),
        config_hash = %config_hash,
        "registry document loaded"
    );
    Ok(LoadedRegistry {
        targets,
        canonical_json: canonical,
        config_hash,
    })
}

async fn fetch(location: &str) -> Result<String, ConfigError> {
    let unreadable = |detail: String| ConfigError::UnreadableDocument {
        location: location.to_string(),
        detail,
    };

    if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location).await.map_err(|e| unreadable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unreadable(format!("HTTP {}", response.status())));
        }
        return response.text().await.map_err(|e| unreadable(e.to_string()));
    }

    let path = location.strip_prefix("file://").unwrap_or(location);
    std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))
}

/// YAML is a superset of JSON; one parse path covers both formats.
fn parse_document(location: &str, text: &str) -> Result<Value, ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::MalformedDocument {
            location: location.to_string(),
            detail: e.to_string(),
        })?;
    serde_json::to_value(yaml).map_err(|e| ConfigError::MalformedDocument {
        location: location.to_string(),
        detail: e.to_string(),
    })
}

/// Deep-merge: objects merge recursively; arrays and scalars are replaced.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize by sorting object keys recursively and emitting compact
/// JSON.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
