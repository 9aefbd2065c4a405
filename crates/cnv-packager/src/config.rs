//! Per-target configuration model, mirroring the registry document.
//!
//! The registry document is an associative mapping `target-key → TargetConfig`
//! loaded once at startup. Key names are the document's kebab-case spelling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assembler::AssemblerOptions;
use crate::status::StatusMapping;

/// `deposit-config.processing` — which status processor interprets this
/// target's status documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Processor name resolved at wiring time (e.g. `"mapping"`).
    #[serde(rename = "beanName")]
    pub bean_name: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            bean_name: "mapping".to_string(),
        }
    }
}

/// Prefix-replacement rule for status-document URLs, for when the document
/// must be reached from a different network perspective than the target
/// advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRewrite {
    pub from: String,
    pub to: String,
}

impl PrefixRewrite {
    /// Rewrite `url` when it starts with `from`; otherwise return it as-is.
    pub fn apply(&self, url: &str) -> String {
        match url.strip_prefix(&self.from) {
            Some(rest) => format!("{}{}", self.to, rest),
            None => url.to_string(),
        }
    }
}

/// `deposit-config` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub mapping: StatusMapping,
    #[serde(
        rename = "status-ref-rewrite",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub status_ref_rewrite: Option<PrefixRewrite>,
}

/// `assembler` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerSection {
    /// Which assembler builds this target's packages.
    pub specification: String,
    pub options: AssemblerOptions,
}

/// One entry of `transport-config.auth-realms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRealm {
    pub mech: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// `transport-config` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportSection {
    #[serde(rename = "auth-realms", default)]
    pub auth_realms: Vec<AuthRealm>,
    /// Enumerated connection parameters; see [`crate::transport::params`].
    #[serde(rename = "protocol-binding", default)]
    pub protocol_binding: BTreeMap<String, String>,
}

/// Everything the registry document says about one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(rename = "deposit-config", default)]
    pub deposit: DepositConfig,
    pub assembler: AssemblerSection,
    #[serde(rename = "transport-config", default)]
    pub transport: TransportSection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{Archive, Compression};

    const DOC: &str = r#"
    {
      "deposit-config": {
        "processing": {"beanName": "mapping"},
        "mapping": {"archived": "accepted", "withdrawn": "rejected", "default-mapping": "submitted"},
        "status-ref-rewrite": {"from": "https://internal.target/", "to": "https://target.example/"}
      },
      "assembler": {
        "specification": "simple-archive",
        "options": {"archive": "TAR", "compression": "GZIP", "checksums": ["sha256", "sha512"], "spec": "http://spec.example/simple"}
      },
      "transport-config": {
        "auth-realms": [{"mech": "basic", "username": "depositor", "password": "s3cret", "url": "https://target.example/"}],
        "protocol-binding": {"protocol": "http", "default-collection": "https://target.example/collection"}
      }
    }
    "#;

    #[test]
    fn full_target_config_deserializes() {
        let cfg: TargetConfig = serde_json::from_str(DOC).unwrap();
        assert_eq!(cfg.deposit.processing.bean_name, "mapping");
        assert_eq!(cfg.assembler.options.archive, Archive::Tar);
        assert_eq!(cfg.assembler.options.compression, Compression::Gzip);
        assert_eq!(cfg.transport.auth_realms.len(), 1);
        assert_eq!(
            cfg.transport.protocol_binding.get("protocol").unwrap(),
            "http"
        );
    }

    #[test]
    fn missing_sections_take_defaults() {
        let cfg: TargetConfig = serde_json::from_str(
            r#"{"assembler": {"specification": "simple-archive",
                "options": {"archive": "NONE", "compression": "NONE", "spec": "s"}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.deposit.processing.bean_name, "mapping");
        assert!(cfg.transport.protocol_binding.is_empty());
    }

    #[test]
    fn prefix_rewrite_only_touches_matching_urls() {
        let rw = PrefixRewrite {
            from: "https://internal.target/".into(),
            to: "https://target.example/".into(),
        };
        assert_eq!(
            rw.apply("https://internal.target/statement/1"),
            "https://target.example/statement/1"
        );
        assert_eq!(
            rw.apply("https://elsewhere/statement/1"),
            "https://elsewhere/statement/1"
        );
    }
}
