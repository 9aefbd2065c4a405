//! The packager registry: target repository → packager.
//!
//! Built once at startup from the registry document; read-only afterwards
//! and shared behind an `Arc`. A lookup miss is a *configuration* error for
//! the affected deposit — the caller marks it FAILED and does not retry.

use std::collections::HashMap;
use std::sync::Arc;

use cnv_model::Repository;

use crate::assembler::Assembler;
use crate::config::TargetConfig;
use crate::status::DepositStatusProcessor;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Packager
// ---------------------------------------------------------------------------

/// Everything needed to deposit into one configured target.
pub struct Packager {
    /// Registry key this packager was registered under.
    pub name: String,
    pub assembler: Arc<dyn Assembler>,
    pub transport: Arc<dyn Transport>,
    pub status_processor: Arc<dyn DepositStatusProcessor>,
    pub config: TargetConfig,
}

impl std::fmt::Debug for Packager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packager")
            .field("name", &self.name)
            .field("assembler", &"<dyn Assembler>")
            .field("transport", &"<dyn Transport>")
            .field("status_processor", &"<dyn DepositStatusProcessor>")
            .field("config", &self.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PackagerRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PackagerRegistry {
    entries: HashMap<String, Arc<Packager>>,
}

impl PackagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, packager: Packager) {
        self.entries
            .insert(packager.name.clone(), Arc::new(packager));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve the packager for a target repository.
    ///
    /// Four key forms are recognized, in order:
    /// 1. the repository's short key;
    /// 2. its full identifier;
    /// 3. the trailing path segment of the identifier;
    /// 4. every suffix of the identifier's path, longest first.
    pub fn lookup(&self, repository: &Repository) -> Option<Arc<Packager>> {
        if let Some(key) = repository.repository_key.as_deref() {
            if let Some(hit) = self.entries.get(key) {
                return Some(Arc::clone(hit));
            }
        }

        if let Some(hit) = self.entries.get(&repository.id) {
            return Some(Arc::clone(hit));
        }

        let path = strip_scheme_and_host(&repository.id);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if let Some(last) = segments.last() {
            if let Some(hit) = self.entries.get(*last) {
                return Some(Arc::clone(hit));
            }
        }

        for start in 0..segments.len() {
            let suffix = segments[start..].join("/");
            if let Some(hit) = self.entries.get(&suffix) {
                return Some(Arc::clone(hit));
            }
        }

        None
    }
}

/// `https://host/a/b` → `a/b`; non-URL identifiers pass through unchanged.
fn strip_scheme_and_host(id: &str) -> &str {
    let after_scheme = id
        .strip_prefix("https://")
        .or_else(|| id.strip_prefix("http://"));
    match after_scheme {
        Some(rest) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
        None => id,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{
        Archive, AssemblerOptions, Compression, PackageStream,
    };
    use crate::status::DepositStatusOutcome;
    use crate::transport::{TransportParams, TransportSession};
    use async_trait::async_trait;
    use cnv_model::DepositSubmission;

    struct NullAssembler;

    #[async_trait]
    impl Assembler for NullAssembler {
        async fn assemble(
            &self,
            _submission: &DepositSubmission,
            _options: &AssemblerOptions,
        ) -> anyhow::Result<PackageStream> {
            anyhow::bail!("not used in registry tests")
        }
    }

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn open(
            &self,
            _params: &TransportParams,
        ) -> anyhow::Result<Box<dyn TransportSession>> {
            anyhow::bail!("not used in registry tests")
        }
    }

    struct NullStatus;

    #[async_trait]
    impl DepositStatusProcessor for NullStatus {
        async fn process(
            &self,
            _deposit: &cnv_model::Deposit,
            _config: &TargetConfig,
        ) -> anyhow::Result<DepositStatusOutcome> {
            Ok(DepositStatusOutcome::Submitted)
        }
    }

    fn packager(name: &str) -> Packager {
        Packager {
            name: name.to_string(),
            assembler: Arc::new(NullAssembler),
            transport: Arc::new(NullTransport),
            status_processor: Arc::new(NullStatus),
            config: TargetConfig {
                deposit: Default::default(),
                assembler: crate::config::AssemblerSection {
                    specification: "simple-archive".into(),
                    options: AssemblerOptions {
                        archive: Archive::None,
                        compression: Compression::None,
                        checksums: vec![],
                        spec: "s".into(),
                    },
                },
                transport: Default::default(),
            },
        }
    }

    fn repository(id: &str, key: Option<&str>) -> Repository {
        Repository {
            id: id.to_string(),
            name: "target".into(),
            repository_key: key.map(String::from),
            url: None,
        }
    }

    #[test]
    fn lookup_by_short_key_wins() {
        let mut reg = PackagerRegistry::new();
        reg.register(packager("pmc"));
        let repo = repository("https://upstream/repositories/xyz", Some("pmc"));
        assert!(reg.lookup(&repo).is_some());
    }

    #[test]
    fn lookup_by_full_identifier() {
        let mut reg = PackagerRegistry::new();
        reg.register(packager("https://upstream/repositories/xyz"));
        let repo = repository("https://upstream/repositories/xyz", None);
        assert_eq!(reg.lookup(&repo).unwrap().name, "https://upstream/repositories/xyz");
    }

    #[test]
    fn lookup_by_trailing_segment() {
        let mut reg = PackagerRegistry::new();
        reg.register(packager("xyz"));
        let repo = repository("https://upstream/repositories/xyz", None);
        assert!(reg.lookup(&repo).is_some());
    }

    #[test]
    fn lookup_by_recursive_suffix() {
        let mut reg = PackagerRegistry::new();
        reg.register(packager("repositories/xyz"));
        let repo = repository("https://upstream/data/repositories/xyz", None);
        assert!(reg.lookup(&repo).is_some());
    }

    #[test]
    fn miss_returns_none() {
        let mut reg = PackagerRegistry::new();
        reg.register(packager("pmc"));
        let repo = repository("https://upstream/repositories/unknown", None);
        assert!(reg.lookup(&repo).is_none());
    }

    #[test]
    fn short_key_takes_precedence_over_identifier() {
        let mut reg = PackagerRegistry::new();
        reg.register(packager("pmc"));
        reg.register(packager("https://upstream/repositories/xyz"));
        let repo = repository("https://upstream/repositories/xyz", Some("pmc"));
        assert_eq!(reg.lookup(&repo).unwrap().name, "pmc");
    }
}
