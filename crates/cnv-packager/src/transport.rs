//! Wire transmission contract.
//!
//! A [`Transport`] opens per-task [`TransportSession`]s; sessions are never
//! shared across tasks, and a session must be closed on every exit path —
//! the deposit worker enforces that discipline.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::assembler::PackageStream;

// ---------------------------------------------------------------------------
// Parameter keys
// ---------------------------------------------------------------------------

/// Enumerated transport parameter keys, as they appear in the registry
/// document's `protocol-binding` table.
pub mod params {
    pub const PROTOCOL: &str = "protocol";
    pub const SERVER_FQDN: &str = "server-fqdn";
    pub const SERVER_PORT: &str = "server-port";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const AUTH_MODE: &str = "auth-mode";
    pub const DEFAULT_DIRECTORY: &str = "default-directory";
    pub const TRANSFER_MODE: &str = "transfer-mode";
    pub const USE_PASV: &str = "use-pasv";
    pub const DATA_TYPE: &str = "data-type";
    pub const SERVICE_DOC: &str = "service-doc";
    pub const DEFAULT_COLLECTION: &str = "default-collection";
    pub const ON_BEHALF_OF: &str = "on-behalf-of";
    pub const USER_AGENT: &str = "user-agent";
}

// ---------------------------------------------------------------------------
// TransportParams
// ---------------------------------------------------------------------------

/// Connection parameters for one target, keyed by the enumerated names.
#[derive(Debug, Clone, Default)]
pub struct TransportParams {
    entries: BTreeMap<String, String>,
}

impl TransportParams {
    pub fn from_binding(binding: &BTreeMap<String, String>) -> Self {
        Self {
            entries: binding.clone(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn protocol(&self) -> Option<&str> {
        self.get(params::PROTOCOL)
    }

    pub fn default_directory(&self) -> Option<&str> {
        self.get(params::DEFAULT_DIRECTORY)
    }

    pub fn default_collection(&self) -> Option<&str> {
        self.get(params::DEFAULT_COLLECTION)
    }

    pub fn username(&self) -> Option<&str> {
        self.get(params::USERNAME)
    }

    pub fn password(&self) -> Option<&str> {
        self.get(params::PASSWORD)
    }

    pub fn on_behalf_of(&self) -> Option<&str> {
        self.get(params::ON_BEHALF_OF)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.get(params::USER_AGENT)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// What a successful transmission hands back.
///
/// Synchronous targets acknowledge in-band and leave both URLs empty.
/// Asynchronous targets return a `status_url` whose document eventually
/// reveals the logical outcome, and usually an `item_url` locating the
/// deposited item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositReceipt {
    pub status_url: Option<String>,
    pub item_url: Option<String>,
}

/// Outcome of one `send`.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub success: bool,
    pub cause: Option<String>,
    pub receipt: Option<DepositReceipt>,
}

impl TransportResponse {
    pub fn success(receipt: Option<DepositReceipt>) -> Self {
        Self {
            success: true,
            cause: None,
            receipt,
        }
    }

    pub fn failure(cause: impl Into<String>) -> Self {
        Self {
            success: false,
            cause: Some(cause.into()),
            receipt: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, params: &TransportParams) -> anyhow::Result<Box<dyn TransportSession>>;
}

#[async_trait]
pub trait TransportSession: Send + Sync {
    async fn send(
        &mut self,
        package: PackageStream,
        params: &TransportParams,
    ) -> anyhow::Result<TransportResponse>;

    /// Release the session's resources. Idempotent.
    async fn close(&mut self) -> anyhow::Result<()>;
}
