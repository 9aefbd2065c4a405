//! Fake packager components with recorded calls and scripted outcomes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use cnv_model::{Deposit, DepositSubmission};
use cnv_packager::{
    Archive, Assembler, AssemblerOptions, AssemblerSection, Compression, DepositReceipt,
    DepositStatusOutcome, DepositStatusProcessor, PackageMetadata, PackageStream, Packager,
    TargetConfig, Transport, TransportParams, TransportResponse, TransportSession,
};

// ---------------------------------------------------------------------------
// FakeTransport
// ---------------------------------------------------------------------------

/// One recorded `send`.
#[derive(Debug, Clone)]
pub struct SentPackage {
    pub name: String,
    pub size_bytes: u64,
}

enum SendScript {
    Succeed { receipt: Option<DepositReceipt> },
    FailResponse { cause: String },
    Error { cause: String },
    /// Hold the worker slot for `delay`, then succeed without a receipt.
    Stall { delay: std::time::Duration },
}

struct TransportState {
    script: SendScript,
    sent: Mutex<Vec<SentPackage>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Transport double: records every send, counts opened/closed sessions, and
/// answers according to its script.
///
/// Cheaply cloneable (shares its recorded state) so that `open` can hand a
/// live handle to the session it returns without relying on an impl on
/// `Arc<FakeTransport>`, which the orphan rules disallow for a foreign trait.
#[derive(Clone)]
pub struct FakeTransport {
    state: Arc<TransportState>,
}

impl FakeTransport {
    /// Succeeds with no receipt at all.
    pub fn successful() -> Arc<Self> {
        Arc::new(Self::with_script(SendScript::Succeed { receipt: None }))
    }

    /// Succeeds with a receipt carrying the given statement / item URLs.
    pub fn with_receipt(status_url: Option<&str>, item_url: Option<&str>) -> Arc<Self> {
        Arc::new(Self::with_script(SendScript::Succeed {
            receipt: Some(DepositReceipt {
                status_url: status_url.map(String::from),
                item_url: item_url.map(String::from),
            }),
        }))
    }

    /// Send completes but the target refuses (`success == false`).
    pub fn refusing(cause: &str) -> Arc<Self> {
        Arc::new(Self::with_script(SendScript::FailResponse {
            cause: cause.to_string(),
        }))
    }

    /// Send errors at the wire level.
    pub fn erroring(cause: &str) -> Arc<Self> {
        Arc::new(Self::with_script(SendScript::Error {
            cause: cause.to_string(),
        }))
    }

    /// Each send occupies its worker for `delay` before succeeding.
    pub fn stalling(delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self::with_script(SendScript::Stall { delay }))
    }

    fn with_script(script: SendScript) -> Self {
        Self {
            state: Arc::new(TransportState {
                script,
                sent: Mutex::new(Vec::new()),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }

    pub fn sent(&self) -> Vec<SentPackage> {
        self.state.sent.lock().clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.sent.lock().len()
    }

    pub fn opened_sessions(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed_sessions(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Every opened session was closed — the worker's resource discipline.
    pub fn all_sessions_closed(&self) -> bool {
        self.opened_sessions() == self.closed_sessions()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, _params: &TransportParams) -> anyhow::Result<Box<dyn TransportSession>> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            transport: self.clone(),
        }))
    }
}

struct FakeSession {
    transport: FakeTransport,
}

#[async_trait]
impl TransportSession for FakeSession {
    async fn send(
        &mut self,
        package: PackageStream,
        _params: &TransportParams,
    ) -> anyhow::Result<TransportResponse> {
        self.transport.state.sent.lock().push(SentPackage {
            name: package.metadata().name.clone(),
            size_bytes: package.metadata().size_bytes,
        });
        match &self.transport.state.script {
            SendScript::Succeed { receipt } => Ok(TransportResponse::success(receipt.clone())),
            SendScript::FailResponse { cause } => Ok(TransportResponse::failure(cause.clone())),
            SendScript::Error { cause } => anyhow::bail!("{cause}"),
            SendScript::Stall { delay } => {
                tokio::time::sleep(*delay).await;
                Ok(TransportResponse::success(None))
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.transport.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeAssembler
// ---------------------------------------------------------------------------

/// Produces a tiny deterministic package, or fails when built failing.
pub struct FakeAssembler {
    failing: Option<String>,
    assembled: AtomicUsize,
}

impl FakeAssembler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: None,
            assembled: AtomicUsize::new(0),
        })
    }

    pub fn failing(cause: &str) -> Arc<Self> {
        Arc::new(Self {
            failing: Some(cause.to_string()),
            assembled: AtomicUsize::new(0),
        })
    }

    pub fn assemble_count(&self) -> usize {
        self.assembled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Assembler for FakeAssembler {
    async fn assemble(
        &self,
        submission: &DepositSubmission,
        options: &AssemblerOptions,
    ) -> anyhow::Result<PackageStream> {
        self.assembled.fetch_add(1, Ordering::SeqCst);
        if let Some(cause) = &self.failing {
            anyhow::bail!("{cause}");
        }
        let name = format!(
            "{}.tar",
            submission
                .submission_id
                .rsplit('/')
                .next()
                .unwrap_or("package")
        );
        let bytes = b"fake-package".to_vec();
        Ok(PackageStream::new(
            PackageMetadata {
                name,
                size_bytes: bytes.len() as u64,
                mime_type: "application/x-tar".into(),
                archive: options.archive,
                compression: options.compression,
                checksums: vec![],
                spec: options.spec.clone(),
            },
            bytes,
        ))
    }
}

// ---------------------------------------------------------------------------
// FakeStatusProcessor
// ---------------------------------------------------------------------------

/// Scripted status outcomes, consumed in order; falls back to the default
/// outcome once the script runs dry.
pub struct FakeStatusProcessor {
    script: Mutex<VecDeque<DepositStatusOutcome>>,
    fallback: DepositStatusOutcome,
    calls: AtomicUsize,
}

impl FakeStatusProcessor {
    pub fn always(outcome: DepositStatusOutcome) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: outcome,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn scripted(
        outcomes: &[DepositStatusOutcome],
        fallback: DepositStatusOutcome,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.iter().copied().collect()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DepositStatusProcessor for FakeStatusProcessor {
    async fn process(
        &self,
        _deposit: &Deposit,
        _config: &TargetConfig,
    ) -> anyhow::Result<DepositStatusOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .pop_front()
            .unwrap_or(self.fallback))
    }
}

// ---------------------------------------------------------------------------
// Packager assembly helpers
// ---------------------------------------------------------------------------

/// A minimal target configuration for fakes.
pub fn target_config() -> TargetConfig {
    TargetConfig {
        deposit: Default::default(),
        assembler: AssemblerSection {
            specification: "fake".into(),
            options: AssemblerOptions {
                archive: Archive::Tar,
                compression: Compression::None,
                checksums: vec![],
                spec: "fake-spec".into(),
            },
        },
        transport: Default::default(),
    }
}

/// Wire fakes into a registry-ready [`Packager`].
pub fn packager(
    name: &str,
    transport: Arc<FakeTransport>,
    assembler: Arc<FakeAssembler>,
    status: Arc<FakeStatusProcessor>,
) -> Packager {
    Packager {
        name: name.to_string(),
        assembler,
        transport,
        status_processor: status,
        config: target_config(),
    }
}
