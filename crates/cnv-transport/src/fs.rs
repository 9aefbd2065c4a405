//! Filesystem transport: the package lands under `default-directory`.
//!
//! Synchronous custody: a successful write is the target's acceptance, so
//! the receipt carries the item location and no statement URL.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use cnv_packager::{
    DepositReceipt, PackageStream, Transport, TransportParams, TransportResponse,
    TransportSession,
};

pub struct FilesystemTransport;

#[async_trait]
impl Transport for FilesystemTransport {
    async fn open(&self, params: &TransportParams) -> anyhow::Result<Box<dyn TransportSession>> {
        let directory = params
            .default_directory()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("filesystem transport requires a default-directory parameter")
            })?;
        let directory = PathBuf::from(directory);
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Box::new(FilesystemSession {
            directory: Some(directory),
        }))
    }
}

struct FilesystemSession {
    /// `None` once closed; send after close is a programming error.
    directory: Option<PathBuf>,
}

#[async_trait]
impl TransportSession for FilesystemSession {
    async fn send(
        &mut self,
        package: PackageStream,
        _params: &TransportParams,
    ) -> anyhow::Result<TransportResponse> {
        let directory = self
            .directory
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("send on a closed filesystem session"))?;

        let destination = directory.join(&package.metadata().name);
        let bytes = package.into_bytes();
        if let Err(e) = tokio::fs::write(&destination, &bytes).await {
            return Ok(TransportResponse::failure(format!(
                "writing {}: {e}",
                destination.display()
            )));
        }

        debug!(path = %destination.display(), size = bytes.len(), "package written");
        Ok(TransportResponse::success(Some(DepositReceipt {
            status_url: None,
            item_url: Some(format!("file://{}", destination.display())),
        })))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.directory = None;
        Ok(())
    }
}
