//! HTTP deposit transport.
//!
//! Posts the assembled package to the target's `default-collection` URL and
//! parses a JSON receipt:
//!
//! ```json
//! { "statement": "https://target/statement/42", "item": "https://target/item/42" }
//! ```
//!
//! `statement` is the asynchronous status-document URL (absent for targets
//! that accept synchronously); `item` locates the deposited item. Transport
//! failures at the HTTP layer come back as an unsuccessful
//! [`TransportResponse`]; connection-level failures surface as errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use cnv_packager::{
    params, DepositReceipt, PackageStream, Transport, TransportParams, TransportResponse,
    TransportSession,
};

/// Headers announced alongside the package body.
const PACKAGING: &str = "packaging";
const ON_BEHALF_OF: &str = "on-behalf-of";
const CONTENT_DISPOSITION: &str = "content-disposition";

pub struct HttpDepositTransport {
    http: reqwest::Client,
}

impl HttpDepositTransport {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpDepositTransport {
    async fn open(&self, transport_params: &TransportParams) -> anyhow::Result<Box<dyn TransportSession>> {
        let collection = transport_params
            .default_collection()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("http transport requires a default-collection parameter")
            })?
            .to_string();
        Ok(Box::new(HttpDepositSession {
            http: Some(self.http.clone()),
            collection,
        }))
    }
}

struct HttpDepositSession {
    /// `None` once closed.
    http: Option<reqwest::Client>,
    collection: String,
}

impl HttpDepositSession {
    fn headers(
        package: &PackageStream,
        transport_params: &TransportParams,
    ) -> anyhow::Result<HeaderMap> {
        let meta = package.metadata();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(&meta.mime_type)?);
        headers.insert(
            HeaderName::from_static(CONTENT_DISPOSITION),
            HeaderValue::from_str(&format!("attachment; filename={}", meta.name))?,
        );
        headers.insert(
            HeaderName::from_static(PACKAGING),
            HeaderValue::from_str(&meta.spec)?,
        );
        for checksum in &meta.checksums {
            // e.g. `digest: sha256=9f86d0…`
            let value = format!("{:?}={}", checksum.algorithm, checksum.hex).to_lowercase();
            headers.append(
                HeaderName::from_static("digest"),
                HeaderValue::from_str(&value)?,
            );
        }
        if let Some(obo) = transport_params.on_behalf_of() {
            headers.insert(
                HeaderName::from_static(ON_BEHALF_OF),
                HeaderValue::from_str(obo)?,
            );
        }
        if let Some(agent) = transport_params.get(params::USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_str(agent)?);
        }
        Ok(headers)
    }
}

#[async_trait]
impl TransportSession for HttpDepositSession {
    async fn send(
        &mut self,
        package: PackageStream,
        transport_params: &TransportParams,
    ) -> anyhow::Result<TransportResponse> {
        let http = self
            .http
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("send on a closed http session"))?;

        let headers = Self::headers(&package, transport_params)?;
        let mut request = http
            .post(&self.collection)
            .headers(headers)
            .body(package.into_bytes());
        if let Some(username) = transport_params.username() {
            request = request.basic_auth(username, transport_params.password());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(TransportResponse::failure(format!(
                "target answered HTTP {status} for {}",
                self.collection
            )));
        }

        let receipt: serde_json::Value = match response.json().await {
            Ok(doc) => doc,
            // An empty or non-JSON body from a 2xx is still a success; the
            // target simply issued no receipt.
            Err(_) => {
                debug!(collection = %self.collection, "deposit accepted without receipt");
                return Ok(TransportResponse::success(None));
            }
        };

        let field = |key: &str| {
            receipt
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(String::from)
        };
        Ok(TransportResponse::success(Some(DepositReceipt {
            status_url: field("statement"),
            item_url: field("item"),
        })))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.http = None;
        Ok(())
    }
}
