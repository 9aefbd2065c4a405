//! HTTP implementation of [`RepositoryClient`].
//!
//! Entity identifiers minted by the upstream are absolute URLs; reads and
//! writes address them directly. Collection endpoints (`POST` create,
//! attribute search) hang off the configured base URL. Conditional writes use
//! `If-Match`; the upstream answers `412 Precondition Failed` when the ETag
//! is stale.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_MATCH};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use cnv_model::EntityType;

use crate::client::{IncomingLinks, RepositoryClient, VersionedValue};
use crate::error::RepoError;

/// Connection settings for the upstream entity store.
#[derive(Debug, Clone)]
pub struct HttpRepositoryConfig {
    /// Base URL of the entity API, e.g. `https://upstream.example/data`.
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sent as `User-Agent` on every request. The same string identifies
    /// this process in upstream change notifications, which is what makes
    /// self-loop suppression possible.
    pub user_agent: String,
    pub timeout: Duration,
}

impl HttpRepositoryConfig {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct HttpRepositoryClient {
    http: reqwest::Client,
    config: HttpRepositoryConfig,
}

impl HttpRepositoryClient {
    pub fn new(config: HttpRepositoryConfig) -> Result<Self, RepoError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(RepoError::from)?;
        Ok(Self { http, config })
    }

    /// Resolve an entity identifier to a request URL.
    ///
    /// Upstream-minted identifiers are absolute and used as-is; anything
    /// else is joined under the collection endpoint.
    fn url_for(&self, entity_type: EntityType, id: &str) -> String {
        if id.starts_with("http://") || id.starts_with("https://") {
            id.to_string()
        } else {
            format!(
                "{}/{}/{}",
                self.config.base_url.trim_end_matches('/'),
                entity_type.collection(),
                id
            )
        }
    }

    fn collection_url(&self, entity_type: EntityType) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            entity_type.collection()
        )
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), pass) => req.basic_auth(user, pass.as_deref()),
            _ => req,
        }
    }

    async fn parse_versioned(
        &self,
        id: &str,
        response: reqwest::Response,
    ) -> Result<VersionedValue, RepoError> {
        let etag = etag_of(response.headers(), id)?;
        let value: Value = response.json().await.map_err(|e| RepoError::Malformed {
            id: id.to_string(),
            detail: e.to_string(),
        })?;
        Ok(VersionedValue { etag, value })
    }
}

fn etag_of(headers: &HeaderMap, id: &str) -> Result<String, RepoError> {
    headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or_else(|| RepoError::Malformed {
            id: id.to_string(),
            detail: "response carries no ETag".into(),
        })
}

fn unexpected(status: StatusCode, detail: impl Into<String>) -> RepoError {
    RepoError::Http {
        status: status.as_u16(),
        detail: detail.into(),
    }
}

#[async_trait]
impl RepositoryClient for HttpRepositoryClient {
    async fn read(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> Result<Option<VersionedValue>, RepoError> {
        // Upstream identifiers embed their collection. An id of a different
        // entity kind is "no such entity" for this read, which lets callers
        // probe incoming links without knowing what each referrer is.
        if id.starts_with("http") && !id.contains(&format!("/{}/", entity_type.collection())) {
            return Ok(None);
        }
        let url = self.url_for(entity_type, id);
        let response = self.authed(self.http.get(&url)).send().await?;
        match response.status() {
            StatusCode::OK => self.parse_versioned(id, response).await.map(Some),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(unexpected(status, format!("GET {url}"))),
        }
    }

    async fn create(
        &self,
        entity_type: EntityType,
        body: Value,
    ) -> Result<VersionedValue, RepoError> {
        let url = self.collection_url(entity_type);
        let response = self.authed(self.http.post(&url)).json(&body).send().await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let created = self.parse_versioned("(new)", response).await?;
                debug!(
                    entity_type = %entity_type,
                    id = created.value.get("id").and_then(serde_json::Value::as_str).unwrap_or(""),
                    "created entity"
                );
                Ok(created)
            }
            status => Err(unexpected(status, format!("POST {url}"))),
        }
    }

    async fn update_and_read(
        &self,
        entity_type: EntityType,
        id: &str,
        etag: &str,
        body: Value,
    ) -> Result<VersionedValue, RepoError> {
        let url = self.url_for(entity_type, id);
        let if_match = HeaderValue::from_str(etag).map_err(|_| RepoError::Malformed {
            id: id.to_string(),
            detail: format!("unusable ETag {etag:?}"),
        })?;
        let response = self
            .authed(self.http.put(&url))
            .header(IF_MATCH, if_match)
            .json(&body)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => self.parse_versioned(id, response).await,
            StatusCode::PRECONDITION_FAILED => Err(RepoError::Conflict { id: id.to_string() }),
            StatusCode::NOT_FOUND => Err(RepoError::NotFound { id: id.to_string() }),
            status => Err(unexpected(status, format!("PUT {url}"))),
        }
    }

    async fn incoming(&self, id: &str) -> Result<IncomingLinks, RepoError> {
        let url = format!("{}/incoming", id.trim_end_matches('/'));
        let response = self.authed(self.http.get(&url)).send().await?;
        match response.status() {
            StatusCode::OK => {
                let links: BTreeMap<String, Vec<String>> =
                    response.json().await.map_err(|e| RepoError::Malformed {
                        id: id.to_string(),
                        detail: e.to_string(),
                    })?;
                Ok(links
                    .into_iter()
                    .map(|(relation, ids)| (relation, ids.into_iter().collect()))
                    .collect())
            }
            StatusCode::NOT_FOUND => Ok(IncomingLinks::new()),
            status => Err(unexpected(status, format!("GET {url}"))),
        }
    }

    async fn find_by_attribute(
        &self,
        entity_type: EntityType,
        attr: &str,
        value: &Value,
    ) -> Result<Vec<String>, RepoError> {
        let url = self.collection_url(entity_type);
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let response = self
            .authed(self.http.get(&url))
            .query(&[(attr, rendered.as_str())])
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| RepoError::Malformed {
                id: url,
                detail: e.to_string(),
            }),
            status => Err(unexpected(status, format!("GET {url}?{attr}="))),
        }
    }

    async fn ping(&self) -> Result<(), RepoError> {
        let url = self.config.base_url.clone();
        let response = self.authed(self.http.get(&url)).send().await?;
        if response.status().is_success() || response.status().is_redirection() {
            Ok(())
        } else {
            Err(unexpected(response.status(), format!("GET {url}")))
        }
    }
}
