//! Resolves manifest byte locations for the assembler.

use std::time::Duration;

use async_trait::async_trait;

use cnv_packager::{AuthRealm, FileRetriever};

/// Fetches `http(s)://` locations over the wire and `file://` locations from
/// local disk. Anything else in a manifest is a data error.
///
/// Locations under a configured auth realm's base URL are fetched with that
/// realm's credentials.
pub struct LocationRetriever {
    http: reqwest::Client,
    realms: Vec<AuthRealm>,
}

impl LocationRetriever {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            realms: Vec::new(),
        })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            realms: Vec::new(),
        }
    }

    pub fn with_realms(mut self, realms: Vec<AuthRealm>) -> Self {
        self.realms = realms;
        self
    }

    fn realm_for(&self, location: &str) -> Option<&AuthRealm> {
        self.realms.iter().find(|realm| {
            realm
                .base_url
                .as_deref()
                .map(|base| location.starts_with(base))
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl FileRetriever for LocationRetriever {
    async fn retrieve(&self, location: &str) -> anyhow::Result<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let mut request = self.http.get(location);
            if let Some(realm) = self.realm_for(location) {
                if let Some(username) = realm.username.as_deref() {
                    request = request.basic_auth(username, realm.password.as_deref());
                }
            }
            let response = request.send().await?;
            if !response.status().is_success() {
                anyhow::bail!(
                    "fetching {location} returned HTTP {}",
                    response.status()
                );
            }
            return Ok(response.bytes().await?.to_vec());
        }

        if let Some(path) = location.strip_prefix("file://") {
            return Ok(tokio::fs::read(path).await?);
        }

        anyhow::bail!("unretrievable file location: {location}")
    }
}
