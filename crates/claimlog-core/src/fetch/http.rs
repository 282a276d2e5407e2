//! JSON-over-HTTP fetcher.
//!
//! URL templates carry an `{identifier}` placeholder. The update request adds
//! `since=<rfc3339>` when a checkpoint exists. HTTP 404 is
//! [`FetchError::NotFound`]; every other failure, including an undecodable
//! body, is [`FetchError::Transient`].

use std::time::Duration;

use serde::de::DeserializeOwned;

use super::{FetchError, RemoteFetcher, Snapshot, UpdateFeed};
use crate::clock::Timestamp;

const USER_AGENT: &str = concat!("claimlog/", env!("CARGO_PKG_VERSION"));

/// Fetcher for the authority's HTTP API.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    snapshot_url: String,
    updates_url: String,
    token: Option<String>,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(
        snapshot_url: impl Into<String>,
        updates_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            snapshot_url: snapshot_url.into(),
            updates_url: updates_url.into(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        identifier: &str,
        url: &str,
        since: Option<Timestamp>,
    ) -> Result<T, FetchError> {
        let mut request = self
            .agent
            .get(url)
            .set("Accept", "application/json")
            .set("User-Agent", USER_AGENT);

        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        if let Some(since) = since {
            request = request.query("since", &since.to_rfc3339());
        }

        tracing::debug!(identifier, url, "fetching from remote");

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(FetchError::not_found(identifier)),
            Err(ureq::Error::Status(code, _)) => {
                return Err(FetchError::transient(identifier, format!("HTTP {code} from {url}")));
            }
            Err(err) => {
                return Err(FetchError::transient(
                    identifier,
                    format!("request to {url} failed: {err}"),
                ));
            }
        };

        response.into_json::<T>().map_err(|err| {
            FetchError::transient(identifier, format!("undecodable response from {url}: {err}"))
        })
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch_snapshot(&self, identifier: &str) -> Result<Snapshot, FetchError> {
        let url = expand_template(&self.snapshot_url, identifier);
        self.get_json(identifier, &url, None)
    }

    fn fetch_updates_since(
        &self,
        identifier: &str,
        since: Option<Timestamp>,
    ) -> Result<UpdateFeed, FetchError> {
        let url = expand_template(&self.updates_url, identifier);
        self.get_json(identifier, &url, since)
    }
}

/// Substitute `{identifier}` in a URL template.
#[must_use]
pub fn expand_template(template: &str, identifier: &str) -> String {
    template.replace("{identifier}", identifier)
}
