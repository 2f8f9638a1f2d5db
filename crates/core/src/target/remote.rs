// Remote sync target
//
// Round trip through a local staging file: the current feed is fetched
// with GET at startup, every publish writes the staging file and PUTs it
// back. The HTTP client (and its pooled connection) lives as long as the
// target.

use std::path::Path;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use tempfile::NamedTempFile;

use crate::codec;
use crate::destination::Destination;
use crate::event_log::EventLog;

use super::SyncError;

/// Connect timeout for the remote host
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials from the destination URI's user-info
///
/// The password is handed out as-is once the server asks for
/// authentication. There is no prompting and no second guess.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Password to answer an authentication challenge with
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Publishes the feed with HTTP GET/PUT
#[derive(Debug)]
pub struct RemoteTarget {
    http: reqwest::Client,
    url: String,
    credentials: Credentials,
    /// Set after the first 401; later requests carry credentials up front
    challenged: bool,
    staging: NamedTempFile,
}

impl RemoteTarget {
    /// Create the staging file and the HTTP client
    pub fn new(destination: &Destination) -> Result<Self, SyncError> {
        let staging = tempfile::Builder::new()
            .prefix("httpfeed-")
            .suffix(".json")
            .tempfile()
            .map_err(SyncError::StagingFile)?;

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(SyncError::Client)?;

        Ok(Self {
            http,
            url: destination.resource_url(),
            credentials: Credentials::new(
                destination.username.clone(),
                destination.password.clone(),
            ),
            challenged: false,
            staging,
        })
    }

    pub fn staging(&self) -> &Path {
        self.staging.path()
    }

    pub fn feed_url(&self) -> &str {
        &self.url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Fetch the current feed into the staging file
    ///
    /// A missing resource is an empty baseline. Any other failure leaves
    /// nothing to reconcile against and is fatal.
    pub async fn prime(&mut self) -> Result<(), SyncError> {
        let request = self.http.get(&self.url);
        let response = self
            .send(request)
            .await
            .map_err(|source| self.transport("GET", source))?;

        let body = match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!(url = %self.url, "No feed on server yet");
                Vec::new()
            }
            status if status.is_success() => response
                .bytes()
                .await
                .map_err(|source| self.transport("GET", source))?
                .to_vec(),
            status => {
                return Err(SyncError::UnexpectedStatus {
                    method: "GET",
                    url: self.url.clone(),
                    status,
                })
            }
        };

        tokio::fs::write(self.staging.path(), &body)
            .await
            .map_err(SyncError::StagingFile)?;

        tracing::debug!(url = %self.url, bytes = body.len(), "Fetched baseline feed");
        Ok(())
    }

    /// Write the log to the staging file and PUT it
    pub async fn publish(&mut self, log: &EventLog) -> Result<(), SyncError> {
        let document = codec::encode(log)?;
        codec::write_file(self.staging.path(), &document).await?;

        let request = self
            .http
            .put(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(document);

        let response = self
            .send(request)
            .await
            .map_err(|source| self.transport("PUT", source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::UnexpectedStatus {
                method: "PUT",
                url: self.url.clone(),
                status,
            });
        }

        tracing::debug!(url = %self.url, events = log.len(), %status, "Published feed");
        Ok(())
    }

    /// Delete the staging file and drop the connection
    pub async fn cleanup(self) {
        let path = self.staging.path().display().to_string();
        if let Err(e) = self.staging.close() {
            tracing::error!(path = %path, error = %e, "Unable to remove staging file");
        }
        drop(self.http);
    }

    /// Send a request, answering one 401 with the cached password
    async fn send(&mut self, request: RequestBuilder) -> reqwest::Result<Response> {
        if let (true, Some(password)) = (self.challenged, self.credentials.password()) {
            return request
                .basic_auth(&self.credentials.username, Some(password))
                .send()
                .await;
        }

        let retry = request.try_clone();
        let response = request.send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        self.challenged = true;

        match (retry, self.credentials.password()) {
            (Some(retry), Some(password)) => {
                tracing::debug!(
                    url = %self.url,
                    user = %self.credentials.username,
                    "Server requested authentication"
                );
                retry
                    .basic_auth(&self.credentials.username, Some(password))
                    .send()
                    .await
            }
            _ => Ok(response),
        }
    }

    fn transport(&self, method: &'static str, source: reqwest::Error) -> SyncError {
        SyncError::Transport {
            method,
            url: self.url.clone(),
            source,
        }
    }
}
