// Destination URI
//
// scheme://[user[:password]@]host[:port]/path[?max_events=N]
//
// An http(s) URI naming a host publishes remotely; anything else (an ipp
// recipient URI, or no host at all) publishes to a file in the local cache
// directory named after the path.
//
// User-info is percent-decoded once here. The resource keeps its encoded
// form for URLs; `resource_path()` gives the decoded file name.

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

use crate::event_log::DEFAULT_MAX_EVENTS;
use crate::record::default_port;

/// Destination parsing errors
#[derive(Debug, Error)]
pub enum DestinationError {
    /// Not a URI at all
    #[error("Bad URI {uri}: {source}")]
    Invalid {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    /// A URI without a resource path to publish to
    #[error("Bad URI {0}: no resource path")]
    MissingResource(String),
}

/// Where the feed is published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// File in the local cache directory
    Local,
    /// HTTP resource on another host
    Remote,
}

/// A parsed destination URI
#[derive(Clone, PartialEq, Eq)]
pub struct Destination {
    pub scheme: String,
    /// Empty when the URI names no host
    pub host: String,
    pub port: u16,
    /// Path of the feed resource, percent-encoded, without the query
    pub resource: String,
    pub username: String,
    pub password: Option<String>,
    pub max_events: usize,
}

impl Destination {
    /// Parse a destination URI
    pub fn parse(uri: &str) -> Result<Self, DestinationError> {
        let url = Url::parse(uri).map_err(|source| DestinationError::Invalid {
            uri: uri.to_string(),
            source,
        })?;

        let resource = url.path().to_string();
        if resource.is_empty() || resource == "/" {
            return Err(DestinationError::MissingResource(uri.to_string()));
        }

        let scheme = url.scheme().to_string();
        let port = url
            .port()
            .or_else(|| default_port(&scheme))
            .unwrap_or(80);

        Ok(Self {
            host: url.host_str().unwrap_or_default().to_string(),
            port,
            resource,
            username: decode(url.username()),
            password: url.password().map(decode),
            max_events: max_events(&url),
            scheme,
        })
    }

    /// Local or remote publishing
    pub fn mode(&self) -> PublishMode {
        let http = matches!(self.scheme.as_str(), "http" | "https");
        if http && !self.host.is_empty() {
            PublishMode::Remote
        } else {
            PublishMode::Local
        }
    }

    /// Decoded resource path, as used for the local feed file
    pub fn resource_path(&self) -> String {
        decode(&self.resource)
    }

    /// URL of the feed resource on the remote host
    pub fn resource_url(&self) -> String {
        let scheme = if self.scheme == "https" { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.resource)
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("resource", &self.resource)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("max_events", &self.max_events)
            .finish()
    }
}

fn decode(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

/// `max_events` query parameter; anything but a positive integer means the default
fn max_events(url: &Url) -> usize {
    url.query_pairs()
        .find(|(key, _)| key == "max_events")
        .and_then(|(_, value)| value.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(DEFAULT_MAX_EVENTS)
}
