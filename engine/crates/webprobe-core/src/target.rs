//! Scan target definition

use serde::{Deserialize, Serialize};
use url::Url;

/// The validated base URL a scan runs against.
///
/// Only `http` and `https` URLs with a host are accepted. A target is
/// immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
    url: Url,
}

impl Target {
    /// Parse a target from user input.
    ///
    /// Input without a scheme is treated as `http://`. A trailing slash on
    /// the path is dropped so that joined paths never contain `//`. Query
    /// and fragment are discarded: a target is scheme, host, port and path.
    pub fn parse(input: &str) -> Result<Self, TargetParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TargetParseError::Empty);
        }

        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("http://{}", input)
        };

        let mut url = Url::parse(&with_scheme).map_err(|e| TargetParseError::InvalidUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(TargetParseError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(TargetParseError::MissingHost);
        }

        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Base URL without trailing slash
    pub fn base(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }

    /// Build a URL for a path derived from this target.
    ///
    /// Paths starting with `/` resolve against the origin; other paths are
    /// appended to the base path.
    pub fn join(&self, path: &str) -> Result<Url, TargetParseError> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.origin(), path)
        } else {
            let base_path = self.url.path().trim_end_matches('/');
            format!("{}{}/{}", self.origin(), base_path, path)
        };
        Url::parse(&joined).map_err(|e| TargetParseError::InvalidUrl(e.to_string()))
    }

    /// The same target with another scheme (used to compare http/https behaviour)
    pub fn with_scheme(&self, scheme: &str) -> Result<Url, TargetParseError> {
        let mut url = self.url.clone();
        url.set_scheme(scheme)
            .map_err(|_| TargetParseError::UnsupportedScheme(scheme.to_string()))?;
        Ok(url)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base())
    }
}

impl std::str::FromStr for Target {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl TryFrom<String> for Target {
    type Error = TargetParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Target::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.base()
    }
}

/// Error parsing a scan target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetParseError {
    Empty,
    InvalidUrl(String),
    UnsupportedScheme(String),
    MissingHost,
}

impl std::fmt::Display for TargetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetParseError::Empty => write!(f, "Empty target"),
            TargetParseError::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
            TargetParseError::UnsupportedScheme(s) => write!(f, "Unsupported scheme: {}", s),
            TargetParseError::MissingHost => write!(f, "URL has no host"),
        }
    }
}

impl std::error::Error for TargetParseError {}

impl From<TargetParseError> for crate::Error {
    fn from(e: TargetParseError) -> Self {
        crate::Error::InvalidTarget(e.to_string())
    }
}
