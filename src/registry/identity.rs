//! Stream identities and validated start requests
//!
//! A [`StreamIdentity`] names a stream in the registry and on disk. In
//! single-stream mode it is the fixed name `index`; in multi-stream mode it is
//! the URL-safe, unpadded base64 encoding of the normalized source URL, which is
//! reversible and never contains `/` or `.`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use url::Url;

use super::config::Mode;
use super::error::UrlError;

/// Identity used for the only stream in single-stream mode
pub const SINGLE_STREAM_IDENTITY: &str = "index";

/// Longest identity accepted (leaves room for suffixes within a 255 byte file name)
pub const MAX_IDENTITY_LEN: usize = 200;

/// Registry key and file name stem of a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct StreamIdentity(String);

impl StreamIdentity {
    /// Wrap an existing identity string (e.g. taken from a request path)
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The fixed single-stream identity
    pub fn single() -> Self {
        Self(SINGLE_STREAM_IDENTITY.to_string())
    }

    /// Derive the multi-stream identity of a source URL
    pub fn for_url(url: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(url.as_bytes()))
    }

    /// Recover the source URL from a multi-stream identity
    pub fn decode(&self) -> Option<String> {
        let bytes = URL_SAFE_NO_PAD.decode(self.0.as_bytes()).ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated request to start restreaming a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    source_url: String,
    identity: StreamIdentity,
}

impl StreamRequest {
    /// Validate a raw source URL for the given mode
    ///
    /// Accepts absolute `http`/`https` URLs with a host. Single-stream mode
    /// additionally requires the path to end in `.m3u8` or `.ts` (ASCII case
    /// is ignored; the query string is not considered).
    pub fn parse(raw: &str, mode: Mode) -> Result<Self, UrlError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(UrlError::Empty);
        }

        let url = Url::parse(raw).map_err(|e| UrlError::Unparseable(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::MissingHost);
        }

        let path = url.path().to_ascii_lowercase();
        let source_url = String::from(url);

        let identity = match mode {
            Mode::Single => {
                if !path.ends_with(".m3u8") && !path.ends_with(".ts") {
                    return Err(UrlError::UnsupportedSuffix);
                }
                StreamIdentity::single()
            }
            Mode::Multi => {
                let identity = StreamIdentity::for_url(&source_url);
                if identity.as_str().len() > MAX_IDENTITY_LEN {
                    return Err(UrlError::IdentityTooLong(source_url.len()));
                }
                identity
            }
        };

        Ok(Self {
            source_url,
            identity,
        })
    }

    /// Normalized source URL handed to the transcoder
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }
}
