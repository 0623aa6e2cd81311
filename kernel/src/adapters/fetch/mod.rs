// Source Document Fetching
//
// Retrieves the raw daily document from an HTTP endpoint or a local
// file. Transport failures and non-success statuses stay distinct.

use std::fmt;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use tracing::{info, warn};

/// Longest response body kept in a status error.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Where the source document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Url(String),
    Path(PathBuf),
}

impl SourceLocator {
    /// `http://` and `https://` locators are URLs, anything else a path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            SourceLocator::Url(raw.to_owned())
        } else {
            SourceLocator::Path(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Url(url) => f.write_str(url),
            SourceLocator::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Raw, unparsed source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument(pub Vec<u8>);

impl RawDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("transport error fetching {source_locator}: {error}")]
    Transport {
        source_locator: String,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_locator} answered with HTTP {status}: {body}")]
    Status {
        source_locator: String,
        status: u16,
        body: String,
    },

    #[error("cannot read {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("{0} cannot be fetched by this fetcher")]
    Unsupported(String),
}

/// Retrieves a source document.
pub trait Fetcher {
    fn fetch(&self, source: &SourceLocator) -> Result<RawDocument, FetchError>;
}

/// Retry and timeout settings for HTTP retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    /// Total attempts, including the first.
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            attempts: 1,
            retry_delay: Duration::from_secs(2),
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    options: HttpOptions,
}

impl HttpFetcher {
    pub fn new(options: HttpOptions) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, options })
    }

    fn get_once(&self, url: &str) -> Result<RawDocument, FetchError> {
        let transport = |error| FetchError::Transport {
            source_locator: url.to_owned(),
            error,
        };

        let response = self.client.get(url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY_LEN);
            return Err(FetchError::Status {
                source_locator: url.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().map_err(transport)?;
        Ok(RawDocument(bytes.to_vec()))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, source: &SourceLocator) -> Result<RawDocument, FetchError> {
        let SourceLocator::Url(url) = source else {
            return Err(FetchError::Unsupported(source.to_string()));
        };

        let attempts = self.options.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.get_once(url) {
                Ok(doc) => {
                    info!(source = %url, bytes = doc.0.len(), "loaded response");
                    return Ok(doc);
                }
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    warn!(source = %url, attempt, error = %e, "fetch failed, retrying");
                    attempt += 1;
                    sleep(self.options.retry_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Transport { .. } => true,
        FetchError::Status { status, .. } => *status >= 500,
        FetchError::Client(_) | FetchError::Io { .. } | FetchError::Unsupported(_) => false,
    }
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Reads a document from the local filesystem.
#[derive(Debug, Default)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, source: &SourceLocator) -> Result<RawDocument, FetchError> {
        let SourceLocator::Path(path) = source else {
            return Err(FetchError::Unsupported(source.to_string()));
        };
        let bytes = std::fs::read(path).map_err(|error| FetchError::Io {
            path: path.clone(),
            error,
        })?;
        info!(source = %path.display(), bytes = bytes.len(), "loaded file");
        Ok(RawDocument(bytes))
    }
}

/// Dispatches on the locator kind.
pub struct SourceFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SourceFetcher {
    pub fn new(options: HttpOptions) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpFetcher::new(options)?,
            file: FileFetcher,
        })
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, source: &SourceLocator) -> Result<RawDocument, FetchError> {
        match source {
            SourceLocator::Url(_) => self.http.fetch(source),
            SourceLocator::Path(_) => self.file.fetch(source),
        }
    }
}
