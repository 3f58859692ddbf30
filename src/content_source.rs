//! Where the content description comes from: a local file or an HTTP(S) URL.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use reqwest::header::CACHE_CONTROL;

use crate::deck::Deck;

pub const DEFAULT_SOURCE: &str = "content.json";

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("content description is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Url(String),
    File(PathBuf),
}

impl Default for ContentSource {
    fn default() -> Self {
        ContentSource::File(PathBuf::from(DEFAULT_SOURCE))
    }
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSource::Url(url) => f.write_str(url),
            ContentSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl ContentSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ContentSource::Url(trimmed.to_string())
        } else {
            ContentSource::File(PathBuf::from(trimmed))
        }
    }

    /// Fetch the raw description text. URLs always bypass caches.
    pub fn fetch(&self) -> Result<String, LoadError> {
        match self {
            ContentSource::File(path) => {
                debug!("Reading content from {}", path.display());
                std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })
            }
            ContentSource::Url(url) => fetch_url(url),
        }
    }

    /// Fetch and parse into a [`Deck`].
    pub fn load(&self) -> Result<Deck, LoadError> {
        let text = self.fetch()?;
        let deck = Deck::from_json(&text)?;
        info!(
            "Loaded deck '{}' with {} entries from {self}",
            deck.title(),
            deck.slides.len()
        );
        Ok(deck)
    }
}

fn fetch_url(url: &str) -> Result<String, LoadError> {
    let http_error = |source| LoadError::Http {
        url: url.to_string(),
        source,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(http_error)?;

    debug!("Fetching content from {url}");
    let response = client
        .get(url)
        .query(&[("ts", cache_buster())])
        .header(CACHE_CONTROL, "no-store")
        .send()
        .map_err(http_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    response.text().map_err(http_error)
}

fn cache_buster() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
