//! URL work units handed through the frontier
//!
//! A [`WebUrl`] is the opaque unit of work: the URL string plus the metadata
//! the discovery caller attaches to it. Identity is the URL string alone.

mod domain;

use crate::{UrlError, UrlResult};
use std::hash::{Hash, Hasher};
use url::Url;

pub use domain::extract_domain;

/// A URL scheduled for crawling together with its discovery metadata
#[derive(Debug, Clone)]
pub struct WebUrl {
    /// The URL string; equality and hashing use only this field
    pub url: String,

    /// Link distance from the seed that led here (0 for seeds)
    pub depth: u16,

    /// The page this URL was discovered on
    pub parent_url: Option<String>,

    /// Anchor text of the discovering link
    pub anchor: Option<String>,

    /// Dispatch priority (lower is dispatched first)
    pub priority: u8,
}

impl WebUrl {
    /// Creates a seed URL without validating it
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            parent_url: None,
            anchor: None,
            priority: 0,
        }
    }

    /// Parses and validates a URL string
    ///
    /// Only `http` and `https` URLs with a host are accepted. The string is
    /// kept as given; normalization happens upstream of the frontier.
    ///
    /// # Examples
    ///
    /// ```
    /// use crawl_frontier::url::WebUrl;
    ///
    /// let url = WebUrl::parse("https://example.com/a").unwrap();
    /// assert_eq!(url.url, "https://example.com/a");
    /// assert!(WebUrl::parse("ftp://example.com/").is_err());
    /// ```
    pub fn parse(input: &str) -> UrlResult<Self> {
        let parsed = Url::parse(input).map_err(|e| UrlError::Parse(format!("{}: {}", input, e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::InvalidScheme(other.to_string())),
        }

        if extract_domain(&parsed).is_none() {
            return Err(UrlError::MissingDomain);
        }

        Ok(Self::new(input))
    }

    /// Creates a child URL discovered on this page, one level deeper
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: self.depth.saturating_add(1),
            parent_url: Some(self.url.clone()),
            anchor: None,
            priority: self.priority,
        }
    }

    /// Sets the anchor text
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    /// Sets the dispatch priority
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the lowercase host of this URL, if it parses
    pub fn domain(&self) -> Option<String> {
        Url::parse(&self.url).ok().as_ref().and_then(extract_domain)
    }
}

impl PartialEq for WebUrl {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for WebUrl {}

impl Hash for WebUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl std::fmt::Display for WebUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
