use std::fmt;

use async_trait::async_trait;
use optout_core_types::SessionId;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AdapterError, AdapterErrorKind};

/// How an `<option>` is matched by [`BrowserSession::select_option`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SelectTarget {
    Value(String),
    Label(String),
    Index(u32),
}

impl SelectTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            SelectTarget::Value(_) => "value",
            SelectTarget::Label(_) => "label",
            SelectTarget::Index(_) => "index",
        }
    }
}

impl fmt::Display for SelectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectTarget::Value(value) => write!(f, "value={value}"),
            SelectTarget::Label(label) => write!(f, "label={label}"),
            SelectTarget::Index(index) => write!(f, "index={index}"),
        }
    }
}

/// Source of fresh, isolated browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, AdapterError>;

    /// Releases the underlying browser. Sessions must be closed first.
    async fn shutdown(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// One page the workflow drives. Calls may block until the page action
/// completes; `close` must be called on every exit path.
#[async_trait]
pub trait BrowserSession: Send {
    fn id(&self) -> &SessionId;
    async fn navigate(&mut self, url: &str) -> Result<(), AdapterError>;
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), AdapterError>;
    async fn click(&mut self, selector: &str) -> Result<(), AdapterError>;
    async fn select_option(
        &mut self,
        selector: &str,
        target: &SelectTarget,
    ) -> Result<(), AdapterError>;
    async fn close(&mut self) -> Result<(), AdapterError>;
}

/// Only absolute http(s), `about:`, `data:` and `file:` URLs are navigable.
pub fn parse_url(raw: &str) -> Result<Url, AdapterError> {
    let parsed = Url::parse(raw.trim()).map_err(|err| {
        AdapterError::new(AdapterErrorKind::InvalidUrl).with_hint(format!("{raw}: {err}"))
    })?;
    match parsed.scheme() {
        "http" | "https" | "about" | "data" | "file" => Ok(parsed),
        other => Err(AdapterError::new(AdapterErrorKind::InvalidUrl)
            .with_hint(format!("unsupported scheme `{other}` in {raw}"))),
    }
}
