use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::dom::DomElement;
use crate::error::BrowserError;

/// Reference to a live element: `selector`, or its `index`-th match.
///
/// Mirrors a Playwright `locator(selector).nth(index)`; the driver resolves it
/// again on every use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl ElementHandle {
    pub fn primary(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            index: None,
        }
    }

    pub fn nth(selector: &str, index: usize) -> Self {
        Self {
            selector: selector.to_string(),
            index: Some(index),
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} >> nth={}", self.selector, i),
            None => write!(f, "{}", self.selector),
        }
    }
}

/// Browser capabilities the resolver and pipelines consume.
pub trait LivePage {
    /// Navigate and wait for the load state. Returns the final URL.
    fn navigate(&mut self, url: &str) -> Result<String, BrowserError>;

    fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Wait up to `timeout` for `selector` to be attached to the document.
    fn wait_attached(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError>;

    /// All matches for `selector`, in document order.
    fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, BrowserError>;

    fn inner_text(&mut self, handle: &ElementHandle) -> Result<String, BrowserError>;

    fn click(&mut self, handle: &ElementHandle) -> Result<(), BrowserError>;

    /// Replace the value of an input element.
    fn fill(&mut self, handle: &ElementHandle, value: &str) -> Result<(), BrowserError>;

    /// Attribute and text summary of every element on the page.
    fn extract(&mut self) -> Result<Vec<DomElement>, BrowserError>;

    /// Release the underlying browser. Must be safe to call more than once.
    fn close(&mut self) -> Result<(), BrowserError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    /// Session-state artifact to restore into the new context.
    pub storage_state: Option<PathBuf>,
    pub headless: bool,
    pub load_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            storage_state: None,
            headless: true,
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// Opens isolated browser sessions for the generation pipelines.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn LivePage>, BrowserError>;
}
