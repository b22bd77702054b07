#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use smart_locator::browser::dom::DomElement;
use smart_locator::browser::page::{BrowserLauncher, ElementHandle, LaunchOptions, LivePage};
use smart_locator::error::{BrowserError, OracleError};
use smart_locator::fingerprint::model::{ElementDescriptor, FingerprintDocument};
use smart_locator::oracle::backend::TextInference;

// ============================================================================
// Scripted page
// ============================================================================

/// Call log shared between a `FakePage` and every clone of it.
#[derive(Debug, Default, Clone)]
pub struct PageLog {
    pub query_all_calls: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub navigations: Arc<Mutex<Vec<String>>>,
    /// `click <handle>` and `fill <handle> = <value>`, in call order.
    pub actions: Arc<Mutex<Vec<String>>>,
}

impl PageLog {
    pub fn query_all_calls(&self) -> usize {
        self.query_all_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

/// In-memory `LivePage` with a fixed DOM.
#[derive(Debug, Default, Clone)]
pub struct FakePage {
    /// Selectors that attach immediately.
    pub attached: HashSet<String>,
    /// Visible text of each element per tag, in document order.
    pub texts: HashMap<String, Vec<String>>,
    /// URL reported after navigation; defaults to the requested URL.
    pub landed_url: Option<String>,
    /// `None` makes `extract` fail.
    pub elements: Option<Vec<DomElement>>,
    pub current: String,
    pub log: PageLog,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            elements: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn with_attached(mut self, selector: &str) -> Self {
        self.attached.insert(selector.to_string());
        self
    }

    pub fn with_texts(mut self, tag: &str, texts: &[&str]) -> Self {
        self.texts
            .insert(tag.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_elements(mut self, elements: Vec<DomElement>) -> Self {
        self.elements = Some(elements);
        self
    }

    pub fn with_broken_extract(mut self) -> Self {
        self.elements = None;
        self
    }

    pub fn landing_on(mut self, url: &str) -> Self {
        self.landed_url = Some(url.to_string());
        self
    }

    fn exists(&self, handle: &ElementHandle) -> bool {
        match handle.index {
            None | Some(0) if self.attached.contains(&handle.selector) => true,
            index => self
                .texts
                .get(&handle.selector)
                .is_some_and(|texts| index.unwrap_or(0) < texts.len()),
        }
    }

    fn act(&mut self, command: &str, handle: &ElementHandle, entry: String) -> Result<(), BrowserError> {
        if !self.exists(handle) {
            return Err(BrowserError::Protocol {
                command: command.into(),
                error: format!("no element {}", handle),
            });
        }
        self.log.actions.lock().unwrap().push(entry);
        Ok(())
    }
}

impl LivePage for FakePage {
    fn navigate(&mut self, url: &str) -> Result<String, BrowserError> {
        self.log.navigations.lock().unwrap().push(url.to_string());
        self.current = self.landed_url.clone().unwrap_or_else(|| url.to_string());
        Ok(self.current.clone())
    }

    fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.current.clone())
    }

    fn wait_attached(&mut self, selector: &str, _timeout: Duration) -> Result<bool, BrowserError> {
        Ok(self.attached.contains(selector))
    }

    fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>, BrowserError> {
        self.log.query_all_calls.fetch_add(1, Ordering::SeqCst);
        let count = self.texts.get(selector).map_or(0, Vec::len);
        Ok((0..count).map(|i| ElementHandle::nth(selector, i)).collect())
    }

    fn inner_text(&mut self, handle: &ElementHandle) -> Result<String, BrowserError> {
        self.texts
            .get(&handle.selector)
            .and_then(|texts| texts.get(handle.index.unwrap_or(0)))
            .cloned()
            .ok_or_else(|| BrowserError::Protocol {
                command: "inner_text".into(),
                error: format!("no element {}", handle),
            })
    }

    fn click(&mut self, handle: &ElementHandle) -> Result<(), BrowserError> {
        self.act("click", handle, format!("click {}", handle))
    }

    fn fill(&mut self, handle: &ElementHandle, value: &str) -> Result<(), BrowserError> {
        self.act("fill", handle, format!("fill {} = {}", handle, value))
    }

    fn extract(&mut self) -> Result<Vec<DomElement>, BrowserError> {
        self.elements.clone().ok_or_else(|| BrowserError::Protocol {
            command: "extract".into(),
            error: "page crashed".into(),
        })
    }

    fn close(&mut self) -> Result<(), BrowserError> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out clones of one template page and records every launch.
pub struct FakeLauncher {
    pub template: FakePage,
    pub launches: Arc<Mutex<Vec<LaunchOptions>>>,
}

impl FakeLauncher {
    pub fn new(template: FakePage) -> Self {
        Self {
            template,
            launches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

impl BrowserLauncher for FakeLauncher {
    fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn LivePage>, BrowserError> {
        self.launches.lock().unwrap().push(options.clone());
        Ok(Box::new(self.template.clone()))
    }
}

// ============================================================================
// Oracle
// ============================================================================

/// Canned oracle that remembers every prompt it was sent.
pub struct RecordingOracle {
    pub response: String,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingOracle {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl TextInference for RecordingOracle {
    fn infer_text(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const LOGIN_URL: &str = "https://app.example.com/login";

pub fn login_document() -> FingerprintDocument {
    let mut elements = BTreeMap::new();
    elements.insert(
        "email_field".to_string(),
        ElementDescriptor::new("input#email", "input", ""),
    );
    elements.insert(
        "login_button".to_string(),
        ElementDescriptor::new("button[data-testid='login-submit']", "button", "Sign in"),
    );
    FingerprintDocument::new(Some(LOGIN_URL), elements)
}

pub const LOGIN_REPLY: &str = r#"{
  "email_field": { "primary_selector": "input#email", "tag": "input", "text": "" },
  "login_button": { "primary_selector": "button[data-testid='login-submit']", "tag": "button", "text": "Sign in" }
}"#;

pub fn login_page_elements() -> Vec<DomElement> {
    vec![
        DomElement::new("h1").with_text("Welcome back"),
        DomElement::new("input")
            .with_id("email")
            .with_attr("type", "email"),
        DomElement::new("button")
            .with_test_id("login-submit")
            .with_text("Sign in"),
    ]
}

pub fn write_fixture(dir: &Path, category: &str, json: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(format!("{}.json", category)), json).unwrap();
}
