use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Locators captured for one logical page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintDocument {
    /// Page the document was captured against. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub elements: BTreeMap<String, ElementDescriptor>,
}

/// Per-element record used by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub primary_selector: String,
    /// Tag name; scopes the self-healing search.
    pub tag: String,
    /// Expected visible text at capture time, empty for text-less elements.
    #[serde(default)]
    pub text: String,
}

impl ElementDescriptor {
    pub fn new(primary_selector: &str, tag: &str, text: &str) -> Self {
        Self {
            primary_selector: primary_selector.to_string(),
            tag: tag.to_string(),
            text: text.to_string(),
        }
    }
}

impl FingerprintDocument {
    pub fn new(url: Option<&str>, elements: BTreeMap<String, ElementDescriptor>) -> Self {
        Self {
            url: url.map(str::to_string),
            elements,
        }
    }

    pub fn element(&self, key: &str) -> Option<&ElementDescriptor> {
        self.elements.get(key)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Check the invariants serde cannot express. Returns the first violation.
    pub fn validate(&self) -> Result<(), String> {
        validate_elements(&self.elements)
    }
}

/// Every descriptor needs a non-blank selector and tag.
pub fn validate_elements(elements: &BTreeMap<String, ElementDescriptor>) -> Result<(), String> {
    for (key, descriptor) in elements {
        if key.trim().is_empty() {
            return Err("element key is blank".into());
        }
        if descriptor.primary_selector.trim().is_empty() {
            return Err(format!("element '{}' has a blank primary_selector", key));
        }
        if descriptor.tag.trim().is_empty() {
            return Err(format!("element '{}' has a blank tag", key));
        }
    }
    Ok(())
}
