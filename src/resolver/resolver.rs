use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::browser::page::{ElementHandle, LivePage};
use crate::error::ResolveError;
use crate::fingerprint::model::ElementDescriptor;
use crate::fingerprint::store::FingerprintStore;
use crate::resolver::scoring::select_best;

pub const DEFAULT_PRIMARY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Maps `(category, element key)` to a live element, healing stale selectors.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<FingerprintStore>,
    primary_timeout: Duration,
}

impl Resolver {
    pub fn new(store: Arc<FingerprintStore>) -> Self {
        Self {
            store,
            primary_timeout: DEFAULT_PRIMARY_TIMEOUT,
        }
    }

    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<FingerprintStore> {
        &self.store
    }

    /// Resolve an element on `page`.
    ///
    /// The primary selector is tried first with a short attach wait; a hit
    /// resolves to its first match, the same element the wait observed. When it
    /// does not attach, every element with the fingerprinted tag is scored on
    /// its visible text and the first exact match is returned. Failures are
    /// final; callers own any retry policy.
    pub fn resolve(
        &self,
        page: &mut dyn LivePage,
        category: &str,
        key: &str,
    ) -> Result<ElementHandle, ResolveError> {
        let doc = self.store.load(category)?;
        let descriptor = doc.element(key).ok_or_else(|| {
            error!(category, key, "element key not defined in fingerprint");
            ResolveError::UnknownElement {
                category: category.to_string(),
                key: key.to_string(),
            }
        })?;

        if page.wait_attached(&descriptor.primary_selector, self.primary_timeout)? {
            info!(category, key, "found element using primary selector");
            return Ok(ElementHandle::nth(&descriptor.primary_selector, 0));
        }

        warn!(
            category,
            key,
            selector = %descriptor.primary_selector,
            "primary selector did not attach; attempting self-healing search"
        );

        match heal(page, descriptor)? {
            Some(handle) => {
                info!(category, key, handle = %handle, "self-healed locator");
                Ok(handle)
            }
            None => {
                error!(category, key, "could not find or heal locator");
                Err(ResolveError::Unresolved {
                    category: category.to_string(),
                    key: key.to_string(),
                })
            }
        }
    }
}

/// Fallback search over every element sharing the descriptor's tag.
fn heal(
    page: &mut dyn LivePage,
    descriptor: &ElementDescriptor,
) -> Result<Option<ElementHandle>, ResolveError> {
    let mut candidates = page.query_all(&descriptor.tag)?;

    let mut texts = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        texts.push(page.inner_text(candidate)?);
    }

    Ok(select_best(&texts, &descriptor.text).map(|i| candidates.swap_remove(i)))
}
