//! Fixtures for generated test artifacts.
//!
//! Generated tests obtain their browser and resolver from here so that they
//! pick up the same config (`smart-locator.yaml`, or the file named by
//! `SMART_LOCATOR_CONFIG`) as the CLI that wrote them.

use std::sync::{Arc, OnceLock};

use crate::browser::session::BrowserSession;
use crate::cli::config::{build_oracle, load_ambient_config};
use crate::error::{BrowserError, PipelineError};
use crate::fingerprint::store::FingerprintStore;
use crate::generate::steps::StepRunner;
use crate::resolver::resolver::Resolver;

/// Fresh anonymous browser session.
pub fn page() -> Result<BrowserSession, BrowserError> {
    let config = load_ambient_config();
    BrowserSession::launch(&config.browser.driver_script, &config.launch_options())
}

/// Browser session restored from the saved session state.
pub fn logged_in_page() -> Result<BrowserSession, PipelineError> {
    let config = load_ambient_config();
    let state = config.paths.auth_state.clone();
    if !state.exists() {
        return Err(PipelineError::MissingAuthState(state));
    }

    let mut options = config.launch_options();
    options.storage_state = Some(state);
    Ok(BrowserSession::launch(&config.browser.driver_script, &options)?)
}

/// Process-wide resolver over the configured fingerprint directory, so every
/// test in a run shares one fingerprint cache.
pub fn resolver() -> &'static Resolver {
    static RESOLVER: OnceLock<Resolver> = OnceLock::new();
    RESOLVER.get_or_init(|| {
        let config = load_ambient_config();
        let store = Arc::new(FingerprintStore::new(&config.paths.fingerprints_dir));
        Resolver::new(store).with_primary_timeout(config.primary_timeout())
    })
}

/// Step runner over the configured oracle and base URL.
pub fn steps() -> Result<StepRunner, PipelineError> {
    let config = load_ambient_config();
    let runner = StepRunner::new(build_oracle(&config.oracle)?);
    Ok(match config.browser.base_url {
        Some(base) => runner.with_base_url(base),
        None => runner,
    })
}
