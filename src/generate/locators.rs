use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use url::Url;

use crate::browser::page::{BrowserLauncher, LaunchOptions, LivePage};
use crate::error::PipelineError;
use crate::fingerprint::model::{ElementDescriptor, FingerprintDocument};
use crate::fingerprint::store::write_document;
use crate::oracle::backend::TextInference;
use crate::oracle::reply::OracleReply;
use crate::simplify::simplifier::simplify;

/// One fingerprint capture.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintRequest {
    pub target_url: String,
    pub output_path: PathBuf,
    pub use_auth: bool,
    pub allow_redirects: bool,
}

/// Browser → digest → oracle → validated fingerprint on disk.
pub struct LocatorPipeline {
    oracle: Arc<dyn TextInference>,
    launcher: Arc<dyn BrowserLauncher>,
    launch_options: LaunchOptions,
    auth_state: PathBuf,
}

impl LocatorPipeline {
    pub fn new(
        oracle: Arc<dyn TextInference>,
        launcher: Arc<dyn BrowserLauncher>,
        launch_options: LaunchOptions,
        auth_state: impl Into<PathBuf>,
    ) -> Self {
        Self {
            oracle,
            launcher,
            launch_options,
            auth_state: auth_state.into(),
        }
    }

    /// Capture a fingerprint for `request.target_url` and persist it.
    ///
    /// Every failure aborts the run before anything is written.
    pub fn generate(&self, request: &FingerprintRequest) -> Result<FingerprintDocument, PipelineError> {
        info!(
            url = %request.target_url,
            path = %request.output_path.display(),
            use_auth = request.use_auth,
            "starting fingerprint generation"
        );

        let result = self.run(request);
        if let Err(e) = &result {
            match e {
                PipelineError::MalformedResponse { reason, raw } => error!(
                    url = %request.target_url,
                    path = %request.output_path.display(),
                    reason = %reason,
                    raw = %raw,
                    "oracle returned an unusable locator reply"
                ),
                other => error!(
                    url = %request.target_url,
                    path = %request.output_path.display(),
                    error = %other,
                    "fingerprint generation failed"
                ),
            }
        }
        result
    }

    fn run(&self, request: &FingerprintRequest) -> Result<FingerprintDocument, PipelineError> {
        let mut options = self.launch_options.clone();
        if request.use_auth {
            if !self.auth_state.exists() {
                return Err(PipelineError::MissingAuthState(self.auth_state.clone()));
            }
            info!(path = %self.auth_state.display(), "using session state");
            options.storage_state = Some(self.auth_state.clone());
        }

        let mut page = self.launcher.launch(&options)?;
        let outcome = self.capture(page.as_mut(), request);
        // Always release the browser; a close failure must not mask the outcome.
        if let Err(e) = page.close() {
            warn!(error = %e, "failed to close browser session");
        }

        let elements = outcome?;
        let doc = FingerprintDocument::new(Some(request.target_url.as_str()), elements);
        write_document(&request.output_path, &doc)?;

        info!(
            path = %request.output_path.display(),
            elements = doc.len(),
            "saved fingerprint"
        );
        Ok(doc)
    }

    fn capture(
        &self,
        page: &mut dyn LivePage,
        request: &FingerprintRequest,
    ) -> Result<BTreeMap<String, ElementDescriptor>, PipelineError> {
        info!(url = %request.target_url, "navigating");
        let landed = page.navigate(&request.target_url)?;

        if !same_page(&request.target_url, &landed) {
            if !request.allow_redirects {
                return Err(PipelineError::Redirected {
                    requested: request.target_url.clone(),
                    landed,
                });
            }
            warn!(
                requested = %request.target_url,
                landed = %landed,
                "navigation was redirected; fingerprinting the landed page"
            );
        }

        let digest = simplify(page);
        if digest.is_empty() {
            return Err(PipelineError::EmptyDigest);
        }

        let prompt = build_locator_prompt(&digest);
        info!("sending locator request to oracle");
        let raw = self.oracle.infer_text(&prompt)?;
        normalize_locator_reply(&raw)
    }
}

/// Turn an untrusted oracle reply into element descriptors.
pub fn normalize_locator_reply(
    raw: &str,
) -> Result<BTreeMap<String, ElementDescriptor>, PipelineError> {
    let reply = OracleReply::parse(raw);
    if matches!(reply, OracleReply::UnwrappedList(_)) {
        warn!("oracle wrapped the locator object in a list; unwrapping");
    }
    reply
        .into_elements()
        .map_err(|reason| PipelineError::MalformedResponse {
            reason,
            raw: raw.to_string(),
        })
}

/// Compare URLs after normalization so `https://a.com` and `https://a.com/`
/// count as the same page. Unparseable URLs fall back to string equality.
pub fn same_page(requested: &str, landed: &str) -> bool {
    match (Url::parse(requested), Url::parse(landed)) {
        (Ok(a), Ok(b)) => a == b,
        _ => requested.trim() == landed.trim(),
    }
}

pub fn build_locator_prompt(digest: &str) -> String {
    format!(
        r##"You are an expert test automation engineer. Analyze the simplified HTML below and return a JSON object containing stable, unique and interactable locators for the key elements on the page.

INSTRUCTIONS:
1. The output must be a single JSON object. Do not wrap it in a list.
2. Each key is a descriptive snake_case name for the element (e.g. `email_field`, `login_button`).
3. Each value is an object with:
   - "primary_selector": the most stable CSS selector; it MUST uniquely identify one element.
   - "tag": the HTML tag name of the element (e.g. "input", "button").
   - "text": the visible text of the element, or "" if it has none.

SELECTOR STRATEGY:
- Priority: prefer [data-testid], then id, then a combination of other unique attributes such as name, type or aria-label.
- Specificity: combine attributes when one is not unique, e.g. input[name='email'][type='email'].
- Interactability: for input, textarea and button, target an element that is not disabled or readonly. When several elements match, choose the interactable one, e.g. input#email:not([readonly]).

EXAMPLE OUTPUT:
{{
  "email_field": {{ "primary_selector": "input#email:not([readonly])", "tag": "input", "text": "" }},
  "login_button": {{ "primary_selector": "button[data-testid='login-submit']", "tag": "button", "text": "Login" }}
}}

SIMPLIFIED HTML:
{digest}

Respond with ONLY valid JSON, no explanation."##,
        digest = digest
    )
}
