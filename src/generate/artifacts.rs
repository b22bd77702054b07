use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::fingerprint::store::{FingerprintStore, write_atomic};
use crate::oracle::backend::TextInference;
use crate::oracle::reply::strip_code_fences;

/// One generated test file.
#[derive(Debug, Clone, PartialEq)]
pub struct TestArtifactRequest {
    pub description: String,
    pub file_name: String,
    pub fingerprint_category: Option<String>,
    pub requires_login: bool,
}

/// Description (+ optional fingerprint) → oracle → test source on disk.
pub struct ArtifactPipeline {
    oracle: Arc<dyn TextInference>,
    store: Arc<FingerprintStore>,
    output_dir: PathBuf,
}

impl ArtifactPipeline {
    pub fn new(
        oracle: Arc<dyn TextInference>,
        store: Arc<FingerprintStore>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            oracle,
            store,
            output_dir: output_dir.into(),
        }
    }

    /// Generate and save a test file. Returns the written path.
    pub fn generate(&self, request: &TestArtifactRequest) -> Result<PathBuf, PipelineError> {
        info!(file = %request.file_name, "starting test artifact generation");
        let result = self.run(request);
        match &result {
            Ok(path) => info!(path = %path.display(), "saved test artifact"),
            Err(PipelineError::NotSourceCode { raw }) => error!(
                file = %request.file_name,
                raw = %raw,
                "oracle reply does not look like source code; nothing written"
            ),
            Err(e) => error!(file = %request.file_name, error = %e, "test artifact generation failed"),
        }
        result
    }

    fn run(&self, request: &TestArtifactRequest) -> Result<PathBuf, PipelineError> {
        validate_artifact_name(&request.file_name)?;

        let prompt = self.build_prompt(request);
        let raw = self.oracle.infer_text(&prompt)?;

        let code = strip_code_fences(&raw);
        if !looks_like_source(code) {
            return Err(PipelineError::NotSourceCode { raw });
        }

        let path = self.output_dir.join(&request.file_name);
        write_atomic(&path, &format!("{}\n", code))?;
        Ok(path)
    }

    /// Assemble the oracle prompt for `request`.
    ///
    /// A named fingerprint pins navigation to its URL and lists its element
    /// keys. Without one (or if it fails to load) the prompt lists every known
    /// category so the oracle can pick.
    pub fn build_prompt(&self, request: &TestArtifactRequest) -> String {
        let fixture = if request.requires_login {
            "logged_in_page"
        } else {
            "page"
        };

        let fixture_rule = if request.requires_login {
            format!(
                "4. Obtain the browser with `let mut page = {}()?;`. It is already authenticated, so DO NOT add any login steps.",
                fixture
            )
        } else {
            format!(
                "4. Obtain the browser with `let mut page = {}()?;`. For credentials read `std::env::var(\"TEST_USER\")` and `std::env::var(\"TEST_PASSWORD\")`.",
                fixture
            )
        };

        let mut navigation_rule =
            "5. Navigate with `page.navigate(\"<url>\")?;` before locating anything.".to_string();
        let mut category_name = "<category>".to_string();
        let mut elements_context = None;

        if let Some(category) = &request.fingerprint_category {
            match self.store.load(category) {
                Ok(doc) => {
                    if let Some(url) = &doc.url {
                        navigation_rule = format!(
                            "5. The test MUST begin by navigating to the page's URL: `page.navigate(\"{}\")?;`.",
                            url
                        );
                    }
                    let elements = serde_json::to_string_pretty(&doc.elements)
                        .unwrap_or_else(|_| "{}".to_string());
                    category_name = category.clone();
                    elements_context = Some(format!(
                        "   Available elements for '{}':\n```json\n{}\n```",
                        category, elements
                    ));
                }
                Err(e) => warn!(
                    category = %category,
                    error = %e,
                    "could not load fingerprint; falling back to listing all categories"
                ),
            }
        }

        let elements_context = match elements_context {
            Some(context) => context,
            None => {
                let categories = self.store.categories().unwrap_or_else(|e| {
                    warn!(error = %e, "could not list fingerprint categories");
                    Vec::new()
                });
                let listed = if categories.is_empty() {
                    "none".to_string()
                } else {
                    categories
                        .iter()
                        .map(|c| format!("'{}'", c))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!(
                    "   The available categories are: [{}]. You must infer the correct one.",
                    listed
                )
            }
        };

        format!(
            r##"You are an expert Rust test automation engineer. Write a complete Rust integration test file for the description below.

INSTRUCTIONS:
1. The output must be a single block of raw Rust code. No explanations and no Markdown fences such as ```rust.
2. The file must start with these imports:
   use smart_locator::browser::page::LivePage;
   use smart_locator::testing::{{{fixture}, resolver}};
3. Define a single `#[test]` function whose name starts with `test_`, is descriptive snake_case, and returns `Result<(), Box<dyn std::error::Error>>`.
{fixture_rule}
{navigation_rule}
6. You MUST locate EVERY element with `resolver().resolve(&mut page, "{category}", "<element_key>")?`. Never write ad hoc selectors.
{elements_context}
7. Interact with `page.click(&handle)?` and `page.fill(&handle, "value")?`. Assert with `assert!`/`assert_eq!`, e.g. on `page.current_url()?` or `page.inner_text(&handle)?`.

TEST DESCRIPTION:
"{description}"

GENERATED RUST CODE:"##,
            fixture = fixture,
            fixture_rule = fixture_rule,
            navigation_rule = navigation_rule,
            category = category_name,
            elements_context = elements_context,
            description = request.description,
        )
    }
}

/// Cheap guard against saving prose instead of code: the first non-blank line
/// must be an import-like statement.
pub fn looks_like_source(code: &str) -> bool {
    let Some(first) = code.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return false;
    };
    ["use ", "extern crate ", "#![", "import "]
        .iter()
        .any(|prefix| first.starts_with(prefix))
}

/// Artifact names are plain `test_*.rs` file names.
pub fn validate_artifact_name(file_name: &str) -> Result<(), PipelineError> {
    let ok = file_name.starts_with("test_")
        && file_name.ends_with(".rs")
        && file_name.len() > "test_.rs".len()
        && !file_name.contains('/')
        && !file_name.contains('\\');
    if ok {
        Ok(())
    } else {
        Err(PipelineError::InvalidFileName(file_name.to_string()))
    }
}
