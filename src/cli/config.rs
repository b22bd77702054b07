use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::browser::page::LaunchOptions;
use crate::error::OracleError;
use crate::oracle::backend::{
    DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL,
    GeminiBackend, MockTextInference, OllamaBackend, TextInference,
};

pub const DEFAULT_CONFIG_FILE: &str = "smart-locator.yaml";
/// Overrides the config file location for the test fixtures.
pub const CONFIG_ENV_VAR: &str = "SMART_LOCATOR_CONFIG";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "smart-locator",
    version,
    about = "Self-healing element locators and AI-generated fingerprints"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: smart-locator.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Oracle backend: ollama, gemini or mock
    #[arg(long, global = true)]
    pub oracle: Option<String>,

    /// Oracle API endpoint
    #[arg(long, global = true)]
    pub oracle_endpoint: Option<String>,

    /// Oracle model name
    #[arg(long, global = true)]
    pub oracle_model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture a fingerprint for a page
    Fingerprint {
        /// Page to fingerprint
        #[arg(long)]
        url: String,

        /// Category name; the fingerprint is saved as <category>.json
        #[arg(long)]
        category: String,

        /// Restore the saved session state before navigating
        #[arg(long)]
        use_auth: bool,

        /// Fingerprint the landed page even if navigation was redirected
        #[arg(long)]
        allow_redirects: bool,
    },

    /// Generate a test file from a natural-language description
    GenerateTest {
        /// What the test should do
        #[arg(long)]
        description: String,

        /// Output file name, e.g. test_login.rs
        #[arg(long)]
        file_name: String,

        /// Fingerprint category the test should use
        #[arg(long)]
        fingerprint: Option<String>,

        /// Use the authenticated page fixture
        #[arg(long)]
        requires_login: bool,
    },

    /// Resolve one element on a live page
    Resolve {
        #[arg(long)]
        url: String,

        #[arg(long)]
        category: String,

        #[arg(long)]
        key: String,

        /// Restore the saved session state before navigating
        #[arg(long)]
        use_auth: bool,
    },

    /// Carry out a natural-language instruction on a live page
    Run {
        /// Page to start from
        #[arg(long)]
        url: String,

        /// What to do, e.g. "log in as customer@example.com"
        #[arg(long)]
        instruction: String,

        /// Restore the saved session state before navigating
        #[arg(long)]
        use_auth: bool,
    },

    /// List fingerprint categories
    List,

    /// Run every job in a YAML batch file in the background and report
    Batch {
        /// Path to the batch YAML file
        #[arg(long)]
        jobs: String,

        /// Seconds to wait for all jobs before giving up
        #[arg(long, default_value_t = 600)]
        timeout_secs: u64,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `smart-locator.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_fingerprints_dir")]
    pub fingerprints_dir: PathBuf,

    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    #[serde(default = "default_auth_state")]
    pub auth_state: PathBuf,

    /// JSONL journal of background job transitions; disabled when unset.
    pub job_journal: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            fingerprints_dir: default_fingerprints_dir(),
            artifacts_dir: default_artifacts_dir(),
            auth_state: default_auth_state(),
            job_journal: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_backend")]
    pub backend: String,

    pub endpoint: Option<String>,

    pub model: Option<String>,

    /// Environment variable holding the Gemini API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,

    /// Canned reply for the mock backend.
    pub mock_response: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: None,
            model: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_oracle_timeout(),
            mock_response: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_driver_script")]
    pub driver_script: PathBuf,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_primary_timeout")]
    pub primary_timeout_ms: u64,

    #[serde(default = "default_load_timeout")]
    pub load_timeout_ms: u64,

    /// Site root that relative `navigate` steps are joined onto; the page's
    /// current URL when unset.
    pub base_url: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver_script: default_driver_script(),
            headless: true,
            primary_timeout_ms: default_primary_timeout(),
            load_timeout_ms: default_load_timeout(),
            base_url: None,
        }
    }
}

// Serde default helpers
fn default_fingerprints_dir() -> PathBuf { PathBuf::from("elements") }
fn default_artifacts_dir() -> PathBuf { PathBuf::from("generated_tests") }
fn default_auth_state() -> PathBuf { PathBuf::from("auth_state.json") }
fn default_backend() -> String { "ollama".to_string() }
fn default_api_key_env() -> String { "GEMINI_API_KEY".to_string() }
fn default_oracle_timeout() -> u64 { 120 }
fn default_driver_script() -> PathBuf { PathBuf::from(crate::browser::session::DEFAULT_DRIVER_SCRIPT) }
fn default_true() -> bool { true }
fn default_primary_timeout() -> u64 { 2000 }
fn default_load_timeout() -> u64 { 30_000 }

impl AppConfig {
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            storage_state: None,
            headless: self.browser.headless,
            load_timeout: Duration::from_millis(self.browser.load_timeout_ms),
        }
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.browser.primary_timeout_ms)
    }

    /// Apply global CLI overrides (CLI beats the config file).
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(backend) = &cli.oracle {
            self.oracle.backend = backend.clone();
        }
        if let Some(endpoint) = &cli.oracle_endpoint {
            self.oracle.endpoint = Some(endpoint.clone());
        }
        if let Some(model) = &cli.oracle_model {
            self.oracle.model = Some(model.clone());
        }
    }
}

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if the file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = config_path, error = %e, "malformed config file; using defaults");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

/// Config for code running outside the CLI, such as generated tests.
pub fn load_ambient_config() -> AppConfig {
    let path = std::env::var(CONFIG_ENV_VAR).ok();
    load_config(path.as_deref())
}

// ============================================================================
// Oracle construction
// ============================================================================

/// Build the configured oracle backend.
pub fn build_oracle(config: &OracleConfig) -> Result<Arc<dyn TextInference>, OracleError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.backend.as_str() {
        "gemini" => {
            let endpoint = config.endpoint.as_deref().unwrap_or(DEFAULT_GEMINI_ENDPOINT);
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            Ok(Arc::new(GeminiBackend::from_env(
                endpoint,
                model,
                &config.api_key_env,
                timeout,
            )?))
        }
        "mock" => Ok(Arc::new(MockTextInference::new(
            config.mock_response.as_deref().unwrap_or_default(),
        ))),
        other => {
            if other != "ollama" {
                warn!(backend = other, "unknown oracle backend; using ollama");
            }
            let endpoint = config.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_ENDPOINT);
            let model = config.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL);
            Ok(Arc::new(OllamaBackend::new(endpoint, model, timeout)?))
        }
    }
}

// ============================================================================
// Batch File Model
// ============================================================================

/// `batch` subcommand input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFile {
    pub jobs: Vec<BatchJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchJob {
    Fingerprint {
        url: String,
        category: String,
        #[serde(default)]
        use_auth: bool,
        #[serde(default)]
        allow_redirects: bool,
    },
    Test {
        description: String,
        file_name: String,
        #[serde(default)]
        fingerprint: Option<String>,
        #[serde(default)]
        requires_login: bool,
    },
}
