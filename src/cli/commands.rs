use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::browser::page::{BrowserLauncher, LivePage};
use crate::browser::session::NodeLauncher;
use crate::cli::config::{AppConfig, BatchFile, BatchJob, build_oracle};
use crate::error::PipelineError;
use crate::fingerprint::store::FingerprintStore;
use crate::generate::artifacts::{ArtifactPipeline, TestArtifactRequest};
use crate::generate::locators::{FingerprintRequest, LocatorPipeline};
use crate::generate::steps::StepRunner;
use crate::jobs::executor::ThreadExecutor;
use crate::jobs::journal::JobJournal;
use crate::jobs::pipelines::{submit_artifact, submit_fingerprint};
use crate::jobs::tracker::{JobStatus, JobTracker};
use crate::resolver::resolver::Resolver;

// ============================================================================
// fingerprint subcommand
// ============================================================================

pub fn cmd_fingerprint(
    config: &AppConfig,
    url: &str,
    category: &str,
    use_auth: bool,
    allow_redirects: bool,
) -> Result<(), Box<dyn Error>> {
    let store = FingerprintStore::new(&config.paths.fingerprints_dir);
    let request = FingerprintRequest {
        target_url: url.to_string(),
        output_path: store.path_for(category)?,
        use_auth,
        allow_redirects,
    };

    let doc = locator_pipeline(config)?.generate(&request)?;
    println!(
        "Saved {} elements for '{}' to {}",
        doc.len(),
        category,
        request.output_path.display()
    );
    Ok(())
}

// ============================================================================
// generate-test subcommand
// ============================================================================

pub fn cmd_generate_test(
    config: &AppConfig,
    description: &str,
    file_name: &str,
    fingerprint: Option<&str>,
    requires_login: bool,
) -> Result<(), Box<dyn Error>> {
    let store = Arc::new(FingerprintStore::new(&config.paths.fingerprints_dir));
    let request = TestArtifactRequest {
        description: description.to_string(),
        file_name: file_name.to_string(),
        fingerprint_category: fingerprint.map(str::to_string),
        requires_login,
    };

    let path = artifact_pipeline(config, store)?.generate(&request)?;
    println!("Generated {}", path.display());
    Ok(())
}

// ============================================================================
// resolve subcommand
// ============================================================================

pub fn cmd_resolve(
    config: &AppConfig,
    url: &str,
    category: &str,
    key: &str,
    use_auth: bool,
) -> Result<(), Box<dyn Error>> {
    let store = Arc::new(FingerprintStore::new(&config.paths.fingerprints_dir));
    let resolver = Resolver::new(store).with_primary_timeout(config.primary_timeout());

    let mut page = launch_page(config, use_auth)?;
    let outcome = page
        .navigate(url)
        .map_err(Box::<dyn Error>::from)
        .and_then(|_| {
            resolver
                .resolve(page.as_mut(), category, key)
                .map_err(Box::<dyn Error>::from)
        });
    page.close()?;

    let handle = outcome?;
    println!("{}.{} -> {}", category, key, handle);
    Ok(())
}

// ============================================================================
// run subcommand
// ============================================================================

pub fn cmd_run(
    config: &AppConfig,
    url: &str,
    instruction: &str,
    use_auth: bool,
) -> Result<(), Box<dyn Error>> {
    let mut runner = StepRunner::new(build_oracle(&config.oracle)?);
    if let Some(base) = &config.browser.base_url {
        runner = runner.with_base_url(base.clone());
    }

    let mut page = launch_page(config, use_auth)?;
    let outcome = page
        .navigate(url)
        .map_err(PipelineError::from)
        .and_then(|_| runner.run(page.as_mut(), instruction));
    page.close()?;

    let steps = outcome?;
    for (i, step) in steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!("Executed {} steps", steps.len());
    Ok(())
}

// ============================================================================
// list subcommand
// ============================================================================

pub fn cmd_list(config: &AppConfig) -> Result<(), Box<dyn Error>> {
    let store = FingerprintStore::new(&config.paths.fingerprints_dir);
    let categories = store.categories()?;

    if categories.is_empty() {
        println!("No fingerprints in {}", store.dir().display());
        return Ok(());
    }

    for category in categories {
        match store.load(&category) {
            Ok(doc) => println!(
                "  {:<24} {:>3} elements  {}",
                category,
                doc.len(),
                doc.url.as_deref().unwrap_or("-")
            ),
            Err(e) => println!("  {:<24} unreadable: {}", category, e),
        }
    }
    Ok(())
}

// ============================================================================
// batch subcommand
// ============================================================================

/// Run a batch file through the job tracker. Returns whether every job completed.
pub fn cmd_batch(
    config: &AppConfig,
    jobs_path: &str,
    timeout: Duration,
) -> Result<bool, Box<dyn Error>> {
    let content = std::fs::read_to_string(jobs_path)?;
    let batch: BatchFile = serde_yaml::from_str(&content)?;

    if batch.jobs.is_empty() {
        eprintln!("No jobs in {}", jobs_path);
        return Ok(true);
    }

    let store = Arc::new(FingerprintStore::new(&config.paths.fingerprints_dir));
    let journal = config.paths.job_journal.as_deref().map(JobJournal::open);
    let tracker = JobTracker::new(Arc::new(ThreadExecutor), journal);

    // Pipelines are only built for the job kinds the batch uses, so a
    // fingerprint-only batch needs no artifact settings and vice versa.
    let mut locators: Option<Arc<LocatorPipeline>> = None;
    let mut artifacts: Option<Arc<ArtifactPipeline>> = None;

    let mut ids = Vec::new();
    for job in batch.jobs {
        let id = match job {
            BatchJob::Fingerprint {
                url,
                category,
                use_auth,
                allow_redirects,
            } => {
                let pipeline = shared(&mut locators, || locator_pipeline(config))?;
                let request = FingerprintRequest {
                    target_url: url,
                    output_path: store.path_for(&category)?,
                    use_auth,
                    allow_redirects,
                };
                submit_fingerprint(&tracker, pipeline, request)
            }
            BatchJob::Test {
                description,
                file_name,
                fingerprint,
                requires_login,
            } => {
                let pipeline =
                    shared(&mut artifacts, || artifact_pipeline(config, Arc::clone(&store)))?;
                let request = TestArtifactRequest {
                    description,
                    file_name,
                    fingerprint_category: fingerprint,
                    requires_login,
                };
                submit_artifact(&tracker, pipeline, request)
            }
        };
        ids.push(id);
    }

    info!(jobs = ids.len(), "batch submitted");

    tracker.wait_all(&ids, timeout)?;

    let mut all_complete = true;
    for record in tracker.list() {
        all_complete &= record.status == JobStatus::Complete;
        match &record.error {
            Some(error) => println!("  [{}] {}: {}", record.status, record.label, error),
            None => println!("  [{}] {}", record.status, record.label),
        }
    }
    Ok(all_complete)
}

// ============================================================================
// Helpers
// ============================================================================

/// Launch a browser, restoring the saved session state when `use_auth` is set.
fn launch_page(config: &AppConfig, use_auth: bool) -> Result<Box<dyn LivePage>, Box<dyn Error>> {
    let mut options = config.launch_options();
    if use_auth {
        if !config.paths.auth_state.exists() {
            return Err(PipelineError::MissingAuthState(config.paths.auth_state.clone()).into());
        }
        options.storage_state = Some(config.paths.auth_state.clone());
    }

    let launcher = NodeLauncher::new(&config.browser.driver_script);
    Ok(launcher.launch(&options)?)
}

/// Build a pipeline on first use and share it afterwards.
fn shared<T>(
    slot: &mut Option<Arc<T>>,
    build: impl FnOnce() -> Result<T, Box<dyn Error>>,
) -> Result<Arc<T>, Box<dyn Error>> {
    if let Some(existing) = slot {
        return Ok(Arc::clone(existing));
    }
    let built = Arc::new(build()?);
    *slot = Some(Arc::clone(&built));
    Ok(built)
}

fn locator_pipeline(config: &AppConfig) -> Result<LocatorPipeline, Box<dyn Error>> {
    let oracle = build_oracle(&config.oracle)?;
    let launcher: Arc<dyn BrowserLauncher> =
        Arc::new(NodeLauncher::new(&config.browser.driver_script));
    Ok(LocatorPipeline::new(
        oracle,
        launcher,
        config.launch_options(),
        &config.paths.auth_state,
    ))
}

fn artifact_pipeline(
    config: &AppConfig,
    store: Arc<FingerprintStore>,
) -> Result<ArtifactPipeline, Box<dyn Error>> {
    let oracle = build_oracle(&config.oracle)?;
    Ok(ArtifactPipeline::new(
        oracle,
        store,
        &config.paths.artifacts_dir,
    ))
}
