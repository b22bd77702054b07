use std::path::Path;
use std::sync::Arc;

use smart_locator::error::PipelineError;
use smart_locator::fingerprint::store::{FingerprintStore, write_document};
use smart_locator::generate::artifacts::{
    ArtifactPipeline, TestArtifactRequest, looks_like_source, validate_artifact_name,
};

mod common;
use common::{LOGIN_URL, RecordingOracle, login_document};

const GENERATED: &str = "use smart_locator::browser::page::LivePage;
use smart_locator::testing::{page, resolver};

#[test]
fn test_login_succeeds() -> Result<(), Box<dyn std::error::Error>> {
    let mut page = page()?;
    page.navigate(\"https://app.example.com/login\")?;
    let button = resolver().resolve(&mut page, \"login\", \"login_button\")?;
    page.click(&button)?;
    Ok(())
}";

fn request(file_name: &str, category: Option<&str>, requires_login: bool) -> TestArtifactRequest {
    TestArtifactRequest {
        description: "log in with valid credentials".to_string(),
        file_name: file_name.to_string(),
        fingerprint_category: category.map(str::to_string),
        requires_login,
    }
}

fn pipeline_over(fingerprints: &Path, out: &Path, reply: &str) -> (Arc<RecordingOracle>, ArtifactPipeline) {
    let oracle = Arc::new(RecordingOracle::new(reply));
    let store = Arc::new(FingerprintStore::new(fingerprints));
    let pipeline = ArtifactPipeline::new(oracle.clone(), store, out);
    (oracle, pipeline)
}

// ============================================================================
// Writing artifacts
// ============================================================================

#[test]
fn fenced_code_is_stripped_and_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated_tests");
    let reply = format!("```rust\n{}\n```", GENERATED);
    let (_oracle, pipeline) = pipeline_over(dir.path(), &out, &reply);

    let path = pipeline
        .generate(&request("test_login.rs", None, false))
        .unwrap();

    assert_eq!(path, out.join("test_login.rs"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", GENERATED));
}

#[test]
fn prose_reply_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated_tests");
    let (_oracle, pipeline) =
        pipeline_over(dir.path(), &out, "Sure! Here is a test that logs in:\n\nuse foo;");

    let err = pipeline
        .generate(&request("test_login.rs", None, false))
        .unwrap_err();

    assert!(matches!(err, PipelineError::NotSourceCode { .. }));
    assert!(!out.join("test_login.rs").exists());
}

#[test]
fn bad_file_name_never_reaches_the_oracle() {
    let dir = tempfile::tempdir().unwrap();
    let (oracle, pipeline) = pipeline_over(dir.path(), dir.path(), GENERATED);

    let err = pipeline
        .generate(&request("../test_escape.rs", None, false))
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidFileName(_)));
    assert!(oracle.last_prompt().is_none());
}

#[test]
fn artifact_names() {
    assert!(validate_artifact_name("test_login.rs").is_ok());
    for bad in ["login.rs", "test_.rs", "test_login.py", "sub/test_login.rs", "test\\x.rs", ""] {
        assert!(validate_artifact_name(bad).is_err(), "{bad:?} should be rejected");
    }
}

#[test]
fn source_detection() {
    assert!(looks_like_source("\n\nuse std::io;\nfn main() {}"));
    assert!(looks_like_source("#![allow(unused)]\nuse x;"));
    assert!(!looks_like_source("Here is your test:\nuse x;"));
    assert!(!looks_like_source("   \n"));
}

// ============================================================================
// Prompt assembly
// ============================================================================

#[test]
fn prompt_pins_fingerprint_url_and_elements() {
    let dir = tempfile::tempdir().unwrap();
    write_document(&dir.path().join("login.json"), &login_document()).unwrap();
    let (_oracle, pipeline) = pipeline_over(dir.path(), dir.path(), GENERATED);

    let prompt = pipeline.build_prompt(&request("test_login.rs", Some("login"), false));

    assert!(prompt.contains(&format!("page.navigate(\"{}\")", LOGIN_URL)));
    assert!(prompt.contains("Available elements for 'login'"));
    assert!(prompt.contains("\"login_button\""));
    assert!(prompt.contains("resolver().resolve(&mut page, \"login\", \"<element_key>\")"));
    assert!(prompt.contains("use smart_locator::testing::{page, resolver};"));
    assert!(prompt.contains("log in with valid credentials"));
}

#[test]
fn prompt_uses_authenticated_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let (_oracle, pipeline) = pipeline_over(dir.path(), dir.path(), GENERATED);

    let prompt = pipeline.build_prompt(&request("test_dashboard.rs", None, true));

    assert!(prompt.contains("use smart_locator::testing::{logged_in_page, resolver};"));
    assert!(prompt.contains("let mut page = logged_in_page()?;"));
    assert!(prompt.contains("DO NOT add any login steps"));
}

#[test]
fn unknown_category_falls_back_to_listing() {
    let dir = tempfile::tempdir().unwrap();
    write_document(&dir.path().join("login.json"), &login_document()).unwrap();
    write_document(&dir.path().join("checkout.json"), &login_document()).unwrap();
    let (_oracle, pipeline) = pipeline_over(dir.path(), dir.path(), GENERATED);

    let prompt = pipeline.build_prompt(&request("test_cart.rs", Some("cart"), false));

    assert!(prompt.contains("The available categories are: ['checkout', 'login']"));
    assert!(!prompt.contains("Available elements for"));
}

#[test]
fn empty_store_lists_no_categories() {
    let dir = tempfile::tempdir().unwrap();
    let (_oracle, pipeline) = pipeline_over(&dir.path().join("elements"), dir.path(), GENERATED);

    let prompt = pipeline.build_prompt(&request("test_home.rs", None, false));
    assert!(prompt.contains("The available categories are: [none]"));
}

#[test]
fn generate_sends_the_built_prompt() {
    let dir = tempfile::tempdir().unwrap();
    write_document(&dir.path().join("login.json"), &login_document()).unwrap();
    let (oracle, pipeline) = pipeline_over(dir.path(), &dir.path().join("out"), GENERATED);
    let req = request("test_login.rs", Some("login"), false);

    pipeline.generate(&req).unwrap();

    assert_eq!(oracle.last_prompt().unwrap(), pipeline.build_prompt(&req));
}
