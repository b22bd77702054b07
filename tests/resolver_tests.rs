use std::sync::Arc;

use smart_locator::browser::page::ElementHandle;
use smart_locator::error::{ResolveError, StoreError};
use smart_locator::fingerprint::store::{FingerprintStore, write_document};
use smart_locator::resolver::resolver::Resolver;

mod common;
use common::{FakePage, login_document};

fn login_resolver() -> (tempfile::TempDir, Resolver) {
    let dir = tempfile::tempdir().unwrap();
    write_document(&dir.path().join("login.json"), &login_document()).unwrap();
    let store = Arc::new(FingerprintStore::new(dir.path()));
    (dir, Resolver::new(store))
}

// ============================================================================
// Primary selector
// ============================================================================

#[test]
fn attached_primary_selector_skips_healing() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new()
        .with_attached("button[data-testid='login-submit']")
        .with_texts("button", &["Sign in"]);

    let handle = resolver.resolve(&mut page, "login", "login_button").unwrap();

    assert_eq!(handle, ElementHandle::nth("button[data-testid='login-submit']", 0));
    assert_eq!(page.log.query_all_calls(), 0);
}

#[test]
fn primary_hit_pins_the_first_match() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new().with_attached("button[data-testid='login-submit']");

    let handle = resolver.resolve(&mut page, "login", "login_button").unwrap();

    assert_eq!(handle.index, Some(0));
    assert_eq!(handle.to_string(), "button[data-testid='login-submit'] >> nth=0");
}

// ============================================================================
// Self-healing
// ============================================================================

#[test]
fn stale_selector_heals_to_exact_text_match() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new().with_texts("button", &["Cancel", "  Sign in\n", "Help"]);

    let handle = resolver.resolve(&mut page, "login", "login_button").unwrap();

    assert_eq!(handle, ElementHandle::nth("button", 1));
    assert_eq!(handle.to_string(), "button >> nth=1");
    assert_eq!(page.log.query_all_calls(), 1);
}

#[test]
fn first_of_several_matches_wins() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new().with_texts("button", &["Back", "Sign in", "Sign in"]);

    let handle = resolver.resolve(&mut page, "login", "login_button").unwrap();
    assert_eq!(handle, ElementHandle::nth("button", 1));
}

#[test]
fn partial_text_does_not_heal() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new().with_texts("button", &["Sign in with Google", "sign in"]);

    let err = resolver.resolve(&mut page, "login", "login_button").unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Unresolved { ref category, ref key } if category == "login" && key == "login_button"
    ));
}

#[test]
fn no_candidates_is_unresolved() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new();

    let err = resolver.resolve(&mut page, "login", "login_button").unwrap_err();
    assert!(matches!(err, ResolveError::Unresolved { .. }));
}

#[test]
fn empty_expected_text_matches_first_text_less_candidate() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new().with_texts("input", &["", ""]);

    let handle = resolver.resolve(&mut page, "login", "email_field").unwrap();
    assert_eq!(handle, ElementHandle::nth("input", 0));
}

// ============================================================================
// Lookup failures
// ============================================================================

#[test]
fn unknown_key_fails_without_touching_the_page() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new().with_texts("button", &["Sign in"]);

    let err = resolver.resolve(&mut page, "login", "logout_link").unwrap_err();

    assert!(matches!(err, ResolveError::UnknownElement { ref key, .. } if key == "logout_link"));
    assert_eq!(page.log.query_all_calls(), 0);
}

#[test]
fn unknown_category_surfaces_store_error() {
    let (_dir, resolver) = login_resolver();
    let mut page = FakePage::new();

    let err = resolver.resolve(&mut page, "checkout", "pay_button").unwrap_err();
    assert!(matches!(err, ResolveError::Store(StoreError::NotFound { .. })));
}

#[test]
fn clones_share_the_fingerprint_cache() {
    let (_dir, resolver) = login_resolver();
    let other = resolver.clone();
    let mut page = FakePage::new().with_attached("input#email");

    resolver.resolve(&mut page, "login", "email_field").unwrap();
    assert!(other.store().is_cached("login"));
}

#[test]
fn fixture_resolver_is_process_wide() {
    let a = smart_locator::testing::resolver();
    let b = smart_locator::testing::resolver();
    assert!(std::ptr::eq(a, b));
}
