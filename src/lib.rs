//! Semantic element locators for web pages.
//!
//! Fingerprints map human-chosen element keys (`login_button`) to recorded
//! selectors. The [`resolver`] turns a key into a live element and falls back
//! to a text-based search when the recorded selector has gone stale. The
//! [`generate`] pipelines produce fingerprints and test files with an external
//! text oracle, and [`jobs`] runs them in the background.

pub mod browser;
pub mod cli;
pub mod error;
pub mod fingerprint;
pub mod generate;
pub mod jobs;
pub mod oracle;
pub mod resolver;
pub mod simplify;
pub mod testing;
