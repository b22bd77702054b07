use std::sync::Arc;

use crate::generate::artifacts::{ArtifactPipeline, TestArtifactRequest};
use crate::generate::locators::{FingerprintRequest, LocatorPipeline};
use crate::jobs::tracker::{JobId, JobTracker};

/// Run a fingerprint capture in the background.
pub fn submit_fingerprint(
    tracker: &JobTracker,
    pipeline: Arc<LocatorPipeline>,
    request: FingerprintRequest,
) -> JobId {
    let label = format!("fingerprint {}", request.target_url);
    tracker.submit(&label, move || pipeline.generate(&request).map(|_| ()))
}

/// Run a test artifact generation in the background.
pub fn submit_artifact(
    tracker: &JobTracker,
    pipeline: Arc<ArtifactPipeline>,
    request: TestArtifactRequest,
) -> JobId {
    let label = format!("test {}", request.file_name);
    tracker.submit(&label, move || pipeline.generate(&request).map(|_| ()))
}
