use serde::Serialize;
use vhs_storage::{successful_urls, UploadResult};

/// Batch upload report printed by the `upload` command
#[derive(Debug, Serialize)]
pub struct UploadSummary<'a> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub urls: Vec<String>,
    pub results: &'a [UploadResult],
}

impl<'a> UploadSummary<'a> {
    pub fn new(results: &'a [UploadResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        UploadSummary {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            urls: successful_urls(results),
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Initialize tracing for CLI binaries.
///
/// Logs go to stderr so stdout stays valid JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
