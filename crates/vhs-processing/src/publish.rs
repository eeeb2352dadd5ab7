use crate::combine::{CombineOutput, CombineRequest, VideoCombiner};
use crate::error::ProcessingResult;
use serde::Serialize;
use vhs_core::Preview;
use vhs_storage::{successful_urls, CloudStorageHandler, UploadResult};

#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub combine: CombineOutput,
    pub uploads: Vec<UploadResult>,
    pub preview: Preview,
}

impl PublishReport {
    pub fn urls(&self) -> Vec<String> {
        successful_urls(&self.uploads)
    }
}

/// Combine frames into a video and upload the saved outputs under `prefix`.
///
/// Only a failed combine is an error. Upload failures are reported per file in
/// `uploads` and leave the preview without a URL.
pub async fn publish(
    combiner: &VideoCombiner,
    handler: &CloudStorageHandler,
    req: &CombineRequest,
    prefix: Option<&str>,
) -> ProcessingResult<PublishReport> {
    let combine = combiner.combine(req).await?;
    Ok(upload_outputs(handler, combine, prefix).await)
}

/// Upload the files of a finished combine and attach the first public URL to its preview
pub async fn upload_outputs(
    handler: &CloudStorageHandler,
    combine: CombineOutput,
    prefix: Option<&str>,
) -> PublishReport {
    let mut preview = combine.preview.clone();

    let uploads = if combine.save_output && !combine.filenames.is_empty() {
        handler.upload_files(&combine.filenames, prefix).await
    } else {
        tracing::debug!(
            save_output = combine.save_output,
            "Skipping upload of unsaved output"
        );
        Vec::new()
    };

    let urls = successful_urls(&uploads);
    if !urls.is_empty() {
        tracing::info!(urls = ?urls, "Files uploaded to cloud storage");
    }
    if let Some(url) = urls.into_iter().next() {
        preview = preview.with_url(url);
    }

    PublishReport {
        combine,
        uploads,
        preview,
    }
}
