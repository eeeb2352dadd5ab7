//! VHS Processing Library
//!
//! Media work around the storage layer: downloading source videos from URLs,
//! combining frame images into videos with ffmpeg, and publishing the results
//! through the cloud storage handler.

pub mod combine;
pub mod error;
pub mod fetch;
pub mod publish;

pub use combine::{
    collect_frames, next_output_path, CombineOutput, CombineRequest, VideoCombiner, VideoFormat,
};
pub use error::{FetchError, FetchResult, ProcessingError, ProcessingResult};
pub use fetch::{validate_url, FetchConfig, FetchMethod, FetchOutcome, Fetcher};
pub use publish::{publish, upload_outputs, PublishReport};
