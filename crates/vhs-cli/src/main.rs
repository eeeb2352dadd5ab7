//! VHS Cloud CLI: upload, download and publish generated videos.
//!
//! Storage is configured from the environment and `.env` files (CLOUD_PROVIDER,
//! credentials, bucket). `--provider` and `--bucket` override it.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use vhs_cli::{init_tracing, UploadSummary};
use vhs_core::{CloudProvider, StorageConfig, StorageOverrides};
use vhs_processing::{
    publish, CombineRequest, FetchConfig, Fetcher, VideoCombiner, VideoFormat,
};
use vhs_storage::{CloudStorageHandler, KeyOptions};

#[derive(Parser)]
#[command(name = "vhs", about = "Publish generated videos to cloud storage")]
struct Cli {
    /// Storage provider: aws, google, azure or local
    #[arg(long, global = true)]
    provider: Option<CloudProvider>,
    /// Bucket (or Azure container) to use instead of the configured one
    #[arg(long, global = true)]
    bucket: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Key prefix (folder) in the bucket
        #[arg(long)]
        prefix: Option<String>,
        /// Index appended to the file name; single file only
        #[arg(long)]
        index: Option<u32>,
        /// Object name to use instead of the file name; single file only
        #[arg(long)]
        target_name: Option<String>,
    },
    /// Download an object to a local path
    Download {
        /// Object key
        key: String,
        /// Destination file
        dest: PathBuf,
    },
    /// Check that an object exists
    Verify {
        /// Object key
        key: String,
    },
    /// Print the public URL of an object
    Url {
        /// Object key
        key: String,
    },
    /// Download a video from a URL, falling back to yt-dlp
    Fetch {
        /// Video or page URL
        url: String,
        /// Directory to save the video in
        #[arg(long, default_value = "input")]
        output_dir: PathBuf,
        /// yt-dlp executable
        #[arg(long, default_value = "yt-dlp")]
        ytdlp: String,
        /// Request timeout in seconds for the direct download
        #[arg(long, default_value = "300")]
        timeout: u64,
    },
    /// Combine frame images into a video
    Combine(CombineArgs),
    /// Combine frame images into a video and upload the result
    Publish {
        #[command(flatten)]
        combine: CombineArgs,
        /// Key prefix (folder) for the uploaded video
        #[arg(long, default_value = "")]
        s3_prefix: String,
    },
}

#[derive(Args)]
struct CombineArgs {
    /// Directory containing the frame images (png, jpg, webp)
    frames_dir: PathBuf,
    #[arg(long, default_value = "8")]
    frame_rate: f64,
    /// Output format: video/h264-mp4, video/h265-mp4, video/webm or image/gif
    #[arg(long, default_value = "video/h264-mp4")]
    format: VideoFormat,
    /// Output file name prefix; may include a sub-folder
    #[arg(long, default_value = "vhs")]
    prefix: String,
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// Play the frames forward then backward
    #[arg(long)]
    pingpong: bool,
    #[arg(long, default_value = "0")]
    loop_count: u32,
    /// Write to the temp directory instead of the output directory
    #[arg(long)]
    no_save: bool,
    /// ffmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,
}

impl CombineArgs {
    fn request(&self) -> CombineRequest {
        CombineRequest {
            frames_dir: self.frames_dir.clone(),
            frame_rate: self.frame_rate,
            loop_count: self.loop_count,
            filename_prefix: self.prefix.clone(),
            format: self.format,
            output_dir: self.output_dir.clone(),
            pingpong: self.pingpong,
            save_output: !self.no_save,
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn storage_handler(overrides: StorageOverrides) -> anyhow::Result<CloudStorageHandler> {
    let config = StorageConfig::from_env(overrides).context(
        "Failed to load storage configuration. Set CLOUD_PROVIDER and the provider credentials",
    )?;
    CloudStorageHandler::from_config(&config)
        .await
        .context("Failed to initialize cloud storage")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let overrides = StorageOverrides {
        provider: cli.provider,
        bucket: cli.bucket,
    };

    match cli.command {
        Commands::Upload {
            files,
            prefix,
            index,
            target_name,
        } => {
            let handler = storage_handler(overrides).await?;

            if files.len() == 1 {
                let opts = KeyOptions {
                    prefix,
                    index,
                    target_name,
                };
                let object = handler.upload_file(&files[0], &opts).await?;
                print_json(&object)?;
            } else {
                if index.is_some() || target_name.is_some() {
                    anyhow::bail!("--index and --target-name apply to a single file");
                }
                let results = handler.upload_files(&files, prefix.as_deref()).await;
                let summary = UploadSummary::new(&results);
                print_json(&summary)?;
                if !summary.all_succeeded() {
                    anyhow::bail!("{} of {} uploads failed", summary.failed, summary.total);
                }
            }
        }
        Commands::Download { key, dest } => {
            let handler = storage_handler(overrides).await?;
            let size_bytes = handler
                .download_file(&key, &dest)
                .await
                .with_context(|| format!("Failed to download {}", key))?;
            print_json(&serde_json::json!({
                "key": key,
                "path": dest,
                "size_bytes": size_bytes,
            }))?;
        }
        Commands::Verify { key } => {
            let handler = storage_handler(overrides).await?;
            let exists = handler.verify_upload(&key).await;
            print_json(&serde_json::json!({ "key": key, "exists": exists }))?;
            if !exists {
                anyhow::bail!("Object {} not found", key);
            }
        }
        Commands::Url { key } => {
            let handler = storage_handler(overrides).await?;
            print_json(&serde_json::json!({ "key": key, "url": handler.public_url(&key) }))?;
        }
        Commands::Fetch {
            url,
            output_dir,
            ytdlp,
            timeout,
        } => {
            let fetcher = Fetcher::new(FetchConfig {
                timeout: Duration::from_secs(timeout),
                ytdlp_path: ytdlp,
                ..Default::default()
            })?;
            let outcome = fetcher
                .fetch(&url, &output_dir)
                .await
                .with_context(|| format!("Failed to fetch {}", url))?;
            print_json(&outcome)?;
        }
        Commands::Combine(args) => {
            let combiner = VideoCombiner::new(args.ffmpeg.clone());
            let output = combiner
                .combine(&args.request())
                .await
                .context("Failed to combine frames")?;
            print_json(&output)?;
        }
        Commands::Publish { combine, s3_prefix } => {
            let handler = storage_handler(overrides).await?;
            let combiner = VideoCombiner::new(combine.ffmpeg.clone());
            let prefix = Some(s3_prefix.as_str()).filter(|p| !p.is_empty());

            let report = publish(&combiner, &handler, &combine.request(), prefix)
                .await
                .context("Failed to combine frames")?;
            print_json(&report)?;
        }
    }

    Ok(())
}
