//! Combine a directory of frame images into a video with ffmpeg.

use crate::error::{ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;
use uuid::Uuid;
use vhs_core::{Preview, PreviewKind};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Upper bound on `loop_count`; each video loop repeats every frame in the concat list.
pub const MAX_LOOP_COUNT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFormat {
    #[serde(rename = "video/h264-mp4")]
    H264Mp4,
    #[serde(rename = "video/h265-mp4")]
    H265Mp4,
    #[serde(rename = "video/webm")]
    Webm,
    #[serde(rename = "image/gif")]
    Gif,
}

impl VideoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::H264Mp4 => "video/h264-mp4",
            VideoFormat::H265Mp4 => "video/h265-mp4",
            VideoFormat::Webm => "video/webm",
            VideoFormat::Gif => "image/gif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::H264Mp4 | VideoFormat::H265Mp4 => "mp4",
            VideoFormat::Webm => "webm",
            VideoFormat::Gif => "gif",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            VideoFormat::H264Mp4 | VideoFormat::H265Mp4 => "video/mp4",
            VideoFormat::Webm => "video/webm",
            VideoFormat::Gif => "image/gif",
        }
    }

    /// Encoder arguments placed between the input and the output path
    fn codec_args(&self, loop_count: u32) -> Vec<String> {
        let args: &[&str] = match self {
            VideoFormat::H264Mp4 => &[
                "-c:v", "libx264", "-pix_fmt", "yuv420p", "-crf", "19", "-movflags", "+faststart",
            ],
            VideoFormat::H265Mp4 => &[
                "-c:v", "libx265", "-pix_fmt", "yuv420p", "-crf", "22", "-tag:v", "hvc1",
                "-movflags", "+faststart",
            ],
            VideoFormat::Webm => &[
                "-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p", "-crf", "20", "-b:v", "0",
            ],
            VideoFormat::Gif => &[
                "-vf",
                "split[a][b];[a]palettegen[p];[b][p]paletteuse",
            ],
        };

        let mut args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if *self == VideoFormat::Gif {
            args.push("-loop".to_string());
            args.push(loop_count.to_string());
        }
        args
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video/h264-mp4" | "h264-mp4" | "h264" | "mp4" => Ok(VideoFormat::H264Mp4),
            "video/h265-mp4" | "h265-mp4" | "h265" | "hevc" => Ok(VideoFormat::H265Mp4),
            "video/webm" | "webm" => Ok(VideoFormat::Webm),
            "image/gif" | "gif" => Ok(VideoFormat::Gif),
            other => Err(ProcessingError::InvalidFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CombineRequest {
    pub frames_dir: PathBuf,
    pub frame_rate: f64,
    /// GIF: loop count written into the file (0 = forever). Video: extra repetitions of the frames.
    pub loop_count: u32,
    /// File name prefix; may contain a sub-folder (`clips/vhs`)
    pub filename_prefix: String,
    pub format: VideoFormat,
    pub output_dir: PathBuf,
    pub pingpong: bool,
    pub save_output: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombineOutput {
    pub save_output: bool,
    pub filenames: Vec<PathBuf>,
    pub preview: Preview,
}

/// Next free output path for `prefix` in `output_dir`: `{prefix}_{counter:05}.{ext}`.
///
/// The counter is one past the largest counter already used by files with this prefix,
/// whatever their extension. Counters past 99999 keep growing in width. Missing
/// directories are created.
pub async fn next_output_path(
    output_dir: &Path,
    prefix: &str,
    ext: &str,
) -> ProcessingResult<PathBuf> {
    let prefix = prefix.trim_matches('/');
    let (subfolder, stem) = match prefix.rsplit_once('/') {
        Some((subfolder, stem)) => (subfolder, stem),
        None => ("", prefix),
    };

    if stem.is_empty() {
        return Err(ProcessingError::InvalidRequest(
            "filename prefix must not be empty".to_string(),
        ));
    }
    if Path::new(subfolder)
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        return Err(ProcessingError::InvalidRequest(format!(
            "filename prefix must stay inside the output directory: {}",
            prefix
        )));
    }

    let folder = output_dir.join(subfolder);
    tokio::fs::create_dir_all(&folder).await?;

    let mut max_counter = 0u32;
    let mut entries = tokio::fs::read_dir(&folder).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(counter) = parse_counter(name, stem) {
            max_counter = max_counter.max(counter);
        }
    }

    Ok(folder.join(format!("{}_{:05}.{}", stem, max_counter + 1, ext)))
}

/// `vhs_00012.mp4` with stem `vhs` -> 12
fn parse_counter(filename: &str, stem: &str) -> Option<u32> {
    let rest = filename.strip_prefix(stem)?.strip_prefix('_')?;
    let digits = rest.split('.').next()?;
    if digits.len() < 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Frame images in `frames_dir`, sorted by file name
pub async fn collect_frames(frames_dir: &Path) -> ProcessingResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(frames_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_frame && tokio::fs::metadata(&path).await?.is_file() {
            frames.push(path);
        }
    }

    if frames.is_empty() {
        return Err(ProcessingError::NoFrames(frames_dir.to_path_buf()));
    }

    frames.sort();
    Ok(frames)
}

/// Frame order for the video: pingpong plays the interior frames back in reverse,
/// and each loop repeats the whole sequence.
fn frame_sequence(frames: Vec<PathBuf>, pingpong: bool, extra_loops: u32) -> Vec<PathBuf> {
    let mut sequence = frames;
    if pingpong && sequence.len() > 2 {
        let back: Vec<PathBuf> = sequence[1..sequence.len() - 1].iter().rev().cloned().collect();
        sequence.extend(back);
    }

    let once = sequence.clone();
    for _ in 0..extra_loops {
        sequence.extend(once.iter().cloned());
    }
    sequence
}

/// ffmpeg concat demuxer script with one entry per frame
fn concat_script(frames: &[PathBuf], frame_rate: f64) -> String {
    let duration = 1.0 / frame_rate;
    let mut script = String::from("ffconcat version 1.0\n");
    for frame in frames {
        let escaped = frame.to_string_lossy().replace('\'', "'\\''");
        script.push_str(&format!("file '{}'\nduration {:.6}\n", escaped, duration));
    }
    // The demuxer ignores the duration of the last entry unless it is repeated
    if let Some(last) = frames.last() {
        let escaped = last.to_string_lossy().replace('\'', "'\\''");
        script.push_str(&format!("file '{}'\n", escaped));
    }
    script
}

pub struct VideoCombiner {
    ffmpeg_path: String,
    temp_dir: PathBuf,
}

impl VideoCombiner {
    pub fn new(ffmpeg_path: String) -> Self {
        VideoCombiner {
            ffmpeg_path,
            temp_dir: std::env::temp_dir().join("vhs"),
        }
    }

    /// Directory for outputs of requests with `save_output = false`
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    #[tracing::instrument(skip(self, req), fields(frames_dir = %req.frames_dir.display(), format = %req.format))]
    pub async fn combine(&self, req: &CombineRequest) -> ProcessingResult<CombineOutput> {
        if !(req.frame_rate.is_finite() && req.frame_rate > 0.0) {
            return Err(ProcessingError::InvalidRequest(format!(
                "frame rate must be positive, got {}",
                req.frame_rate
            )));
        }

        if req.loop_count > MAX_LOOP_COUNT {
            return Err(ProcessingError::InvalidRequest(format!(
                "loop count must be at most {}, got {}",
                MAX_LOOP_COUNT, req.loop_count
            )));
        }

        let frames = collect_frames(&req.frames_dir).await?;
        let frame_count = frames.len();

        let extra_loops = if req.format == VideoFormat::Gif {
            0
        } else {
            req.loop_count
        };
        let sequence = frame_sequence(frames, req.pingpong, extra_loops);

        let (base_dir, kind) = if req.save_output {
            (req.output_dir.as_path(), PreviewKind::Output)
        } else {
            (self.temp_dir.as_path(), PreviewKind::Temp)
        };
        let output_path =
            next_output_path(base_dir, &req.filename_prefix, req.format.extension()).await?;

        let list_path = std::env::temp_dir().join(format!("vhs-concat-{}.txt", Uuid::new_v4()));
        tokio::fs::write(&list_path, concat_script(&sequence, req.frame_rate)).await?;

        let result = self.run_ffmpeg(&list_path, &output_path, req).await;

        if let Err(e) = tokio::fs::remove_file(&list_path).await {
            tracing::debug!(path = %list_path.display(), error = %e, "Failed to remove concat list");
        }
        result?;

        tracing::info!(
            output = %output_path.display(),
            frames = frame_count,
            encoded_frames = sequence.len(),
            frame_rate = req.frame_rate,
            "Video combined"
        );

        let filename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let subfolder = output_path
            .parent()
            .and_then(|p| p.strip_prefix(base_dir).ok())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let preview = Preview::new(filename, subfolder, kind, req.format.as_str())
            .with_frame_rate(req.frame_rate);

        Ok(CombineOutput {
            save_output: req.save_output,
            filenames: vec![output_path],
            preview,
        })
    }

    async fn run_ffmpeg(
        &self,
        list_path: &Path,
        output_path: &Path,
        req: &CombineRequest,
    ) -> ProcessingResult<()> {
        let mut args: Vec<String> = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list_path.to_string_lossy().into_owned(),
            "-r".to_string(),
            req.frame_rate.to_string(),
        ];
        args.extend(req.format.codec_args(req.loop_count));
        args.push(output_path.to_string_lossy().into_owned());

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ProcessingError::FfmpegUnavailable(self.ffmpeg_path.clone())
                }
                _ => ProcessingError::IoError(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProcessingError::FfmpegFailed(stderr.trim().to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    fn request(frames_dir: &Path, output_dir: &Path) -> CombineRequest {
        CombineRequest {
            frames_dir: frames_dir.to_path_buf(),
            frame_rate: 8.0,
            loop_count: 0,
            filename_prefix: "vhs".to_string(),
            format: VideoFormat::H264Mp4,
            output_dir: output_dir.to_path_buf(),
            pingpong: false,
            save_output: true,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("video/h264-mp4".parse::<VideoFormat>().unwrap(), VideoFormat::H264Mp4);
        assert_eq!("video/h265-mp4".parse::<VideoFormat>().unwrap(), VideoFormat::H265Mp4);
        assert_eq!("WEBM".parse::<VideoFormat>().unwrap(), VideoFormat::Webm);
        assert_eq!("image/gif".parse::<VideoFormat>().unwrap(), VideoFormat::Gif);
        assert!(matches!(
            "video/avi".parse::<VideoFormat>(),
            Err(ProcessingError::InvalidFormat(_))
        ));

        assert_eq!(VideoFormat::H265Mp4.extension(), "mp4");
        assert_eq!(VideoFormat::H265Mp4.mime(), "video/mp4");
        assert_eq!(VideoFormat::Gif.to_string(), "image/gif");
    }

    #[test]
    fn test_gif_codec_args_carry_loop_count() {
        let args = VideoFormat::Gif.codec_args(3);
        assert_eq!(&args[args.len() - 2..], ["-loop", "3"]);
        assert!(!VideoFormat::Webm.codec_args(3).contains(&"-loop".to_string()));
    }

    #[tokio::test]
    async fn test_next_output_path_counts_up() {
        let dir = tempdir().unwrap();

        let first = next_output_path(dir.path(), "vhs", "mp4").await.unwrap();
        assert_eq!(first, dir.path().join("vhs_00001.mp4"));

        touch(dir.path(), "vhs_00001.mp4");
        touch(dir.path(), "vhs_00007.gif");
        touch(dir.path(), "vhs_backup.mp4");
        touch(dir.path(), "other_00042.mp4");

        let next = next_output_path(dir.path(), "vhs", "mp4").await.unwrap();
        assert_eq!(next, dir.path().join("vhs_00008.mp4"));
    }

    #[tokio::test]
    async fn test_next_output_path_past_five_digits() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "vhs_99999.mp4");

        let rolled = next_output_path(dir.path(), "vhs", "mp4").await.unwrap();
        assert_eq!(rolled, dir.path().join("vhs_100000.mp4"));

        touch(dir.path(), "vhs_100000.mp4");
        let next = next_output_path(dir.path(), "vhs", "mp4").await.unwrap();
        assert_eq!(next, dir.path().join("vhs_100001.mp4"));
    }

    #[tokio::test]
    async fn test_next_output_path_with_subfolder() {
        let dir = tempdir().unwrap();

        let path = next_output_path(dir.path(), "clips/day1/vhs", "webm").await.unwrap();
        assert_eq!(path, dir.path().join("clips/day1/vhs_00001.webm"));
        assert!(dir.path().join("clips/day1").is_dir());

        assert!(matches!(
            next_output_path(dir.path(), "../escape/vhs", "mp4").await,
            Err(ProcessingError::InvalidRequest(_))
        ));
        assert!(matches!(
            next_output_path(dir.path(), "/", "mp4").await,
            Err(ProcessingError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_collect_frames_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "frame_002.png");
        touch(dir.path(), "frame_001.png");
        touch(dir.path(), "frame_003.JPG");
        touch(dir.path(), "notes.txt");

        let frames = collect_frames(dir.path()).await.unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["frame_001.png", "frame_002.png", "frame_003.JPG"]);
    }

    #[tokio::test]
    async fn test_collect_frames_empty_dir() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "readme.md");
        assert!(matches!(
            collect_frames(dir.path()).await,
            Err(ProcessingError::NoFrames(_))
        ));
    }

    #[test]
    fn test_pingpong_and_loops() {
        let frames: Vec<PathBuf> = ["a", "b", "c", "d"].iter().map(PathBuf::from).collect();

        let pingpong = frame_sequence(frames.clone(), true, 0);
        let names: Vec<_> = pingpong.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(names, ["a", "b", "c", "d", "c", "b"]);

        let looped = frame_sequence(frames[..2].to_vec(), true, 2);
        let names: Vec<_> = looped.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(names, ["a", "b", "a", "b", "a", "b"]);
    }

    #[test]
    fn test_concat_script() {
        let frames = vec![PathBuf::from("/f/a.png"), PathBuf::from("/f/it's.png")];
        let script = concat_script(&frames, 4.0);

        assert!(script.starts_with("ffconcat version 1.0\n"));
        assert!(script.contains("file '/f/a.png'\nduration 0.250000\n"));
        assert!(script.contains("file '/f/it'\\''s.png'"));
        assert!(script.ends_with("file '/f/it'\\''s.png'\n"));
    }

    #[tokio::test]
    async fn combine_without_frames_fails_before_ffmpeg() {
        let frames = tempdir().unwrap();
        let output = tempdir().unwrap();
        let combiner = VideoCombiner::new("/nonexistent/ffmpeg".to_string());

        let result = combiner.combine(&request(frames.path(), output.path())).await;
        assert!(matches!(result, Err(ProcessingError::NoFrames(_))));
    }

    #[tokio::test]
    async fn combine_reports_missing_ffmpeg() {
        let frames = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(frames.path(), "0001.png");
        let combiner = VideoCombiner::new("/nonexistent/ffmpeg".to_string());

        let result = combiner.combine(&request(frames.path(), output.path())).await;
        assert!(matches!(result, Err(ProcessingError::FfmpegUnavailable(_))));
    }

    #[tokio::test]
    async fn combine_rejects_zero_frame_rate() {
        let frames = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(frames.path(), "0001.png");
        let combiner = VideoCombiner::new("ffmpeg".to_string());

        let mut req = request(frames.path(), output.path());
        req.frame_rate = 0.0;
        assert!(matches!(
            combiner.combine(&req).await,
            Err(ProcessingError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn combine_rejects_excessive_loop_count() {
        let frames = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(frames.path(), "0001.png");
        let combiner = VideoCombiner::new("/nonexistent/ffmpeg".to_string());

        let mut req = request(frames.path(), output.path());
        req.loop_count = MAX_LOOP_COUNT + 1;
        assert!(matches!(
            combiner.combine(&req).await,
            Err(ProcessingError::InvalidRequest(_))
        ));

        req.loop_count = MAX_LOOP_COUNT;
        assert!(matches!(
            combiner.combine(&req).await,
            Err(ProcessingError::FfmpegUnavailable(_))
        ));
    }

    /// Stand-in ffmpeg that creates its last argument (the output path)
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, "#!/bin/sh\nfor last; do :; done\ntouch \"$last\"\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn combine_saves_into_output_subfolder() {
        let bin = tempdir().unwrap();
        let frames = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(frames.path(), "0001.png");
        touch(frames.path(), "0002.png");
        let combiner = VideoCombiner::new(fake_ffmpeg(bin.path()));

        let mut req = request(frames.path(), output.path());
        req.filename_prefix = "clips/vhs".to_string();
        let result = combiner.combine(&req).await.unwrap();

        let expected = output.path().join("clips/vhs_00001.mp4");
        assert!(expected.is_file());
        assert!(result.save_output);
        assert_eq!(result.filenames, vec![expected]);
        assert_eq!(result.preview.kind, PreviewKind::Output);
        assert_eq!(result.preview.filename, "vhs_00001.mp4");
        assert_eq!(result.preview.subfolder, "clips");
        assert_eq!(result.preview.format, "video/h264-mp4");
        assert_eq!(result.preview.frame_rate, Some(8.0));

        let again = combiner.combine(&req).await.unwrap();
        assert_eq!(again.preview.filename, "vhs_00002.mp4");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn combine_without_saving_writes_to_temp_dir() {
        let bin = tempdir().unwrap();
        let frames = tempdir().unwrap();
        let output = tempdir().unwrap();
        let temp = tempdir().unwrap();
        touch(frames.path(), "0001.png");
        let combiner = VideoCombiner::new(fake_ffmpeg(bin.path())).with_temp_dir(temp.path());

        let mut req = request(frames.path(), output.path());
        req.save_output = false;
        req.format = VideoFormat::Gif;
        let result = combiner.combine(&req).await.unwrap();

        let expected = temp.path().join("vhs_00001.gif");
        assert!(expected.is_file());
        assert_eq!(result.filenames, vec![expected]);
        assert!(!result.save_output);
        assert_eq!(result.preview.kind, PreviewKind::Temp);
        assert_eq!(result.preview.subfolder, "");
        assert!(std::fs::read_dir(output.path()).unwrap().next().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn combine_reports_ffmpeg_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempdir().unwrap();
        let frames = tempdir().unwrap();
        let output = tempdir().unwrap();
        touch(frames.path(), "0001.png");

        let script = bin.path().join("ffmpeg");
        std::fs::write(&script, "#!/bin/sh\necho 'Unknown encoder' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let combiner = VideoCombiner::new(script.to_string_lossy().into_owned());

        match combiner.combine(&request(frames.path(), output.path())).await {
            Err(ProcessingError::FfmpegFailed(stderr)) => assert_eq!(stderr, "Unknown encoder"),
            other => panic!("expected FfmpegFailed, got {:?}", other),
        }
    }
}
