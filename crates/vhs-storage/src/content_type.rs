use std::path::Path;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Guess the Content-Type of a file from its extension
pub fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        // Videos
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "m4v" => "video/x-m4v",
        "ts" => "video/mp2t",
        "m3u8" => "application/vnd.apple.mpegurl",
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        // Text
        "json" => "application/json",
        "txt" => "text/plain",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(guess_content_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(guess_content_type(Path::new("dir/A.WEBM")), "video/webm");
        assert_eq!(guess_content_type(Path::new("x.gif")), "image/gif");
        assert_eq!(guess_content_type(Path::new("x.json")), "application/json");
    }

    #[test]
    fn unknown_extensions_fall_back() {
        assert_eq!(guess_content_type(Path::new("a.xyz")), DEFAULT_CONTENT_TYPE);
        assert_eq!(guess_content_type(Path::new("noext")), DEFAULT_CONTENT_TYPE);
    }
}
