//! Preview records for generated and uploaded videos
//!
//! A `Preview` is what a UI needs to display an output: where the file lives relative to
//! its output directory, what kind of output it is, its container format, and the public
//! URL once the file has been uploaded.

use serde::{Deserialize, Serialize};

/// Where a previewed file lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Output,
    Temp,
    Input,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub kind: PreviewKind,
    pub format: String,
    #[serde(default)]
    pub frame_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Preview {
    pub fn new(
        filename: impl Into<String>,
        subfolder: impl Into<String>,
        kind: PreviewKind,
        format: impl Into<String>,
    ) -> Self {
        Preview {
            filename: filename.into(),
            subfolder: subfolder.into(),
            kind,
            format: format.into(),
            frame_rate: None,
            url: None,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Attach the public URL of the uploaded file
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_as_type_field() {
        let preview = Preview::new("vhs_00001.mp4", "", PreviewKind::Output, "video/h264-mp4")
            .with_frame_rate(8.0);
        let value = serde_json::to_value(&preview).unwrap();

        assert_eq!(value["type"], "output");
        assert_eq!(value["filename"], "vhs_00001.mp4");
        assert_eq!(value["frame_rate"], 8.0);
        assert!(value.get("url").is_none());
    }

    #[test]
    fn url_is_included_once_uploaded() {
        let preview = Preview::new("a.gif", "runs", PreviewKind::Temp, "image/gif")
            .with_url("https://bucket.s3.amazonaws.com/runs/a.gif");
        let value = serde_json::to_value(&preview).unwrap();

        assert_eq!(value["type"], "temp");
        assert_eq!(value["url"], "https://bucket.s3.amazonaws.com/runs/a.gif");
    }

    #[test]
    fn unknown_frame_rate_serializes_as_null() {
        let preview = Preview::new("clip.mp4", "", PreviewKind::Input, "video/mp4");
        let value = serde_json::to_value(&preview).unwrap();

        assert!(value["frame_rate"].is_null());
        assert!(value.as_object().unwrap().contains_key("frame_rate"));
        assert!(!value.as_object().unwrap().contains_key("url"));
    }
}
