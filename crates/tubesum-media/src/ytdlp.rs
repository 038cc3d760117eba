//! yt-dlp integration for video info, caption tracks and stream URLs.

use crate::error::{MediaError, MediaResult};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tokio::process::Command;
use tracing::debug;
use tubesum_core::watch_url;

/// Wrapper around the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check the executable is on PATH (or an existing path).
    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    /// Fetch the info JSON for a video without downloading it.
    pub async fn video_info(&self, video_id: &str) -> MediaResult<VideoInfo> {
        if !self.is_available() {
            return Err(MediaError::ToolNotFound {
                tool: self.binary.clone(),
            });
        }

        debug!("Fetching video info for {}", video_id);

        let output = Command::new(&self.binary)
            .args(["-J", "--skip-download", "--no-warnings", "--no-playlist"])
            .arg(watch_url(video_id))
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(MediaError::VideoUnavailable(if stderr.is_empty() {
                format!("yt-dlp exited with {}", output.status)
            } else {
                stderr
            }));
        }

        parse_video_info(&output.stdout)
    }
}

/// Parse yt-dlp's `-J` output.
pub fn parse_video_info(raw: &[u8]) -> MediaResult<VideoInfo> {
    serde_json::from_slice(raw)
        .map_err(|e| MediaError::Parse(format!("Failed to parse yt-dlp output: {}", e)))
}

/// Subset of the yt-dlp info JSON used by tubesum.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub channel: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    /// `YYYYMMDD`
    pub upload_date: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
    #[serde(default)]
    pub subtitles: BTreeMap<String, Vec<CaptionFormat>>,
    #[serde(default)]
    pub automatic_captions: BTreeMap<String, Vec<CaptionFormat>>,
}

impl VideoInfo {
    /// Highest quality format carrying both audio and video.
    pub fn best_combined_format(&self) -> Option<&StreamFormat> {
        self.formats
            .iter()
            .filter(|f| f.has_video() && f.has_audio() && f.url.is_some())
            .max_by(|a, b| {
                a.height
                    .unwrap_or(0)
                    .cmp(&b.height.unwrap_or(0))
                    .then_with(|| {
                        a.tbr
                            .unwrap_or(0.0)
                            .partial_cmp(&b.tbr.unwrap_or(0.0))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
            })
    }
}

/// One downloadable format.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFormat {
    pub format_id: String,
    pub url: Option<String>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub tbr: Option<f64>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
}

impl StreamFormat {
    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }

    /// Expected size in bytes, if yt-dlp knows it.
    pub fn size_hint(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if !c.is_empty() && c != "none")
}

/// One encoding of a caption track.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptionFormat {
    pub ext: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "channel": "Rick Astley",
        "duration": 212.0,
        "upload_date": "20091025",
        "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
        "formats": [
            {"format_id": "140", "url": "https://a", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2"},
            {"format_id": "18", "url": "https://b", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a.40.2", "height": 360, "tbr": 500.0},
            {"format_id": "22", "url": "https://c", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a.40.2", "height": 720, "tbr": 1500.0},
            {"format_id": "137", "url": "https://d", "ext": "mp4", "vcodec": "avc1", "acodec": "none", "height": 1080}
        ],
        "subtitles": {
            "en": [{"ext": "srv1", "url": "https://captions/en"}]
        }
    }"#;

    #[test]
    fn test_parse_info() {
        let info = parse_video_info(INFO.as_bytes()).unwrap();
        assert_eq!(info.id, "dQw4w9WgXcQ");
        assert_eq!(info.channel.as_deref(), Some("Rick Astley"));
        assert_eq!(info.subtitles.len(), 1);
        assert!(info.automatic_captions.is_empty());
    }

    #[test]
    fn test_best_combined_format_skips_video_only() {
        let info = parse_video_info(INFO.as_bytes()).unwrap();
        let best = info.best_combined_format().unwrap();
        assert_eq!(best.format_id, "22");
    }

    #[test]
    fn test_no_combined_format() {
        let info = parse_video_info(
            br#"{"id": "x", "formats": [{"format_id": "140", "url": "u", "vcodec": "none", "acodec": "opus"}]}"#,
        )
        .unwrap();
        assert!(info.best_combined_format().is_none());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_video_info(b"not json"),
            Err(MediaError::Parse(_))
        ));
    }
}
