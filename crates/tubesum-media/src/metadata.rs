//! Video metadata resolution.

use crate::ytdlp::{VideoInfo, YtDlp};
use chrono::NaiveDate;
use tracing::{info, warn};
use tubesum_core::{fallback_thumbnail_url, parse_video_id, Error, ResolvedVideo, VideoMetadata};

/// Resolves a YouTube URL into its video id and descriptive metadata.
#[derive(Debug, Clone)]
pub struct YtDlpMetadataResolver {
    ytdlp: YtDlp,
}

impl YtDlpMetadataResolver {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self { ytdlp }
    }

    /// Validate the URL, then look the video up.
    pub async fn resolve(&self, url: &str) -> tubesum_core::Result<ResolvedVideo> {
        let video_id = parse_video_id(url)?;

        let info = self
            .ytdlp
            .video_info(&video_id)
            .await
            .map_err(|e| Error::Extraction(e.to_string()))?;

        if info.id != video_id {
            warn!("yt-dlp returned id {} for requested {}", info.id, video_id);
        }

        let metadata = metadata_from_info(&info, &video_id);
        info!("Resolved {}: {}", video_id, metadata.title);

        Ok(ResolvedVideo { video_id, metadata })
    }
}

/// Map the yt-dlp info JSON onto tubesum's metadata.
pub fn metadata_from_info(info: &VideoInfo, video_id: &str) -> VideoMetadata {
    let channel = info
        .channel
        .clone()
        .or_else(|| info.uploader.clone())
        .unwrap_or_else(|| "Unknown channel".to_string());

    let publish_date = info
        .upload_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let thumbnail_url = info
        .thumbnail
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_thumbnail_url(video_id));

    VideoMetadata {
        title: if info.title.is_empty() {
            video_id.to_string()
        } else {
            info.title.clone()
        },
        channel,
        duration: info.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0),
        publish_date,
        thumbnail_url,
    }
}
