//! YouTube URL handling.

use crate::error::{Error, Result};
use url::Url;

const VIDEO_ID_LEN: usize = 11;

/// Extract the canonical video id from a YouTube URL.
///
/// Accepts watch, short-link, embed, shorts and live URLs. This is a purely
/// syntactic check; it never touches the network.
pub fn parse_video_id(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed)
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default().to_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("music."))
        .unwrap_or(&host);

    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("embed") | Some("shorts") | Some("live") | Some("v") => {
                segments.next().map(str::to_string)
            }
            _ => None,
        },
        _ => {
            return Err(Error::InvalidUrl(format!("not a YouTube URL: {}", trimmed)));
        }
    };

    match candidate {
        Some(id) if is_valid_video_id(&id) => Ok(id),
        Some(id) => Err(Error::InvalidUrl(format!("malformed video id '{}'", id))),
        None => Err(Error::InvalidUrl(format!("no video id in {}", trimmed))),
    }
}

fn is_valid_video_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Thumbnail URL used whenever a real screenshot is unavailable.
pub fn fallback_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id)
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_forms() {
        let id = "dQw4w9WgXcQ";
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "http://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "  https://www.youtube.com/live/dQw4w9WgXcQ  ",
        ] {
            assert_eq!(parse_video_id(url).unwrap(), id, "{}", url);
        }
    }

    #[test]
    fn test_rejects_invalid_urls() {
        for url in [
            "not a url",
            "ftp://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://vimeo.com/12345",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/feed/subscriptions",
            "https://youtu.be/",
        ] {
            let err = parse_video_id(url).unwrap_err();
            assert_eq!(err.kind(), "InvalidUrlError", "{}", url);
        }
    }

    #[test]
    fn test_fallback_thumbnail() {
        assert_eq!(
            fallback_thumbnail_url("dQw4w9WgXcQ"),
            "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
        );
    }
}
