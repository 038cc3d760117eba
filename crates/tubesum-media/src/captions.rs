//! Caption track selection and timedtext parsing.

use crate::error::{MediaError, MediaResult};
use crate::ytdlp::{CaptionFormat, VideoInfo, YtDlp};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};
use tubesum_core::Subtitle;
use url::Url;

/// A caption track offered for a video.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language: String,
    /// URL of the track in srv1 timedtext XML.
    pub url: String,
    pub automatic: bool,
}

/// Fetches the transcript of a video from its caption tracks.
#[derive(Debug, Clone)]
pub struct CaptionExtractor {
    ytdlp: YtDlp,
    http: reqwest::Client,
    primary_languages: Vec<String>,
    secondary_languages: Vec<String>,
}

impl CaptionExtractor {
    pub fn new(
        ytdlp: YtDlp,
        http: reqwest::Client,
        primary_languages: Vec<String>,
        secondary_languages: Vec<String>,
    ) -> Self {
        Self {
            ytdlp,
            http,
            primary_languages,
            secondary_languages,
        }
    }

    /// Download and parse the preferred caption track.
    ///
    /// An empty or unparsable track is reported as `NoCaptions`, never as an
    /// empty transcript.
    pub async fn extract(&self, video_id: &str) -> MediaResult<Vec<Subtitle>> {
        let video = self.ytdlp.video_info(video_id).await?;
        let tracks = caption_tracks(&video);
        debug!("{} caption tracks available for {}", tracks.len(), video_id);

        let track = select_track(&tracks, &self.primary_languages, &self.secondary_languages)
            .ok_or_else(|| MediaError::NoCaptions(format!("no caption tracks for {}", video_id)))?;

        info!(
            "Using {} caption track '{}' for {}",
            if track.automatic { "automatic" } else { "manual" },
            track.language,
            video_id
        );

        let response = self.http.get(&track.url).send().await?;
        if !response.status().is_success() {
            return Err(MediaError::NoCaptions(format!(
                "caption request returned {}",
                response.status()
            )));
        }
        let body = response.text().await?;

        let subtitles = parse_timedtext(&body);
        if subtitles.is_empty() {
            return Err(MediaError::NoCaptions(format!(
                "caption track '{}' for {} is empty or unparsable",
                track.language, video_id
            )));
        }

        info!("Extracted {} subtitle lines for {}", subtitles.len(), video_id);
        Ok(subtitles)
    }
}

/// Caption tracks in preference order: uploaded tracks first, then the
/// speech-recognized track in the video's own language.
pub fn caption_tracks(info: &VideoInfo) -> Vec<CaptionTrack> {
    let mut tracks: Vec<CaptionTrack> = info
        .subtitles
        .iter()
        .filter(|(lang, _)| lang.as_str() != "live_chat")
        .filter_map(|(lang, formats)| {
            srv1_url(formats).map(|url| CaptionTrack {
                language: lang.clone(),
                url,
                automatic: false,
            })
        })
        .collect();

    // Automatic captions also list machine translations into every language;
    // only the "-orig" track is the real transcript when yt-dlp marks one.
    let has_orig = info.automatic_captions.keys().any(|k| k.ends_with("-orig"));
    tracks.extend(
        info.automatic_captions
            .iter()
            .filter(|(lang, _)| !has_orig || lang.ends_with("-orig"))
            .filter_map(|(lang, formats)| {
                srv1_url(formats).map(|url| CaptionTrack {
                    language: lang.trim_end_matches("-orig").to_string(),
                    url,
                    automatic: true,
                })
            }),
    );

    tracks
}

/// Pick a track: primary languages, then secondary, then the first track.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    primary: &[String],
    secondary: &[String],
) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| primary.contains(&t.language))
        .or_else(|| tracks.iter().find(|t| secondary.contains(&t.language)))
        .or_else(|| tracks.first())
}

fn srv1_url(formats: &[CaptionFormat]) -> Option<String> {
    if let Some(srv1) = formats.iter().find(|f| f.ext == "srv1") {
        return Some(srv1.url.clone());
    }

    // Timedtext URLs select their encoding through the `fmt` parameter.
    let first = formats.first()?;
    let mut url = Url::parse(&first.url).ok()?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("fmt", "srv1");
    Some(url.to_string())
}

fn text_element() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").expect("valid regex"))
}

fn start_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bstart="([^"]*)""#).expect("valid regex"))
}

fn dur_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bdur="([^"]*)""#).expect("valid regex"))
}

/// Finite number held by the attribute `re` matches in `attrs`.
fn attribute(attrs: &str, re: &Regex) -> Option<f64> {
    re.captures(attrs)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse srv1 timedtext XML (`<text start=".." dur="..">..</text>`).
pub fn parse_timedtext(xml: &str) -> Vec<Subtitle> {
    text_element()
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let start = attribute(attrs, start_attribute())?;
            let dur = attribute(attrs, dur_attribute()).unwrap_or(0.0).max(0.0);
            let text = clean_text(caps.get(2)?.as_str());
            if text.is_empty() {
                return None;
            }
            Some(Subtitle::new(start, start + dur, text))
        })
        .collect()
}

fn markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

/// Decode entities, drop inline markup and collapse whitespace.
fn clean_text(raw: &str) -> String {
    // Entities may be double-escaped (`&amp;#39;`), so decode twice.
    let decoded = decode_entities(&decode_entities(raw));
    let stripped = markup().replace_all(&decoded, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn entity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex"))
}

/// Decode named and numeric HTML entities.
pub fn decode_entities(text: &str) -> String {
    entity()
        .replace_all(text, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
