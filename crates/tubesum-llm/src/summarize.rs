//! Transcript segmentation and summarization.
//!
//! The model is asked for a strict JSON object of the form
//! `{"segments": [{"id", "startTime", "endTime", "title", "aiSummary"}]}`.
//! Anything that does not match that shape is rejected; segment boundaries
//! are kept as returned.

use crate::client::ChatClient;
use crate::error::{LlmError, LlmResult};
use crate::types::{ChatMessage, ChatRequest};
use serde_json::Value;
use tracing::{debug, info, warn};
use tubesum_config::LlmConfig;
use tubesum_core::{new_id, Subtitle, SummarySegment};

const SYSTEM_PROMPT: &str = "You are a professional video content analyst. You split videos \
into topical sections and summarize each one. Reply with a single JSON object only.";

/// Splits a transcript into topical segments using a chat model.
#[derive(Debug, Clone)]
pub struct Summarizer {
    client: ChatClient,
    model: String,
    temperature: f32,
    min_segments: usize,
    max_segments: usize,
}

impl Summarizer {
    pub fn new(client: ChatClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.3,
            min_segments: 4,
            max_segments: 6,
        }
    }

    /// Create a summarizer and its client from configuration.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        Ok(Self {
            client: ChatClient::from_config(config)?,
            model: config.model.clone(),
            temperature: config.temperature,
            min_segments: config.min_segments,
            max_segments: config.max_segments,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Segment and summarize a transcript. Returned segments have no
    /// screenshot yet and carry every subtitle overlapping their range.
    pub async fn summarize(
        &self,
        title: &str,
        subtitles: &[Subtitle],
    ) -> LlmResult<Vec<SummarySegment>> {
        let prompt = build_prompt(title, subtitles, self.min_segments, self.max_segments);
        debug!("Summary prompt is {} characters", prompt.len());

        let request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
        )
        .with_temperature(self.temperature)
        .json_mode();

        let response = self.client.chat(request).await?;
        let content = response
            .content()
            .ok_or_else(|| LlmError::MalformedSummary("response has no message content".into()))?;

        let segments = parse_summary(content, subtitles)?;
        info!("Model {} returned {} segments", self.model, segments.len());
        Ok(segments)
    }
}

/// `mm:ss` for a position in seconds; minutes are not wrapped into hours.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Build the user prompt: title, instructions and the timestamped transcript.
pub fn build_prompt(title: &str, subtitles: &[Subtitle], min: usize, max: usize) -> String {
    let transcript = subtitles
        .iter()
        .map(|s| format!("[{}] {}", format_timestamp(s.start), s.text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze the transcript of the YouTube video below and split it into {min}-{max} logical sections by topic.

Video title: {title}

Transcript:
{transcript}

Return JSON with exactly this structure:
{{
  "segments": [
    {{
      "id": "unique section id",
      "startTime": <start in seconds>,
      "endTime": <end in seconds>,
      "title": "section title",
      "aiSummary": "a 150-200 word summary of the section"
    }}
  ]
}}

Requirements:
1. Each section has one clear topical focus.
2. Time ranges are sensible and do not overlap.
3. Summaries accurately reflect what is said in that time range.
4. Write the titles and summaries in the language of the transcript."#
    )
}

/// Validate the model reply and turn it into segments.
pub fn parse_summary(content: &str, subtitles: &[Subtitle]) -> LlmResult<Vec<SummarySegment>> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| LlmError::MalformedSummary(format!("response is not JSON: {}", e)))?;

    let items = value
        .get("segments")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::MalformedSummary("missing \"segments\" array".into()))?;

    if items.is_empty() {
        return Err(LlmError::MalformedSummary("\"segments\" is empty".into()));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let segment = parse_segment(i, item)?;
            if segment.end_time <= segment.start_time {
                warn!(
                    "Segment {} has end {} <= start {}; keeping as returned",
                    i, segment.end_time, segment.start_time
                );
            }
            Ok(segment.with_subtitles_from(subtitles))
        })
        .collect()
}

fn parse_segment(index: usize, item: &Value) -> LlmResult<SummarySegment> {
    let obj = item
        .as_object()
        .ok_or_else(|| LlmError::MalformedSummary(format!("segment {} is not an object", index)))?;

    let number = |key: &str| {
        obj.get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                LlmError::MalformedSummary(format!("segment {} has no numeric \"{}\"", index, key))
            })
    };
    let text = |key: &str| {
        obj.get(key).and_then(Value::as_str).ok_or_else(|| {
            LlmError::MalformedSummary(format!("segment {} has no string \"{}\"", index, key))
        })
    };

    // Ids are optional; models sometimes emit numbers.
    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("segment-{}", new_id()),
    };

    Ok(SummarySegment::new(
        id,
        number("startTime")?,
        number("endTime")?,
        text("title")?,
        text("aiSummary")?,
    ))
}

/// Some models wrap JSON mode output in a Markdown code fence anyway.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtitles() -> Vec<Subtitle> {
        vec![
            Subtitle::new(0.0, 8.0, "intro"),
            Subtitle::new(8.0, 12.0, "straddles the boundary"),
            Subtitle::new(12.0, 30.0, "main part"),
        ]
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.9), "01:05");
        assert_eq!(format_timestamp(3725.0), "62:05");
    }

    #[test]
    fn test_build_prompt_contains_transcript() {
        let prompt = build_prompt("My Video", &subtitles(), 4, 6);
        assert!(prompt.contains("Video title: My Video"));
        assert!(prompt.contains("[00:08] straddles the boundary"));
        assert!(prompt.contains("4-6 logical sections"));
        assert!(prompt.contains("\"aiSummary\""));
    }

    #[test]
    fn test_parse_summary_attaches_overlapping_subtitles() {
        let content = r#"{"segments": [
            {"id": "s1", "startTime": 0, "endTime": 10, "title": "Intro", "aiSummary": "Opening"},
            {"id": 2, "startTime": 10, "endTime": 30, "title": "Body", "aiSummary": "Details"}
        ]}"#;

        let segments = parse_summary(content, &subtitles()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id, "s1");
        assert_eq!(segments[1].id, "2");
        assert!(segments[0].screenshot_url.is_empty());

        let first: Vec<&str> = segments[0].subtitles.iter().map(|s| s.text.as_str()).collect();
        let second: Vec<&str> = segments[1].subtitles.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(first, vec!["intro", "straddles the boundary"]);
        assert_eq!(second, vec!["straddles the boundary", "main part"]);
    }

    #[test]
    fn test_parse_summary_generates_missing_id_and_strips_fence() {
        let content = "```json\n{\"segments\": [{\"startTime\": 0, \"endTime\": 5, \"title\": \"A\", \"aiSummary\": \"B\"}]}\n```";
        let segments = parse_summary(content, &[]).unwrap();
        assert!(segments[0].id.starts_with("segment-"));
    }

    #[test]
    fn test_parse_summary_keeps_inverted_range() {
        let content = r#"{"segments": [{"id": "x", "startTime": 20, "endTime": 5, "title": "A", "aiSummary": "B"}]}"#;
        let segments = parse_summary(content, &subtitles()).unwrap();
        assert_eq!(segments[0].start_time, 20.0);
        assert_eq!(segments[0].end_time, 5.0);
        assert!(segments[0].subtitles.is_empty());
    }

    #[test]
    fn test_parse_summary_rejects_malformed() {
        let cases = [
            "not json",
            r#"{"sections": []}"#,
            r#"{"segments": []}"#,
            r#"{"segments": "nope"}"#,
            r#"{"segments": [{"startTime": "0", "endTime": 5, "title": "A", "aiSummary": "B"}]}"#,
            r#"{"segments": [{"startTime": 0, "endTime": 5, "aiSummary": "B"}]}"#,
            r#"{"segments": [42]}"#,
        ];
        for case in cases {
            let err = parse_summary(case, &[]).unwrap_err();
            assert!(matches!(err, LlmError::MalformedSummary(_)), "{}", case);
            assert_eq!(
                tubesum_core::Error::from(err).kind(),
                "MalformedSummaryError"
            );
        }
    }
}
