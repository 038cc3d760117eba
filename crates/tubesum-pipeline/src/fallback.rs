//! Substitute transcript used when no captions can be fetched.

use tubesum_core::Subtitle;

/// Fixed five-line placeholder transcript covering the first two minutes.
pub fn demo_subtitles() -> Vec<Subtitle> {
    vec![
        Subtitle::new(0.0, 10.0, "Opening part of the video..."),
        Subtitle::new(10.0, 30.0, "Introduction to the main content..."),
        Subtitle::new(30.0, 60.0, "Detailed explanation of the topic..."),
        Subtitle::new(60.0, 90.0, "Examples and case studies..."),
        Subtitle::new(90.0, 120.0, "Summary and conclusions..."),
    ]
}
