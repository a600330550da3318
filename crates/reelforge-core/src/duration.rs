//! Natural-language duration extraction.
//!
//! Pure text → integer-frames extractor for explicit duration phrases in a
//! user prompt ("5 seconds", "90 frames", "2.5s"). Returns `None` when the
//! prompt states no explicit duration — callers must not assume a default
//! here; defaulting is the code generator's concern.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::frames::seconds_to_frames;

static SECONDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:seconds?|secs?|s)\b").unwrap());

static FRAMES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:frames?|f)\b").unwrap());

/// Extract an explicit duration from free text, in frames at the project fps.
///
/// Frame phrasing is checked first so "90 frames" never half-matches the
/// trailing `s` of an unrelated word. No match means no explicit duration.
pub fn parse_duration_frames(text: &str) -> Option<u32> {
    if let Some(caps) = FRAMES_RE.captures(text) {
        if let Ok(frames) = caps[1].parse::<u32>() {
            return Some(frames.max(1));
        }
    }

    if let Some(caps) = SECONDS_RE.captures(text) {
        if let Ok(seconds) = caps[1].parse::<f64>() {
            return Some(seconds_to_frames(seconds));
        }
    }

    None
}

/// Extract a *relative* duration change, e.g. "2 seconds longer",
/// "30 frames shorter", "extend by 1s". Positive means lengthen.
pub fn parse_duration_delta_frames(text: &str) -> Option<i64> {
    let magnitude = parse_duration_frames(text)? as i64;

    let lower = text.to_lowercase();
    let lengthen = ["longer", "extend", "increase", "add", "more"];
    let shorten = ["shorter", "trim", "reduce", "decrease", "cut", "less"];

    if shorten.iter().any(|w| lower.contains(w)) {
        Some(-magnitude)
    } else if lengthen.iter().any(|w| lower.contains(w)) {
        Some(magnitude)
    } else {
        None
    }
}
