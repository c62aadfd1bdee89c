//! Interpretation of inbound model content: the completion marker, the
//! closing-statement cue, and the bracketed-speaker line format.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::SparringError;

/// Sentinel token the model emits to signal the conversation should end.
pub const COMPLETION_MARKER: &str = "DEBATE_COMPLETE";

/// Case-insensitive substrings that announce the closing-statement round.
const CLOSING_CUES: [&str; 2] = ["closing statement", "final remarks"];

fn speaker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // (?s) so the remainder may span multiple lines.
    RE.get_or_init(|| Regex::new(r"(?s)\[(.*?)\]:\s*(.*)").expect("valid speaker pattern"))
}

/// Remove the completion marker from the text, reporting whether it was
/// present. The remainder is trimmed for display.
pub fn strip_completion_marker(text: &str) -> (String, bool) {
    if text.contains(COMPLETION_MARKER) {
        (text.replace(COMPLETION_MARKER, "").trim().to_string(), true)
    } else {
        (text.trim().to_string(), false)
    }
}

/// Whether the text announces closing statements.
pub fn contains_closing_cue(text: &str) -> bool {
    let lower = text.to_lowercase();
    CLOSING_CUES.iter().any(|cue| lower.contains(cue))
}

/// Parse a `[Name]: remainder` line into (speaker, message).
///
/// Fails with [`SparringError::Format`] on no match; callers recover by
/// falling back to the active persona's display name.
pub fn parse_speaker_line(text: &str) -> Result<(String, String), SparringError> {
    let captures = speaker_pattern()
        .captures(text)
        .ok_or_else(|| SparringError::Format(text.to_string()))?;

    let message = captures
        .get(2)
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    if message.is_empty() {
        return Err(SparringError::Format(text.to_string()));
    }
    let speaker = captures
        .get(1)
        .map(|m| m.as_str().trim())
        .unwrap_or_default();

    Ok((speaker.to_string(), message.to_string()))
}
