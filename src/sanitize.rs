//! Response text cleanup before it goes back out over the transport.
//!
//! Chat recipients see plain text with no markdown renderer, and the model
//! occasionally prefixes its own name or leads with a burst of emoji.

use once_cell::sync::Lazy;
use regex::Regex;

static ASSISTANT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*am[ée]lie\s*:\s*").expect("static regex"));
static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*{1,3}([^*\n]+)\*{1,3}").expect("static regex"));
static UNDERSCORE_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b_{1,3}([^_\n]+)_{1,3}\b").expect("static regex"));
static STRIKETHROUGH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~([^~\n]+)~~").expect("static regex"));
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Clean one model response: strip emoji, the assistant-name prefix, and
/// markdown emphasis; normalize line endings; collapse 3+ newlines to 2.
pub fn sanitize_response(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text: String = text.chars().filter(|c| !is_emoji(*c)).collect();
    let text = ASSISTANT_PREFIX.replace(&text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = UNDERSCORE_EMPHASIS.replace_all(&text, "$1");
    let text = STRIKETHROUGH.replace_all(&text, "$1");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Emoji and the joiners/selectors that glue them together.
fn is_emoji(c: char) -> bool {
    matches!(u32::from(c),
        0x1F000..=0x1F02F   // mahjong/domino
        | 0x1F0A0..=0x1F0FF // playing cards
        | 0x1F1E6..=0x1F1FF // regional indicators (flags)
        | 0x1F300..=0x1F5FF // symbols & pictographs
        | 0x1F600..=0x1F64F // emoticons
        | 0x1F680..=0x1F6FF // transport & map
        | 0x1F900..=0x1F9FF // supplemental symbols
        | 0x1FA70..=0x1FAFF // extended-A
        | 0x2600..=0x26FF   // misc symbols
        | 0x2700..=0x27BF   // dingbats
        | 0x2B00..=0x2BFF   // misc symbols & arrows (stars etc.)
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200D            // zero-width joiner
    )
}
