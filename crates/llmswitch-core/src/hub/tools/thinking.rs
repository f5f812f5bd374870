//! Thinking-wrapper stripping.
//!
//! Models that reason in-band wrap their reasoning in `<think>`,
//! `<thinking>`, fenced ```` ```thinking ```` blocks or `[THINKING]` markers.
//! The wrappers are removed and the inner text kept. Running the stripper
//! twice yields the same text.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?think(?:ing)?\s*>|\[/?THINKING\]").expect("Thinking tag regex is valid")
});

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```thinking[ \t]*\r?\n(.*?)```").expect("Thinking fence regex is valid")
});

/// Remove thinking wrappers, keeping their inner text.
pub fn strip_thinking_tags(text: &str) -> String {
    if !contains_thinking_markup(text) {
        return text.to_string();
    }
    let unfenced = FENCE_RE.replace_all(text, "$1");
    let stripped = TAG_RE.replace_all(&unfenced, "");
    stripped.trim().to_string()
}

/// Cheap pre-check used to skip the regex pass.
pub fn contains_thinking_markup(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    ["<think", "</think", "```thinking", "[thinking]", "[/thinking]"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_tags() {
        assert_eq!(strip_thinking_tags("<think>plan it</think>\nanswer"), "plan it\nanswer");
        assert_eq!(strip_thinking_tags("<thinking>a</thinking>b"), "ab");
        assert_eq!(strip_thinking_tags("<THINK>x</THINK>"), "x");
    }

    #[test]
    fn test_fenced_and_bracketed() {
        let text = "```thinking\nstep one\n```\nfinal";
        assert_eq!(strip_thinking_tags(text), "step one\n\nfinal");
        assert_eq!(strip_thinking_tags("[THINKING]hmm[/THINKING] ok"), "hmm ok");
    }

    #[test]
    fn test_stray_closing_tag() {
        assert_eq!(strip_thinking_tags("reasoning</think>answer"), "reasoninganswer");
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "  keep <b>html</b> and spacing ";
        assert_eq!(strip_thinking_tags(text), text);
        assert!(!contains_thinking_markup("thinking about it"));
    }

    #[test]
    fn test_idempotent() {
        let once = strip_thinking_tags("<think>a</think> b [THINKING]c[/THINKING]");
        assert_eq!(strip_thinking_tags(&once), once);
    }
}
