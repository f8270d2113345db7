//! Helpers for cleaning model output.

/// Remove a Markdown code fence that wraps the whole text, including an
/// optional language tag.
///
/// Fences inside surrounding prose are part of the text and are kept.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };

    let body = skip_language_tag(inner);
    if body.contains("```") {
        return trimmed;
    }
    body.trim()
}

/// Body of the first fenced block, wherever it sits in the text.
///
/// Text without a fence is returned trimmed. Used for structured replies
/// where a model may add prose around the payload.
pub fn fenced_body(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let body = skip_language_tag(&trimmed[start + 3..]);
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

// Skip the language tag line ("```json", "```yaml", ...). A one-line
// fence has no tag.
fn skip_language_tag(after_open: &str) -> &str {
    match after_open.find('\n') {
        Some(i) => &after_open[i + 1..],
        None => after_open,
    }
}

/// Strip fences and one layer of matching quotes from a rewritten prompt.
pub fn clean_rewrite(text: &str) -> String {
    let body = strip_code_fence(text);
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            body.strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(body);
    unquoted.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_language() {
        let text = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(strip_code_fence(text), "[{\"a\": 1}]");
    }

    #[test]
    fn test_fenced_body_with_leading_prose() {
        let text = "Here you go:\n```\nbody\n```\nthanks";
        assert_eq!(fenced_body(text), "body");
        assert_eq!(fenced_body("  plain  "), "plain");
    }

    #[test]
    fn test_inner_fence_keeps_surrounding_prose() {
        let text = "Explain recursion step by step.\nExample:\n```python\ndef fact(n): ...\n```\nAlways name the base case.";
        assert_eq!(strip_code_fence(text), text);
        assert_eq!(clean_rewrite(text), text);
    }

    #[test]
    fn test_two_blocks_are_not_one_wrapper() {
        let text = "```\na\n```\nthen\n```\nb\n```";
        assert_eq!(strip_code_fence(text), text);
    }

    #[test]
    fn test_no_fence_is_trimmed() {
        assert_eq!(strip_code_fence("  plain  "), "plain");
    }

    #[test]
    fn test_clean_rewrite_unquotes() {
        assert_eq!(clean_rewrite("\"Explain recursion\""), "Explain recursion");
        assert_eq!(clean_rewrite("```\nExplain\n```"), "Explain");
        assert_eq!(clean_rewrite("```Explain```"), "Explain");
    }
}
