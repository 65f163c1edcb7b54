//! Fenced-code-block extraction from model completions.
//!
//! Models do not always wrap generated source in a fenced block, and
//! sometimes wrap it in several. The caller falls back to the raw
//! completion when no block is found; that fallback can let explanatory
//! prose through as if it were source, which is why the heuristic lives in
//! one place with its own tests.

/// Extract the body of the first fenced code block, if any.
///
/// The language tag after the opening fence is ignored. An unterminated
/// fence counts as "no block".
pub fn extract_code_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];

    // Skip the language tag line.
    let body_start = rest.find('\n')? + 1;
    let body = &rest[body_start..];

    let close = body.find("```")?;
    Some(body[..close].trim_end().to_string())
}
