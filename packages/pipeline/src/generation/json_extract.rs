//! Recovering a JSON object from raw generation output.
//!
//! Output may be wrapped in Markdown fences, surrounded by prose, or cut off
//! mid-object when the token limit is hit. Each strategy is tried in order
//! and the first one that parses wins.

use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};

const PREVIEW_CHARS: usize = 100;

/// Extract the first parseable JSON value from `text`.
pub fn extract_json(text: &str) -> Result<Value> {
    let text = text.trim();

    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    for block in fenced_blocks(text) {
        if let Ok(value) = serde_json::from_str(block) {
            debug!("extracted JSON from code block");
            return Ok(value);
        }
        if let Some(value) = repair(block) {
            debug!("repaired truncated JSON in code block");
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str(&text[start..=end]) {
                debug!("extracted JSON between outer braces");
                return Ok(value);
            }
        }
    }

    let cleaned = text.trim_matches(|c| c == '"' || c == '\'' || c == '`');
    if let Ok(value) = serde_json::from_str(cleaned) {
        return Ok(value);
    }

    if let Some(start) = text.find('{') {
        if let Some(value) = repair(&text[start..]) {
            debug!("repaired truncated JSON");
            return Ok(value);
        }
    }

    Err(PipelineError::JsonExtraction(preview(text)))
}

/// Output with code fences and stray backticks removed, for prose fallbacks.
pub fn clean_raw_text(text: &str) -> String {
    let trimmed = text.trim();
    let inner = fenced_blocks(trimmed).next().unwrap_or(trimmed);
    inner.trim().trim_matches(|c: char| c == '`' || c.is_whitespace()).to_string()
}

/// Bodies of Markdown code fences, with a leading `json` tag dropped.
///
/// An unterminated final fence still yields its body.
fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    text.split("```").skip(1).step_by(2).map(|block| {
        let block = block.trim();
        block
            .strip_prefix("json")
            .or_else(|| block.strip_prefix("JSON"))
            .unwrap_or(block)
            .trim()
    })
}

fn repair(text: &str) -> Option<Value> {
    let closed = close_open_structures(text);
    if let Ok(value) = serde_json::from_str(&closed) {
        return Some(value);
    }
    truncate_to_last_section(text).and_then(|t| serde_json::from_str(&t).ok())
}

/// Close an unterminated string, then every open bracket and brace in
/// nesting order.
fn close_open_structures(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut fixed = text.trim_end().to_string();
    if in_string {
        if escaped {
            fixed.pop();
        }
        fixed.push('"');
    } else {
        while fixed.ends_with(',') {
            fixed.pop();
            fixed.truncate(fixed.trim_end().len());
        }
        if fixed.ends_with(':') {
            fixed.push_str("null");
        }
    }
    while let Some(closer) = stack.pop() {
        fixed.push(closer);
    }
    fixed
}

/// Cut a truncated narrative plan after its last complete section.
fn truncate_to_last_section(text: &str) -> Option<String> {
    let key = text.find("\"narrative_sections\"")?;
    let open = key + text[key..].find('[')?;
    let body_start = open + 1;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_end = None;

    for (i, c) in text[body_start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    last_end = Some(body_start + i);
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }

    let end = last_end?;
    Some(format!("{}]}}", &text[..=end]))
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
