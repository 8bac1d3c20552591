//! JSON Extraction from LLM Responses
//!
//! Models rarely answer with bare JSON. This module tolerates:
//! - Markdown code fences (```json ... ```)
//! - Explanatory prose before or after the object
//! - Trailing commas
//! - Missing closing braces from truncated output

use serde_json::Value;
use tracing::debug;

// =============================================================================
// Convenience Functions
// =============================================================================

/// Find and parse the first JSON value in an LLM response
pub fn extract_json(content: &str) -> Option<Value> {
    JsonRepairer::new().parse_or_repair(content).map(|(value, _)| value)
}

// =============================================================================
// JsonRepairer
// =============================================================================

/// Lenient JSON parser for model output
#[derive(Debug, Default)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Parse, falling back to extraction and repair
    ///
    /// Returns the value and whether any repair was needed.
    pub fn parse_or_repair(&self, raw: &str) -> Option<(Value, bool)> {
        let cleaned = preprocess(raw);

        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Some((value, false));
        }

        let candidate = extract_balanced(&cleaned).unwrap_or_else(|| cleaned.clone());
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            debug!("JSON extracted from surrounding text");
            return Some((value, true));
        }

        let repaired = balance_brackets(&strip_trailing_commas(&candidate));
        match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => {
                debug!("JSON repaired");
                Some((value, true))
            }
            Err(e) => {
                debug!(error = %e, "JSON repair failed");
                None
            }
        }
    }
}

fn preprocess(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('\u{feff}');
    strip_code_fences(s).trim().to_string()
}

/// Take the body of the first fenced block, if any
fn strip_code_fences(s: &str) -> &str {
    let Some(open) = s.find("```") else {
        return s;
    };
    let after_open = &s[open + 3..];
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// Walks characters tracking whether the cursor is inside a JSON string
#[derive(Default)]
struct StringState {
    in_string: bool,
    escape: bool,
}

impl StringState {
    /// Feed one char; returns true when it is structural (outside a string)
    fn structural(&mut self, ch: char) -> bool {
        if self.escape {
            self.escape = false;
            return false;
        }
        match ch {
            '\\' if self.in_string => {
                self.escape = true;
                false
            }
            '"' => {
                self.in_string = !self.in_string;
                false
            }
            _ => !self.in_string,
        }
    }
}

/// Slice out the first complete `{...}` or `[...]` from mixed content
fn extract_balanced(s: &str) -> Option<String> {
    let start = s.find(['{', '['])?;
    let mut state = StringState::default();
    let mut depth = 0i32;

    for (i, ch) in s[start..].char_indices() {
        if !state.structural(ch) {
            continue;
        }
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(s[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    // Unterminated: hand the tail to the bracket balancer
    Some(s[start..].to_string())
}

fn strip_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut state = StringState::default();
    let mut out = String::with_capacity(s.len());

    for (i, &ch) in chars.iter().enumerate() {
        if state.structural(ch) && ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn balance_brackets(s: &str) -> String {
    let mut state = StringState::default();
    let mut open: Vec<char> = Vec::new();

    for ch in s.chars() {
        if !state.structural(ch) {
            continue;
        }
        match ch {
            '{' => open.push('}'),
            '[' => open.push(']'),
            '}' | ']' => {
                open.pop();
            }
            _ => {}
        }
    }

    let mut out = s.to_string();
    if state.in_string {
        out.push('"');
    }
    while let Some(closer) = open.pop() {
        out.push(closer);
    }
    out
}
