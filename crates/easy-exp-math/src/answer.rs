//! Answer extraction from model output.
//!
//! `\boxed{...}` handling follows the MATH benchmark conventions: the last
//! boxed expression in a solution is its final answer.

use std::sync::OnceLock;

use regex::Regex;

/// Fenced code block: language tag, then body.
pub const CODE_BLOCK_PATTERN: &str = r"(?s)```(\w*)\n(.*?)\n```";

/// Language reported when the text holds no code block at all.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Last `\boxed{...}` (or `\fbox{...}`) in `text`, braces included.
///
/// Returns `None` when there is none or its braces never balance.
pub fn last_boxed_only_string(text: &str) -> Option<&str> {
    let start = text.rfind("\\boxed").or_else(|| text.rfind("\\fbox"))?;
    let mut depth = 0isize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip the `\boxed{` prefix and closing brace.
pub fn remove_boxed(boxed: &str) -> Option<&str> {
    boxed.strip_prefix("\\boxed{")?.strip_suffix('}')
}

/// Final boxed answer of a solution.
pub fn get_answer(solution: Option<&str>) -> Option<&str> {
    remove_boxed(last_boxed_only_string(solution?)?)
}

/// A code block found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

fn fenced() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CODE_BLOCK_PATTERN).unwrap_or_else(|e| panic!("bad pattern: {e}")))
}

fn fenced_or_inline() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"`{3}(\w+)?\s*([\s\S]*?)`{3}|`([^`]+)`")
            .unwrap_or_else(|e| panic!("bad pattern: {e}"))
    })
}

/// Extract code blocks from `text`.
///
/// Without `detect_single_line_code`, only fenced blocks count, and text
/// with none comes back whole as a single [`UNKNOWN_LANGUAGE`] block. With
/// it, inline `` `code` `` spans are returned too (language `""`).
pub fn extract_code(text: &str, detect_single_line_code: bool) -> Vec<CodeBlock> {
    if !detect_single_line_code {
        let blocks: Vec<CodeBlock> = fenced()
            .captures_iter(text)
            .map(|c| CodeBlock {
                language: c[1].to_string(),
                code: c[2].to_string(),
            })
            .collect();
        if blocks.is_empty() {
            return vec![CodeBlock {
                language: UNKNOWN_LANGUAGE.to_string(),
                code: text.to_string(),
            }];
        }
        return blocks;
    }

    fenced_or_inline()
        .captures_iter(text)
        .filter_map(|c| {
            if let Some(body) = c.get(2).filter(|m| !m.as_str().is_empty()) {
                Some(CodeBlock {
                    language: c.get(1).map_or("", |m| m.as_str()).trim().to_string(),
                    code: body.as_str().trim().to_string(),
                })
            } else {
                c.get(3).map(|inline| CodeBlock {
                    language: String::new(),
                    code: inline.as_str().trim().to_string(),
                })
            }
        })
        .collect()
}
