//! Formatting-insensitive canonical form of hint source code
//!
//! Hints are Python. Normalization erases what Python itself ignores (spacing between tokens,
//! blank lines, comments, line breaks inside brackets, explicit `\` continuations, the amount
//! of indentation) and keeps everything else verbatim: identifiers, literals, operators and
//! the block nesting implied by indentation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical hint text: one `depth|tokens` line per logical source line
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedHint(String);

impl NormalizedHint {
    /// Canonical text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const THREE_CHAR_OPS: [&str; 4] = ["**=", "//=", ">>=", "<<="];
const TWO_CHAR_OPS: [&str; 19] = [
    "==", "!=", "<=", ">=", "**", "//", "<<", ">>", "->", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", ":=", "@=",
];
const STRING_PREFIXES: [&str; 8] = ["r", "b", "f", "u", "rb", "br", "fr", "rf"];

/// Normalize hint source code
pub fn normalize_hint(code: &str) -> NormalizedHint {
    let chars: Vec<char> = code.chars().collect();
    let mut lines: Vec<String> = Vec::new();
    let mut indent_stack: Vec<usize> = Vec::new();
    let mut tokens: Vec<String> = Vec::new();
    let mut depth = 0usize; // bracket nesting
    let mut at_line_start = true;
    let mut line_width = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];

        if at_line_start {
            // Measure indentation of a new logical line
            match c {
                ' ' => {
                    line_width += 1;
                    i += 1;
                    continue;
                }
                '\t' => {
                    line_width = (line_width / 8 + 1) * 8;
                    i += 1;
                    continue;
                }
                '\r' | '\n' => {
                    line_width = 0;
                    i += 1;
                    continue;
                }
                '#' => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                _ => {
                    at_line_start = false;
                }
            }
        }

        match c {
            ' ' | '\t' | '\r' => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => i += 2,
            '\n' => {
                i += 1;
                if depth == 0 {
                    flush_line(&mut lines, &mut indent_stack, &mut tokens, line_width);
                    at_line_start = true;
                    line_width = 0;
                }
            }
            '"' | '\'' => {
                let end = scan_string(&chars, i);
                tokens.push(chars[i..end].iter().collect());
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let is_prefix = STRING_PREFIXES.contains(&word.to_ascii_lowercase().as_str());
                if is_prefix && matches!(chars.get(i), Some('"') | Some('\'')) {
                    let end = scan_string(&chars, i);
                    let literal: String = chars[i..end].iter().collect();
                    tokens.push(format!("{}{}", word, literal));
                    i = end;
                } else {
                    tokens.push(word);
                }
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
            }
            _ => {
                let rest: String = chars[i..(i + 3).min(chars.len())].iter().collect();
                let op = THREE_CHAR_OPS
                    .iter()
                    .chain(TWO_CHAR_OPS.iter())
                    .find(|op| rest.starts_with(*op))
                    .map(|op| op.to_string())
                    .unwrap_or_else(|| c.to_string());
                match op.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
                i += op.chars().count();
                tokens.push(op);
            }
        }
    }

    flush_line(&mut lines, &mut indent_stack, &mut tokens, line_width);
    NormalizedHint(lines.join("\n"))
}

/// Emit the pending logical line with its block depth
fn flush_line(
    lines: &mut Vec<String>,
    indent_stack: &mut Vec<usize>,
    tokens: &mut Vec<String>,
    width: usize,
) {
    if tokens.is_empty() {
        return;
    }

    while let Some(&top) = indent_stack.last() {
        if top <= width {
            break;
        }
        indent_stack.pop();
    }
    if indent_stack.last() != Some(&width) {
        indent_stack.push(width);
    }

    let level = indent_stack.len() - 1;
    lines.push(format!("{}|{}", level, tokens.join(" ")));
    tokens.clear();
}

/// Returns the index just past the string literal starting at `start`
fn scan_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => {
                if !triple {
                    return i + 1;
                }
                if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                    return i + 3;
                }
                i += 1;
            }
            '\n' if !triple => return i,
            _ => i += 1,
        }
    }
    chars.len()
}
