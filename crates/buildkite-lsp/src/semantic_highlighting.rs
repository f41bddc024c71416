//! Semantic tokens
//!
//! Classifies each line of a pipeline into the fixed legend and encodes
//! the result in the LSP delta form
//! `[deltaLine, deltaStart, length, tokenType, tokenModifiers]`.

use tower_lsp::lsp_types::*;

use crate::context::indent_width;

/// Token types, in legend order. The indices are stable; clients map
/// them through the advertised legend.
pub const TOKEN_TYPES: &[SemanticTokenType] = &[
    SemanticTokenType::KEYWORD,   // 0 - step types (command, wait, block, ...)
    SemanticTokenType::STRING,    // 1 - labels, commands, values
    SemanticTokenType::PROPERTY,  // 2 - YAML property keys
    SemanticTokenType::VARIABLE,  // 3 - environment variables
    SemanticTokenType::FUNCTION,  // 4 - plugin names
    SemanticTokenType::NAMESPACE, // 5 - step keys for reference
    SemanticTokenType::OPERATOR,  // 6 - YAML operators like : and -
    SemanticTokenType::COMMENT,   // 7 - YAML comments
];

pub const TOKEN_MODIFIERS: &[SemanticTokenModifier] = &[
    SemanticTokenModifier::DEFINITION, // 0x1 - defining a step or plugin
    SemanticTokenModifier::READONLY,   // 0x2 - immutable values
    SemanticTokenModifier::DEPRECATED, // 0x4 - deprecated properties
];

const TYPE_KEYWORD: u32 = 0;
const TYPE_STRING: u32 = 1;
const TYPE_PROPERTY: u32 = 2;
const TYPE_VARIABLE: u32 = 3;
const TYPE_FUNCTION: u32 = 4;
const TYPE_NAMESPACE: u32 = 5;
const TYPE_OPERATOR: u32 = 6;
const TYPE_COMMENT: u32 = 7;

const MOD_DEFINITION: u32 = 0x1;
const MOD_READONLY: u32 = 0x2;

pub fn legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.to_vec(),
        token_modifiers: TOKEN_MODIFIERS.to_vec(),
    }
}

/// An absolutely positioned token, before delta encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawToken {
    line: u32,
    start: u32,
    length: u32,
    token_type: u32,
    modifiers: u32,
}

/// Tokens for the whole document.
pub fn semantic_tokens(lines: &[String]) -> SemanticTokens {
    semantic_tokens_for_range(lines, 0)
}

/// Tokens for a slice of the document; `start_line_offset` is the
/// absolute line number of the first element of `lines`.
pub fn semantic_tokens_for_range(lines: &[String], start_line_offset: usize) -> SemanticTokens {
    let mut tokens = Vec::new();
    let mut state = LineState::default();

    for (index, line) in lines.iter().enumerate() {
        let line_number = (index + start_line_offset) as u32;
        tokenize_line(line, line_number, &mut state, &mut tokens);
    }

    SemanticTokens {
        result_id: None,
        data: encode_deltas(&tokens),
    }
}

/// Delta-encode tokens in emission order. Within a line `deltaStart` is
/// relative to the previous token's start, otherwise to the line start.
fn encode_deltas(tokens: &[RawToken]) -> Vec<SemanticToken> {
    let mut data = Vec::with_capacity(tokens.len());
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for token in tokens {
        let delta_line = token.line - prev_line;
        let delta_start = if delta_line == 0 {
            token.start - prev_start
        } else {
            token.start
        };

        data.push(SemanticToken {
            delta_line,
            delta_start,
            length: token.length,
            token_type: token.token_type,
            token_modifiers_bitset: token.modifiers,
        });

        prev_line = token.line;
        prev_start = token.start;
    }

    data
}

/// Scan state carried across lines.
#[derive(Debug, Default)]
struct LineState {
    in_steps: bool,
    in_step: bool,
    step_indent: usize,
}

fn tokenize_line(line: &str, line_number: u32, state: &mut LineState, out: &mut Vec<RawToken>) {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') {
        if let Some(comment_start) = line.find('#') {
            out.push(RawToken {
                line: line_number,
                start: comment_start as u32,
                length: trimmed.len() as u32,
                token_type: TYPE_COMMENT,
                modifiers: 0,
            });
        }
        return;
    }

    let indent = indent_width(line);

    if trimmed == "steps:" {
        state.in_steps = true;
        state.in_step = false;

        let key_start = line.find("steps").unwrap_or(0) as u32;
        out.push(RawToken {
            line: line_number,
            start: key_start,
            length: "steps".len() as u32,
            token_type: TYPE_KEYWORD,
            modifiers: 0,
        });
        out.push(RawToken {
            line: line_number,
            start: key_start + "steps".len() as u32,
            length: 1,
            token_type: TYPE_OPERATOR,
            modifiers: 0,
        });
        return;
    }

    if state.in_steps && indent == 0 && !trimmed.starts_with("- ") {
        state.in_steps = false;
        state.in_step = false;
    }

    if state.in_steps && line.trim_start().starts_with("- ") && indent == 2 {
        state.in_step = true;
        state.step_indent = indent;

        if let Some(dash_pos) = line.find("- ") {
            out.push(RawToken {
                line: line_number,
                start: dash_pos as u32,
                length: 1,
                token_type: TYPE_OPERATOR,
                modifiers: 0,
            });

            let content_start = dash_pos + 2;
            if !line[content_start..].trim().is_empty() {
                tokenize_key_value(line, content_start, line_number, true, out);
            }
        }
        return;
    }

    if state.in_step && indent <= state.step_indent && !trimmed.starts_with("- ") {
        state.in_step = false;
    }

    if line.contains(':') {
        let key_start = line.len() - line.trim_start().len();
        tokenize_key_value(line, key_start, line_number, state.in_step, out);
    }
}

/// Emit key, colon, and value tokens for the `key: value` found at
/// `content_start`.
fn tokenize_key_value(
    line: &str,
    content_start: usize,
    line_number: u32,
    in_step: bool,
    out: &mut Vec<RawToken>,
) {
    let content = &line[content_start..];
    let Some(colon_offset) = content.find(':') else {
        return;
    };

    let key = content[..colon_offset].trim();
    if key.is_empty() {
        return;
    }

    out.push(RawToken {
        line: line_number,
        start: content_start as u32,
        length: key.len() as u32,
        token_type: key_token_type(key),
        modifiers: key_modifiers(key, in_step),
    });
    out.push(RawToken {
        line: line_number,
        start: (content_start + colon_offset) as u32,
        length: 1,
        token_type: TYPE_OPERATOR,
        modifiers: 0,
    });

    let after_colon = &content[colon_offset + 1..];
    let value = after_colon.trim();
    if value.is_empty() {
        return;
    }

    let leading_ws = after_colon.len() - after_colon.trim_start().len();
    let value_start = content_start + colon_offset + 1 + leading_ws;

    let (token_type, modifiers) = value_token_type(key, value);
    out.push(RawToken {
        line: line_number,
        start: value_start as u32,
        length: value.len() as u32,
        token_type,
        modifiers,
    });
}

fn is_step_type_key(key: &str) -> bool {
    matches!(
        key,
        "command" | "commands" | "wait" | "block" | "input" | "trigger" | "group"
    )
}

fn key_token_type(key: &str) -> u32 {
    if is_step_type_key(key) {
        return TYPE_KEYWORD;
    }
    if key == "key" || key == "label" {
        return TYPE_NAMESPACE;
    }
    if key == "env" {
        return TYPE_VARIABLE;
    }
    if key == "plugins" || key.contains('#') {
        return TYPE_FUNCTION;
    }
    TYPE_PROPERTY
}

fn key_modifiers(key: &str, in_step: bool) -> u32 {
    let mut modifiers = 0;

    if is_step_type_key(key) && in_step {
        modifiers |= MOD_DEFINITION;
    }
    if key == "key" || key == "timeout_in_minutes" {
        modifiers |= MOD_READONLY;
    }

    modifiers
}

fn value_token_type(key: &str, value: &str) -> (u32, u32) {
    let clean = value.trim_matches(|c| c == '"' || c == '\'');

    if clean.contains('#') {
        return (TYPE_FUNCTION, 0);
    }
    if key == "env" {
        return (TYPE_VARIABLE, 0);
    }
    if key == "key" || key == "label" {
        return (TYPE_NAMESPACE, 0);
    }
    if matches!(clean, "true" | "false" | "null" | "~") {
        return (TYPE_KEYWORD, MOD_READONLY);
    }
    if !clean.is_empty() && clean.parse::<i64>().is_ok() {
        return (TYPE_KEYWORD, MOD_READONLY);
    }

    (TYPE_STRING, 0)
}
