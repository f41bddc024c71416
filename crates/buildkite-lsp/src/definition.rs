//! Go-to-definition for step references
//!
//! `depends_on` entries name other steps by key. The definition of a key
//! is the header line of the step that declares it, either explicitly
//! via `key:` or implicitly via its label.

use tower_lsp::lsp_types::*;

use crate::context::indent_width;
use crate::document::PositionContext;

/// Definition locations for the word under the cursor. Only fires in
/// `depends_on` contexts; plugin references have no local definition.
pub fn find_definitions(pos_ctx: &PositionContext) -> Vec<Location> {
    let Some(word) = word_at_position(&pos_ctx.current_line, pos_ctx.char_index) else {
        return Vec::new();
    };

    if !is_step_reference(pos_ctx, &word) {
        return Vec::new();
    }

    let lines: Vec<&str> = pos_ctx.full_text.split('\n').collect();
    match find_step_with_key(&lines, &word) {
        Some(location) => {
            let line = lines[location];
            vec![Location {
                uri: pos_ctx.uri.clone(),
                range: Range {
                    start: Position::new(location as u32, 0),
                    end: Position::new(location as u32, line.len() as u32),
                },
            }]
        }
        None => Vec::new(),
    }
}

/// The word under the cursor using the definition boundary set:
/// alphanumerics, `_`, `-`, with surrounding quotes stripped.
fn word_at_position(line: &str, char_index: usize) -> Option<String> {
    let bytes = line.as_bytes();
    if char_index >= bytes.len() {
        return None;
    }

    let is_word_byte = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-');

    let mut start = char_index;
    while start > 0 && is_word_byte(bytes[start - 1]) {
        start -= 1;
    }

    let mut end = char_index;
    while end < bytes.len() && is_word_byte(bytes[end]) {
        end += 1;
    }

    if start >= end {
        return None;
    }

    let mut word = &line[start..end];
    if word.len() >= 2 {
        let first = word.as_bytes()[0];
        if (first == b'"' || first == b'\'') && word.as_bytes()[word.len() - 1] == first {
            word = &word[1..word.len() - 1];
        }
    }

    if word.is_empty() {
        None
    } else {
        Some(word.to_string())
    }
}

/// The cursor references a step key when the current line mentions
/// `depends_on`, or it is a quoted list item inside a `depends_on` block.
fn is_step_reference(pos_ctx: &PositionContext, word: &str) -> bool {
    let line = pos_ctx.current_line.trim();

    if line.contains("depends_on") {
        return true;
    }

    let quoted = format!("- \"{word}\"");
    let single_quoted = format!("- '{word}'");
    if !line.contains(&quoted) && !line.contains(&single_quoted) {
        return false;
    }

    // Confirm the enclosing key is depends_on by walking up to the first
    // less-indented key line.
    let item_indent = indent_width(&pos_ctx.current_line);
    for previous in pos_ctx.context_lines.iter().rev().skip(1) {
        let trimmed = previous.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if indent_width(previous) < item_indent {
            return trimmed.starts_with("depends_on:") || trimmed.starts_with("- depends_on:");
        }
    }

    false
}

/// Scan the steps section for a step whose key matches.
fn find_step_with_key(lines: &[&str], step_key: &str) -> Option<usize> {
    let mut in_steps = false;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if trimmed == "steps:" {
            in_steps = true;
            continue;
        }

        if in_steps && !line.is_empty() && !line.starts_with(' ') && !line.starts_with('\t') {
            break;
        }

        if in_steps && line.trim_start().starts_with("- ") && indent_width(line) == 2 {
            if step_key_for(lines, i).as_deref() == Some(step_key) {
                return Some(i);
            }
        }
    }

    None
}

/// A step's key: the explicit `key:` value, or one synthesized from the
/// label (lowercased, spaces to dashes, colons removed).
fn step_key_for(lines: &[&str], step_start: usize) -> Option<String> {
    let step_lines = lines[step_start..]
        .iter()
        .enumerate()
        .take_while(|(offset, line)| {
            *offset == 0
                || !(line.trim_start().starts_with("- ")
                    || (!line.trim().is_empty()
                        && !line.starts_with(' ')
                        && !line.starts_with('\t')))
        });

    let mut label = None;
    for (_, line) in step_lines {
        let trimmed = line.trim().trim_start_matches("- ");

        if let Some(value) = trimmed.strip_prefix("key:") {
            let key = value.trim().trim_matches(|c| c == '"' || c == '\'');
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }

        if label.is_none() {
            if let Some(value) = trimmed.strip_prefix("label:") {
                let text = value.trim().trim_matches(|c| c == '"' || c == '\'');
                if !text.is_empty() {
                    label = Some(text.to_string());
                }
            }
        }
    }

    label.map(|label| label.to_lowercase().replace(' ', "-").replace(':', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::split_lines;

    fn position_context(full: &str, line: u32, character: u32) -> PositionContext {
        let lines = split_lines(full);
        PositionContext {
            uri: Url::parse("file:///p/.buildkite/pipeline.yml").unwrap(),
            position: Position::new(line, character),
            current_line: lines[line as usize].clone(),
            char_index: character as usize,
            context_lines: lines[..=line as usize].to_vec(),
            full_text: full.to_string(),
        }
    }

    const PIPELINE: &str = r#"steps:
  - label: "Build"
    key: "build-step"
    command: "make build"

  - label: "Test"
    depends_on:
      - "build-step"
    command: "make test"
"#;

    #[test]
    fn resolves_explicit_key_from_depends_on_item() {
        // Cursor on "build-step" inside the depends_on list
        let pos = position_context(PIPELINE, 7, 10);
        let locations = find_definitions(&pos);

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].range.start.line, 1);
    }

    #[test]
    fn resolves_key_synthesized_from_label() {
        let content = r#"steps:
  - label: "Build App"
    command: "make build"

  - label: "Test"
    depends_on:
      - "build-app"
"#;
        let pos = position_context(content, 6, 10);
        let locations = find_definitions(&pos);

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].range.start.line, 1);
    }

    #[test]
    fn list_item_outside_depends_on_does_not_trigger() {
        let content = r#"steps:
  - label: "Build"
    key: "build-step"
    commands:
      - "build-step"
"#;
        let pos = position_context(content, 4, 10);
        assert!(find_definitions(&pos).is_empty());
    }

    #[test]
    fn unknown_key_finds_nothing() {
        let content = r#"steps:
  - label: "Test"
    depends_on:
      - "missing-step"
"#;
        let pos = position_context(content, 3, 10);
        assert!(find_definitions(&pos).is_empty());
    }

    #[test]
    fn depends_on_inline_reference_resolves() {
        let content = "steps:\n  - key: \"lint\"\n    command: \"make lint\"\n  - depends_on: \"lint\"\n    command: \"make test\"\n";
        let pos = position_context(content, 3, 18);
        let locations = find_definitions(&pos);

        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].range.start.line, 1);
    }
}
