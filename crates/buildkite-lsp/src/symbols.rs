//! Document symbols
//!
//! The outline view: top-level pipeline properties plus one entry per
//! step, named from its label or step type.

use tower_lsp::lsp_types::*;

use crate::pipeline::Pipeline;

/// Extract document symbols. Returns `None` when the document is not
/// valid YAML; the outline quietly disappears while the user is
/// mid-edit.
pub fn document_symbols(content: &str, lines: &[String]) -> Option<Vec<DocumentSymbol>> {
    Pipeline::parse(content).ok()?;

    let mut symbols = Vec::new();

    if let Some(symbol) = top_level_symbol(lines, "env", SymbolKind::OBJECT, "Environment Variables")
    {
        symbols.push(symbol);
    }
    if let Some(symbol) = top_level_symbol(lines, "agents", SymbolKind::OBJECT, "Agent Requirements")
    {
        symbols.push(symbol);
    }
    if let Some(symbol) = steps_symbol(lines) {
        symbols.push(symbol);
    }

    let others: [(&str, SymbolKind, &str); 4] = [
        ("notify", SymbolKind::OBJECT, "Notifications"),
        ("skip", SymbolKind::STRING, "Skip Condition"),
        ("group", SymbolKind::OBJECT, "Pipeline Group"),
        ("timeout_in_minutes", SymbolKind::NUMBER, "Pipeline Timeout"),
    ];
    for (name, kind, detail) in others {
        if let Some(symbol) = top_level_symbol(lines, name, kind, detail) {
            symbols.push(symbol);
        }
    }

    Some(symbols)
}

/// The `steps (N)` symbol with one child per step.
fn steps_symbol(lines: &[String]) -> Option<DocumentSymbol> {
    let steps_line = lines.iter().position(|line| line.trim() == "steps:")?;

    let mut children = Vec::new();
    let mut current_start: Option<usize> = None;

    for (i, line) in lines.iter().enumerate().skip(steps_line + 1) {
        if is_top_level(line) {
            break;
        }

        if is_step_start(line) {
            if let Some(start) = current_start {
                if let Some(symbol) = step_symbol(lines, children.len(), start, i - 1) {
                    children.push(symbol);
                }
            }
            current_start = Some(i);
        }
    }

    if let Some(start) = current_start {
        if let Some(symbol) = step_symbol(lines, children.len(), start, lines.len() - 1) {
            children.push(symbol);
        }
    }

    let mut end_line = lines.len().saturating_sub(1);
    for (i, line) in lines.iter().enumerate().skip(steps_line + 1) {
        if is_top_level(line) {
            end_line = i - 1;
            break;
        }
    }

    Some(symbol(
        format!("steps ({})", children.len()),
        SymbolKind::ARRAY,
        "Steps".to_string(),
        line_range(steps_line, end_line),
        selection_range(steps_line, "steps:".len()),
        Some(children),
    ))
}

fn step_symbol(
    lines: &[String],
    index: usize,
    start_line: usize,
    end_line: usize,
) -> Option<DocumentSymbol> {
    if start_line >= lines.len() {
        return None;
    }

    let mut name = format!("Step {}", index + 1);
    let mut detail = "Step".to_string();
    let mut kind = SymbolKind::OBJECT;

    for line in lines[start_line..=end_line.min(lines.len() - 1)].iter() {
        let trimmed = line.trim();

        if trimmed.starts_with("label:") || trimmed.starts_with("- label:") {
            if let Some(value) = extract_value(trimmed) {
                name = value;
                detail = "Command Step".to_string();
            }
        } else if trimmed.starts_with("wait:") || trimmed == "wait" || trimmed.starts_with("- wait")
        {
            detail = "Wait".to_string();
            kind = SymbolKind::EVENT;
            name = match extract_value(trimmed) {
                Some(value) => format!("Wait: {value}"),
                None => "Wait Step".to_string(),
            };
        } else if trimmed.starts_with("block:") || trimmed.starts_with("- block:") {
            detail = "Block".to_string();
            kind = SymbolKind::EVENT;
            name = match extract_value(trimmed) {
                Some(value) => format!("Block: {value}"),
                None => "Manual Approval".to_string(),
            };
        } else if trimmed.starts_with("input:") || trimmed.starts_with("- input:") {
            detail = "Input".to_string();
            kind = SymbolKind::EVENT;
            name = match extract_value(trimmed) {
                Some(value) => format!("Input: {value}"),
                None => "Input Step".to_string(),
            };
        } else if trimmed.starts_with("trigger:") || trimmed.starts_with("- trigger:") {
            detail = "Trigger".to_string();
            kind = SymbolKind::EVENT;
            name = match extract_value(trimmed) {
                Some(value) => format!("Trigger: {value}"),
                None => "Trigger Step".to_string(),
            };
        }
    }

    Some(symbol(
        name,
        kind,
        detail,
        line_range(start_line, end_line),
        selection_range(start_line, lines[start_line].len()),
        None,
    ))
}

/// A top-level property symbol spanning its block.
fn top_level_symbol(
    lines: &[String],
    property: &str,
    kind: SymbolKind,
    detail: &str,
) -> Option<DocumentSymbol> {
    let prefix = format!("{property}:");

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed != prefix && !trimmed.starts_with(&prefix) {
            continue;
        }
        // Only top-level occurrences count.
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }

        let mut end_line = i;
        for (j, next) in lines.iter().enumerate().skip(i + 1) {
            if is_top_level(next) {
                end_line = j - 1;
                break;
            }
            end_line = j;
        }

        return Some(symbol(
            property.to_string(),
            kind,
            detail.to_string(),
            line_range(i, end_line),
            selection_range(i, property.len()),
            None,
        ));
    }

    None
}

fn is_top_level(line: &str) -> bool {
    !line.is_empty() && !line.starts_with(' ') && !line.starts_with('\t')
}

fn is_step_start(line: &str) -> bool {
    let leading_spaces = line.len() - line.trim_start_matches(' ').len();
    line.trim_start().starts_with("- ") && leading_spaces == 2
}

/// The value after the colon, with surrounding quotes removed. Flow
/// collections do not produce a display value.
fn extract_value(line: &str) -> Option<String> {
    let colon = line.find(':')?;
    let after = line[colon + 1..].trim();

    if after.len() >= 2 && (after.starts_with('"') || after.starts_with('\'')) {
        let quote = after.chars().next()?;
        let inner = &after[1..];
        let end = inner.rfind(quote)?;
        if end == 0 {
            return None;
        }
        return Some(inner[..end].to_string());
    }

    // YAML nulls are not display values.
    if after.is_empty() || after == "~" || after == "null" {
        return None;
    }
    if after.starts_with('[') || after.starts_with('{') {
        return None;
    }

    Some(after.to_string())
}

fn line_range(start: usize, end: usize) -> Range {
    Range {
        start: Position::new(start as u32, 0),
        end: Position::new(end as u32, 0),
    }
}

fn selection_range(line: usize, len: usize) -> Range {
    Range {
        start: Position::new(line as u32, 0),
        end: Position::new(line as u32, len as u32),
    }
}

#[allow(deprecated)]
fn symbol(
    name: String,
    kind: SymbolKind,
    detail: String,
    range: Range,
    selection_range: Range,
    children: Option<Vec<DocumentSymbol>>,
) -> DocumentSymbol {
    DocumentSymbol {
        name,
        detail: Some(detail),
        kind,
        tags: None,
        deprecated: None,
        range,
        selection_range,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::split_lines;

    const PIPELINE: &str = r#"env:
  NODE_ENV: production

agents:
  queue: "default"

steps:
  - label: ":rocket: Build"
    command: "make build"

  - wait: ~

  - label: ":test_tube: Test"
    command: "make test"

  - block: "Deploy to production?"

  - input: "Release version"
    fields:
      - text: "version"

  - trigger: "deploy-pipeline"

notify:
  - email: "team@example.com"
"#;

    fn symbols_for(content: &str) -> Vec<DocumentSymbol> {
        document_symbols(content, &split_lines(content)).unwrap()
    }

    #[test]
    fn full_pipeline_outline() {
        let symbols = symbols_for(PIPELINE);

        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"env"));
        assert!(names.contains(&"agents"));
        assert!(names.contains(&"notify"));
        assert!(names.contains(&"steps (6)"));

        let steps = symbols.iter().find(|s| s.name == "steps (6)").unwrap();
        assert_eq!(steps.kind, SymbolKind::ARRAY);

        let children = steps.children.as_ref().unwrap();
        let child_names: Vec<&str> = children.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            child_names,
            vec![
                ":rocket: Build",
                "Wait Step",
                ":test_tube: Test",
                "Block: Deploy to production?",
                "Input: Release version",
                "Trigger: deploy-pipeline",
            ]
        );

        assert_eq!(children[0].detail.as_deref(), Some("Command Step"));
        assert_eq!(children[1].detail.as_deref(), Some("Wait"));
        assert_eq!(children[3].detail.as_deref(), Some("Block"));
        assert_eq!(children[3].kind, SymbolKind::EVENT);
    }

    #[test]
    fn invalid_yaml_yields_no_symbols() {
        let content = "steps:\n  - label: \"unterminated\n    command: [";
        assert!(document_symbols(content, &split_lines(content)).is_none());
    }

    #[test]
    fn wait_with_message_is_named() {
        let content = "steps:\n  - wait: \"Ready?\"\n";
        let symbols = symbols_for(content);
        let steps = symbols.iter().find(|s| s.name == "steps (1)").unwrap();
        let children = steps.children.as_ref().unwrap();
        assert_eq!(children[0].name, "Wait: Ready?");
        assert_eq!(children[0].kind, SymbolKind::EVENT);
    }

    #[test]
    fn property_ranges_span_their_blocks() {
        let symbols = symbols_for(PIPELINE);
        let env = symbols.iter().find(|s| s.name == "env").unwrap();
        assert_eq!(env.range.start.line, 0);
        // The block ends on the blank line before "agents:"
        assert_eq!(env.range.end.line, 2);
    }
}
