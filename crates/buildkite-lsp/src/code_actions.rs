//! Code actions: quick fixes and refactorings over the step under the
//! requested range.

use std::collections::HashMap;

use tower_lsp::lsp_types::*;

use crate::context::indent_width;

/// What a scan of the enclosing step found.
#[derive(Debug, Default, Clone)]
pub struct StepInfo {
    pub start_line: usize,
    pub end_line: usize,
    pub is_command_step: bool,
    pub has_label: bool,
    pub has_key: bool,
    pub has_name: bool,
    pub has_step_type: bool,
    pub has_empty_command: bool,
    pub has_single_command: bool,
    pub label_line: usize,
    pub command_line: usize,
    pub name_line: usize,
}

/// Code actions for the step containing the range. Quick fixes come
/// before refactorings.
pub fn code_actions(uri: &Url, range: Range, lines: &[String]) -> Vec<CodeActionOrCommand> {
    let Some(info) = analyze_step_at_range(range, lines) else {
        return Vec::new();
    };

    let mut actions = Vec::new();

    if info.has_name && !info.has_label {
        actions.push(convert_name_to_label(uri, &info, lines));
    }

    if !info.has_label && !info.has_name && info.is_command_step {
        actions.push(add_label(uri, &info));
    }

    if !info.has_key && (info.has_label || info.has_name) {
        actions.push(add_key(uri, &info));
    }

    if info.is_command_step && info.has_empty_command {
        actions.push(fix_empty_command(uri, &info));
    }

    if !info.has_step_type {
        actions.push(add_step_type(uri, &info));
    }

    if info.is_command_step && info.has_single_command {
        actions.push(convert_to_commands_array(uri, &info));
    }

    if info.is_command_step {
        actions.push(extract_step(&info));
    }

    actions
}

/// Locate the step containing the range start and scan its properties.
pub fn analyze_step_at_range(range: Range, lines: &[String]) -> Option<StepInfo> {
    let start_line = range.start.line as usize;
    if start_line >= lines.len() {
        return None;
    }

    let step_start = find_step_start(start_line, lines)?;

    let mut step_end = lines.len() - 1;
    for (i, line) in lines.iter().enumerate().skip(step_start + 1) {
        if is_step_item(line) || is_top_level(line) {
            step_end = i - 1;
            break;
        }
    }

    let mut info = StepInfo {
        start_line: step_start,
        end_line: step_end,
        ..StepInfo::default()
    };

    for (i, line) in lines[step_start..=step_end].iter().enumerate() {
        let line_index = step_start + i;
        let trimmed = line.trim().trim_start_matches("- ");

        if trimmed.starts_with("label:") {
            info.has_label = true;
            info.label_line = line_index;
        }
        if trimmed.starts_with("name:") {
            info.has_name = true;
            info.name_line = line_index;
        }
        if trimmed.starts_with("key:") {
            info.has_key = true;
        }

        if trimmed.starts_with("command:") || trimmed.starts_with("commands:") {
            info.is_command_step = true;
            info.has_step_type = true;
            info.command_line = line_index;

            if let Some(value) = trimmed.strip_prefix("command:") {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                if value.is_empty() {
                    info.has_empty_command = true;
                } else {
                    info.has_single_command = true;
                }
            }
        }

        for step_type in ["wait:", "block:", "input:", "trigger:", "group:"] {
            if trimmed.starts_with(step_type) {
                info.has_step_type = true;
            }
        }
    }

    Some(info)
}

fn find_step_start(from_line: usize, lines: &[String]) -> Option<usize> {
    for i in (0..=from_line).rev() {
        if is_step_item(&lines[i]) {
            return under_steps(i, lines).then_some(i);
        }
        // A top-level key before any step item means the range is
        // outside the steps section.
        if is_top_level(&lines[i]) {
            return None;
        }
    }

    None
}

fn under_steps(step_line: usize, lines: &[String]) -> bool {
    for i in (0..step_line).rev() {
        let trimmed = lines[i].trim();
        if trimmed == "steps:" {
            return true;
        }
        if is_top_level(&lines[i]) {
            return false;
        }
    }
    false
}

fn is_step_item(line: &str) -> bool {
    line.trim_start().starts_with("- ") && indent_width(line) == 2
}

fn is_top_level(line: &str) -> bool {
    !line.trim().is_empty() && !line.starts_with(' ') && !line.starts_with('\t')
}

fn quick_fix(title: &str, uri: &Url, edits: Vec<TextEdit>) -> CodeActionOrCommand {
    action(title, CodeActionKind::QUICKFIX, uri, edits)
}

fn action(
    title: &str,
    kind: CodeActionKind,
    uri: &Url,
    edits: Vec<TextEdit>,
) -> CodeActionOrCommand {
    let mut changes = HashMap::new();
    changes.insert(uri.clone(), edits);

    CodeActionOrCommand::CodeAction(CodeAction {
        title: title.to_string(),
        kind: Some(kind),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn replace_line(line: usize, len: usize, new_text: String) -> TextEdit {
    TextEdit {
        range: Range {
            start: Position::new(line as u32, 0),
            end: Position::new(line as u32, len as u32),
        },
        new_text,
    }
}

fn insert_at_line(line: usize, new_text: String) -> TextEdit {
    TextEdit {
        range: Range {
            start: Position::new(line as u32, 0),
            end: Position::new(line as u32, 0),
        },
        new_text,
    }
}

fn convert_name_to_label(uri: &Url, info: &StepInfo, lines: &[String]) -> CodeActionOrCommand {
    let original = &lines[info.name_line];
    let new_line = original.replacen("name:", "label:", 1);

    quick_fix(
        "Convert 'name' to 'label'",
        uri,
        vec![replace_line(info.name_line, original.len(), new_line)],
    )
}

fn add_label(uri: &Url, info: &StepInfo) -> CodeActionOrCommand {
    let suggested = format!("Step {}", info.start_line);
    quick_fix(
        "Add label to step",
        uri,
        vec![insert_at_line(
            info.start_line + 1,
            format!("    label: \"{suggested}\"\n"),
        )],
    )
}

fn add_key(uri: &Url, info: &StepInfo) -> CodeActionOrCommand {
    let suggested = format!("step-{}", info.start_line);
    let insert_after = if info.has_label {
        info.label_line
    } else {
        info.name_line
    };

    quick_fix(
        "Add key to step",
        uri,
        vec![insert_at_line(
            insert_after + 1,
            format!("    key: \"{suggested}\"\n"),
        )],
    )
}

fn fix_empty_command(uri: &Url, info: &StepInfo) -> CodeActionOrCommand {
    quick_fix(
        "Fix empty command",
        uri,
        vec![TextEdit {
            range: Range {
                start: Position::new(info.command_line as u32, 0),
                end: Position::new(info.command_line as u32 + 1, 0),
            },
            new_text: "    command: \"echo 'TODO: Add command'\"\n".to_string(),
        }],
    )
}

fn add_step_type(uri: &Url, info: &StepInfo) -> CodeActionOrCommand {
    quick_fix(
        "Add command to step",
        uri,
        vec![insert_at_line(
            info.start_line + 1,
            "    command: \"echo 'TODO: Add command'\"\n".to_string(),
        )],
    )
}

fn convert_to_commands_array(uri: &Url, info: &StepInfo) -> CodeActionOrCommand {
    let new_text = "    commands:\n      - \"echo 'TODO: Add first command'\"\n      - \"echo 'TODO: Add second command'\"\n";

    action(
        "Convert to commands array",
        CodeActionKind::REFACTOR_REWRITE,
        uri,
        vec![TextEdit {
            range: Range {
                start: Position::new(info.command_line as u32, 0),
                end: Position::new(info.command_line as u32 + 1, 0),
            },
            new_text: new_text.to_string(),
        }],
    )
}

/// Scaffold only: the full extraction flow needs user input for the new
/// step's name and dependencies.
fn extract_step(_info: &StepInfo) -> CodeActionOrCommand {
    CodeActionOrCommand::CodeAction(CodeAction {
        title: "Extract to separate step".to_string(),
        kind: Some(CodeActionKind::REFACTOR),
        ..Default::default()
    })
}
