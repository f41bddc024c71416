//! Diagnostics evaluation
//!
//! Staged pipeline: YAML parse, schema validation, structural checks,
//! plugin configuration checks. Each publish replaces the previous set
//! for the document, so an empty result clears old findings.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::pipeline::Pipeline;
use crate::plugins::{self, PluginRegistry, RegistryError};
use crate::schema::PipelineSchemaClient;

const SOURCE: &str = "buildkite-ls";

pub struct DiagnosticsEvaluator {
    schema_client: Arc<PipelineSchemaClient>,
    registry: Arc<PluginRegistry>,
}

impl DiagnosticsEvaluator {
    pub fn new(schema_client: Arc<PipelineSchemaClient>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            schema_client,
            registry,
        }
    }

    /// The full replacement diagnostic set for a document. The caller is
    /// responsible for the Buildkite-file eligibility gate.
    pub async fn evaluate(&self, content: &str) -> Vec<Diagnostic> {
        let pipeline = match Pipeline::parse(content) {
            Ok(pipeline) => pipeline,
            Err(error) => {
                return vec![diagnostic(
                    point_range(0, 0),
                    DiagnosticSeverity::ERROR,
                    None,
                    format!("YAML parse error: {error}"),
                )];
            }
        };

        match self.schema_client.validate(&pipeline.json_bytes()).await {
            Ok(None) => {}
            Ok(Some(issue)) => {
                let line = pipeline.line_for_error(&issue.message, issue.property.as_deref());
                return vec![diagnostic(
                    Range {
                        start: Position::new(line.saturating_sub(1) as u32, 0),
                        end: Position::new(line.saturating_sub(1) as u32, 999),
                    },
                    DiagnosticSeverity::ERROR,
                    None,
                    format!("Schema validation error: {}", issue.message),
                )];
            }
            Err(error) => {
                debug!(%error, "schema validation unavailable");
                return vec![diagnostic(
                    point_range(0, 0),
                    DiagnosticSeverity::ERROR,
                    None,
                    format!("Schema loading error: {error}"),
                )];
            }
        }

        let mut diagnostics = structural_diagnostics(&pipeline);
        diagnostics.extend(self.plugin_diagnostics(&pipeline).await);
        diagnostics
    }

    /// Plugin configuration validation; one error per failing reference.
    async fn plugin_diagnostics(&self, pipeline: &Pipeline) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let Some(steps) = pipeline.json.get("steps").and_then(JsonValue::as_array) else {
            return diagnostics;
        };

        let lines: Vec<&str> = pipeline.content.split('\n').collect();
        let step_lines = find_step_lines(&lines);

        for (index, step) in steps.iter().enumerate() {
            if !step.is_object() {
                continue;
            }
            let line = step_lines.get(index).copied().unwrap_or(index);

            for (name, config) in plugins::plugin_refs_from_step(step) {
                if let Err(error) = self.registry.validate_config(&name, &config).await {
                    let message = match &error {
                        RegistryError::Config { .. } => error.to_string(),
                        other => format!("Plugin '{name}' configuration error: {other}"),
                    };
                    diagnostics.push(diagnostic(
                        Range {
                            start: Position::new(line as u32, 0),
                            end: Position::new(line as u32 + 2, 0),
                        },
                        DiagnosticSeverity::ERROR,
                        Some("plugin-config-error"),
                        message,
                    ));
                }
            }
        }

        diagnostics
    }
}

/// Structural checks over the JSON projection. Pure and synchronous.
pub fn structural_diagnostics(pipeline: &Pipeline) -> Vec<Diagnostic> {
    let Some(root) = pipeline.json.as_object() else {
        return Vec::new();
    };

    let lines: Vec<&str> = pipeline.content.split('\n').collect();
    let mut diagnostics = Vec::new();

    if !root.contains_key("steps") {
        let line = find_line_for_property("steps", &lines);
        diagnostics.push(diagnostic(
            property_range(line, &lines),
            DiagnosticSeverity::ERROR,
            Some("missing-steps"),
            "Pipeline must contain a 'steps' array".to_string(),
        ));
    }

    if let Some(env) = root.get("env") {
        if !env.is_object() {
            let line = find_line_for_property("env", &lines);
            diagnostics.push(diagnostic(
                property_range(line, &lines),
                DiagnosticSeverity::ERROR,
                Some("invalid-env"),
                "Environment variables must be an object with string keys and values".to_string(),
            ));
        }
    }

    if let Some(steps) = root.get("steps").and_then(JsonValue::as_array) {
        let step_lines = find_step_lines(&lines);

        for (index, step) in steps.iter().enumerate() {
            if !step.is_object() {
                continue;
            }
            let line = step_lines.get(index).copied().unwrap_or(index);
            diagnostics.extend(step_diagnostics(step, line, index + 1));
        }
    }

    diagnostics
}

/// Checks for a single step. `step_number` is 1-based for messages.
fn step_diagnostics(step: &JsonValue, line: usize, step_number: usize) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let line = line as u32;

    let has_command = is_present(step, "command") || is_present(step, "commands");
    // A `wait: ~` line still declares a wait step, so presence of the
    // key counts, not its value.
    let has_wait = step.get("wait").is_some();
    let has_block = is_present(step, "block");
    let has_input = is_present(step, "input");
    let has_trigger = is_present(step, "trigger");
    let has_group = is_present(step, "group");

    let step_type_count = [has_command, has_wait, has_block, has_input, has_trigger, has_group]
        .iter()
        .filter(|present| **present)
        .count();

    let has_plugins = is_present(step, "plugins");

    if step_type_count == 0 {
        if has_plugins {
            diagnostics.push(diagnostic(
                block_range(line, 2),
                DiagnosticSeverity::INFORMATION,
                Some("no-step-type-with-plugins"),
                format!(
                    "Step {step_number} has no explicit step type, but plugins may provide command execution via hooks"
                ),
            ));
        } else {
            diagnostics.push(diagnostic(
                block_range(line, 2),
                DiagnosticSeverity::ERROR,
                Some("missing-step-type"),
                format!(
                    "Step {step_number} must specify a step type: command, wait, block, input, trigger, or group"
                ),
            ));
        }
    } else if step_type_count > 1 {
        diagnostics.push(diagnostic(
            block_range(line, 3),
            DiagnosticSeverity::ERROR,
            Some("multiple-step-types"),
            format!("Step {step_number} has multiple step types - only one is allowed per step"),
        ));
    }

    if has_command {
        if let Some(command) = step.get("command").and_then(JsonValue::as_str) {
            if command.trim().is_empty() {
                if has_plugins {
                    diagnostics.push(diagnostic(
                        value_range(line),
                        DiagnosticSeverity::INFORMATION,
                        Some("empty-command-with-plugins"),
                        "Command is empty, but plugins may provide command execution via hooks"
                            .to_string(),
                    ));
                } else {
                    diagnostics.push(diagnostic(
                        value_range(line),
                        DiagnosticSeverity::WARNING,
                        Some("empty-command"),
                        "Command should not be empty".to_string(),
                    ));
                }
            }
        }

        if is_present(step, "name") && !is_present(step, "label") {
            diagnostics.push(diagnostic(
                block_range(line, 2),
                DiagnosticSeverity::INFORMATION,
                Some("use-label-not-name"),
                "Use 'label' instead of 'name' - 'label' is the standard Buildkite field for step display names"
                    .to_string(),
            ));
        }

        if !is_present(step, "label") && !is_present(step, "name") {
            diagnostics.push(diagnostic(
                Range {
                    start: Position::new(line, 2),
                    end: Position::new(line, 999),
                },
                DiagnosticSeverity::INFORMATION,
                Some("missing-label"),
                "Consider adding a 'label' to make this step easier to identify in the UI"
                    .to_string(),
            ));
        }
    }

    if has_wait {
        let wait = step.get("wait").unwrap_or(&JsonValue::Null);
        if !wait.is_null() && !wait.is_string() && !wait.is_number() {
            diagnostics.push(diagnostic(
                value_range(line),
                DiagnosticSeverity::ERROR,
                Some("invalid-wait-value"),
                format!(
                    "Wait value must be null, a string message, or a number of seconds, got {}",
                    json_type_name(wait)
                ),
            ));
        }
    }

    if has_block && !is_non_empty_string(step.get("block")) {
        diagnostics.push(diagnostic(
            value_range(line),
            DiagnosticSeverity::ERROR,
            Some("empty-block-message"),
            "Block step must have a non-empty message".to_string(),
        ));
    }

    if has_trigger && !is_non_empty_string(step.get("trigger")) {
        diagnostics.push(diagnostic(
            value_range(line),
            DiagnosticSeverity::ERROR,
            Some("empty-trigger-pipeline"),
            "Trigger step must specify a pipeline slug".to_string(),
        ));
    }

    if has_input && !is_non_empty_string(step.get("input")) {
        diagnostics.push(diagnostic(
            value_range(line),
            DiagnosticSeverity::ERROR,
            Some("empty-input-prompt"),
            "Input step must have a non-empty prompt message".to_string(),
        ));
    }

    diagnostics
}

fn is_present(step: &JsonValue, key: &str) -> bool {
    step.get(key).is_some_and(|value| !value.is_null())
}

fn is_non_empty_string(value: Option<&JsonValue>) -> bool {
    value
        .and_then(JsonValue::as_str)
        .is_some_and(|text| !text.trim().is_empty())
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Line of a top-level `property:` key; the last line when absent.
fn find_line_for_property(property: &str, lines: &[&str]) -> usize {
    let needle = format!("{property}:");
    for (i, line) in lines.iter().enumerate() {
        if line.trim() == needle {
            return i;
        }
    }
    lines.len().saturating_sub(1)
}

/// Start lines of the list items at indent 2 under `steps:`.
fn find_step_lines(lines: &[&str]) -> Vec<usize> {
    let mut step_lines = Vec::new();
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

        if in_steps && line.trim_start().starts_with("- ") {
            let leading_spaces = line.len() - line.trim_start_matches(' ').len();
            if leading_spaces == 2 {
                step_lines.push(i);
            }
        }
    }

    step_lines
}

fn diagnostic(
    range: Range,
    severity: DiagnosticSeverity,
    code: Option<&str>,
    message: String,
) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(severity),
        code: code.map(|code| NumberOrString::String(code.to_string())),
        source: Some(SOURCE.to_string()),
        message,
        ..Default::default()
    }
}

fn point_range(line: u32, character: u32) -> Range {
    Range {
        start: Position::new(line, character),
        end: Position::new(line, character),
    }
}

fn property_range(line: usize, lines: &[&str]) -> Range {
    let len = lines.get(line).map_or(0, |l| l.len());
    Range {
        start: Position::new(line as u32, 0),
        end: Position::new(line as u32, len as u32),
    }
}

/// Step-scoped problems anchor at the step header.
fn block_range(line: u32, span: u32) -> Range {
    Range {
        start: Position::new(line, 2),
        end: Position::new(line + span, 0),
    }
}

/// Value problems anchor just below the step header.
fn value_range(line: u32) -> Range {
    Range {
        start: Position::new(line + 1, 4),
        end: Position::new(line + 1, 999),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics
            .iter()
            .filter_map(|d| match &d.code {
                Some(NumberOrString::String(code)) => Some(code.clone()),
                _ => None,
            })
            .collect()
    }

    fn check(content: &str) -> Vec<Diagnostic> {
        structural_diagnostics(&Pipeline::parse(content).unwrap())
    }

    #[test]
    fn missing_steps_is_an_error() {
        let diagnostics = check("env:\n  NODE_ENV: production\n");

        assert_eq!(codes(&diagnostics), vec!["missing-steps"]);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(diagnostics[0].source.as_deref(), Some(SOURCE));
    }

    #[test]
    fn non_object_env_is_an_error() {
        let diagnostics = check("env: \"not an object\"\nsteps:\n  - command: \"test\"\n");

        let codes = codes(&diagnostics);
        assert!(codes.contains(&"invalid-env".to_string()));
        assert!(codes.contains(&"missing-label".to_string()));
    }

    #[test]
    fn step_without_type_is_an_error() {
        let diagnostics = check("steps:\n  - label: \"No Command\"\n");

        assert_eq!(codes(&diagnostics), vec!["missing-step-type"]);
        assert!(diagnostics[0].message.contains("Step 1"));
    }

    #[test]
    fn multiple_step_types_are_an_error() {
        let diagnostics = check("steps:\n  - command: \"test\"\n    wait: ~\n");

        let codes = codes(&diagnostics);
        assert_eq!(codes, vec!["multiple-step-types", "missing-label"]);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            diagnostics[1].severity,
            Some(DiagnosticSeverity::INFORMATION)
        );
    }

    #[test]
    fn empty_command_is_a_warning() {
        let diagnostics = check("steps:\n  - label: \"Build\"\n    command: \"\"\n");

        assert_eq!(codes(&diagnostics), vec!["empty-command"]);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
    }

    #[test]
    fn empty_command_with_plugins_downgrades_to_information() {
        let diagnostics = check(
            "steps:\n  - label: \"Build with plugin\"\n    command: \"\"\n    plugins:\n      - docker#v5.13.0:\n          image: \"golang:1.19\"\n",
        );

        assert_eq!(codes(&diagnostics), vec!["empty-command-with-plugins"]);
        assert_eq!(
            diagnostics[0].severity,
            Some(DiagnosticSeverity::INFORMATION)
        );
    }

    #[test]
    fn typeless_step_with_plugins_is_informational() {
        let diagnostics = check(
            "steps:\n  - label: \"Build with plugin\"\n    plugins:\n      - docker#v5.13.0:\n          image: \"golang:1.19\"\n",
        );

        assert_eq!(codes(&diagnostics), vec!["no-step-type-with-plugins"]);
    }

    #[test]
    fn name_instead_of_label_is_flagged() {
        let diagnostics = check("steps:\n  - name: \"Build App\"\n    command: \"make build\"\n");

        assert_eq!(codes(&diagnostics), vec!["use-label-not-name"]);
    }

    #[test]
    fn boolean_wait_value_is_an_error() {
        let diagnostics = check("steps:\n  - wait: true\n");

        assert_eq!(codes(&diagnostics), vec!["invalid-wait-value"]);
        assert!(diagnostics[0].message.ends_with("got bool"));
    }

    #[test]
    fn wait_variations_are_valid() {
        let diagnostics =
            check("steps:\n  - wait: ~\n  - wait: \"Waiting for deployment\"\n  - wait: 30\n");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn empty_block_trigger_input_are_errors() {
        assert_eq!(codes(&check("steps:\n  - block: \"\"\n")), vec!["empty-block-message"]);
        assert_eq!(
            codes(&check("steps:\n  - trigger: \"\"\n")),
            vec!["empty-trigger-pipeline"]
        );
        assert_eq!(codes(&check("steps:\n  - input: \"\"\n")), vec!["empty-input-prompt"]);
    }

    #[test]
    fn well_formed_pipeline_is_clean() {
        let content = r#"env:
  NODE_ENV: production

steps:
  - label: "Build"
    command: "make build"

  - wait: ~

  - label: "Test"
    command: "make test"

  - block: "Deploy to production?"

  - input: "Release version"
    fields:
      - text: "version"

  - trigger: "deploy-pipeline"
"#;
        assert!(check(content).is_empty());
    }

    #[test]
    fn step_diagnostics_anchor_at_step_lines() {
        let content = "steps:\n  - label: \"Build\"\n    command: \"make build\"\n\n  - wait: true\n";
        let diagnostics = check(content);

        assert_eq!(codes(&diagnostics), vec!["invalid-wait-value"]);
        // The second step starts on line 4; value problems anchor one
        // line below the header.
        assert_eq!(diagnostics[0].range.start.line, 5);
    }

    #[tokio::test]
    async fn parse_failure_yields_a_single_error_and_stops() {
        let evaluator = DiagnosticsEvaluator::new(
            Arc::new(PipelineSchemaClient::new()),
            Arc::new(PluginRegistry::new()),
        );

        let diagnostics = evaluator
            .evaluate("steps:\n  - label: \"unterminated\n    command: [")
            .await;

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
        assert!(diagnostics[0].message.starts_with("YAML parse error:"));
        assert_eq!(diagnostics[0].range.start, Position::new(0, 0));
        assert!(diagnostics[0].code.is_none());
    }

    #[test]
    fn find_step_lines_matches_indent_two_items() {
        let lines: Vec<&str> = vec![
            "steps:",
            "  - label: \"Build\"",
            "    command: \"make build\"",
            "  ",
            "  - wait: ~",
            "  ",
            "  - trigger: \"deploy\"",
            "    build:",
            "      message: \"Deploy\"",
        ];
        assert_eq!(find_step_lines(&lines), vec![1, 4, 6]);
    }

    #[test]
    fn find_line_for_property_falls_back_to_last_line() {
        let lines: Vec<&str> = vec!["env:", "  NODE_ENV: production", "", "steps:", "  - command: test"];
        assert_eq!(find_line_for_property("env", &lines), 0);
        assert_eq!(find_line_for_property("steps", &lines), 3);
        assert_eq!(find_line_for_property("agents", &lines), 4);
    }
}
