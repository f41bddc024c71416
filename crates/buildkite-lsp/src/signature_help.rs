//! Signature help for step types and plugin configuration

use std::sync::Arc;

use tower_lsp::lsp_types::*;

use crate::catalog::{self, SignatureSpec};
use crate::context::{indent_width, ContextAnalyzer, ContextKind};
use crate::document::PositionContext;
use crate::plugins::PluginRegistry;

pub struct SignatureHelpProvider {
    registry: Arc<PluginRegistry>,
    analyzer: ContextAnalyzer,
}

impl SignatureHelpProvider {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            analyzer: ContextAnalyzer::new(),
        }
    }

    /// Signature help at the position: a plugin-configuration signature
    /// when the cursor sits in a plugin block, otherwise the signature
    /// of the enclosing step's type.
    pub async fn signature_help(&self, pos_ctx: &PositionContext) -> Option<SignatureHelp> {
        let info = self.analyzer.analyze(Some(pos_ctx));

        let signatures = if info.kind == ContextKind::PluginConfig {
            let plugin_name = info.plugin_name.as_deref()?;
            vec![self.plugin_signature(plugin_name).await?]
        } else if in_step_body(pos_ctx) {
            let step_type = detect_step_type(pos_ctx)?;
            let spec = catalog::step_signature(&step_type)?;
            vec![signature_from_spec(spec)]
        } else {
            return None;
        };

        Some(SignatureHelp {
            signatures,
            active_signature: Some(0),
            active_parameter: Some(0),
        })
    }

    async fn plugin_signature(&self, plugin_name: &str) -> Option<SignatureInformation> {
        // The signature is generic; resolving the schema only confirms
        // the reference denotes a real plugin.
        self.registry.get(plugin_name).await.ok()?;

        Some(SignatureInformation {
            label: format!("{plugin_name} plugin configuration"),
            documentation: Some(Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format!("Configuration options for the **{plugin_name}** plugin"),
            })),
            parameters: Some(vec![ParameterInformation {
                label: ParameterLabel::Simple("configuration".to_string()),
                documentation: Some(Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: "Plugin configuration object".to_string(),
                })),
            }]),
            active_parameter: None,
        })
    }
}

fn signature_from_spec(spec: &SignatureSpec) -> SignatureInformation {
    SignatureInformation {
        label: spec.label.to_string(),
        documentation: Some(Documentation::MarkupContent(MarkupContent {
            kind: MarkupKind::Markdown,
            value: spec.doc.to_string(),
        })),
        parameters: Some(
            spec.params
                .iter()
                .map(|param| ParameterInformation {
                    label: ParameterLabel::Simple(param.label.to_string()),
                    documentation: Some(Documentation::MarkupContent(MarkupContent {
                        kind: MarkupKind::Markdown,
                        value: param.doc.to_string(),
                    })),
                })
                .collect(),
        ),
        active_parameter: None,
    }
}

/// Walk back from the cursor looking for a step list item at indent 2;
/// a top-level key before one means the cursor is outside any step.
fn in_step_body(pos_ctx: &PositionContext) -> bool {
    for line in pos_ctx.context_lines.iter().rev() {
        if is_step_item(line) {
            return true;
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() && !line.starts_with(' ') && !line.starts_with('\t') {
            return false;
        }
    }

    false
}

/// Find the type of the step enclosing the cursor by scanning the step's
/// lines for the first step-type keyword.
fn detect_step_type(pos_ctx: &PositionContext) -> Option<String> {
    let lines = &pos_ctx.context_lines;
    let all_lines: Vec<&str> = pos_ctx.full_text.split('\n').collect();

    let step_start = lines.iter().rposition(|line| is_step_item(line))?;

    for (offset, line) in all_lines.iter().enumerate().skip(step_start) {
        if offset > step_start
            && (is_step_item(line)
                || (!line.trim().is_empty() && !line.starts_with(' ') && !line.starts_with('\t')))
        {
            break;
        }

        let trimmed = line.trim();
        for step_type in ["command", "commands", "wait", "block", "input", "trigger", "group"] {
            if trimmed.contains(&format!("{step_type}:")) {
                if step_type == "commands" {
                    return Some("command".to_string());
                }
                return Some(step_type.to_string());
            }
        }
    }

    None
}

fn is_step_item(line: &str) -> bool {
    line.trim_start().starts_with("- ") && indent_width(line) == 2
}
