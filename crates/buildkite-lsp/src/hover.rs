//! Hover documentation

use std::sync::Arc;

use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::catalog;
use crate::context::{ContextAnalyzer, ContextInfo};
use crate::document::PositionContext;
use crate::plugins::PluginRegistry;

/// Provides Markdown hover content for properties and plugin references.
pub struct HoverProvider {
    registry: Arc<PluginRegistry>,
    analyzer: ContextAnalyzer,
}

impl HoverProvider {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            analyzer: ContextAnalyzer::new(),
        }
    }

    /// Hover content at the position, or `None` when there is nothing
    /// useful to say.
    pub async fn hover(&self, pos_ctx: &PositionContext) -> Option<Hover> {
        let info = self.analyzer.analyze(Some(pos_ctx));

        let word = extract_word_at_position(&pos_ctx.current_line, pos_ctx.char_index)?;

        let content = if word.contains('#') && info.is_in_plugins_array() {
            self.plugin_hover(&word).await
        } else {
            property_hover(&word, &info)
        };

        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: content,
            }),
            range: None,
        })
    }

    async fn plugin_hover(&self, plugin_name: &str) -> String {
        let schema = match self.registry.get(plugin_name).await {
            Ok(schema) => schema,
            Err(error) => {
                debug!(plugin = plugin_name, %error, "plugin hover fetch failed");
                return format!("Plugin: {plugin_name}\n\nUnable to load plugin information.");
            }
        };

        let mut content = format!("# {} Plugin\n\n{}\n\n", schema.name, schema.description);

        if !schema.author.is_empty() {
            content.push_str(&format!("**Author**: {}\n\n", schema.author));
        }

        if !schema.requirements.is_empty() {
            content.push_str("**Requirements**:\n");
            for requirement in &schema.requirements {
                content.push_str(&format!("- {requirement}\n"));
            }
            content.push('\n');
        }

        if schema.configuration.is_some() {
            content.push_str("**Configuration Options**: Available via schema validation\n\n");
        }

        content.push_str("[Plugin Documentation](https://buildkite.com/plugins)");
        content
    }
}

fn property_hover(property: &str, info: &ContextInfo) -> String {
    if let Some(doc) = catalog::property_documentation(property) {
        return doc.to_string();
    }

    let role = if info.is_at_top_level() {
        "pipeline-level"
    } else if info.is_in_step_context() {
        "step-level"
    } else if info.is_in_plugins_array() {
        "plugin"
    } else {
        "unknown"
    };

    format!(
        "**{property}** - {role} property\n\nNo specific documentation available for this property.\n\n[Buildkite Documentation](https://buildkite.com/docs)"
    )
}

/// The word under the cursor, expanded over alphanumerics and `_ - . @ #`,
/// with a trailing `:` stripped. This boundary set intentionally differs
/// from the one used for definitions.
pub fn extract_word_at_position(line: &str, char_index: usize) -> Option<String> {
    let bytes = line.as_bytes();
    if char_index >= bytes.len() {
        return None;
    }

    let is_word_byte = |b: u8| {
        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'@' | b'#')
    };

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

    let word = line[start..end].trim_end_matches(':');
    if word.is_empty() {
        None
    } else {
        Some(word.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKind;

    #[test]
    fn extracts_plugin_references() {
        let line = "      - docker#v5.13.0:";
        assert_eq!(
            extract_word_at_position(line, 10),
            Some("docker#v5.13.0".to_string())
        );
    }

    #[test]
    fn extracts_keys_without_trailing_colon() {
        assert_eq!(
            extract_word_at_position("    command: \"echo\"", 6),
            Some("command".to_string())
        );
    }

    #[test]
    fn out_of_bounds_yields_nothing() {
        assert!(extract_word_at_position("steps:", 40).is_none());
        assert!(extract_word_at_position("", 0).is_none());
    }

    #[test]
    fn word_set_includes_dots_and_at() {
        assert_eq!(
            extract_word_at_position("image: node@sha256.abc", 10),
            Some("node@sha256.abc".to_string())
        );
    }

    #[test]
    fn known_property_hover_is_documented() {
        let info = ContextInfo {
            kind: ContextKind::Step,
            indent_level: 4,
            in_array: false,
            array_context: None,
            parent_keys: vec!["steps".into()],
            plugin_name: None,
        };
        let content = property_hover("command", &info);
        assert!(content.starts_with("**command**"));
    }

    #[tokio::test]
    async fn plugin_reference_hover_renders_schema_details() {
        use crate::plugins::{PluginRegistry, PluginSchema};
        use std::time::Duration;

        let registry = Arc::new(PluginRegistry::new());
        registry
            .seed(
                "docker#v5.13.0",
                PluginSchema {
                    name: "docker".to_string(),
                    description: "Run build steps in Docker containers".to_string(),
                    author: "Buildkite".to_string(),
                    requirements: vec!["docker".to_string()],
                    configuration: Some(serde_json::json!({"properties": {}})),
                },
                Duration::from_secs(60),
            )
            .await;

        let provider = HoverProvider::new(registry);
        let pos_ctx = PositionContext {
            uri: Url::parse("file:///p/.buildkite/pipeline.yml").unwrap(),
            position: Position::new(4, 10),
            current_line: "      - docker#v5.13.0:".to_string(),
            char_index: 10,
            context_lines: vec![
                "steps:".to_string(),
                "  - label: \"test\"".to_string(),
                "    command: \"echo\"".to_string(),
                "    plugins:".to_string(),
                "      - docker#v5.13.0:".to_string(),
            ],
            full_text: String::new(),
        };

        let hover = provider.hover(&pos_ctx).await.unwrap();
        let HoverContents::Markup(markup) = hover.contents else {
            panic!("expected markup hover");
        };
        assert!(markup.value.starts_with("# docker Plugin"));
        assert!(markup.value.contains("**Author**: Buildkite"));
        assert!(markup.value.contains("**Requirements**:"));
        assert!(markup.value.contains("Configuration Options"));
    }

    #[test]
    fn unknown_property_hover_names_the_role() {
        let info = ContextInfo {
            kind: ContextKind::TopLevel,
            indent_level: 0,
            in_array: false,
            array_context: None,
            parent_keys: vec![],
            plugin_name: None,
        };
        let content = property_hover("mystery", &info);
        assert!(content.contains("**mystery** - pipeline-level property"));
    }
}
