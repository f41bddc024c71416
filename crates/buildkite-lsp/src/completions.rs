//! Context-aware completion

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::catalog::{self, ItemKind, PropertySpec};
use crate::context::{ContextAnalyzer, ContextInfo, ContextKind};
use crate::document::PositionContext;
use crate::plugins::PluginRegistry;

/// Handles context-aware completion.
pub struct CompletionProvider {
    registry: Arc<PluginRegistry>,
    analyzer: ContextAnalyzer,
}

impl CompletionProvider {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            analyzer: ContextAnalyzer::new(),
        }
    }

    /// Completions for the given position, routed by context kind.
    pub async fn completions(&self, pos_ctx: &PositionContext) -> Vec<CompletionItem> {
        let info = self.analyzer.analyze(Some(pos_ctx));

        debug!(
            kind = ?info.kind,
            plugin = info.plugin_name.as_deref().unwrap_or(""),
            indent = info.indent_level,
            "completion context"
        );

        match info.kind {
            ContextKind::TopLevel => property_items(catalog::TOP_LEVEL_PROPERTIES),
            ContextKind::Step => property_items(catalog::STEP_PROPERTIES),
            ContextKind::Plugins => self.plugin_items(pos_ctx, &info),
            ContextKind::PluginConfig => self.plugin_config_items(&info).await,
            ContextKind::Unknown => {
                // No usable context: offer everything rather than nothing.
                let mut items = property_items(catalog::TOP_LEVEL_PROPERTIES);
                items.extend(property_items(catalog::STEP_PROPERTIES));
                items
            }
        }
    }

    /// Popular plugin references, filterable by bare plugin name.
    fn plugin_items(&self, pos_ctx: &PositionContext, info: &ContextInfo) -> Vec<CompletionItem> {
        let mut items = Vec::new();

        if needs_list_item(pos_ctx, info) {
            items.push(CompletionItem {
                label: "- (add plugin)".to_string(),
                kind: Some(CompletionItemKind::SNIPPET),
                detail: Some("Add a plugin to the list".to_string()),
                documentation: Some(markdown("Insert a list item for adding a plugin")),
                insert_text: Some(
                    "- ${1:plugin-name}#${2:version}:\n    ${3:config}: \"${4:value}\"".to_string(),
                ),
                insert_text_format: Some(InsertTextFormat::SNIPPET),
                sort_text: Some("00-list-item".to_string()),
                ..Default::default()
            });
        }

        for plugin in catalog::POPULAR_PLUGINS {
            let full_name = format!("{}#{}", plugin.name, plugin.version);
            let insert_text = format!(
                "{}:\n    {}",
                full_name,
                catalog::plugin_config_snippet(plugin.name)
            );

            items.push(CompletionItem {
                label: full_name,
                kind: Some(CompletionItemKind::MODULE),
                detail: Some(plugin.description.to_string()),
                documentation: Some(markdown(&format!(
                    "**{} Plugin**\n\n{}\n\n[Plugin Directory](https://buildkite.com/plugins)",
                    plugin.name, plugin.description
                ))),
                insert_text: Some(insert_text),
                insert_text_format: Some(InsertTextFormat::SNIPPET),
                // Lets "dock" match "docker#v5.13.0"
                filter_text: Some(plugin.name.to_string()),
                sort_text: Some(format!("{:02}-{}", plugin.name.len(), plugin.name)),
                ..Default::default()
            });
        }

        items
    }

    /// Schema-driven completions for a plugin's configuration block.
    async fn plugin_config_items(&self, info: &ContextInfo) -> Vec<CompletionItem> {
        let Some(plugin_name) = info.plugin_name.as_deref() else {
            return generic_plugin_config_items();
        };

        let schema = match self.registry.get(plugin_name).await {
            Ok(schema) => schema,
            Err(error) => {
                debug!(plugin = plugin_name, %error, "plugin schema unavailable");
                return generic_plugin_config_items();
            }
        };

        let Some(configuration) = &schema.configuration else {
            return generic_plugin_config_items();
        };

        let Some(properties) = configuration.get("properties").and_then(JsonValue::as_object)
        else {
            return generic_plugin_config_items();
        };

        let mut items: Vec<CompletionItem> = properties
            .iter()
            .map(|(name, definition)| property_item_from_schema(name, definition, plugin_name))
            .collect();

        if items.is_empty() {
            return generic_plugin_config_items();
        }

        items.sort_by(|a, b| a.label.cmp(&b.label));
        items
    }
}

fn markdown(value: &str) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value: value.to_string(),
    })
}

fn property_items(specs: &[PropertySpec]) -> Vec<CompletionItem> {
    specs
        .iter()
        .map(|spec| CompletionItem {
            label: spec.name.to_string(),
            kind: Some(match spec.kind {
                ItemKind::Property => CompletionItemKind::PROPERTY,
                ItemKind::Keyword => CompletionItemKind::KEYWORD,
            }),
            detail: Some(spec.detail.to_string()),
            documentation: Some(markdown(spec.doc)),
            insert_text: spec.snippet.map(str::to_string),
            insert_text_format: spec.snippet.map(|_| InsertTextFormat::SNIPPET),
            ..Default::default()
        })
        .collect()
}

/// A blank line in a plugins list still needs its `- ` marker; offer it
/// first.
fn needs_list_item(pos_ctx: &PositionContext, info: &ContextInfo) -> bool {
    let trimmed = pos_ctx.current_line.trim();

    if trimmed.starts_with('-') {
        return false;
    }

    trimmed.is_empty() && info.kind == ContextKind::Plugins
}

fn generic_plugin_config_items() -> Vec<CompletionItem> {
    vec![CompletionItem {
        label: "enabled".to_string(),
        kind: Some(CompletionItemKind::PROPERTY),
        detail: Some("Enable/disable plugin".to_string()),
        documentation: Some(markdown("Whether this plugin should be enabled")),
        insert_text: Some("enabled: ${1|true,false|}".to_string()),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        ..Default::default()
    }]
}

fn property_item_from_schema(
    name: &str,
    definition: &JsonValue,
    plugin_name: &str,
) -> CompletionItem {
    let mut item = CompletionItem {
        label: name.to_string(),
        kind: Some(CompletionItemKind::PROPERTY),
        ..Default::default()
    };

    if let Some(description) = definition.get("description").and_then(JsonValue::as_str) {
        item.detail = Some(description.to_string());
        item.documentation = Some(markdown(&format!(
            "**{plugin_name} Plugin - {name}**\n\n{description}"
        )));
    }

    item.insert_text = Some(snippet_for_schema_property(name, definition));
    item.insert_text_format = Some(InsertTextFormat::SNIPPET);

    item
}

/// Shape the inserted text after the declared property type.
fn snippet_for_schema_property(name: &str, definition: &JsonValue) -> String {
    if let Some(options) = definition.get("enum").and_then(JsonValue::as_array) {
        let choices: Vec<String> = options
            .iter()
            .filter_map(JsonValue::as_str)
            .map(|option| format!("\"{option}\""))
            .collect();
        if !choices.is_empty() {
            return format!("{name}: ${{1|{}|}}", choices.join(","));
        }
    }

    match definition.get("type").and_then(JsonValue::as_str) {
        Some("string") => match definition.get("default").and_then(JsonValue::as_str) {
            Some(default) => format!("{name}: \"${{1:{default}}}\""),
            None => format!("{name}: \"${{1}}\""),
        },
        Some("boolean") => format!("{name}: ${{1|true,false|}}"),
        Some("integer") | Some("number") => {
            match definition.get("default").and_then(JsonValue::as_f64) {
                Some(default) => format!("{name}: ${{1:{}}}", default.round() as i64),
                None => format!("{name}: ${{1:0}}"),
            }
        }
        Some("array") => format!("{name}:\n  - \"${{1}}\""),
        Some("object") => format!("{name}:\n  ${{1:key}}: \"${{2:value}}\""),
        Some(_) => format!("{name}: ${{1}}"),
        None => format!("{name}: \"${{1}}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn position_context(lines: &[&str]) -> PositionContext {
        let current = lines.last().copied().unwrap_or_default();
        PositionContext {
            uri: Url::parse("file:///p/.buildkite/pipeline.yml").unwrap(),
            position: Position::new(lines.len().saturating_sub(1) as u32, current.len() as u32),
            current_line: current.to_string(),
            char_index: current.len(),
            context_lines: lines.iter().map(|s| s.to_string()).collect(),
            full_text: lines.join("\n"),
        }
    }

    fn provider() -> CompletionProvider {
        CompletionProvider::new(Arc::new(PluginRegistry::new()))
    }

    #[tokio::test]
    async fn top_level_completions_have_no_plugin_labels() {
        let pos = position_context(&["steps:", ""]);
        let items = provider().completions(&pos).await;

        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        for expected in ["steps", "env", "agents", "timeout_in_minutes"] {
            assert!(labels.contains(&expected), "missing {expected}");
        }
        assert!(labels.iter().all(|label| !label.contains('#')));
    }

    #[tokio::test]
    async fn step_completions_have_no_plugin_labels() {
        let pos = position_context(&["steps:", "  - label: \"test\"", "    "]);
        let items = provider().completions(&pos).await;

        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        for expected in ["label", "command", "plugins", "depends_on", "retry"] {
            assert!(labels.contains(&expected), "missing {expected}");
        }
        assert!(labels.iter().all(|label| !label.contains('#')));
    }

    #[tokio::test]
    async fn plugins_context_offers_popular_plugins() {
        let pos = position_context(&[
            "steps:",
            "  - label: \"test\"",
            "    command: \"echo\"",
            "    plugins:",
            "      - ",
        ]);
        let items = provider().completions(&pos).await;

        assert!(!items.is_empty());
        assert!(items.iter().all(|item| item.label.contains('#')));

        for prefix in ["docker#", "cache#", "docker-compose#"] {
            assert!(
                items.iter().any(|item| item.label.starts_with(prefix)),
                "missing {prefix}"
            );
        }

        let docker = items
            .iter()
            .find(|item| item.label.starts_with("docker#"))
            .unwrap();
        assert_eq!(docker.filter_text.as_deref(), Some("docker"));
        assert_eq!(docker.sort_text.as_deref(), Some("06-docker"));
        assert_eq!(docker.kind, Some(CompletionItemKind::MODULE));
    }

    #[tokio::test]
    async fn blank_plugins_line_gets_a_list_item_helper() {
        let pos = position_context(&[
            "steps:",
            "  - label: \"test\"",
            "    plugins:",
            "      ",
        ]);
        let items = provider().completions(&pos).await;

        assert_eq!(items[0].sort_text.as_deref(), Some("00-list-item"));
        // The helper plus the popular catalog
        assert_eq!(items.len(), catalog::POPULAR_PLUGINS.len() + 1);
    }

    #[test]
    fn schema_property_snippets_follow_types() {
        assert_eq!(
            snippet_for_schema_property("image", &json!({"type": "string"})),
            "image: \"${1}\""
        );
        assert_eq!(
            snippet_for_schema_property("image", &json!({"type": "string", "default": "node:18"})),
            "image: \"${1:node:18}\""
        );
        assert_eq!(
            snippet_for_schema_property("debug", &json!({"type": "boolean"})),
            "debug: ${1|true,false|}"
        );
        assert_eq!(
            snippet_for_schema_property("retries", &json!({"type": "integer", "default": 2})),
            "retries: ${1:2}"
        );
        assert_eq!(
            snippet_for_schema_property("paths", &json!({"type": "array"})),
            "paths:\n  - \"${1}\""
        );
        assert_eq!(
            snippet_for_schema_property("environment", &json!({"type": "object"})),
            "environment:\n  ${1:key}: \"${2:value}\""
        );
        assert_eq!(
            snippet_for_schema_property("mode", &json!({"enum": ["fast", "safe"]})),
            "mode: ${1|\"fast\",\"safe\"|}"
        );
    }

    #[tokio::test]
    async fn plugin_config_with_schema_lists_its_properties() {
        let pos = position_context(&[
            "steps:",
            "  - label: \"test\"",
            "    plugins:",
            "      - docker#v5.13.0:",
            "          ",
        ]);

        let registry = Arc::new(PluginRegistry::new());
        registry
            .seed(
                "docker#v5.13.0",
                crate::plugins::PluginSchema {
                    name: "docker".to_string(),
                    description: "Run build steps in Docker containers".to_string(),
                    author: "Buildkite".to_string(),
                    requirements: vec![],
                    configuration: Some(json!({
                        "properties": {
                            "image": {"type": "string", "description": "Docker image"},
                            "always-pull": {"type": "boolean"}
                        }
                    })),
                },
                std::time::Duration::from_secs(60),
            )
            .await;

        let provider = CompletionProvider::new(registry);
        let items = provider.completions(&pos).await;

        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["always-pull", "image"]);

        let image = items.iter().find(|i| i.label == "image").unwrap();
        assert_eq!(image.insert_text.as_deref(), Some("image: \"${1}\""));
        assert_eq!(image.detail.as_deref(), Some("Docker image"));
    }

    #[tokio::test]
    async fn plugin_config_without_declared_schema_falls_back() {
        let pos = position_context(&[
            "steps:",
            "  - label: \"test\"",
            "    plugins:",
            "      - docker#v5.13.0:",
            "          ",
        ]);

        let registry = Arc::new(PluginRegistry::new());
        registry
            .seed(
                "docker#v5.13.0",
                crate::plugins::PluginSchema {
                    name: "docker".to_string(),
                    description: String::new(),
                    author: String::new(),
                    requirements: vec![],
                    configuration: None,
                },
                std::time::Duration::from_secs(60),
            )
            .await;

        let provider = CompletionProvider::new(registry);
        let items = provider.completions(&pos).await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "enabled");
    }
}
