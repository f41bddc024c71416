//! Position-aware YAML context analysis
//!
//! Infers the semantic role of the cursor (top level, step body, plugins
//! list, plugin configuration) from the lines above it, without a YAML
//! parse. It has to tolerate the half-typed documents users produce
//! mid-edit, so it works purely on indentation and `key:` patterns.

use crate::document::PositionContext;

/// The semantic role of the cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Unknown,
    /// Top-level pipeline properties (steps, env, agents)
    TopLevel,
    /// Inside a step object (label, command, plugins, ...)
    Step,
    /// Inside a plugins array (plugin names)
    Plugins,
    /// Inside a specific plugin's configuration block
    PluginConfig,
}

/// Detailed information about the context at the cursor.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    pub kind: ContextKind,
    /// Indentation of the cursor line (spaces; a tab counts as 2)
    pub indent_level: usize,
    pub in_array: bool,
    /// Name of the enclosing array, e.g. "plugins"
    pub array_context: Option<&'static str>,
    /// Enclosing key names, outermost first
    pub parent_keys: Vec<String>,
    /// The plugin reference enclosing the cursor when
    /// `kind == PluginConfig`, e.g. "docker#v5.13.0"
    pub plugin_name: Option<String>,
}

impl ContextInfo {
    fn unknown() -> Self {
        Self {
            kind: ContextKind::Unknown,
            indent_level: 0,
            in_array: false,
            array_context: None,
            parent_keys: Vec::new(),
            plugin_name: None,
        }
    }

    pub fn is_in_plugins_array(&self) -> bool {
        self.kind == ContextKind::Plugins
    }

    pub fn is_at_top_level(&self) -> bool {
        self.kind == ContextKind::TopLevel
    }

    pub fn is_in_step_context(&self) -> bool {
        self.kind == ContextKind::Step
    }
}

/// A key parsed from a committed line, tracked on the indent stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: String,
    pub indent: usize,
    pub is_array: bool,
    pub has_value: bool,
}

/// Analyzes YAML context at cursor positions.
pub struct ContextAnalyzer;

impl ContextAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Determine the context at the given position. Total and pure:
    /// equal inputs yield equal outputs and it never panics.
    pub fn analyze(&self, pos_ctx: Option<&PositionContext>) -> ContextInfo {
        let Some(pos_ctx) = pos_ctx else {
            return ContextInfo::unknown();
        };

        self.analyze_structure(&pos_ctx.context_lines)
    }

    /// Walk the lines up to the cursor, maintaining a stack of enclosing
    /// keys. The last line is the cursor line; it contributes its indent
    /// but no key.
    pub fn analyze_structure(&self, lines: &[String]) -> ContextInfo {
        let mut info = ContextInfo {
            kind: ContextKind::TopLevel,
            ..ContextInfo::unknown()
        };

        let mut stack: Vec<KeyInfo> = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let is_current = i == lines.len() - 1;

            let trimmed = line.trim();
            if (trimmed.is_empty() || trimmed.starts_with('#')) && !is_current {
                continue;
            }

            let indent = indent_width(line);

            // Entries at or below this indent are no longer enclosing.
            stack.retain(|key| key.indent < indent);

            if is_current {
                info.indent_level = indent;
                return self.classify(info, &stack);
            }

            if let Some(key) = parse_key_from_line(line, indent) {
                stack.push(key);
            }
        }

        // Empty input: the cursor is at the top level of a fresh document.
        info
    }

    fn classify(&self, mut info: ContextInfo, stack: &[KeyInfo]) -> ContextInfo {
        info.parent_keys = stack.iter().map(|key| key.key.clone()).collect();

        if stack.is_empty() {
            info.kind = ContextKind::TopLevel;
            return info;
        }

        for (i, key) in stack.iter().enumerate().rev() {
            if key.key == "plugins" {
                info.kind = ContextKind::Plugins;
                info.in_array = true;
                info.array_context = Some("plugins");

                // A key nested below "plugins" is a plugin reference, so
                // the cursor sits in that plugin's configuration.
                if i < stack.len() - 1 {
                    info.kind = ContextKind::PluginConfig;
                    info.plugin_name = Some(stack[i + 1].key.clone());
                }

                return info;
            }

            if key.key == "steps" {
                info.kind = ContextKind::Step;
                return info;
            }
        }

        if stack.len() <= 1 {
            info.kind = ContextKind::TopLevel;
        } else {
            // Nested under something we don't recognize; step properties
            // are the most useful guess.
            info.kind = ContextKind::Step;
        }

        info
    }
}

impl Default for ContextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Indentation width of a line: spaces count 1, tabs count 2.
pub fn indent_width(line: &str) -> usize {
    let mut indent = 0;
    for ch in line.chars() {
        match ch {
            ' ' => indent += 1,
            '\t' => indent += 2,
            _ => break,
        }
    }
    indent
}

/// Extract key information from a committed YAML line. List items with a
/// `key:` part (e.g. `- docker#v5.13.0:`) contribute their key; bare list
/// items and plain values contribute nothing.
pub fn parse_key_from_line(line: &str, indent: usize) -> Option<KeyInfo> {
    let trimmed = line.trim();

    let content = match trimmed.strip_prefix("- ") {
        Some(rest) => rest.trim(),
        None => trimmed,
    };

    let colon = content.find(':')?;
    let key = content[..colon].trim();
    if key.is_empty() {
        return None;
    }
    let after_colon = content[colon + 1..].trim();

    Some(KeyInfo {
        key: key.to_string(),
        indent,
        is_array: after_colon.is_empty() || after_colon == "[]",
        has_value: !after_colon.is_empty() && after_colon != "[]",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    fn analyze(src: &[&str]) -> ContextInfo {
        ContextAnalyzer::new().analyze_structure(&lines(src))
    }

    #[test]
    fn top_level_at_new_key() {
        let info = analyze(&["steps:", "  - label: \"test\"", "env:"]);
        assert_eq!(info.kind, ContextKind::TopLevel);
        assert!(info.is_at_top_level());
    }

    #[test]
    fn step_context_inside_step() {
        let info = analyze(&["steps:", "  - label: \"test\"", "    command:"]);
        assert_eq!(info.kind, ContextKind::Step);
        assert!(info.is_in_step_context());
    }

    #[test]
    fn plugins_context_at_list_item() {
        let info = analyze(&[
            "steps:",
            "  - label: \"test\"",
            "    command: \"echo hello\"",
            "    plugins:",
            "      - ",
        ]);
        assert_eq!(info.kind, ContextKind::Plugins);
        assert!(info.is_in_plugins_array());
        assert_eq!(info.array_context, Some("plugins"));
    }

    #[test]
    fn plugin_config_below_reference() {
        let info = analyze(&[
            "steps:",
            "  - label: \"test\"",
            "    plugins:",
            "      - docker#v5.13.0:",
            "          image:",
        ]);
        assert_eq!(info.kind, ContextKind::PluginConfig);
        assert_eq!(info.plugin_name.as_deref(), Some("docker#v5.13.0"));
    }

    #[test]
    fn plugin_config_in_nested_array_value() {
        let info = analyze(&[
            "steps:",
            "  - label: \"Test with Docker\"",
            "    command: \"make test\"",
            "    plugins:",
            "      - docker#v5.13.0:",
            "          image: \"node:18\"",
            "          volumes:",
            "            - \".:/app\"",
        ]);
        assert_eq!(info.kind, ContextKind::PluginConfig);
        assert_eq!(info.plugin_name.as_deref(), Some("docker#v5.13.0"));
    }

    #[test]
    fn second_plugin_reference_is_plugins_context() {
        let info = analyze(&[
            "steps:",
            "  - label: \"test\"",
            "    plugins:",
            "      - docker#v5.13.0:",
            "          image: \"node:18\"",
            "      - cache#v2.4.10:",
        ]);
        assert_eq!(info.kind, ContextKind::Plugins);
    }

    #[test]
    fn comments_and_blanks_do_not_shift_the_stack() {
        let info = analyze(&[
            "steps:",
            "  - label: \"test\"",
            "    ",
            "    command: \"echo\"    # Comment",
            "    plugins:",
            "      # Plugin comment",
            "      - docker#v5.13.0:",
        ]);
        assert_eq!(info.kind, ContextKind::Plugins);
    }

    #[test]
    fn empty_input_is_top_level() {
        let info = analyze(&[]);
        assert_eq!(info.kind, ContextKind::TopLevel);

        let info = analyze(&[""]);
        assert_eq!(info.kind, ContextKind::TopLevel);
    }

    #[test]
    fn missing_position_context_is_unknown() {
        let info = ContextAnalyzer::new().analyze(None);
        assert_eq!(info.kind, ContextKind::Unknown);
    }

    #[test]
    fn analysis_is_deterministic() {
        let src = [
            "steps:",
            "  - label: \"a\"",
            "    plugins:",
            "      - docker#v5.13.0:",
            "          image:",
        ];
        let a = analyze(&src);
        let b = analyze(&src);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.parent_keys, b.parent_keys);
        assert_eq!(a.plugin_name, b.plugin_name);
    }

    #[test]
    fn indent_width_rules() {
        assert_eq!(indent_width("steps:"), 0);
        assert_eq!(indent_width("  - label: test"), 2);
        assert_eq!(indent_width("    command: echo"), 4);
        assert_eq!(indent_width("      - docker#v5.13.0:"), 6);
        assert_eq!(indent_width("\t\timage: node"), 4);
        assert_eq!(indent_width(""), 0);
        assert_eq!(indent_width("no-indent"), 0);
    }

    #[test]
    fn parse_key_variants() {
        let key = parse_key_from_line("steps:", 0).unwrap();
        assert_eq!(
            key,
            KeyInfo {
                key: "steps".into(),
                indent: 0,
                is_array: true,
                has_value: false
            }
        );

        let key = parse_key_from_line("    command: echo hello", 4).unwrap();
        assert!(key.has_value);
        assert!(!key.is_array);

        let key = parse_key_from_line("    retry: []", 4).unwrap();
        assert!(key.is_array);
        assert!(!key.has_value);

        let key = parse_key_from_line("  - docker#v5.13.0:", 2).unwrap();
        assert_eq!(key.key, "docker#v5.13.0");
        assert!(key.is_array);

        assert!(parse_key_from_line("", 0).is_none());
        assert!(parse_key_from_line("  - \"bare item\"", 2).is_none());
    }
}
