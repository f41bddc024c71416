//! Document management

use dashmap::DashMap;
use tower_lsp::lsp_types::{Position, Url};

/// A document in the workspace
#[derive(Debug, Clone)]
pub struct Document {
    /// Document URI
    pub uri: Url,

    /// Document version
    pub version: i32,

    /// Document text
    pub text: String,

    /// Line index derived from the text
    pub lines: Vec<String>,
}

impl Document {
    /// Create a new document
    pub fn new(uri: Url, version: i32, text: String) -> Self {
        let lines = split_lines(&text);
        Self {
            uri,
            version,
            text,
            lines,
        }
    }

    /// Replace document text
    pub fn update(&mut self, version: i32, text: String) {
        self.version = version;
        self.lines = split_lines(&text);
        self.text = text;
    }
}

/// Everything the context analyzer needs about a cursor position.
#[derive(Debug, Clone)]
pub struct PositionContext {
    pub uri: Url,
    pub position: Position,
    pub current_line: String,
    /// Character offset within the current line, recorded verbatim
    pub char_index: usize,
    /// Lines from the start of the document through the cursor line
    pub context_lines: Vec<String>,
    pub full_text: String,
}

/// Document store
pub struct DocumentStore {
    /// Documents indexed by URI
    documents: DashMap<Url, Document>,
}

impl DocumentStore {
    /// Create a new document store
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open a document
    pub fn open(&self, uri: Url, version: i32, text: String) {
        let document = Document::new(uri.clone(), version, text);
        self.documents.insert(uri, document);
    }

    /// Update a document, creating it if it was never opened
    pub fn update(&self, uri: Url, version: i32, text: String) {
        match self.documents.get_mut(&uri) {
            Some(mut doc) => doc.update(version, text),
            None => self.open(uri, version, text),
        }
    }

    /// Close a document
    pub fn close(&self, uri: &Url) {
        self.documents.remove(uri);
    }

    /// Get a snapshot of a document
    pub fn get(&self, uri: &Url) -> Option<Document> {
        self.documents.get(uri).map(|doc| doc.clone())
    }

    /// Build the position context used by the analyzer and the feature
    /// providers. Returns `None` when the document is unknown or the
    /// position's line is out of bounds.
    pub fn context_at(&self, uri: &Url, position: Position) -> Option<PositionContext> {
        let doc = self.documents.get(uri)?;

        let line_index = position.line as usize;
        if line_index >= doc.lines.len() {
            return None;
        }

        let current_line = doc.lines[line_index].clone();
        let context_lines = doc.lines[..=line_index].to_vec();

        Some(PositionContext {
            uri: uri.clone(),
            position,
            current_line,
            char_index: position.character as usize,
            context_lines,
            full_text: doc.text.clone(),
        })
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Split text into lines. `\n` terminates a line, `\r` is dropped, and a
/// trailing newline does not produce a trailing empty element.
pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        match ch {
            '\n' => {
                lines.push(std::mem::take(&mut current));
            }
            '\r' => {}
            _ => current.push(ch),
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn split_lines_law() {
        assert_eq!(split_lines(""), Vec::<String>::new());
        assert_eq!(split_lines("a\n"), vec!["a"]);
        assert_eq!(split_lines("\n"), vec![""]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(split_lines("a"), vec!["a"]);
    }

    #[test]
    fn split_lines_round_trip() {
        for text in ["steps:\n  - label: \"x\"\n", "a\nb\nc", "one line"] {
            let lines = split_lines(text);
            let rejoined = lines.join("\n");
            assert_eq!(split_lines(&rejoined), lines);
        }
    }

    #[test]
    fn open_update_get_close() {
        let store = DocumentStore::new();
        let uri = url("file:///p/.buildkite/pipeline.yml");

        store.open(uri.clone(), 1, "steps:\n".to_string());
        let doc = store.get(&uri).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.lines, vec!["steps:"]);

        store.update(uri.clone(), 2, "steps:\n  - wait: ~\n".to_string());
        let doc = store.get(&uri).unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.text, "steps:\n  - wait: ~\n");
        assert_eq!(doc.lines, vec!["steps:", "  - wait: ~"]);

        store.close(&uri);
        assert!(store.get(&uri).is_none());
    }

    #[test]
    fn update_creates_missing_document() {
        let store = DocumentStore::new();
        let uri = url("file:///p/pipeline.yml");

        store.update(uri.clone(), 5, "env:\n".to_string());
        let doc = store.get(&uri).unwrap();
        assert_eq!(doc.version, 5);
    }

    #[test]
    fn context_at_bounds() {
        let store = DocumentStore::new();
        let uri = url("file:///p/pipeline.yml");
        store.open(uri.clone(), 1, "steps:\n  - wait: ~\n".to_string());

        let ctx = store
            .context_at(&uri, Position::new(1, 4))
            .expect("in bounds");
        assert_eq!(ctx.current_line, "  - wait: ~");
        assert_eq!(ctx.char_index, 4);
        assert_eq!(ctx.context_lines, vec!["steps:", "  - wait: ~"]);

        assert!(store.context_at(&uri, Position::new(2, 0)).is_none());
        assert!(store
            .context_at(&url("file:///other.yml"), Position::new(0, 0))
            .is_none());
    }

    #[test]
    fn context_at_does_not_clamp_character() {
        let store = DocumentStore::new();
        let uri = url("file:///p/pipeline.yml");
        store.open(uri.clone(), 1, "steps:\n".to_string());

        let ctx = store.context_at(&uri, Position::new(0, 99)).unwrap();
        assert_eq!(ctx.char_index, 99);
    }
}
