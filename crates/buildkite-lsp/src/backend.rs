//! LSP backend implementation

use std::sync::Arc;

use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::debug;

use crate::capabilities;
use crate::code_actions;
use crate::completions::CompletionProvider;
use crate::definition;
use crate::diagnostics::DiagnosticsEvaluator;
use crate::document::DocumentStore;
use crate::hover::HoverProvider;
use crate::plugins::PluginRegistry;
use crate::schema::PipelineSchemaClient;
use crate::semantic_highlighting;
use crate::signature_help::SignatureHelpProvider;
use crate::symbols;

/// The Buildkite language server backend
pub struct Backend {
    /// LSP client
    pub client: Client,

    /// Document store
    documents: Arc<DocumentStore>,

    /// Completion provider
    completion_provider: CompletionProvider,

    /// Hover provider
    hover_provider: HoverProvider,

    /// Signature help provider
    signature_help_provider: SignatureHelpProvider,

    /// Diagnostics evaluator
    diagnostics: DiagnosticsEvaluator,
}

impl Backend {
    /// Create a new backend
    pub fn new(client: Client) -> Self {
        let documents = Arc::new(DocumentStore::new());
        let registry = Arc::new(PluginRegistry::new());
        let schema_client = Arc::new(PipelineSchemaClient::new());

        Self {
            client,
            documents,
            completion_provider: CompletionProvider::new(registry.clone()),
            hover_provider: HoverProvider::new(registry.clone()),
            signature_help_provider: SignatureHelpProvider::new(registry.clone()),
            diagnostics: DiagnosticsEvaluator::new(schema_client, registry),
        }
    }

    /// Validate a document and publish the replacement diagnostic set.
    /// Non-Buildkite files are left entirely alone.
    async fn validate_and_publish(&self, uri: Url, content: &str, version: i32) {
        if !is_buildkite_file(&uri) {
            return;
        }

        let diagnostics = self.diagnostics.evaluate(content).await;
        debug!(uri = %uri, count = diagnostics.len(), "publishing diagnostics");

        self.client
            .publish_diagnostics(uri, diagnostics, Some(version))
            .await;
    }
}

/// A document is a Buildkite file iff it lives under `.buildkite/` with
/// a YAML suffix, or its base name is one of the conventional pipeline
/// file names. The base-name rule intentionally matches anywhere, not
/// just inside `.buildkite/`.
pub fn is_buildkite_file(uri: &Url) -> bool {
    let path = uri.path();

    if path.contains(".buildkite/") {
        return path.ends_with(".yml") || path.ends_with(".yaml");
    }

    let file_name = path.rsplit('/').next().unwrap_or(path);
    matches!(
        file_name,
        "pipeline.yml" | "pipeline.yaml" | "buildkite.yml" | "buildkite.yaml"
    )
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> LspResult<InitializeResult> {
        debug!("initializing buildkite-ls server");

        Ok(InitializeResult {
            capabilities: capabilities::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "buildkite-ls".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "buildkite-ls initialized")
            .await;
    }

    async fn shutdown(&self) -> LspResult<()> {
        debug!("server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        let text = params.text_document.text;

        debug!(uri = %uri, version, "document opened");
        self.documents.open(uri.clone(), version, text.clone());
        self.validate_and_publish(uri, &text, version).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Full sync: the last change carries the entire document.
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        debug!(uri = %uri, version, "document changed");
        self.documents.update(uri.clone(), version, change.text.clone());
        self.validate_and_publish(uri, &change.text, version).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        debug!(uri = %params.text_document.uri, "document closed");
        self.documents.close(&params.text_document.uri);
    }

    async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(pos_ctx) = self.documents.context_at(&uri, position) else {
            return Ok(None);
        };

        Ok(self.hover_provider.hover(&pos_ctx).await)
    }

    async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(pos_ctx) = self.documents.context_at(&uri, position) else {
            return Ok(None);
        };

        let items = self.completion_provider.completions(&pos_ctx).await;

        Ok(Some(CompletionResponse::List(CompletionList {
            is_incomplete: false,
            items,
        })))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> LspResult<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(doc) = self.documents.get(&uri) else {
            return Ok(None);
        };

        Ok(symbols::document_symbols(&doc.text, &doc.lines).map(DocumentSymbolResponse::Nested))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> LspResult<Option<SignatureHelp>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(pos_ctx) = self.documents.context_at(&uri, position) else {
            return Ok(None);
        };

        Ok(self.signature_help_provider.signature_help(&pos_ctx).await)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> LspResult<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(pos_ctx) = self.documents.context_at(&uri, position) else {
            return Ok(None);
        };

        let locations = definition::find_definitions(&pos_ctx);
        if locations.is_empty() {
            return Ok(None);
        }

        Ok(Some(GotoDefinitionResponse::Array(locations)))
    }

    async fn code_action(&self, params: CodeActionParams) -> LspResult<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(doc) = self.documents.get(&uri) else {
            return Ok(None);
        };

        Ok(Some(code_actions::code_actions(
            &uri,
            params.range,
            &doc.lines,
        )))
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> LspResult<Option<SemanticTokensResult>> {
        let uri = params.text_document.uri;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(doc) = self.documents.get(&uri) else {
            return Ok(None);
        };

        Ok(Some(SemanticTokensResult::Tokens(
            semantic_highlighting::semantic_tokens(&doc.lines),
        )))
    }

    async fn semantic_tokens_range(
        &self,
        params: SemanticTokensRangeParams,
    ) -> LspResult<Option<SemanticTokensRangeResult>> {
        let uri = params.text_document.uri;

        if !is_buildkite_file(&uri) {
            return Ok(None);
        }

        let Some(doc) = self.documents.get(&uri) else {
            return Ok(None);
        };

        let start_line = params.range.start.line as usize;
        let end_line = params.range.end.line as usize;
        if start_line > end_line || end_line >= doc.lines.len() {
            return Ok(Some(SemanticTokensRangeResult::Tokens(SemanticTokens {
                result_id: None,
                data: Vec::new(),
            })));
        }

        Ok(Some(SemanticTokensRangeResult::Tokens(
            semantic_highlighting::semantic_tokens_for_range(
                &doc.lines[start_line..=end_line],
                start_line,
            ),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn buildkite_directory_files_are_eligible() {
        assert!(is_buildkite_file(&url("file:///repo/.buildkite/pipeline.yml")));
        assert!(is_buildkite_file(&url("file:///repo/.buildkite/deploy.yaml")));
        assert!(!is_buildkite_file(&url("file:///repo/.buildkite/README.md")));
    }

    #[test]
    fn conventional_names_are_eligible_anywhere() {
        assert!(is_buildkite_file(&url("file:///repo/pipeline.yml")));
        assert!(is_buildkite_file(&url("file:///somewhere/else/pipeline.yaml")));
        assert!(is_buildkite_file(&url("file:///repo/buildkite.yml")));
        assert!(is_buildkite_file(&url("file:///repo/buildkite.yaml")));
    }

    #[test]
    fn other_yaml_files_are_not_eligible() {
        assert!(!is_buildkite_file(&url("file:///repo/docker-compose.yml")));
        assert!(!is_buildkite_file(&url("file:///repo/config.yaml")));
        assert!(!is_buildkite_file(&url("file:///repo/pipeline.json")));
    }
}
