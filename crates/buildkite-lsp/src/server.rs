//! Server bootstrap

use anyhow::Result;
use tower_lsp::{LspService, Server};

use crate::backend::Backend;

/// Run the language server over stdio until the client disconnects.
pub async fn run_stdio_server() -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
