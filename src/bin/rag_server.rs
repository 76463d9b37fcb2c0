use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pdfrag::{http, RagArgs, RagError, RagService};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "pdfrag-server",
    about = "HTTP endpoint that builds grounded context from a PDF corpus"
)]
struct ServerCli {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "PDFRAG_BIND", default_value = "127.0.0.1:3001")]
    bind: String,

    /// Accept requests right away and prepare the index in the background;
    /// the process still exits if the corpus cannot be ingested
    #[arg(long, default_value_t = false)]
    lazy: bool,

    #[command(flatten)]
    rag: RagArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pdfrag=info".parse()?)
                .add_directive("rag_server=info".parse()?),
        )
        .init();

    let cli = ServerCli::parse();
    let service = Arc::new(
        RagService::from_config(cli.rag.into_config()).context("invalid configuration")?,
    );
    if cli.lazy {
        // requests arriving meanwhile wait on the builder lock
        let warming = service.clone();
        tokio::spawn(async move {
            match warming.index().await {
                Ok(index) => info!(entries = index.len(), "index warmed"),
                Err(err @ RagError::Ingest { .. }) => {
                    error!(error = %err, "corpus ingestion failed; shutting down");
                    std::process::exit(1);
                }
                Err(err) => error!(error = %err, "background index preparation failed"),
            }
        });
    } else {
        let index = service.index().await.context("failed to prepare index")?;
        info!(entries = index.len(), "index warmed");
    }

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "rag server listening");
    axum::serve(listener, http::router(service))
        .await
        .context("server shutdown")?;
    Ok(())
}
