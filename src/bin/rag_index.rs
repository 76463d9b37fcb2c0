use anyhow::{Context, Result};
use clap::Parser;
use pdfrag::{RagArgs, RagService};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "pdfrag-index",
    about = "Build or refresh the persisted vector index ahead of serving"
)]
struct IndexCli {
    /// Delete any existing index and rebuild it from the corpus
    #[arg(long, default_value_t = false)]
    rebuild: bool,

    #[command(flatten)]
    rag: RagArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pdfrag=info".parse()?)
                .add_directive("rag_index=info".parse()?),
        )
        .init();

    let cli = IndexCli::parse();
    let service = RagService::from_config(cli.rag.into_config()).context("invalid configuration")?;
    let index = if cli.rebuild {
        service.rebuild().await.context("index rebuild failed")?
    } else {
        service.index().await.context("index load/build failed")?
    };
    info!(
        path = %service.config().index_dir.display(),
        entries = index.len(),
        dimensions = index.dimensions(),
        model = index.embedding_model(),
        "index ready"
    );
    Ok(())
}
