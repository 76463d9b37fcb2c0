use anyhow::{Context, Result};
use clap::Parser;
use pdfrag::{is_no_answer, resolve_prompt, RagArgs, RagService};

#[derive(Parser, Debug)]
#[command(
    name = "pdfrag-ask",
    about = "Ask a question against the PDF corpus and print the final answer"
)]
struct AskCli {
    /// Question to answer
    #[arg(long)]
    question: String,

    /// Only print the context and the final prompt (skip the second LLM call)
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    rag: RagArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pdfrag=warn".parse()?),
        )
        .init();

    let cli = AskCli::parse();
    let service = RagService::from_config(cli.rag.into_config()).context("invalid configuration")?;
    let context = service
        .build_rag_context(&cli.question)
        .await
        .context("failed to retrieve context")?;
    if is_no_answer(&context) {
        println!("--- RAG context not retrieved ---\n");
    } else {
        println!("--- Retrieved Context ---\n{context}\n");
    }

    let prompt = resolve_prompt(&context, &cli.question);
    if cli.dry_run {
        println!("--- Prompt ---\n{prompt}\n");
        println!("dry-run enabled; skipping LLM call.");
        return Ok(());
    }
    let answer = service
        .complete(&prompt)
        .await
        .context("failed to generate answer")?;
    println!("--- Answer ---\n{answer}");
    Ok(())
}
