mod common;

use std::sync::Arc;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use common::{CannedChat, TopicEmbedder, INTERPRETER};
use pdfrag::{
    is_no_answer, resolve_prompt, ungrounded_prompt, CosineReranker, Embedder, IndexState,
    RagConfig, RagService, VectorIndex,
};
use url::Url;

const INTERPRETER_PAGE: &str = "<html><body><nav>Menu</nav>\
    <p>An interpreter   executes instructions directly without compiling to machine code first .</p>\
    <p>   </p></body></html>";
const MEMORY_PAGE: &str = "<html><body>\
    <p>Garbage collection reclaims unused memory.</p>\
    <p>Mars has two moons.</p></body></html>";

async fn corpus_site() -> String {
    common::spawn(
        Router::new()
            .route("/interpreters", get(|| async { Html(INTERPRETER_PAGE) }))
            .route("/mirror", get(|| async { Html(INTERPRETER_PAGE) }))
            .route("/memory", get(|| async { Html(MEMORY_PAGE) })),
    )
    .await
}

fn service(root: &std::path::Path, site: &str, chat: Arc<CannedChat>) -> RagService {
    let corpus = root.join("pdfs");
    std::fs::create_dir_all(&corpus).unwrap();
    let config = RagConfig {
        corpus_dir: corpus,
        index_dir: root.join("faiss_index"),
        web_pages: ["interpreters", "mirror", "memory"]
            .iter()
            .map(|path| Url::parse(&format!("{site}/{path}")).unwrap())
            .collect(),
        ..RagConfig::default()
    };
    let embedder: Arc<dyn Embedder> = Arc::new(TopicEmbedder::programming());
    let reranker = Arc::new(CosineReranker::new(embedder.clone()));
    RagService::new(config, embedder, chat, reranker).unwrap()
}

#[tokio::test]
async fn web_sources_are_normalized_deduplicated_and_chunked() {
    let dir = tempfile::tempdir().unwrap();
    let site = corpus_site().await;
    let service = service(dir.path(), &site, Arc::new(CannedChat::replying("unused")));

    let chunks = service.ingest().await.unwrap();
    let sources: Vec<String> = chunks
        .iter()
        .map(|c| c.metadata.source.clone())
        .collect();
    assert_eq!(
        sources,
        vec![format!("{site}/interpreters"), format!("{site}/memory")]
    );
    assert_eq!(chunks[0].text, INTERPRETER);
    assert_eq!(
        chunks[0].metadata.get("kind"),
        Some(&serde_json::json!("web"))
    );
}

#[tokio::test]
async fn first_question_builds_and_persists_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let site = corpus_site().await;
    let chat = Arc::new(CannedChat::replying(
        "An interpreter executes instructions directly.",
    ));
    let service = service(dir.path(), &site, chat.clone());
    assert_eq!(service.status().state, IndexState::Unbuilt);

    let top = service.retrieve("What is an interpreter?").await.unwrap();
    assert_eq!(top[0].chunk.text, INTERPRETER);
    assert!(top[0].score > 0.5);

    let context = service
        .build_rag_context("What is an interpreter?")
        .await
        .unwrap();
    assert!(!is_no_answer(&context));
    let prompts = chat.prompts.lock().unwrap().clone();
    assert!(prompts[0].contains(INTERPRETER));

    let persisted = VectorIndex::load(&dir.path().join("faiss_index"), "topic-embedder")
        .await
        .unwrap();
    assert_eq!(persisted.len(), 2);
    assert_eq!(service.status().entries, 2);
}

#[tokio::test]
async fn sentinel_reply_switches_the_caller_to_the_ungrounded_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let site = corpus_site().await;
    let service = service(
        dir.path(),
        &site,
        Arc::new(CannedChat::replying("I DON'T KNOW")),
    );
    let question = "What is the capital of Mars?";
    let context = service.build_rag_context(question).await.unwrap();
    assert_eq!(context, "I DON'T KNOW");
    assert_eq!(resolve_prompt(&context, question), ungrounded_prompt(question));
}
