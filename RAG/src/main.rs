use anyhow::{Context, Result};
use clap::Parser;
use doc_discovery::{
    index_document, prepare_document, GeminiProvider, QueryService, RagConfig, RagError,
    RawDocument, ServiceProvider,
};
use std::path::PathBuf;

/// Ask a question about a PDF, DOCX or TXT file.
#[derive(Parser, Debug)]
#[command(name = "doc_discovery", version)]
struct Args {
    /// Document to index
    file: PathBuf,

    /// Question to answer from the document
    question: String,

    /// Number of chunks to retrieve
    #[arg(long)]
    top_k: Option<usize>,

    /// Maximum characters per chunk
    #[arg(long)]
    max_chunk_chars: Option<usize>,

    /// Print every retrieved chunk instead of only the cited ones
    #[arg(long)]
    show_all_chunks: bool,

    /// Print the parsed document text
    #[arg(long)]
    show_document: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = RagConfig::from_env()?;
    if let Some(max_chunk_chars) = args.max_chunk_chars {
        config.max_chunk_chars = max_chunk_chars;
    }
    let top_k = args.top_k.unwrap_or(config.top_k);

    let credential = config.api_key.clone().ok_or(RagError::MissingCredential)?;
    if args.question.trim().is_empty() {
        return Err(RagError::MissingQuery.into());
    }

    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("document path has no file name")?;
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let raw = RawDocument::from_upload(filename, bytes)?;

    let prepared = prepare_document(&raw, config.max_chunk_chars)?;
    if args.show_document {
        println!("#### Document\n{}\n", prepared.document.full_text());
    }

    let provider = GeminiProvider::new(config.gemini.clone());
    let embedder = provider.embedder(&credential)?;
    let indexed = index_document(prepared, embedder.clone(), config.indexer).await?;

    let query_service = QueryService::new(embedder, provider.completer(&credential)?);
    let response = query_service
        .query(Some(indexed.index.as_ref()), &args.question, top_k)
        .await?;

    println!("#### Answer\n{}\n", response.response);
    println!("#### Sources");
    let shown = if args.show_all_chunks {
        &response.retrieved
    } else {
        &response.sources
    };
    for chunk in shown {
        println!("{}\n{}\n---", chunk.content, chunk.source_id());
    }

    Ok(())
}
