//! End-to-end example of the question answering workflow without model downloads
//!
//! This example shows how to:
//! 1. Build an offline configuration with one hashing space per script
//! 2. Index a small bilingual corpus
//! 3. Reuse the stored index on a second build
//! 4. Ask questions in English, Hindi and an unsupported script

use anyhow::Result;
use docqa_retriever::synthesis::ContextOnlySynthesizer;
use docqa_retriever::{Assistant, RetrieverConfig, RetrieverContext};
use std::sync::Arc;
use tempfile::tempdir;

const CORPUS: &str = "\
RBI stands for Reserve Bank of India. It regulates banks and manages currency.
The repo rate was raised to 6.5% in February. Dr. Rao chaired the meeting.

भारतीय रिज़र्व बैंक देश का केंद्रीय बैंक है। यह मौद्रिक नीति तय करता है।";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let temp_dir = tempdir()?;
    let config = RetrieverConfig::offline(temp_dir.path(), 256);

    println!("Building indices in {}", temp_dir.path().display());
    let mut context = RetrieverContext::from_config(config.clone()).await?;
    for build in context.load_or_build(CORPUS).await? {
        println!(
            "  {} ({}): {:?}, {} chunks",
            build.name, build.script, build.outcome, build.chunks
        );
    }

    // A fresh context finds the artifacts and embeds nothing
    let mut reloaded = RetrieverContext::from_config(config).await?;
    for build in reloaded.load_or_build(CORPUS).await? {
        println!("  {} reloaded: {:?}", build.name, build.outcome);
    }

    let assistant = Assistant::new(reloaded, Arc::new(ContextOnlySynthesizer));
    for question in [
        "What does RBI stand for?",
        "Who chaired the meeting?",
        "मौद्रिक नीति कौन तय करता है?",
        "১২৩ কী?",
    ] {
        let answer = assistant.ask(question).await;
        println!("\nQ: {question}");
        println!(
            "   script: {}, space: {}",
            answer.script,
            answer.space.as_deref().unwrap_or("-")
        );
        println!("A: {}", answer.text);
    }

    Ok(())
}
