//! Embed a few sentences and compare them.
//!
//! Uses the offline hashing backend by default; pass `--labse` to download and
//! run LaBSE instead.

use docqa_embed::{EmbedConfig, Embedder};

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let use_labse = std::env::args().any(|arg| arg == "--labse");
    let temp_dir = tempfile::tempdir()?;
    let config = if use_labse {
        EmbedConfig::labse(temp_dir.path()).with_batch_size(2)
    } else {
        EmbedConfig::hashing(256)
    };

    println!("Model: {}", config.model_name);
    println!("Backend: {}", config.backend_id());

    let embedder = Embedder::from_config(&config).await?;
    println!("Dimension: {}", embedder.dimension());

    let query = "What does the Reserve Bank of India do?";
    let texts = vec![
        "The Reserve Bank of India regulates the banking system.".to_string(),
        "Monsoon rains arrive in June.".to_string(),
        "भारतीय रिज़र्व बैंक देश का केंद्रीय बैंक है।".to_string(),
    ];

    let query_vector = embedder.embed(query).await?;
    let vectors = embedder.embed_many(&texts).await?;

    println!("\nQuery: \"{query}\"");
    for (text, vector) in texts.iter().zip(&vectors) {
        println!(
            "  {:>8.4}  {}",
            squared_distance(&query_vector, vector),
            text
        );
    }

    Ok(())
}
