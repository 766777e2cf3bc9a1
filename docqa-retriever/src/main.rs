use anyhow::Context;
use clap::{Parser, Subcommand};
use docqa_retriever::{
    Assistant, RetrieverConfig, RetrieverContext, RetrieverError,
    batch::answer_csv,
    config::DEFAULT_CONFIG_FILE,
    context::SpaceBuild,
    corpus::read_corpus,
    retrieval::detect_script,
    status::{ArtifactState, collect_status},
    synthesis::create_synthesizer,
};
use std::path::PathBuf;
use std::process;

/// Ask questions about a document corpus using multilingual semantic retrieval.
#[derive(Parser, Debug)]
#[command(name = "docqa", author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log debug detail to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or reuse) the index of every language space
    Build {
        /// Corpus file or directory of .txt/.md files
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Discard stored indices and rebuild
        #[arg(long)]
        force: bool,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Retrieve the passages closest to a query
    Query {
        text: String,
        /// Number of passages
        #[arg(short)]
        k: Option<usize>,
        #[arg(long)]
        corpus: Option<PathBuf>,
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Answer a question from the corpus
    Ask {
        question: String,
        #[arg(long)]
        corpus: Option<PathBuf>,
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Answer every question of a CSV file
    Batch {
        /// CSV with a questions column
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the answered CSV
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Show the state of every language space's index
    Status {
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show the script detected for a text and the space it routes to
    Detect { text: String },
    /// Delete the stored index of every language space
    Clean,
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Corpus text from the command line or the configuration, empty if neither names one.
async fn corpus_text(config: &RetrieverConfig, corpus: Option<PathBuf>) -> anyhow::Result<String> {
    match corpus.or_else(|| config.corpus.clone()) {
        Some(path) => read_corpus(&path)
            .await
            .with_context(|| format!("Failed to read corpus {}", path.display())),
        None => Ok(String::new()),
    }
}

/// Build the context and make every space ready.
async fn ready_context(
    config: RetrieverConfig,
    corpus: Option<PathBuf>,
) -> anyhow::Result<RetrieverContext> {
    let text = corpus_text(&config, corpus).await?;
    let mut context = RetrieverContext::from_config(config).await?;
    match context.load_or_build(&text).await {
        Ok(_) => Ok(context),
        Err(RetrieverError::EmptyCorpus) if text.is_empty() => Err(anyhow::anyhow!(
            "No index has been built yet; pass --corpus or set `corpus` in the configuration"
        )),
        Err(e) => Err(e.into()),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = RetrieverConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    match args.command {
        Commands::Build {
            corpus,
            force,
            format,
        } => {
            let text = corpus_text(&config, corpus).await?;
            let mut context = RetrieverContext::from_config(config).await?;
            let builds = if force {
                context.rebuild(&text).await?
            } else {
                context.load_or_build(&text).await?
            };
            print_builds(&builds, &format)?;
            Ok(())
        }
        Commands::Query {
            text,
            k,
            corpus,
            format,
        } => {
            let k = k.unwrap_or(config.top_k);
            let context = ready_context(config, corpus).await?;
            let hits = context.search(&text, k).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
                OutputFormat::Summary => {
                    println!("Found {} passages:", hits.len());
                    for hit in hits {
                        println!(
                            "  [{}] distance {:.4} | {}",
                            hit.position, hit.distance, hit.text
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Ask {
            question,
            corpus,
            format,
        } => {
            let synthesizer = create_synthesizer(&config.synthesis)?;
            let context = ready_context(config, corpus).await?;
            let assistant = Assistant::new(context, synthesizer);
            let answer = assistant.ask(&question).await;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
                OutputFormat::Summary => println!("{}", answer.text),
            }
            Ok(())
        }
        Commands::Batch {
            input,
            output,
            corpus,
        } => {
            let batch_config = config.batch.clone();
            let synthesizer = create_synthesizer(&config.synthesis)?;
            let context = ready_context(config, corpus).await?;
            let assistant = Assistant::new(context, synthesizer);

            let summary = answer_csv(&assistant, &input, &output, &batch_config).await?;
            println!(
                "Answered {} of {} questions ({} skipped), saved to {}",
                summary.answered,
                summary.rows,
                summary.skipped,
                output.display()
            );
            Ok(())
        }
        Commands::Status { format } => {
            let report = collect_status(&config);

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary => {
                    println!("docqa status");
                    println!("============");
                    println!("  Data directory: {}", report.data_dir.display());
                    println!("  Top k: {}", report.top_k);
                    println!("  Overall status: {:?}", report.overall_status);

                    for space in &report.spaces {
                        println!("\n  Space '{}' ({})", space.name, space.script);
                        println!("    Backend: {}", space.backend_id);
                        println!("    Index: {}", space.index_path.display());
                        match &space.artifact {
                            ArtifactState::Present => {
                                if let Some(info) = &space.info {
                                    println!(
                                        "    Chunks: {} | Dimension: {} | Size: {} bytes",
                                        info.count,
                                        info.dimension,
                                        info.index_size_bytes + info.chunks_size_bytes
                                    );
                                }
                                if space.backend_matches == Some(false) {
                                    println!("    Built by a different backend; will be rebuilt");
                                }
                            }
                            ArtifactState::Missing { path } => {
                                println!("    Not built ({} missing)", path.display());
                            }
                            ArtifactState::Corrupt { reason } => {
                                println!("    Corrupt: {reason}");
                            }
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Clean => {
            let mut context = RetrieverContext::from_config(config).await?;
            context.discard_artifacts()?;
            println!("Removed stored indices");
            Ok(())
        }
        Commands::Detect { text } => {
            let script = detect_script(&text);
            let space = config
                .spaces
                .iter()
                .find(|s| s.script == script)
                .map(|s| s.name.as_str());
            println!("Script: {script}");
            println!("Space: {}", space.unwrap_or("none (unsupported)"));
            Ok(())
        }
    }
}

fn print_builds(builds: &[SpaceBuild], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(builds)?),
        OutputFormat::Summary => {
            for build in builds {
                println!(
                    "{} ({}): {:?}, {} chunks, dimension {}",
                    build.name,
                    build.script,
                    build.outcome,
                    build.chunks,
                    build
                        .dimension
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
    }
    Ok(())
}
