use clap::Parser;
use docqa_context::sentence::{Segmenter, SegmenterConfig};
use std::fs;
use std::io::{self, Read};

/// A CLI tool to split extracted document text into sentence chunks using docqa-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Keep newlines as sentence boundaries instead of collapsing whitespace.
    #[arg(long)]
    keep_newlines: bool,

    /// Regex pattern to remove before segmenting. May be repeated.
    #[arg(short, long = "strip")]
    strip: Vec<String>,

    /// Print one chunk per line instead of JSON.
    #[arg(short, long)]
    lines: bool,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let text = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let mut config = SegmenterConfig::default().with_collapse_whitespace(!args.keep_newlines);
    for pattern in args.strip {
        config = config.with_strip_pattern(pattern);
    }

    let segmenter = Segmenter::new(config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let chunks = segmenter.segment(&text);

    if args.lines {
        for chunk in &chunks {
            println!("{}\t{}", chunk.position, chunk.text);
        }
    } else {
        let json_output = serde_json::to_string_pretty(&chunks)?;
        println!("{json_output}");
    }

    Ok(())
}
