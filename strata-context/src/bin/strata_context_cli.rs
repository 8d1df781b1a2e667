use clap::Parser;
use std::io::{self, Read};
use strata_context::text::{ChunkConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, TextChunker};

/// Chunk a text file into JSON for inspecting chunk boundaries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source label recorded on each chunk.
    #[arg(short, long, default_value = "stdin")]
    source: String,

    /// Chunk size in characters.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Overlap between consecutive chunks in characters.
    #[arg(short, long, default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let text = if let Some(input_path) = &args.input {
        std::fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let source = args.input.as_deref().unwrap_or(&args.source);
    let chunker = TextChunker::new(ChunkConfig::new(args.chunk_size, args.overlap))?;
    let chunks = chunker.chunk(source, &text);

    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}
