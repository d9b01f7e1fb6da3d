use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "quote-dedup")]
#[command(about = "Find and merge near-duplicate quotes", long_about = None)]
pub struct Cli {
    /// SQLite database path (overrides configuration)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a single quote
    Add {
        text: String,
        #[arg(short, long)]
        author: String,
        /// Language code: en, es, pt or it
        #[arg(short, long, default_value = "en")]
        language: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Import quotes from a text file, one `"text" - author` per line
    Import {
        file: PathBuf,
        #[arg(short, long, default_value = "en")]
        language: String,
    },
    /// List stored quotes
    List {
        #[arg(short, long)]
        language: Option<String>,
        /// positive, negative or neutral
        #[arg(long)]
        sentiment: Option<String>,
        /// Case-insensitive substring of the author
        #[arg(short, long)]
        author: Option<String>,
        #[arg(long)]
        verified: Option<bool>,
        /// Case-insensitive substring of the text or author
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show counts by language, sentiment and verification
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Report pairs of quotes whose texts are near-duplicates
    FindDuplicates {
        /// Similarity threshold, clamped to [0.1, 1.0]
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep the primary quote and delete the listed duplicates
    Merge {
        #[arg(short, long)]
        primary: i64,
        #[arg(required = true)]
        duplicates: Vec<i64>,
        #[arg(long)]
        json: bool,
    },
    /// Merge every duplicate cluster into its oldest quote
    AutoMerge {
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Print configuration values
    PrintConfig,
    /// Delete every stored quote
    TruncateDb,
}
