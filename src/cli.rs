use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hugin")]
#[command(author, version, about = "Movie and person metadata lookup across multiple providers")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Look up a movie by title or IMDb id
    Movie {
        /// Movie title
        #[arg(short, long, required_unless_present = "imdb")]
        title: Option<String>,

        /// IMDb id (e.g. tt0401792)
        #[arg(long)]
        imdb: Option<String>,

        /// Release year
        #[arg(short, long)]
        year: Option<u16>,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Look up a person by name
    Person {
        /// Person name
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// List registered providers and whether they are usable
    Providers,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Flags shared by every lookup command. Unset flags fall back to the
/// `[query]` section of the config.
#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Number of results to return
    #[arg(short, long)]
    pub amount: Option<usize>,

    /// Retry budget per job
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Comma-separated provider allow-list
    #[arg(short, long, value_delimiter = ',')]
    pub providers: Option<Vec<String>>,

    /// Result selection strategy (flat or deep)
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Query language (e.g. en, de)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Bypass the response cache
    #[arg(long)]
    pub no_cache: bool,
}
