use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "askcode",
    version,
    about = "Index a repository into line chunks and retrieve code context for a question"
)]
pub struct Cli {
    /// Path to the TOML config file (default: $ASKCODE_CONFIG or askcode.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store directory holding chunks.sqlite, index.usearch and meta.json
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Ollama base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chunk, embed and store a repository
    Index(IndexArgs),
    /// Retrieve the most relevant chunks for a question
    Ask(AskArgs),
    /// Show the store descriptor, record count and index alignment
    Status,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Repository root to index
    #[arg(default_value = ".")]
    pub repo: PathBuf,

    /// Discard the existing store and build a new one
    #[arg(long)]
    pub rebuild: bool,

    /// Embedding model
    #[arg(long)]
    pub embed_model: Option<String>,

    /// Lines per chunk
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Lines shared by consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Extension to index; repeatable, replaces the built-in set
    #[arg(long = "include", value_name = "EXT")]
    pub include: Vec<String>,

    /// Directory name to skip; repeatable, adds to the built-in set
    #[arg(long = "exclude", value_name = "DIR")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    /// Natural-language question about the code
    pub question: String,

    /// Number of distinct files to retrieve
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Character budget for the combined context
    #[arg(short = 'm', long)]
    pub max_context_chars: Option<usize>,

    /// Condense the context with the generation model and save it to a summary file
    #[arg(long)]
    pub summarize: bool,

    /// Slug for the summary file name (default: derived from the question)
    #[arg(long)]
    pub task: Option<String>,

    /// Generation model used by --summarize
    #[arg(long)]
    pub gen_model: Option<String>,
}

impl Cli {
    /// Apply flags on top of file and env configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(store) = &self.store {
            config.store.path.clone_from(store);
        }
        if let Some(url) = &self.base_url {
            config.llm.base_url.clone_from(url);
        }

        match &self.command {
            Command::Index(args) => {
                if let Some(model) = &args.embed_model {
                    config.llm.embedding_model.clone_from(model);
                }
                if let Some(n) = args.max_lines {
                    config.chunker.max_lines = n;
                }
                if let Some(n) = args.overlap {
                    config.chunker.overlap = n;
                }
                if !args.include.is_empty() {
                    config.walker.include.clone_from(&args.include);
                }
                config.walker.exclude.extend(args.exclude.iter().cloned());
            }
            Command::Ask(args) => {
                if let Some(k) = args.k {
                    config.retrieval.k = k;
                }
                if let Some(chars) = args.max_context_chars {
                    config.retrieval.max_context_chars = chars;
                }
                if let Some(model) = &args.gen_model {
                    config.llm.generation_model.clone_from(model);
                }
            }
            Command::Status | Command::Config => {}
        }
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
