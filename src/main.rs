use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apidelta::cli;

#[derive(Parser)]
#[command(name = "apidelta", version)]
#[command(about = "Report top-level API changes in Python files between two revisions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare files between two revisions and print an API change report
    Diff {
        /// Files to analyze, relative to the repository root
        #[arg(required = true)]
        files: Vec<String>,

        /// Base git reference (e.g., commit SHA, branch, HEAD~1)
        #[arg(long)]
        base: String,

        /// Head git reference, or "current" for the working copy
        #[arg(long, default_value = "current")]
        head: String,

        /// Repository path (defaults to current directory)
        #[arg(long, default_value = ".")]
        repo: String,

        /// Path to config file (defaults to ./apidelta.toml or ~/.config/apidelta/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Report format: markdown, json
        #[arg(long)]
        format: Option<String>,

        /// Also write the report to this file
        #[arg(short = 'o', long)]
        output: Option<String>,

        /// Parse failure policy: abort, treat_as_empty
        #[arg(long)]
        on_parse_error: Option<String>,

        /// Comparison granularity: names, signatures, full
        #[arg(long)]
        granularity: Option<String>,
    },
    /// Print the top-level declarations of one file as JSON
    Summary {
        /// File to summarize, relative to the repository root
        file: String,

        /// Git reference, or "current" for the working copy
        #[arg(long, default_value = "current")]
        revision: String,

        /// Repository path (defaults to current directory)
        #[arg(long, default_value = ".")]
        repo: String,

        /// Path to config file
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Diff {
            files,
            base,
            head,
            repo,
            config,
            format,
            output,
            on_parse_error,
            granularity,
        } => {
            cli::diff::run(
                files,
                base,
                head,
                repo,
                config,
                format,
                output,
                on_parse_error,
                granularity,
            )?;
        }
        Commands::Summary {
            file,
            revision,
            repo,
            config,
        } => {
            cli::summary::run(file, revision, repo, config)?;
        }
    }

    Ok(())
}
