use anyhow::Result;
use clap::{Parser, Subcommand};
use council_runner::commands::{self, AggregateRequest, SchemaKind};
use std::io::Write;
use std::path::PathBuf;

/// Review council runner: wave gating, verdict aggregation and review publishing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether the next review wave should run
    WaveGate {
        /// Council config file (.toml, .yml or .yaml)
        #[arg(long)]
        config: PathBuf,
        /// Directory of per-reviewer verdict JSON files
        #[arg(long)]
        verdicts: PathBuf,
        /// Wave that just completed
        #[arg(long)]
        wave: String,
        /// Tier of the change under review
        #[arg(long)]
        tier: String,
        /// Write the JSON decision record here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Aggregate verdicts offline, with an optional override comment feed
    Aggregate {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        verdicts: PathBuf,
        /// Head commit the verdicts were produced for
        #[arg(long)]
        head_sha: String,
        /// JSON array of PR comments, oldest first
        #[arg(long)]
        comments: Option<PathBuf>,
        /// JSON object mapping actor login to permission name
        #[arg(long)]
        permissions: Option<PathBuf>,
        /// Login of the pull request author
        #[arg(long)]
        pr_author: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the line-to-position mapping for one file's diff
    Positions {
        #[arg(long)]
        diff: PathBuf,
    },

    /// Aggregate verdicts and post the review to a GitHub pull request (needs GITHUB_TOKEN)
    Publish {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        verdicts: PathBuf,
        /// Repository as owner/name
        #[arg(long)]
        repo: String,
        /// Pull request number
        #[arg(long)]
        pr: u64,
    },

    /// Print the JSON Schema of a decision record
    Schema {
        #[arg(value_enum)]
        kind: SchemaKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries results, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "council=info,council_runner=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let out = match args.command {
        Command::WaveGate {
            config,
            verdicts,
            wave,
            tier,
            output,
        } => commands::wave_gate(&config, &verdicts, &wave, &tier, output.as_deref())?,
        Command::Aggregate {
            config,
            verdicts,
            head_sha,
            comments,
            permissions,
            pr_author,
            output,
        } => commands::aggregate(&AggregateRequest {
            config,
            verdicts,
            head_sha,
            comments,
            permissions,
            pr_author,
            output,
        })?,
        Command::Positions { diff } => commands::positions(&diff)?,
        Command::Publish {
            config,
            verdicts,
            repo,
            pr,
        } => commands::publish(&config, &verdicts, &repo, pr).await?,
        Command::Schema { kind } => commands::schema(kind)?,
    };

    std::io::stdout().lock().write_all(out.as_bytes())?;
    Ok(())
}
