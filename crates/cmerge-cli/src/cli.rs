use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cmerge",
    about = "Fold the counters of one server shard into another",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file. Defaults to ./cmerge.toml when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub host: Option<String>,

    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[arg(long, global = true, env = "CMERGE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, global = true)]
    pub db: Option<u32>,

    /// Overrides namespace.database.
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Overrides namespace.domain.
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Overrides namespace.scope.
    #[arg(long, global = true)]
    pub scope: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add every counter of the source shard into the destination shard
    Merge(MergeArgs),
    /// List the counters of one shard
    Scan(ScanArgs),
    /// Print the effective configuration (TOML, or JSON with --format json)
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct MergeArgs {
    /// Shard whose counters are folded in (merge.source_id)
    #[arg(long)]
    pub source: Option<u32>,
    /// Shard that receives the sums (merge.dest_id)
    #[arg(long)]
    pub dest: Option<u32>,
    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct ScanArgs {
    pub shard: u32,
}

#[derive(Args)]
pub struct ConfigArgs {}
