use std::path::Path;

use anyhow::Context;
use cmerge_core::{
    scan_counters, AppConfig, CounterEntry, CounterMerger, KeySchema, MergeConfig, MergeReport,
};
use cmerge_store::{KvStore, RespKvStore};
use colored::Colorize;

use crate::cli::*;

const DEFAULT_CONFIG_PATH: &str = "cmerge.toml";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    match cli.command {
        Command::Merge(args) => cmd_merge(&config, args, cli.format).await,
        Command::Scan(args) => cmd_scan(&config, args, cli.format).await,
        Command::Config(_) => cmd_config(&config, cli.format),
    }
}

/// Load the config file, then apply command-line overrides on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
    };
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.store.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.store.port = port;
    }
    if let Some(password) = &cli.password {
        config.store.password = Some(password.clone());
    }
    if let Some(db) = cli.db {
        config.store.db = db;
    }
    if let Some(database) = &cli.database {
        config.namespace.database = database.clone();
    }
    if let Some(domain) = &cli.domain {
        config.namespace.domain = domain.clone();
    }
    if let Some(scope) = &cli.scope {
        config.namespace.scope = scope.clone();
    }
}

fn merge_config(config: &AppConfig, args: &MergeArgs) -> anyhow::Result<MergeConfig> {
    let source = args
        .source
        .or(config.merge.source_id)
        .context("no source shard: pass --source or set merge.source_id")?;
    let dest = args
        .dest
        .or(config.merge.dest_id)
        .context("no destination shard: pass --dest or set merge.dest_id")?;

    let mut merge = MergeConfig::new(config.namespace.clone(), source, dest);
    merge.scan_count = config.store.scan_count;
    merge.dry_run = args.dry_run;
    merge.validate()?;
    Ok(merge)
}

async fn connect(config: &AppConfig) -> anyhow::Result<RespKvStore> {
    RespKvStore::connect(&config.store)
        .await
        .with_context(|| format!("connecting to {}", config.store.addr()))
}

async fn cmd_merge(config: &AppConfig, args: MergeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let merge = merge_config(config, &args)?;
    let store = connect(config).await?;
    let report = run_merge(&store, merge).await?;
    print!("{}", render_report(&report, format)?);
    Ok(())
}

async fn run_merge<S: KvStore + ?Sized>(store: &S, merge: MergeConfig) -> anyhow::Result<MergeReport> {
    let merger = CounterMerger::new(store, merge)?;
    let report = merger.merge().await.context("counter merge aborted")?;
    Ok(report)
}

fn render_report(report: &MergeReport, format: OutputFormat) -> anyhow::Result<String> {
    let mut out = String::new();
    match format {
        OutputFormat::Json => {
            out.push_str(&serde_json::to_string_pretty(report)?);
            out.push('\n');
        }
        OutputFormat::Text => {
            for record in &report.records {
                out.push_str(&format!("{record}\n"));
            }
            let mode = if report.dry_run { " (dry run)".yellow().to_string() } else { String::new() };
            out.push_str(&format!(
                "{} shard {} -> shard {}: {} scanned, {} written, {} not written{}\n",
                "✓".green().bold(),
                report.source_id,
                report.dest_id,
                report.len(),
                report.written_count(),
                report.skipped_count(),
                mode,
            ));
        }
    }
    Ok(out)
}

async fn cmd_scan(config: &AppConfig, args: ScanArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = connect(config).await?;
    let entries = run_scan(&store, config, args.shard).await?;
    print!("{}", render_entries(&entries, format)?);
    Ok(())
}

async fn run_scan<S: KvStore + ?Sized>(
    store: &S,
    config: &AppConfig,
    shard: u32,
) -> anyhow::Result<Vec<CounterEntry>> {
    let schema = KeySchema::new(&config.namespace)?;
    let pattern = schema.scan_pattern(shard);
    let entries = scan_counters(store, &pattern, config.store.scan_count.max(1))
        .await
        .with_context(|| format!("scanning {pattern}"))?;
    Ok(entries)
}

fn render_entries(entries: &[CounterEntry], format: OutputFormat) -> anyhow::Result<String> {
    let mut out = String::new();
    match format {
        OutputFormat::Json => {
            out.push_str(&serde_json::to_string_pretty(entries)?);
            out.push('\n');
        }
        OutputFormat::Text => {
            for entry in entries {
                out.push_str(&format!("{} = {}\n", entry.key, entry.value));
            }
            let total: i64 = entries.iter().map(|e| e.value).sum();
            out.push_str(&format!("{} counters, total {}\n", entries.len(), total));
        }
    }
    Ok(out)
}

fn cmd_config(config: &AppConfig, format: OutputFormat) -> anyhow::Result<()> {
    print!("{}", render_config(config, format)?);
    Ok(())
}

fn render_config(config: &AppConfig, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(config.to_redacted_toml()?),
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(&config.redacted())?;
            out.push('\n');
            Ok(out)
        }
    }
}
