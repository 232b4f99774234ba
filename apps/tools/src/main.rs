mod dataset_report;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, AssetLoader, AssetLocation, LocalAssetLoader};
use shared::domain::ScriptRecord;
use tracing_subscriber::EnvFilter;

use crate::dataset_report::{preview, validate_records, DatasetSummary, LengthSummary};

#[derive(Parser, Debug)]
#[command(name = "dramabench-tools", about = "Inspect a DramaBench script dataset")]
struct Cli {
    /// Dataset path or URL; defaults to the configured dataset.
    #[arg(long)]
    dataset: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample count, text lengths and split distribution.
    Stats,
    /// Check every record; exits non-zero when any problem is found.
    Validate,
    /// Print one record (1-based) with truncated text.
    Sample {
        index: usize,
        #[arg(long, default_value_t = 200)]
        max_chars: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = load_settings();
    let dataset = AssetLocation::parse(cli.dataset.as_deref().unwrap_or(&settings.dataset_location));
    let loader = LocalAssetLoader::new(
        AssetLocation::parse(&settings.template_location),
        dataset.clone(),
    );
    let records = loader
        .load_dataset()
        .await
        .with_context(|| format!("failed to load dataset {}", dataset.describe()))?;
    tracing::info!(count = records.len(), source = %dataset.describe(), "dataset loaded");

    match cli.command {
        Command::Stats => print_stats(&DatasetSummary::from_records(&records)),
        Command::Validate => {
            let issues = validate_records(&records);
            for issue in &issues {
                println!("#{} ({}): {}", issue.position, issue.id, issue.problem);
            }
            if !issues.is_empty() {
                bail!("{} problem(s) in {} records", issues.len(), records.len());
            }
            println!("{} records OK", records.len());
        }
        Command::Sample { index, max_chars } => {
            let Some(record) = index.checked_sub(1).and_then(|i| records.get(i)) else {
                bail!("no record number {index} ({} available)", records.len());
            };
            print_sample(record, max_chars)?;
        }
    }

    Ok(())
}

fn print_stats(summary: &DatasetSummary) {
    println!("Total samples: {}", summary.samples);
    println!("Unique ids: {}/{}", summary.unique_ids, summary.samples);
    print_lengths("Context", summary.context_chars);
    print_lengths("Continuation", summary.continuation_chars);
    if let Some(ratio) = summary.avg_split_ratio {
        println!("Average split ratio: {ratio:.3}");
    }
    println!("Split types:");
    for (split_type, count) in &summary.split_types {
        println!(
            "  - {split_type}: {count} ({:.1}%)",
            summary.split_share(split_type)
        );
    }
}

fn print_lengths(label: &str, lengths: Option<LengthSummary>) {
    if let Some(lengths) = lengths {
        println!(
            "{label} lengths: min {} / max {} / avg {:.0} chars",
            lengths.min, lengths.max, lengths.avg
        );
    }
}

fn print_sample(record: &ScriptRecord, max_chars: usize) -> Result<()> {
    println!("ID: {}", record.id);
    println!("Title: {}", record.title);
    println!("Description: {}", preview(&record.description, 100));
    println!();
    println!("Context preview:");
    println!("{}", preview(&record.context, max_chars));
    println!();
    println!("Continuation preview:");
    println!("{}", preview(&record.continuation, max_chars));
    println!();
    println!("Stats:");
    println!("{}", serde_json::to_string_pretty(&record.stats)?);
    Ok(())
}
