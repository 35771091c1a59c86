#![forbid(unsafe_code)]
//! Verify an exported chain (the JSON served by `GET /blocks`) offline.

use chrono::DateTime;
use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use linkchain::blockchain::{parse_chain, validate_chain, Block};
use linkchain::ChainError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file holding an array of blocks
    file: PathBuf,
    /// Only print the verdict
    #[arg(long)]
    quiet: bool,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let content = std::fs::read_to_string(&cli.file)
        .map_err(|e| format!("Failed to read {}: {}", cli.file.display(), e))?;
    let raw: Vec<serde_json::Value> = serde_json::from_str(&content)
        .map_err(|e| format!("{} is not a JSON array of blocks: {}", cli.file.display(), e))?;

    let verdict = parse_chain(&raw).and_then(|chain| validate_chain(&chain).map(|_| chain));

    match verdict {
        Ok(chain) => {
            if !cli.quiet {
                print_table(&chain, None);
            }
            println!(
                "{} {} blocks, tail {}",
                "✅ Chain is valid:".bright_green().bold(),
                chain.len(),
                chain[chain.len() - 1].short_hash()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if !cli.quiet {
                if let Ok(chain) = parse_chain(&raw) {
                    print_table(&chain, failing_position(&e));
                }
            }
            println!("{} {}", "❌ Chain is invalid:".red().bold(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn failing_position(err: &ChainError) -> Option<usize> {
    match err {
        ChainError::ChainInvalid { position, .. } => Some(*position),
        _ => None,
    }
}

fn print_table(chain: &[Block], failed_at: Option<usize>) {
    let header = |name: &str| Cell::new(name).fg(TableColor::Cyan).add_attribute(Attribute::Bold);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            header("Index"),
            header("Hash"),
            header("Previous"),
            header("Time"),
            header("Data"),
        ]);

    for (position, block) in chain.iter().enumerate() {
        let color = match failed_at {
            Some(p) if p == position => TableColor::Red,
            Some(p) if position > p => TableColor::Grey,
            _ => TableColor::White,
        };
        table.add_row(vec![
            Cell::new(format!("#{}", block.index)).fg(color),
            Cell::new(block.short_hash()).fg(color),
            Cell::new(block.previous_hash.as_deref().map(short).unwrap_or("null")).fg(color),
            Cell::new(format_timestamp(block.timestamp)).fg(TableColor::Grey),
            Cell::new(&block.data).fg(color),
        ]);
    }

    println!("{}", table);
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn format_timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Invalid".to_string())
}
