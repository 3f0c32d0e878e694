mod doc;
mod markup;
mod record;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aips_cleaner", about = "Clean AIPS medication XML exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an AIPS export into cleaned per-medication XML
    Convert {
        /// Path of the AIPS export to read
        input: PathBuf,
        /// Path of the output file; will be overwritten
        output: PathBuf,
    },
    /// Record and section statistics for an AIPS export
    Stats {
        /// Path of the AIPS export to read
        input: PathBuf,
        /// Max section ids to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert { input, output } => {
            println!("Converting {} -> {}", input.display(), output.display());
            let counts = doc::convert_file(&input, &output)?;
            counts.print();
            Ok(())
        }
        Commands::Stats { input, limit } => {
            let stats = doc::gather_stats(&input)?;
            println!("Records:      {}", stats.records);
            println!("With content: {}", stats.with_content);
            if !stats.section_ids.is_empty() {
                println!("\n{:<32} | {:>6}", "Section id", "Count");
                println!("{}", "-".repeat(41));
                for (id, count) in stats.section_ids.iter().take(limit) {
                    println!("{:<32} | {:>6}", truncate(id, 32), count);
                }
                if stats.section_ids.len() > limit {
                    println!("... {} more", stats.section_ids.len() - limit);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
