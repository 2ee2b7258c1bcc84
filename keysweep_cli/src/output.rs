//! Rendering of run reports

use anyhow::Result;
use colored::Colorize;
use keysweep_core::DeduplicationReport;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a finished run's report to stdout
pub fn print_report(report: &DeduplicationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            if !report.audit.is_empty() {
                println!("{}", "Changes".bold());
                for line in &report.audit {
                    println!("  {line}");
                }
            }

            if report.is_clean() {
                println!(
                    "{} {} record(s) repaired",
                    "OK".green().bold(),
                    report.repaired
                );
            } else {
                println!(
                    "{} {} record(s) repaired, {} error(s)",
                    "FAILED".red().bold(),
                    report.repaired,
                    report.errors.len()
                );
                for error in &report.errors {
                    eprintln!("  {} {error}", "error:".red());
                }
            }
        }
    }
    Ok(())
}

/// Print the scan queries a run would issue, without issuing them
pub fn print_plan(queries: &[keysweep_core::Query], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(queries)?);
        }
        OutputFormat::Text => {
            if queries.is_empty() {
                println!("Nothing to scan");
            } else {
                println!("{}", format!("{} scan quer(ies)", queries.len()).bold());
                for query in queries {
                    println!("  {}", query.text);
                }
            }
        }
    }
    Ok(())
}
