mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::economics::CalculateArgs;
use commands::sensitivity::SensitivityArgs;

/// Energy-storage investment economics
#[derive(Parser)]
#[command(
    name = "esa",
    version,
    about = "Energy-storage investment economics",
    long_about = "A CLI for evaluating grid-scale battery storage investments with \
                  decimal precision. Runs a full discounted-cash-flow model (arbitrage \
                  and ancillary-service revenues, VAT, depreciation, debt service, \
                  tax-loss carryforward) and one-dimensional sensitivity sweeps."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full economic analysis on a parameter bag
    Calculate(CalculateArgs),
    /// Run a sensitivity sweep over one input parameter
    Sensitivity(SensitivityArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calculate(args) => commands::economics::run_calculate(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::Version => {
            println!("esa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
