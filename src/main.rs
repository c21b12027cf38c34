//! Command line entry point of the report builder.
//!
//! ```sh
//! report-builder deck 202602 --input-dir ./csv
//! report-builder validate tasks/20260301/output/JCB報告資料_202602.pptx
//! report-builder monthly 202602 --point ./point.csv
//! ```
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use report_builder::deck::validate;
use report_builder::report;
use report_builder::report::monthly;
use report_builder::ReportConfig;
use std::path::PathBuf;
use std::process::ExitCode;

/// Generate report decks and monthly spreadsheets from CSV/Excel extracts
#[derive(Parser, Debug)]
#[command(name = "report-builder", version)]
struct Cli {
    /// YAML configuration file; defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one slide per entity and merge them into one deck
    Deck {
        /// Target month (YYYYMM)
        period: String,

        /// Input files; when omitted, --input-dir is read
        files: Vec<PathBuf>,

        /// Directory whose CSV/XLSX files are used as inputs
        #[arg(long, value_name = "DIR")]
        input_dir: Option<PathBuf>,

        /// Do not check the output's table structure against the template
        #[arg(long)]
        skip_validation: bool,
    },

    /// Check the table structure of a deck against the template
    Validate {
        deck: PathBuf,

        /// Template to compare with; the configured template by default
        #[arg(long, value_name = "FILE")]
        template: Option<PathBuf>,
    },

    /// Generate the monthly campaign cost and point usage workbooks
    Monthly {
        /// Target month (YYYYMM)
        period: String,

        #[arg(long, value_name = "FILE")]
        campaign: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        discount: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        point: Option<PathBuf>,

        /// Output directory; `<output_dir>/<period>` by default
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> Result<bool> {
    let config = ReportConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    match cli.command {
        Command::Deck {
            period,
            files,
            input_dir,
            skip_validation,
        } => {
            let request = report::DeckRequest {
                period,
                files,
                input_dir,
                skip_validation,
            };
            let date = chrono::Local::now().format("%Y%m%d").to_string();
            let summary = report::run_deck(&config, &request, &date).context("Deck generation failed")?;
            summary.log();
            Ok(summary.is_success())
        }
        Command::Validate { deck, template } => {
            let template = template.unwrap_or_else(|| config.template.clone());
            let issues = validate::validate_files(&deck, &template)
                .with_context(|| format!("Failed to validate '{}'", deck.display()))?;
            validate::report(&issues);
            Ok(!validate::has_errors(&issues))
        }
        Command::Monthly {
            period,
            campaign,
            discount,
            point,
            output,
        } => {
            let request = monthly::MonthlyRequest {
                period,
                campaign,
                discount,
                point,
                output,
            };
            let outcome = monthly::run_monthly(&config.monthly, &request).context("Monthly reports failed")?;
            for output in &outcome.outputs {
                log::info!("Generated {}", output.display());
            }
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            log::error!("{:#}", error);
            ExitCode::FAILURE
        }
    }
}
