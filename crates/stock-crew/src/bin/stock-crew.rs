//! stock-crew command line
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! stock-crew research AAPL --chart aapl.svg
//! stock-crew compare AAPL MSFT NVDA
//! stock-crew serve --addr 0.0.0.0:8501
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use crew_runtime::LoggingEventHandler;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use stock_crew::dashboard::{self, AppState};
use stock_crew::{AppConfig, ResearchReport, ResearchRequest, ResearchService};
use tracing::info;

/// Exit code for missing or invalid configuration
const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "stock-crew", version)]
#[command(about = "Research stocks with a crew of LLM agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research one ticker
    Research {
        ticker: String,
        /// Write the price chart as SVG
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Compare several tickers in one report
    Compare {
        #[arg(required = true, num_args = 1..)]
        tickers: Vec<String>,
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Run the web dashboard
    Serve {
        /// Overrides STOCK_CREW_ADDR
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    crew_utils::init_tracing();

    let cli = Cli::parse();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    info!(?config, "Configuration loaded");

    match cli.command {
        Command::Research { ticker, chart } => run_research(&config, &[ticker], chart).await,
        Command::Compare { tickers, chart } => run_research(&config, &tickers, chart).await,
        Command::Serve { addr } => {
            if let Some(addr) = addr {
                config.addr = addr;
            }
            let addr = config.addr;
            let state = AppState::from_config(config)?;
            dashboard::serve(state, addr)
                .await
                .with_context(|| format!("dashboard failed on {addr}"))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_research(
    config: &AppConfig,
    tickers: &[String],
    chart: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let service = match ResearchService::from_config(config, Some(Arc::new(LoggingEventHandler))) {
        Ok(service) => service,
        Err(e) if e.is_config() => {
            eprintln!("{e}");
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
        Err(e) => return Err(e.into()),
    };

    let request = ResearchRequest::new(tickers, config.date_range);
    let report = match service.run(&request).await {
        Ok(report) => report,
        Err(e) if e.is_user_error() => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", summary_table(&report));
    for failure in &report.failures {
        eprintln!("{}: {}", failure.ticker, failure.error);
    }

    if let Some(path) = chart {
        std::fs::write(&path, &report.chart_svg)
            .with_context(|| format!("failed to write chart to {}", path.display()))?;
        println!("Chart written to {}", path.display());
    }

    println!("\nResults of your research:\n");
    if let Some(text) = &report.report {
        println!("{text}");
    }
    if let Some(usage) = report.token_usage {
        println!(
            "\nTokens: {} in, {} out",
            usage.input_tokens, usage.output_tokens
        );
    }
    if let Some(err) = &report.report_error {
        eprintln!("{err}");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn summary_table(report: &ResearchReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Ticker", "From", "To", "First", "Last", "Change %", "High", "Low",
        ]);

    for s in &report.summaries {
        table.add_row(vec![
            s.ticker.clone(),
            s.first_date.to_string(),
            s.last_date.to_string(),
            format!("{:.2}", s.first_close),
            format!("{:.2}", s.last_close),
            format!("{:+.2}", s.change_pct),
            format!("{:.2}", s.high),
            format!("{:.2}", s.low),
        ]);
    }
    table
}
