//! practiscope - attempt analytics for emotion and speech practice
//!
//! Serves the analytics HTTP API and prints reports from the command line.

mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use practiscope_core::analytics::{
    ChildReport, GroupStats, Period, ReportAssembler, ReportSettings, StatsQuery,
};
use practiscope_core::format::{format_rate, format_relative_time, format_summary};
use practiscope_core::{Config, Database};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "practiscope")]
#[command(about = "Pass-rate analytics for emotion and speech practice attempts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides `server.bind` from the config)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the guardian report for one child
    Report {
        /// Child identifier
        #[arg(short, long)]
        child: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print per-card speech stats across children
    Stats {
        /// Restrict to one child
        #[arg(short, long)]
        child: Option<String>,

        /// Time window: all, week, month or year
        #[arg(short, long)]
        period: Option<String>,

        /// Card category, e.g. food
        #[arg(long)]
        category: Option<String>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = practiscope_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    let db = Arc::new(db);

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            serve(db, &config, &bind).await
        }
        Command::Report { child, format } => {
            let assembler = ReportAssembler::new(db, ReportSettings::from(&config.analytics));
            let report = assembler
                .child_report(&child)
                .await
                .context("failed to build child report")?;
            match format {
                OutputFormat::Json => print_json(&report),
                OutputFormat::Text => {
                    print_report(&report);
                    Ok(())
                }
            }
        }
        Command::Stats {
            child,
            period,
            category,
            format,
        } => {
            let assembler = ReportAssembler::new(db, ReportSettings::from(&config.analytics));
            let query = StatsQuery {
                child_id: child,
                category,
                period: Period::parse(period.as_deref()),
            };
            let stats = assembler
                .therapist_stats(&query, Utc::now())
                .await
                .context("failed to build stats")?;
            match format {
                OutputFormat::Json => print_json(&stats),
                OutputFormat::Text => {
                    print_stats(&query, &stats);
                    Ok(())
                }
            }
        }
    }
}

async fn serve(db: Arc<Database>, config: &Config, bind: &str) -> Result<()> {
    let state = api::AppState::new(db, &config.analytics);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    let addr = listener.local_addr().context("failed to read bound address")?;

    tracing::info!(%addr, "practiscope API listening");
    println!("practiscope listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("practiscope API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", rendered);
    Ok(())
}

fn print_report(report: &ChildReport) {
    println!("Child {}", report.child_id);
    println!("  {}", format_summary(&report.overall));

    if !report.by_emotion.is_empty() {
        println!();
        println!("By emotion:");
        for group in &report.by_emotion {
            println!("  {:<10} {}", group.key, format_summary(&group.summary));
        }
    }

    if !report.recent.is_empty() {
        println!();
        println!("Recent:");
        for attempt in &report.recent {
            println!(
                "  #{:<6} {:<8} {:<20} {:<6} {}",
                attempt.id,
                attempt.practice.kind().as_str(),
                attempt.practice.dimension_key(),
                if attempt.passed { "pass" } else { "fail" },
                format_relative_time(attempt.created_at)
            );
        }
    }
}

fn print_stats(query: &StatsQuery, stats: &[GroupStats]) {
    if stats.is_empty() {
        println!("No speech attempts in period '{}'.", query.period.as_str());
        return;
    }

    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>10}",
        "CARD", "ATTEMPTS", "PASSES", "RATE", "AVG STARS"
    );
    for group in stats {
        println!(
            "{:<24} {:>8} {:>8} {:>8} {:>10.1}",
            group.key,
            group.summary.attempts,
            group.summary.passes,
            format_rate(group.summary.pass_rate),
            group.summary.avg_stars
        );
    }
}
