//! qlat: break a query's latency down into CPU, IO and starvation time from
//! a binary scheduler trace log.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use qlat::analyze::{Analysis, DEFAULT_TICK_SCALE};
use qlat::window::{cdf_positions, WindowSampler};

#[derive(Parser)]
#[command(name = "qlat")]
#[command(about = "Analyze query latency from a scheduler trace log")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Nanoseconds per hardware tick (offline TSC calibration)
    #[arg(long, default_value_t = DEFAULT_TICK_SCALE)]
    tick_scale: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print whole-trace latency breakdown averages
    Summary {
        /// Path to the trace file
        trace: PathBuf,

        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Print the log-domain tail-latency curve
    Percentiles {
        /// Path to the trace file
        trace: PathBuf,

        /// Output format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
    /// Print averages and CDFs restricted to a percentile window
    Window {
        /// Path to the trace file
        trace: PathBuf,

        /// Window start, as a "1-in-x" rank domain value
        #[arg(long, default_value_t = 1.0)]
        x1: f64,

        /// Window end, same domain
        #[arg(long, default_value_t = 100000.0)]
        x2: f64,

        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Print the event log for a single query
    Log {
        /// Path to the trace file
        trace: PathBuf,

        /// Query id (correlation key) to inspect
        #[arg(short, long)]
        query: u64,

        /// Show every chronological record in the query's time window, not
        /// just the query's own records
        #[arg(long)]
        full: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Summary { trace, format } => {
            let analysis = Analysis::load(&trace, cli.tick_scale)?;
            print_summary(&analysis, &format)
        }
        Commands::Percentiles { trace, format } => {
            let analysis = Analysis::load(&trace, cli.tick_scale)?;
            print_percentiles(&analysis, &format)
        }
        Commands::Window {
            trace,
            x1,
            x2,
            format,
        } => {
            let analysis = Analysis::load(&trace, cli.tick_scale)?;
            print_window(&analysis, x1, x2, &format)
        }
        Commands::Log { trace, query, full } => {
            let analysis = Analysis::load(&trace, cli.tick_scale)?;
            print_log(&analysis, query, full)
        }
    }
}

fn print_summary(analysis: &Analysis, format: &str) -> Result<()> {
    let summary = analysis.summary();
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "table" => {
            println!("{:10} {}", "RECORDS", summary.records);
            println!("{:10} {}", "QUERIES", summary.queries);
            println!("{:10} {:12.9}", "CPU", summary.avg_cputime_ms);
            println!("{:10} {:12.9}", "STARVE", summary.avg_starvetime_ms);
            println!("{:10} {:12.9}", "IO", summary.avg_iotime_ms);
            println!("{:10} {:12.9}", "TOTAL", summary.avg_latency_ms);
            println!("{:10} {:12.9}", "MAX", summary.max_latency_ms);
        }
        _ => bail!("Invalid format: {format}. Must be one of: table, json"),
    }
    Ok(())
}

fn print_percentiles(analysis: &Analysis, format: &str) -> Result<()> {
    let curve = &analysis.curve;
    match format {
        "json" => println!("{}", serde_json::to_string(curve)?),
        "csv" => {
            println!("one_in_x,latency_ns");
            for (x, y) in curve.xs.iter().zip(curve.ys.iter()) {
                println!("{x},{y}");
            }
        }
        _ => bail!("Invalid format: {format}. Must be one of: csv, json"),
    }
    Ok(())
}

fn print_window(analysis: &Analysis, x1: f64, x2: f64, format: &str) -> Result<()> {
    let mut sampler = WindowSampler::new();
    let stats = sampler.sample(&analysis.queries, x1, x2)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(stats)?),
        "table" => {
            println!(
                "window: queries {}..={} of {}",
                stats.first,
                stats.last,
                analysis.queries.len()
            );
            println!("{:10} {:12.9}", "CPU", stats.avg_cputime_ns / 1e6);
            println!("{:10} {:12.9}", "STARVE", stats.avg_starvetime_ns / 1e6);
            println!("{:10} {:12.9}", "IO", stats.avg_iotime_ns / 1e6);
            println!("{:10} {:12.9}", "TOTAL", stats.avg_latency_ns / 1e6);
            println!();
            println!("p,cputime_ns,iotime_ns,starvetime_ns,latency_ns");
            let positions = cdf_positions();
            for (k, p) in positions.iter().enumerate() {
                println!(
                    "{p},{},{},{},{}",
                    stats.cputime_cdf[k],
                    stats.iotime_cdf[k],
                    stats.starvetime_cdf[k],
                    stats.latency_cdf[k]
                );
            }
        }
        _ => bail!("Invalid format: {format}. Must be one of: table, json"),
    }
    Ok(())
}

fn print_log(analysis: &Analysis, query: u64, full: bool) -> Result<()> {
    let store = &analysis.store;
    let range = store.correlated_range(query);
    if range.is_empty() {
        bail!("No records for query {query:x}");
    }
    let start_ts = store.correlated(range.start).ts;
    let end_ts = store.correlated(range.end - 1).ts;

    if let Some(q) = analysis.query_by_id(query) {
        println!("{:10} {:12.9}", "CPU", q.cputime_ns / 1e6);
        println!("{:10} {:12.9}", "STARVE", q.starvetime_ns / 1e6);
        println!("{:10} {:12.9}", "IO", q.iotime_ns / 1e6);
        println!("{:10} {:12.9}", "TOTAL", q.latency_ns / 1e6);
        println!();
    }

    if full {
        // Every record in the query's chronological bracket, marking the
        // query's own records.
        for e in &store.chronological()[store.chrono_window(start_ts, end_ts)] {
            let offset_ms = (e.ts - start_ts) as f64 * analysis.tick_scale / 1e6;
            let marker = if e.query() == query { '*' } else { ' ' };
            println!(
                "{marker} {offset_ms:12.9}: {:16x}: {}",
                e.query(),
                e.describe()
            );
        }
    } else {
        for i in range {
            let e = store.correlated(i);
            let offset_ms = (e.ts - start_ts) as f64 * analysis.tick_scale / 1e6;
            println!("{offset_ms:12.9}: {}", e.describe());
        }
    }
    Ok(())
}
