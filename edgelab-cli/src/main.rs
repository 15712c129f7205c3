//! EdgeLab CLI — run and sweep commands.
//!
//! Commands:
//! - `run` — execute one backtest over a CSV bar file, print a summary,
//!   write the full report as JSON
//! - `sweep` — grid-search MA crossover parameters over a CSV bar file
//!   and print a ranking table

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use edgelab_runner::runner::BacktestResult;
use edgelab_runner::{
    load_bars, run_sweep, ObjectiveMetric, ParamGrid, RunConfig, SweepOptions,
};

#[derive(Parser)]
#[command(name = "edgelab", about = "EdgeLab CLI — backtesting and risk analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest and write the report as JSON.
    Run {
        /// CSV file of OHLCV bars.
        #[arg(long)]
        data: PathBuf,

        /// TOML run config. Defaults to the built-in MA crossover config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output path for the JSON report.
        #[arg(long, default_value = "report.json")]
        output: PathBuf,

        /// Abort runs longer than this many bars.
        #[arg(long)]
        max_bars: Option<usize>,
    },
    /// Grid-search MA crossover parameters and rank the results.
    Sweep {
        /// CSV file of OHLCV bars.
        #[arg(long)]
        data: PathBuf,

        /// TOML base config; the grid overrides its periods and risk.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Short MA periods to test.
        #[arg(long, value_delimiter = ',', default_values_t = [10, 20, 30])]
        shorts: Vec<usize>,

        /// Long MA periods to test.
        #[arg(long, value_delimiter = ',', default_values_t = [50, 100, 200])]
        longs: Vec<usize>,

        /// Fixed-percent risk fractions to test.
        #[arg(long, value_delimiter = ',', default_values_t = [0.01])]
        risk: Vec<f64>,

        /// Ranking objective: sharpe, sortino, calmar, omega,
        /// annualized_return, total_return, win_rate, profit_factor,
        /// max_drawdown.
        #[arg(long, default_value = "sharpe")]
        objective: String,

        /// Rows to print in the ranking table.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Reject sweeps larger than this many runs.
        #[arg(long, default_value_t = 10_000)]
        max_runs: usize,

        /// Optional output path for the full ranked results as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            data,
            config,
            output,
            max_bars,
        } => cmd_run(&data, config.as_deref(), &output, max_bars),
        Commands::Sweep {
            data,
            config,
            shorts,
            longs,
            risk,
            objective,
            top,
            max_runs,
            output,
        } => cmd_sweep(
            &data,
            config.as_deref(),
            shorts,
            longs,
            risk,
            &objective,
            top,
            max_runs,
            output.as_deref(),
        ),
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(RunConfig::default()),
    }
}

fn cmd_run(
    data: &Path,
    config_path: Option<&Path>,
    output: &Path,
    max_bars: Option<usize>,
) -> Result<()> {
    let bars = load_bars(data).with_context(|| format!("loading bars from {}", data.display()))?;
    let config = load_config(config_path)?;

    let result = edgelab_runner::runner::run_backtest_with_options(&bars, &config, max_bars, None)?;

    print_summary(&result, bars.len());

    let json = result.report.to_json()?;
    fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    println!("Report written to: {}", output.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_sweep(
    data: &Path,
    config_path: Option<&Path>,
    shorts: Vec<usize>,
    longs: Vec<usize>,
    risk: Vec<f64>,
    objective: &str,
    top: usize,
    max_runs: usize,
    output: Option<&Path>,
) -> Result<()> {
    let bars = load_bars(data).with_context(|| format!("loading bars from {}", data.display()))?;
    let base = load_config(config_path)?;
    let grid = ParamGrid {
        short_periods: shorts,
        long_periods: longs,
        risk_pcts: risk,
    };
    let opts = SweepOptions {
        objective: parse_objective(objective)?,
        max_runs,
    };

    let results = run_sweep(&bars, &base, &grid, &opts).context("sweep failed")?;

    println!();
    println!(
        "=== Sweep: {} runs, ranked by {objective} ===",
        results.len()
    );
    println!(
        "{:<5} {:<12} {:>10} {:>10} {:>10} {:>8} {:>8}",
        "Rank", "RunId", "Objective", "Return", "MaxDD", "Trades", "WinRate"
    );
    for (rank, result) in results.top_n(top).iter().enumerate() {
        let report = &result.report;
        println!(
            "{:<5} {:<12} {:>10} {:>9.2}% {:>9.2}% {:>8} {:>8}",
            rank + 1,
            &result.run_id[..12],
            fmt_ratio(opts.objective.extract(report)),
            report.total_return * 100.0,
            report.max_drawdown * 100.0,
            report.total_trades,
            fmt_pct(report.win_rate),
        );
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(results.all())?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!();
        println!("Full results written to: {}", path.display());
    }
    Ok(())
}

fn parse_objective(name: &str) -> Result<ObjectiveMetric> {
    Ok(match name {
        "sharpe" => ObjectiveMetric::Sharpe,
        "sortino" => ObjectiveMetric::Sortino,
        "calmar" => ObjectiveMetric::Calmar,
        "omega" => ObjectiveMetric::Omega,
        "annualized_return" => ObjectiveMetric::AnnualizedReturn,
        "total_return" => ObjectiveMetric::TotalReturn,
        "win_rate" => ObjectiveMetric::WinRate,
        "profit_factor" => ObjectiveMetric::ProfitFactor,
        "max_drawdown" => ObjectiveMetric::MaxDrawdown,
        _ => bail!(
            "unknown objective '{name}'. Valid: sharpe, sortino, calmar, omega, \
             annualized_return, total_return, win_rate, profit_factor, max_drawdown"
        ),
    })
}

fn fmt_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.3}"),
        None => "n/a".to_string(),
    }
}

fn fmt_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

fn print_summary(result: &BacktestResult, bar_count: usize) {
    let report = &result.report;
    println!();
    println!("=== Backtest Result ===");
    println!("Run id:         {}", result.run_id);
    println!("Symbol:         {}", display_symbol(&result.config.symbol));
    println!(
        "Bars:           {bar_count} ({} warmup)",
        result.warmup_bars
    );
    println!("Trades:         {}", report.total_trades);
    println!(
        "Skipped:        {} signals, {} vetoed, {} bad bars",
        report.skipped_signals, report.vetoed_entries, report.skipped_bars
    );
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", report.total_return * 100.0);
    println!(
        "Annualized:     {}",
        fmt_pct(report.annualized_return)
    );
    println!("Sharpe:         {}", fmt_ratio(report.sharpe_ratio));
    println!("Sortino:        {}", fmt_ratio(report.sortino_ratio));
    println!("Calmar:         {}", fmt_ratio(report.calmar_ratio));
    println!("Max Drawdown:   {:.2}%", report.max_drawdown * 100.0);
    println!("Ulcer Index:    {:.4}", report.ulcer_index);
    println!("Pain Index:     {:.4}", report.pain_index);
    println!("Win Rate:       {}", fmt_pct(report.win_rate));
    println!("Profit Factor:  {}", fmt_ratio(report.profit_factor));
    println!("Final Equity:   {:.2}", report.final_equity);
    println!();
}

fn display_symbol(symbol: &str) -> &str {
    if symbol.is_empty() {
        "(unnamed)"
    } else {
        symbol
    }
}
