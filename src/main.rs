use anyhow::{Context, Result};
use birria::prelude::*;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "birria")]
#[command(about = "A Rust-based backtesting engine for rule-based crypto spot strategies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a backtest
    Run {
        //directory of <instrument>.csv candle files
        #[arg(long)]
        data: PathBuf,

        //json config file, flags below override its fields
        #[arg(long)]
        config: Option<PathBuf>,

        //strategy type (falling, red)
        #[arg(long, default_value = "falling")]
        strategy: String,

        //backtest period start (rfc3339 or YYYY-MM-DD)
        #[arg(long, default_value = "2025-01-01")]
        start: String,

        //backtest period end (rfc3339 or YYYY-MM-DD)
        #[arg(long, default_value = "2025-12-31")]
        end: String,

        //initial capital
        #[arg(long, default_value = "100")]
        capital: f64,

        //simulation step in hours
        #[arg(long, default_value = "1")]
        interval_hours: i64,

        //candles served per window query
        #[arg(long, default_value = "50")]
        window_size: usize,

        //instruments to scan, in priority order (defaults to every csv in the data dir)
        #[arg(long, value_delimiter = ',')]
        instruments: Vec<String>,

        //opportunity scan policy (first, deepest)
        #[arg(long, default_value = "first")]
        scan_policy: String,

        //falling-candles strategy parameters
        //consecutive falling candles required for entry
        #[arg(long)]
        num_falling: Option<usize>,

        //tolerate one non-falling candle inside the run
        #[arg(long)]
        allow_one_break: Option<bool>,

        //take-profit trigger above entry, percent
        #[arg(long)]
        take_profit: Option<f64>,

        //stop-loss below entry, percent
        #[arg(long)]
        stop_loss: Option<f64>,

        //red candles after arming that force the exit
        #[arg(long)]
        red_candles_to_sell: Option<u32>,

        //trailing stop below the post-arm high, percent
        #[arg(long)]
        trailing_stop: Option<f64>,

        //red-candles strategy parameters
        //length of the falling sequence before the upturn
        #[arg(long)]
        bars_count: Option<usize>,

        //minimum decline across the sequence, percent
        #[arg(long)]
        total_drop: Option<f64>,

        //bars a position may idle before the stagnation exit
        #[arg(long)]
        stagnation_bars: Option<u32>,

        //output options
        //write the full report as json
        #[arg(long)]
        output_json: Option<PathBuf>,

        //print the trade ledger after the summary
        #[arg(long, default_value = "false")]
        print_trades: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            strategy,
            start,
            end,
            capital,
            interval_hours,
            window_size,
            instruments,
            scan_policy,
            num_falling,
            allow_one_break,
            take_profit,
            stop_loss,
            red_candles_to_sell,
            trailing_stop,
            bars_count,
            total_drop,
            stagnation_bars,
            output_json,
            print_trades,
        } => {
            let args = RunArgs {
                data,
                config,
                strategy,
                start,
                end,
                capital,
                interval_hours,
                window_size,
                instruments,
                scan_policy,
                num_falling,
                allow_one_break,
                take_profit,
                stop_loss,
                red_candles_to_sell,
                trailing_stop,
                bars_count,
                total_drop,
                stagnation_bars,
                output_json,
                print_trades,
            };
            run_backtest(args)?;
        }
    }

    Ok(())
}

struct RunArgs {
    data: PathBuf,
    config: Option<PathBuf>,
    strategy: String,
    start: String,
    end: String,
    capital: f64,
    interval_hours: i64,
    window_size: usize,
    instruments: Vec<String>,
    scan_policy: String,
    num_falling: Option<usize>,
    allow_one_break: Option<bool>,
    take_profit: Option<f64>,
    stop_loss: Option<f64>,
    red_candles_to_sell: Option<u32>,
    trailing_stop: Option<f64>,
    bars_count: Option<usize>,
    total_drop: Option<f64>,
    stagnation_bars: Option<u32>,
    output_json: Option<PathBuf>,
    print_trades: bool,
}

fn run_backtest(args: RunArgs) -> Result<()> {
    println!("Birria Spot Backtesting Engine");
    println!("==============================\n");

    let config = build_config(&args)?;
    let source = CsvCandleSource::new(&args.data);

    //no explicit list means every instrument the data directory offers
    let instruments = if config.instruments.is_empty() {
        source
            .instruments()
            .context(format!("Failed to list instruments under {:?}", args.data))?
    } else {
        config.instruments.clone()
    };

    if instruments.is_empty() {
        anyhow::bail!("No instruments found under {:?}", args.data);
    }

    println!("Loading candles from {:?}...", args.data);
    let windows = build_windows(
        &source,
        &instruments,
        config.start,
        config.end,
        config.window_size,
    )?;

    if windows.is_empty() {
        anyhow::bail!("No usable market data for any configured instrument");
    }

    println!(
        "Loaded {} of {} instruments\n",
        windows.len(),
        instruments.len()
    );

    let config = BacktestConfig {
        instruments: windows.keys().cloned().collect(),
        ..config
    };

    println!(
        "Strategy: {} | Period: {} to {} | Capital: {:.2}\n",
        config.strategy.strategy_type().as_str(),
        config.start.to_rfc3339(),
        config.end.to_rfc3339(),
        config.initial_capital
    );

    let strategy = config.strategy.build();
    let mut engine = BacktestEngine::new(config, windows, strategy)?;

    println!("Running backtest...\n");
    let report = engine.run();

    println!("Backtest Results");
    println!("================\n");
    report.pretty_print_table();

    if args.print_trades {
        println!("\nTrades");
        println!("======\n");
        report.pretty_print_trades();
    }

    if let Some(path) = args.output_json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json).context(format!("Failed to write report to {:?}", path))?;
        println!("\nReport saved to {:?}", path);
    }

    Ok(())
}

//resolves the effective configuration: file first, then flag overrides
fn build_config(args: &RunArgs) -> Result<BacktestConfig> {
    let mut config = match &args.config {
        Some(path) => BacktestConfig::from_json_file(path)
            .context(format!("Failed to load config from {:?}", path))?,
        None => BacktestConfig {
            initial_capital: args.capital,
            start: parse_date(&args.start)?,
            end: parse_date(&args.end)?,
            interval_hours: args.interval_hours,
            window_size: args.window_size,
            instruments: args.instruments.clone(),
            scan_policy: parse_scan_policy(&args.scan_policy)?,
            strategy: build_strategy_params(args)?,
        },
    };

    if args.config.is_some() && !args.instruments.is_empty() {
        config.instruments = args.instruments.clone();
    }

    Ok(config)
}

fn build_strategy_params(args: &RunArgs) -> Result<StrategyParams> {
    let strategy_type = StrategyType::parse(&args.strategy)
        .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", args.strategy))?;

    let params = match strategy_type {
        StrategyType::FallingCandles => {
            let defaults = FallingCandlesParams::default();
            StrategyParams::FallingCandles(FallingCandlesParams {
                num_falling: args.num_falling.unwrap_or(defaults.num_falling),
                allow_one_break: args.allow_one_break.unwrap_or(defaults.allow_one_break),
                take_profit_perc: args.take_profit.unwrap_or(defaults.take_profit_perc),
                stop_loss_perc: args.stop_loss.unwrap_or(defaults.stop_loss_perc),
                red_candles_to_sell: args
                    .red_candles_to_sell
                    .unwrap_or(defaults.red_candles_to_sell),
                trailing_stop_perc: args.trailing_stop,
            })
        }
        StrategyType::RedCandlesSequence => {
            let defaults = RedCandlesParams::default();
            StrategyParams::RedCandlesSequence(RedCandlesParams {
                bars_count: args.bars_count.unwrap_or(defaults.bars_count),
                total_drop_perc: args.total_drop.unwrap_or(defaults.total_drop_perc),
                tp_perc: args.take_profit.unwrap_or(defaults.tp_perc),
                sl_perc: args.stop_loss.unwrap_or(defaults.sl_perc),
                stagnation_bars: args.stagnation_bars.unwrap_or(defaults.stagnation_bars),
            })
        }
    };

    Ok(params)
}

fn parse_scan_policy(raw: &str) -> Result<ScanPolicy> {
    match raw.to_lowercase().as_str() {
        "first" | "first_match" => Ok(ScanPolicy::FirstMatch),
        "deepest" | "deepest_drop" => Ok(ScanPolicy::DeepestDrop),
        other => anyhow::bail!("Unknown scan policy: {}", other),
    }
}

//accepts rfc3339 or a bare date, a bare date means midnight utc
fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = raw.parse::<DateTime<Utc>>() {
        return Ok(parsed);
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .context(format!("Unrecognized date: {}", raw))?;
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Unrecognized date: {}", raw))?;
    Ok(naive.and_utc())
}
