use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use drift_analysis::{
    export_sheets, write_sheets, ChangeDistribution, DriftAnalyser, DriftReport, FeedSummary,
};
use drift_core::{Config, DetectorKind, OrderBookRecord, TradeRecord};
use drift_events::EventTable;
use drift_ingestion::{decode, FeedTable, JsonTableStore, RecordLayout, TableStore};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "feed-drift", about = "Decode market-data feeds and measure post-event price drift")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode binary feed captures into JSON tables
    Decode(DecodeArgs),
    /// Detect price events in an order-book table and report drift
    Analyse(AnalyseArgs),
}

#[derive(Debug, Args)]
struct DecodeArgs {
    /// Stdin holds order-book records
    #[arg(short = 'b', conflicts_with = "trades")]
    book: bool,

    /// Stdin holds public-trade records
    #[arg(short = 't')]
    trades: bool,

    /// Capture files named order_book.feed / public_trade.feed; stdin when empty
    files: Vec<PathBuf>,

    /// Output directory for the decoded tables
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Indent the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Debug, Args)]
struct AnalyseArgs {
    /// Order-book table: a decoded .json table or a raw .feed capture
    #[arg(long)]
    order_book: PathBuf,

    /// Public-trade table, used for the feed summary only
    #[arg(long)]
    trades: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured detector (binned_extrema, ema_crossover, volatility_peak)
    #[arg(long)]
    detector: Option<DetectorKind>,

    /// Write per-delay drift sheets to this JSON file
    #[arg(long)]
    sheets: Option<PathBuf>,

    /// Number of bins in the relative change histogram
    #[arg(long, default_value_t = 100)]
    bins: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Decode(args) => run_decode(args),
        Command::Analyse(args) => run_analyse(args),
    }
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let store = if args.pretty {
        JsonTableStore::pretty()
    } else {
        JsonTableStore::new()
    };
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output directory {}", args.out.display()))?;

    if args.files.is_empty() {
        let layout = match (args.book, args.trades) {
            (true, _) => RecordLayout::OrderBook,
            (_, true) => RecordLayout::PublicTrade,
            _ => bail!("reading stdin needs -b (order book) or -t (public trades)"),
        };
        let mut bytes = Vec::new();
        std::io::stdin().read_to_end(&mut bytes).context("read stdin")?;
        let table = decode(&bytes, layout).context("decode stdin")?;
        write_table(&store, &args.out, &table)?;
        return Ok(());
    }

    for path in &args.files {
        let layout = RecordLayout::from_file_name(path).with_context(|| {
            format!(
                "cannot tell the record layout of {}; expected order_book.feed or public_trade.feed",
                path.display()
            )
        })?;
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let table = decode(&bytes, layout).with_context(|| format!("decode {}", path.display()))?;
        write_table(&store, &args.out, &table)?;
    }
    Ok(())
}

fn write_table(store: &impl TableStore, dir: &Path, table: &FeedTable) -> Result<()> {
    let path = dir.join(format!("{}.json", table.layout().name()));
    store
        .write(&path, table)
        .with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), rows = table.len(), "decoded table");
    Ok(())
}

fn load_table(path: &Path, layout: RecordLayout) -> Result<FeedTable> {
    if path.extension().is_some_and(|ext| ext == "json") {
        JsonTableStore::new()
            .read(path)
            .with_context(|| format!("read table {}", path.display()))
    } else {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        decode(&bytes, layout).with_context(|| format!("decode {}", path.display()))
    }
}

fn load_order_book(path: &Path) -> Result<Vec<OrderBookRecord>> {
    match load_table(path, RecordLayout::OrderBook)? {
        FeedTable::OrderBook(rows) => Ok(rows),
        FeedTable::PublicTrade(_) => bail!("{} holds public trades, not an order book", path.display()),
    }
}

fn load_trades(path: &Path) -> Result<Vec<TradeRecord>> {
    match load_table(path, RecordLayout::PublicTrade)? {
        FeedTable::PublicTrade(rows) => Ok(rows),
        FeedTable::OrderBook(_) => bail!("{} holds an order book, not public trades", path.display()),
    }
}

fn run_analyse(args: AnalyseArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(kind) = args.detector {
        config.detector = kind;
    }

    let records = load_order_book(&args.order_book)?;
    let trades = match &args.trades {
        Some(path) => load_trades(path)?,
        None => Vec::new(),
    };
    let analyser = DriftAnalyser::new(config).context("invalid configuration")?;

    if analyser.config().detector == DetectorKind::BinnedExtrema {
        let run = analyser.run(&records).context("binned extrema analysis")?;
        let summary = FeedSummary::new(&run.ticks, &trades);
        let report = DriftReport::from_events(run.events());
        let distribution = ChangeDistribution::from_events(run.events(), args.bins)?;

        print_json("summary", &summary)?;
        println!(
            "buckets: {}  events: {}  sized: {}  row errors: {}",
            run.buckets.len(),
            run.events().len(),
            run.sized_events().count(),
            run.detection.errors.len()
        );
        for row in run.detection.errors.iter().take(10) {
            println!("  {row}");
        }
        print_json("size buckets", &distribution.by_size_bucket)?;
        print_json("drift report", &report)?;

        if let Some(path) = &args.sheets {
            let sheets = export_sheets(run.events());
            write_sheets(path, &sheets).with_context(|| format!("write sheets {}", path.display()))?;
            info!(path = %path.display(), sheets = sheets.len(), "wrote drift sheets");
        }
        return Ok(());
    }

    if args.sheets.is_some() {
        bail!("--sheets is only available with the binned_extrema detector");
    }
    let (ticks, table) = analyser.detect(&records).context("event detection")?;
    print_json("summary", &FeedSummary::new(&ticks, &trades))?;
    match &table {
        EventTable::Crossover(d) => print_json("crossover events", &d.events)?,
        EventTable::Volatility(d) => {
            for peak in &d.events {
                let refs = peak.reference_points(&ticks)?;
                println!(
                    "peak #{} height {:.6e}  P0 {} @ {}  P1 {} @ {}  P2 {} @ {}",
                    peak.peak_index,
                    peak.peak_height,
                    refs.p0,
                    refs.p0_time,
                    refs.p1,
                    refs.p1_time,
                    refs.p2,
                    refs.p2_time
                );
            }
        }
        EventTable::Binned(d) => print_json("events", &d.events)?,
    }
    println!("events: {}  row errors: {}", table.len(), table.errors().len());
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(title: &str, value: &T) -> Result<()> {
    println!("{title}:");
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
