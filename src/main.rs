use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use labyrinth::config::{BuildConfig, DEFAULT_BUFFER_SIZE};
use labyrinth::{driver, export, graph};
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "labyrinth")]
#[command(about = "Extract the wikilink graph from Wikipedia dumps")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the link graph from a Wikipedia dump (.xml or .xml.bz2)
    Build(BuildArgs),
    /// Export a built graph as nodes/edges CSV files
    ExportCsv(ExportCsvArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Path to the Wikipedia dump file
    #[arg(short, long)]
    input: String,

    /// Path of the graph file to write
    #[arg(short, long)]
    output: String,

    /// Read buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Rebuild even if the graph file is current
    #[arg(long)]
    no_cache: bool,

    /// Write build statistics as JSON to this path
    #[arg(long)]
    stats_json: Option<String>,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct ExportCsvArgs {
    /// Graph file produced by `build`
    #[arg(short, long)]
    graph: String,

    /// Output directory for nodes.csv and edges.csv
    #[arg(short, long)]
    output: String,
}

fn run_build(args: BuildArgs) -> Result<()> {
    let output = Path::new(&args.output);

    if !args.no_cache && graph::is_graph_current(output, &args.input)? {
        info!(path = %args.output, "Graph is current, skipping build");
        println!("Graph at {} is up to date (use --no-cache to rebuild)", args.output);
        return Ok(());
    }

    let config = BuildConfig::new(args.buffer_size);
    let start = Instant::now();
    let built = driver::build_graph(&args.input, &config, !args.quiet)?;
    let build_duration = start.elapsed();

    let start_write = Instant::now();
    let metadata = graph::write_graph(&built, &args.input, output)?;
    let write_duration = start_write.elapsed();

    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(&built.stats)
            .context("Failed to serialize build statistics")?;
        fs::write(path, json).with_context(|| format!("Failed to write stats to: {}", path))?;
    }

    let stats = &built.stats;
    println!();
    println!("=== Summary ===");
    println!("Build time:         {:.2}s", build_duration.as_secs_f64());
    println!("Write time:         {:.2}s", write_duration.as_secs_f64());
    println!();
    println!("Bytes read:         {}", stats.bytes_read);
    println!("Reads:              {}", stats.reads);
    println!("Mean read:          {:.0} bytes", stats.mean_read());
    println!("Records:            {}", stats.records);
    println!("Nodes:              {}", metadata.node_count);
    println!("Edges:              {}", metadata.edge_count);
    println!("Resumed tokens:     {}", stats.resumes);
    println!("Largest carry:      {} bytes", stats.max_carried);

    Ok(())
}

fn run_export(args: ExportCsvArgs) -> Result<()> {
    let loaded = graph::load_graph(Path::new(&args.graph))?;
    export::export_csv(&loaded, &args.output)?;
    println!(
        "Exported {} nodes and {} edges to {}",
        loaded.node_count(),
        loaded.edges.len(),
        args.output
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::ExportCsv(args) => run_export(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
