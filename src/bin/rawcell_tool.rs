//! CLI tool for inspecting GDSII libraries through the lazy raw cell loader
//!
//! Usage:
//!   cargo run --release --bin rawcell_tool -- <command> <gds_file> [options]
//!
//! Set `RUST_LOG=gds_rawcell=debug` for scan details.

use anyhow::Context;
use clap::{Parser, Subcommand};
use gds_rawcell::{
    print_rawcell_tree, rawcell_to_file, read_rawcells, DiagnosticSink, ErrorCode, LoadReport, RawCellConfig,
    RawCellRef,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rawcell_tool", about = "Inspect GDSII cells without loading their geometry")]
struct Cli {
    /// JSON file with loader options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every cell with its size and dependency count
    List {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show the cells a cell depends on
    Deps {
        file: PathBuf,
        cell: String,
        #[arg(long)]
        recursive: bool,
    },
    /// Print the reference hierarchy below a cell
    Tree { file: PathBuf, cell: String },
    /// Flatten a cell's polygons
    Polygons {
        file: PathBuf,
        cell: String,
        /// Reference levels to inline; negative means unlimited
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        depth: i64,
        /// Output unit in meters; 0 keeps the library's user unit
        #[arg(long, default_value_t = 0.0)]
        unit: f64,
        #[arg(long, default_value_t = 0.0)]
        tolerance: f64,
        #[arg(long)]
        json: bool,
    },
    /// Copy a cell's records into a standalone GDSII file
    Extract {
        file: PathBuf,
        cell: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct CellSummary {
    name: String,
    size: u64,
    dependencies: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            RawCellConfig::from_json_str(&json)?
        }
        None => RawCellConfig::default(),
    }
    .with_sink(DiagnosticSink::stderr());

    match cli.command {
        Command::List { file, json } => {
            let report = load(&file, &config)?;
            if json {
                let summaries: Vec<CellSummary> = report
                    .cells
                    .values()
                    .map(|cell| {
                        let cell = cell.borrow();
                        CellSummary {
                            name: cell.name().to_string(),
                            size: cell.size(),
                            dependencies: cell.dependency_names(),
                        }
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for cell in report.cells.values() {
                    println!("{}", cell.borrow());
                }
            }
        }
        Command::Deps { file, cell, recursive } => {
            let report = load(&file, &config)?;
            let cell = find_cell(&report, &cell)?;
            for name in cell.borrow().dependencies(recursive).keys() {
                println!("{}", name);
            }
        }
        Command::Tree { file, cell } => {
            let report = load(&file, &config)?;
            print_rawcell_tree(find_cell(&report, &cell)?, 0);
        }
        Command::Polygons { file, cell, depth, unit, tolerance, json } => {
            let report = load(&file, &config)?;
            let start = Instant::now();
            let polygons = find_cell(&report, &cell)?
                .borrow()
                .get_polygons(depth, unit, tolerance, &config)
                .with_context(|| format!("Failed to extract polygons of {}", cell))?;
            eprintln!("Extracted in {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);
            if json {
                println!("{}", serde_json::to_string(&polygons)?);
            } else {
                println!(
                    "{} polygons, {} vertices, tolerance {}",
                    polygons.polygon_count, polygons.vertex_count, polygons.tolerance
                );
                for v in &polygons.vertices {
                    println!("{} {} {}", v.x, v.y, v.polygon_id);
                }
            }
        }
        Command::Extract { file, cell, output } => {
            let report = load(&file, &config)?;
            rawcell_to_file(find_cell(&report, &cell)?, &output, &config)?;
            eprintln!("Wrote {} to {}", cell, output.display());
        }
    }
    Ok(())
}

fn load(file: &Path, config: &RawCellConfig) -> anyhow::Result<LoadReport> {
    let start = Instant::now();
    let report = read_rawcells(file, config);
    match report.error {
        Some(ErrorCode::MissingReference) => {
            eprintln!("Warning: {} missing references", report.missing_references.len());
        }
        Some(code) => anyhow::bail!("Failed to load {}: {}", file.display(), code),
        None => {}
    }
    eprintln!(
        "Loaded {} cells in {:.2}ms",
        report.cells.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(report)
}

fn find_cell<'a>(report: &'a LoadReport, name: &str) -> anyhow::Result<&'a RawCellRef> {
    report
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("Cell {} not found", name))
}
