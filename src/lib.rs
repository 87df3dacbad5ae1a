//! Lazy loading of GDSII layout libraries
//!
//! A GDSII file is scanned once into a name-indexed map of [`RawCell`]s.
//! Cells keep a locator into the shared file instead of their geometry, can
//! be queried for their dependencies, flattened into scaled polygon
//! vertices, or copied byte-for-byte into another stream.
//!
//! # Example
//! ```ignore
//! let config = RawCellConfig::default();
//! let report = read_rawcells("tests/chip.gds", &config);
//! let top = report.get("TOP").expect("TOP cell");
//! let polygons = top.borrow().get_polygons(-1, 0.0, 0.0, &config)?;
//! println!("{} polygons", polygons.polygon_count);
//! ```

pub mod config;
pub mod error;
pub mod gds;

pub use config::{DiagnosticSink, RawCellConfig};
pub use error::{ErrorCode, GdsError};
pub use gds::{
    extract_polygons, rawcell_to_file, read_rawcells, write_rawcell_library, CellBody, Dependency,
    GdsUnits, LoadReport, PolygonAccumulator, PolygonSet, PolygonVertex, RawCell, RawCellMap,
    RawCellRef, RawSource,
};

use std::collections::HashSet;
use std::path::Path;

/// Load a library and fail on any error, including missing references
///
/// # Arguments
/// * `path` - The GDSII file to scan
///
/// # Returns
/// * `Result<RawCellMap>` - Every cell of the library, fully resolved
pub fn load_library<P: AsRef<Path>>(path: P) -> anyhow::Result<RawCellMap> {
    let path = path.as_ref();
    let report = read_rawcells(path, &RawCellConfig::default());
    if let Some(code) = report.error {
        let missing: Vec<String> = report
            .missing_references
            .iter()
            .map(|(owner, name)| format!("{} -> {}", owner, name))
            .collect();
        anyhow::bail!(
            "failed to load {}: {}{}",
            path.display(),
            code,
            if missing.is_empty() { String::new() } else { format!(" ({})", missing.join(", ")) }
        );
    }
    Ok(report.cells)
}

/// Pretty-prints the reference hierarchy below `cell`
///
/// # Arguments
/// * `cell` - The cell to print
/// * `indent` - Current indentation level
pub fn print_rawcell_tree(cell: &RawCellRef, indent: usize) {
    let mut seen = HashSet::new();
    print_rawcell_subtree(cell, indent, &mut seen);
}

fn print_rawcell_subtree(cell: &RawCellRef, indent: usize, seen: &mut HashSet<String>) {
    let cell = cell.borrow();
    let prefix = " ".repeat(indent);
    if !seen.insert(cell.name().to_string()) {
        println!("{}{} (see above)", prefix, cell.name());
        return;
    }
    println!("{}{} [{} bytes]", prefix, cell.name(), cell.size());
    for child in cell.edges().iter().filter_map(Dependency::resolved) {
        print_rawcell_subtree(&child, indent + 2, seen);
    }
}
