//! Lazy GDSII raw cell support
//!
//! Cells are indexed by a single pass over the file and keep only an
//! (offset, size) locator into the shared source until their bytes are needed.
//!
//! # Submodules
//! - `records` - Record framing, byte-order normalization, GDSII reals
//! - `source` - Shared, reference-counted input file handle
//! - `rawcell` - Cell data model and dependency edges
//! - `loader` - Single-pass loader and reference resolution
//! - `dependencies` - Direct and transitive dependency queries
//! - `polygons` - Flattened polygon extraction
//! - `writer` - Copy-through serialization

pub mod records;
mod source;
mod rawcell;
mod loader;
mod dependencies;
mod polygons;
mod writer;

pub use source::RawSource;

pub use rawcell::{
    CellBody,
    Dependency,
    GdsUnits,
    RawCell,
    RawCellMap,
    RawCellRef,
};

pub use loader::{read_rawcells, LoadReport};

pub use polygons::{
    extract_polygons,
    scale_factor,
    serialize_vertices_base64,
    PolygonAccumulator,
    PolygonSet,
    PolygonVertex,
};

pub use writer::{rawcell_to_file, write_rawcell_library};
