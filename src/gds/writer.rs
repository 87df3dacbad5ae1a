//! Copy-through serialization of raw cells
//!
//! Cell bytes are written exactly as they were read. `write_rawcell_library`
//! adds the library framing records so cells can be saved as a standalone
//! GDSII file.

use super::rawcell::{CellBody, GdsUnits, RawCell, RawCellRef};
use super::records::*;
use crate::config::RawCellConfig;
use crate::error::{ErrorCode, GdsError, Result};
use anyhow::Context;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// GDSII stream version written in the HEADER record
const STREAM_VERSION: i16 = 600;

impl RawCell {
    /// Replace a lazy body with an in-memory copy, releasing the source.
    ///
    /// On a failed read the cell ends up empty (size 0) and the source is
    /// released anyway; the failure is also sent to `config`'s sink.
    pub fn materialize(&mut self, config: &RawCellConfig) -> Result<()> {
        if !self.is_lazy() {
            return Ok(());
        }
        let data = self.read_body().map(Cow::into_owned);
        match data {
            Ok(data) => {
                self.body = CellBody::Materialized(data);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(cell = %self.name, error = %err, "unable to read raw cell data from input file");
                config.report(&format!("Unable to read raw cell {} data from input file.", self.name));
                // Dropping the lazy body releases this cell's share of the source
                self.size = 0;
                self.body = CellBody::Materialized(Vec::new());
                Err(GdsError::new(ErrorCode::InputFileError, err.message))
            }
        }
    }

    /// Write the cell's records verbatim to `out`
    pub fn to_gds<W: Write>(&mut self, out: &mut W, config: &RawCellConfig) -> Result<()> {
        let materialized = self.materialize(config);
        // An empty buffer after a failed read still writes nothing
        if let CellBody::Materialized(data) = &self.body {
            out.write_all(data).map_err(|e| {
                config.report(&format!("Unable to write raw cell {} to output.", self.name));
                GdsError::new(ErrorCode::InputFileError, format!("writing cell {}: {}", self.name, e))
            })?;
        }
        materialized
    }
}

/// Write `cells` wrapped in HEADER/BGNLIB/LIBNAME/UNITS ... ENDLIB
pub fn write_rawcell_library<W: Write>(
    out: &mut W,
    library_name: &str,
    units: GdsUnits,
    cells: &[RawCellRef],
    config: &RawCellConfig,
) -> Result<()> {
    write_library_header(out, library_name, units)
        .map_err(|e| GdsError::new(ErrorCode::InputFileError, format!("writing library header: {}", e)))?;
    for cell in cells {
        cell.borrow_mut().to_gds(out, config)?;
    }
    write_record(out, ENDLIB, DT_NO_DATA, &[])
        .map_err(|e| GdsError::new(ErrorCode::InputFileError, format!("writing ENDLIB: {}", e)))
}

fn write_library_header<W: Write>(out: &mut W, library_name: &str, units: GdsUnits) -> std::io::Result<()> {
    write_record(out, HEADER, DT_INT16, &STREAM_VERSION.to_be_bytes())?;
    // modification and access timestamps, left zeroed
    write_record(out, BGNLIB, DT_INT16, &[0u8; 24])?;
    write_record(out, LIBNAME, DT_ASCII, &ascii_payload(library_name))?;
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&f64_to_gdsii_real(units.user).to_be_bytes());
    payload.extend_from_slice(&f64_to_gdsii_real(units.meters).to_be_bytes());
    write_record(out, UNITS, DT_REAL64, &payload)
}

/// Save one cell as a standalone GDSII file named after the cell
pub fn rawcell_to_file<P: AsRef<Path>>(cell: &RawCellRef, file_path: P, config: &RawCellConfig) -> anyhow::Result<()> {
    let file = File::create(&file_path).context("Failed to create GDSII file")?;
    let mut writer = BufWriter::new(file);
    let (name, units) = {
        let cell = cell.borrow();
        (cell.name().to_string(), cell.units().unwrap_or_default())
    };
    // One cell per file, library named after it
    write_rawcell_library(&mut writer, &name, units, std::slice::from_ref(cell), config)
        .with_context(|| format!("Failed to write cell {}", name))?;
    writer.flush().context("Failed to flush GDSII writer")?;
    Ok(())
}
