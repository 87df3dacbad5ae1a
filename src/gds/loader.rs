//! Single-pass raw cell loader
//!
//! Scans a GDSII stream once, creating a lazy `RawCell` per structure and
//! recording the names each structure references. Once ENDLIB is reached
//! every name is resolved against the collected cells.

use super::rawcell::{Dependency, GdsUnits, RawCell, RawCellMap, RawCellRef};
use super::records::*;
use super::source::RawSource;
use crate::config::RawCellConfig;
use crate::error::{ErrorCode, GdsError, Result};
use std::io::{BufReader, Read};
use std::path::Path;
use std::rc::Rc;

/// Outcome of a load pass
///
/// `cells` is always usable: empty after a fatal error, best-effort after
/// missing references. `error` keeps the first error code of the pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub cells: RawCellMap,
    pub library_name: Option<String>,
    pub units: Option<GdsUnits>,
    pub error: Option<ErrorCode>,
    /// `(referencing cell, missing name)` for every dropped edge
    pub missing_references: Vec<(String, String)>,
}

impl LoadReport {
    fn failed(code: ErrorCode) -> Self {
        Self {
            error: Some(code),
            ..Self::default()
        }
    }

    fn record_error(&mut self, code: ErrorCode) {
        if self.error.is_none() {
            self.error = Some(code);
        }
    }

    /// True when the file loaded and every reference resolved
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn get(&self, name: &str) -> Option<&RawCellRef> {
        self.cells.get(name)
    }
}

/// State accumulated by the forward scan
#[derive(Default)]
struct Scan {
    cells: RawCellMap,
    library_name: Option<String>,
    units: Option<GdsUnits>,
}

/// Load every structure of `path` as a lazy raw cell
pub fn read_rawcells<P: AsRef<Path>>(path: P, config: &RawCellConfig) -> LoadReport {
    let path = path.as_ref();
    let source = match RawSource::open(path) {
        Ok(source) => source,
        Err(err) => {
            tracing::warn!(path = %path.display(), "{}", err);
            config.report("Unable to open input GDSII file.");
            return LoadReport::failed(err.code);
        }
    };

    let scan = source
        .with_reader(|file| scan_library(&source, BufReader::new(file), config))
        .map_err(|e| GdsError::io("rewinding input", e))
        .and_then(|scan| scan);
    let scan = match scan {
        Ok(scan) => scan,
        Err(err) => {
            // Partial cells only hold unresolved edges, so dropping them
            // releases every reference to the source.
            tracing::warn!(path = %path.display(), error = %err, "aborting raw cell load");
            config.report(&format!("Invalid GDSII file {}.", path.display()));
            return LoadReport::failed(ErrorCode::InvalidFile);
        }
    };

    let mut report = LoadReport {
        cells: scan.cells,
        library_name: scan.library_name,
        units: scan.units,
        ..LoadReport::default()
    };
    resolve_dependencies(&mut report, config);
    tracing::debug!(
        path = %path.display(),
        cells = report.cells.len(),
        source_uses = RawSource::uses(&source) - 1,
        "loaded raw cells"
    );
    report
}

fn scan_library<R: Read>(source: &Rc<RawSource>, input: R, config: &RawCellConfig) -> Result<Scan> {
    let mut reader = RecordReader::new(input, config.max_record_length);
    let mut scan = Scan::default();
    let mut current: Option<RawCellRef> = None;

    loop {
        // Any read error (EOF included) before ENDLIB aborts the whole scan
        let record = reader.read_record()?;
        let length = record.length() as u64;
        match record.record_type() {
            ENDLIB => return Ok(scan),
            BGNSTR => {
                // The cell starts here; it is keyed once STRNAME arrives
                let cell = RawCell::lazy(source.clone(), record.offset, length, scan.units);
                current = Some(cell.into_ref());
            }
            STRNAME => {
                if let Some(cell) = &current {
                    let name = record.text_str()?.to_string();
                    if name.is_empty() {
                        return Err(GdsError::new(
                            ErrorCode::EmptyName,
                            format!("structure at offset {} has an empty name", record.offset),
                        ));
                    }
                    {
                        let mut cell = cell.borrow_mut();
                        cell.name = name.clone();
                        cell.size += length;
                    }
                    if scan.cells.insert(name.clone(), cell.clone()).is_some() {
                        tracing::debug!(cell = %name, "duplicate structure name replaces earlier cell");
                    }
                }
            }
            ENDSTR => {
                // Size is final once the closing record is counted
                if let Some(cell) = current.take() {
                    cell.borrow_mut().size += length;
                }
            }
            SNAME => {
                // Names are looked up after ENDLIB so forward references work
                if let Some(cell) = &current {
                    let name = record.text_str()?.to_string();
                    let mut cell = cell.borrow_mut();
                    cell.dependencies.push(Dependency::Unresolved(name));
                    cell.size += length;
                }
            }
            record_type => {
                match record_type {
                    LIBNAME => {
                        scan.library_name = Some(String::from_utf8_lossy(record.text()).into_owned());
                    }
                    UNITS => {
                        // user units per database unit, then meters per database unit
                        let reals = record.reals();
                        if let &[user, meters, ..] = reals.as_slice() {
                            scan.units = Some(GdsUnits { user, meters });
                        }
                    }
                    _ => {}
                }
                if let Some(cell) = &current {
                    cell.borrow_mut().size += length;
                }
            }
        }
    }
}

/// Replace every `Unresolved` edge with the named cell, or drop it
fn resolve_dependencies(report: &mut LoadReport, config: &RawCellConfig) {
    let mut missing = Vec::new();
    for (owner, cell) in &report.cells {
        let pending = std::mem::take(&mut cell.borrow_mut().dependencies);
        let mut resolved: Vec<Dependency> = Vec::with_capacity(pending.len());
        for dependency in pending {
            let target = match dependency {
                Dependency::Unresolved(name) => match report.cells.get(&name) {
                    Some(target) => target.clone(),
                    None => {
                        tracing::warn!(cell = %owner, reference = %name, "referenced cell not found");
                        config.report(&format!("Referenced cell {} not found.", name));
                        missing.push((owner.clone(), name));
                        continue;
                    }
                },
                Dependency::Resolved(target) => match target.upgrade() {
                    Some(target) => target,
                    None => continue,
                },
            };
            // collapse repeated references to the same cell
            if !resolved.iter().any(|existing| existing.points_to(&target)) {
                resolved.push(Dependency::Resolved(Rc::downgrade(&target)));
            }
        }
        cell.borrow_mut().dependencies = resolved;
    }
    if !missing.is_empty() {
        report.record_error(ErrorCode::MissingReference);
    }
    report.missing_references = missing;
}
