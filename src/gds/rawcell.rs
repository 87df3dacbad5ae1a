//! Raw cell data model
//!
//! A `RawCell` is one GDSII structure kept as bytes: either a lazy locator
//! into its source file, or a materialized copy. Its dependencies are the
//! cells named by its SREF/AREF elements.

use super::source::RawSource;
use crate::error::{ErrorCode, GdsError, Result};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

/// Shared handle to a cell; the library map and dependency edges hold these
pub type RawCellRef = Rc<RefCell<RawCell>>;

/// Name-keyed cells in insertion order
pub type RawCellMap = IndexMap<String, RawCellRef>;

/// Database unit ratios from a UNITS record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GdsUnits {
    /// Size of a database unit in user units
    pub user: f64,
    /// Size of a database unit in meters
    pub meters: f64,
}

impl Default for GdsUnits {
    fn default() -> Self {
        Self {
            user: 1e-3,
            meters: 1e-9,
        }
    }
}

/// Edge to a referenced cell
///
/// Resolved edges are weak: the library map owns its cells, so a cyclic
/// library is still freed (and its source closed) when the map is dropped.
#[derive(Clone)]
pub enum Dependency {
    /// Name seen during the scan, not yet looked up
    Unresolved(String),
    Resolved(Weak<RefCell<RawCell>>),
}

impl Dependency {
    /// Target name; empty once a resolved target has been dropped
    pub fn name(&self) -> String {
        match self {
            Dependency::Unresolved(name) => name.clone(),
            Dependency::Resolved(cell) => match cell.upgrade() {
                Some(cell) => {
                    let name = cell.borrow().name.clone();
                    name
                }
                None => String::new(),
            },
        }
    }

    /// The referenced cell, if resolved and still alive
    pub fn resolved(&self) -> Option<RawCellRef> {
        match self {
            Dependency::Resolved(cell) => cell.upgrade(),
            Dependency::Unresolved(_) => None,
        }
    }

    /// True if this edge resolves to `cell`
    pub fn points_to(&self, cell: &RawCellRef) -> bool {
        match self {
            Dependency::Resolved(existing) => std::ptr::eq(existing.as_ptr(), Rc::as_ptr(cell)),
            Dependency::Unresolved(_) => false,
        }
    }
}

// Print names only
impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Unresolved(name) => write!(f, "Unresolved({:?})", name),
            Dependency::Resolved(_) => write!(f, "Resolved({:?})", self.name()),
        }
    }
}

/// Where a cell's bytes live
#[derive(Debug, Clone, Default)]
pub enum CellBody {
    Lazy {
        source: Rc<RawSource>,
        offset: u64,
    },
    Materialized(Vec<u8>),
    #[default]
    Empty,
}

#[derive(Debug)]
pub struct RawCell {
    pub(crate) name: String,
    pub(crate) size: u64,
    pub(crate) body: CellBody,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) filename: Option<PathBuf>,
    pub(crate) units: Option<GdsUnits>,
}

impl RawCell {
    /// Empty cell with the given name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(GdsError::new(ErrorCode::EmptyName, "empty cell name"));
        }
        Ok(Self {
            name,
            size: 0,
            body: CellBody::Empty,
            dependencies: Vec::new(),
            filename: None,
            units: None,
        })
    }

    /// Cell opened at a BGNSTR record; named later by its STRNAME
    pub(crate) fn lazy(source: Rc<RawSource>, offset: u64, header_length: u64, units: Option<GdsUnits>) -> Self {
        Self {
            name: String::new(),
            size: header_length,
            filename: Some(source.path().to_path_buf()),
            body: CellBody::Lazy { source, offset },
            dependencies: Vec::new(),
            units,
        }
    }

    /// Cell backed by an in-memory copy of its records
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let mut cell = Self::new(name)?;
        cell.size = data.len() as u64;
        cell.body = CellBody::Materialized(data);
        Ok(cell)
    }

    pub fn into_ref(self) -> RawCellRef {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte length of the cell's record range
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn body(&self) -> &CellBody {
        &self.body
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.body, CellBody::Lazy { .. })
    }

    /// File the cell was loaded from
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn units(&self) -> Option<GdsUnits> {
        self.units
    }

    pub fn set_units(&mut self, units: GdsUnits) {
        self.units = Some(units);
    }

    pub fn edges(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Names of direct dependencies, in edge order
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies.iter().map(Dependency::name).collect()
    }

    /// Add a resolved edge unless one to the same cell already exists
    pub fn add_dependency(&mut self, cell: RawCellRef) -> bool {
        if self.has_dependency(&cell) {
            return false;
        }
        self.dependencies.push(Dependency::Resolved(Rc::downgrade(&cell)));
        true
    }

    pub(crate) fn has_dependency(&self, cell: &RawCellRef) -> bool {
        self.dependencies.iter().any(|existing| existing.points_to(cell))
    }

    /// The cell's record bytes; a lazy body is read without being kept
    pub(crate) fn read_body(&self) -> Result<Cow<'_, [u8]>> {
        match &self.body {
            CellBody::Lazy { source, offset } => {
                let mut data = vec![0u8; self.size as usize];
                let read = source
                    .offset_read(&mut data, *offset)
                    .map_err(|e| GdsError::io("reading raw cell data", e))?;
                if read != data.len() {
                    return Err(GdsError::new(
                        ErrorCode::InputFileError,
                        format!("unable to read {} bytes of cell {} at offset {}", self.size, self.name, offset),
                    ));
                }
                Ok(Cow::Owned(data))
            }
            CellBody::Materialized(data) => Ok(Cow::Borrowed(data)),
            CellBody::Empty => Ok(Cow::Borrowed(&[])),
        }
    }

    /// Release the name, the source reference or buffer, and all edges
    pub fn clear(&mut self) {
        self.name.clear();
        self.body = CellBody::Empty;
        self.size = 0;
        self.dependencies.clear();
    }

    /// Debug dump; `all` also prints each dependency
    pub fn print(&self, all: bool) {
        match &self.body {
            CellBody::Lazy { offset, .. } => println!(
                "RawCell {}, size {}, source offset {}",
                self.name, self.size, offset
            ),
            CellBody::Materialized(data) => println!(
                "RawCell {}, size {}, data {} bytes",
                self.name,
                self.size,
                data.len()
            ),
            CellBody::Empty => println!("RawCell {}, size {}, no data", self.name, self.size),
        }
        if all {
            println!("Dependencies ({}):", self.dependencies.len());
            for (i, dependency) in self.dependencies.iter().enumerate() {
                print!("Dependency {} ", i);
                match dependency.resolved() {
                    Some(cell) => {
                        cell.borrow().print(false);
                    }
                    None => println!("{} (unresolved)", dependency.name()),
                }
            }
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawCell '{}' with {} bytes and {} dependencies",
            self.name,
            self.size,
            self.dependencies.len()
        )
    }
}
