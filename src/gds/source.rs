//! Shared input file handle
//!
//! Every lazily loaded cell keeps an `Rc<RawSource>` to the file it was
//! scanned from. The handle is closed when the last cell releases it.

use crate::error::{ErrorCode, GdsError, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Open GDSII file shared by the cells loaded from it
#[derive(Debug)]
pub struct RawSource {
    file: RefCell<File>,
    path: PathBuf,
}

impl RawSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Rc<Self>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            GdsError::new(
                ErrorCode::InputFileOpenError,
                format!("unable to open input GDSII file {}: {}", path.display(), e),
            )
        })?;
        Ok(Rc::new(Self {
            file: RefCell::new(file),
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live references to this source
    pub fn uses(this: &Rc<Self>) -> usize {
        Rc::strong_count(this)
    }

    /// Seek to `offset` and fill as much of `buf` as the file allows.
    ///
    /// Moves the shared read position; callers must not interleave reads
    /// against the same source.
    pub fn offset_read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Run `f` with the handle positioned at the start of the file
    pub(crate) fn with_reader<T>(&self, f: impl FnOnce(&mut File) -> T) -> io::Result<T> {
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(0))?;
        Ok(f(&mut file))
    }
}

impl Drop for RawSource {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "closing GDSII source");
    }
}
