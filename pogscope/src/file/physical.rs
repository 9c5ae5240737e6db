//! Memory-mapped file backend for package input.

use std::{fs::OpenOptions, path::Path};

use memmap2::Mmap;

use crate::{Error, Result};

/// A memory-mapped package file.
///
/// Maps the input read-only and hands out `&[u8]` views for the section loader.
/// The mapping stays alive for the lifetime of the value.
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Map the file at `path` into memory.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file cannot be opened or mapped, and
    /// [`Error::Empty`] for a zero-length file.
    pub fn new(path: &Path) -> Result<Physical> {
        let file = OpenOptions::new().read(true).open(path)?;

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error::FileError(error)),
        };

        if mmap.is_empty() {
            return Err(Error::Empty);
        }

        Ok(Physical { data: mmap })
    }

    /// The mapped bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
