//! Memory-mapped or owned byte backing for ntuple files.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use eop_core::Result;

/// Backing bytes of one ntuple file.
///
/// `Mmap` avoids copying large files into RAM; `Owned` backs
/// [`crate::NtupleChain::from_bytes`] and testing.
#[derive(Debug)]
pub enum DataSource {
    /// File bytes owned in a `Vec<u8>`.
    Owned(Vec<u8>),
    /// Memory-mapped file.
    Mmap(memmap2::Mmap),
}

impl DataSource {
    /// Map the file at `path` read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: we only read the mapping, and rely on the OS for
        // concurrent modifications (UB for mmap in general, acceptable
        // for write-once ntuple files).
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(DataSource::Mmap(mmap))
    }
}

impl Deref for DataSource {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        match self {
            DataSource::Owned(v) => v,
            DataSource::Mmap(m) => m,
        }
    }
}

impl AsRef<[u8]> for DataSource {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}
