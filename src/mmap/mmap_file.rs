use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;
use crate::core::error::Result;

/// Memory-mapped file for zero-copy reads
pub struct MmapFile {
    pub mmap: Option<Mmap>,
    pub len: usize,
}

impl MmapFile {
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let metadata = file.metadata()?;
        let len = metadata.len() as usize;

        // Zero-length mappings are rejected by some platforms
        if len == 0 {
            return Ok(MmapFile { mmap: None, len });
        }

        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };

        Ok(MmapFile { mmap: Some(mmap), len })
    }

    pub fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }
}

impl AsRef<[u8]> for MmapFile {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}
