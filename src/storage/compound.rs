//! Single-file container for the files of one segment.
//!
//! Layout: `vint` entry count, then per entry a `long` data offset and the
//! entry name, then the entry bytes back to back.

use std::collections::HashMap;

use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::directory::{Directory, DirectoryLock};
use crate::storage::index_input::IndexInput;
use crate::storage::index_output::IndexOutput;

pub struct CompoundFileWriter<'a> {
    directory: &'a dyn Directory,
    name: String,
    entries: Vec<String>,
}

impl<'a> CompoundFileWriter<'a> {
    pub fn new(directory: &'a dyn Directory, name: &str) -> Self {
        CompoundFileWriter {
            directory,
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add_file(&mut self, file: &str) -> Result<()> {
        if self.entries.iter().any(|e| e == file) {
            return Err(Error::invalid_argument(format!("file {} already added", file)));
        }
        self.entries.push(file.to_string());
        Ok(())
    }

    /// Writes the container. Source files are left in place.
    pub fn close(self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::invalid_argument("no entries to add to compound file"));
        }
        let mut out = self.directory.create_output(&self.name)?;
        let count = u32::try_from(self.entries.len())
            .map_err(|_| Error::invalid_argument("too many compound entries"))?;
        out.write_vint(count)?;

        // Offsets are patched once the data has been copied
        let mut offset_slots = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            offset_slots.push(out.file_pointer());
            out.write_long(0)?;
            out.write_string(entry)?;
        }

        let mut data_offsets = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            data_offsets.push(out.file_pointer());
            let input = self.directory.open_input(entry)?;
            out.write_bytes(input.bytes())?;
        }

        for (slot, offset) in offset_slots.iter().zip(&data_offsets) {
            out.seek(*slot)?;
            out.write_long(*offset as i64)?;
        }
        out.close()?;
        log::debug!("wrote compound file {} with {} entries", self.name, self.entries.len());
        Ok(())
    }
}

/// Packs `files` into `<segment>.cfs` and deletes the originals.
pub fn pack_compound(directory: &dyn Directory, segment: &str, files: &[String]) -> Result<()> {
    let mut writer = CompoundFileWriter::new(directory, &format!("{}.cfs", segment));
    for file in files {
        writer.add_file(file)?;
    }
    writer.close()?;
    for file in files {
        directory.delete_file(file)?;
    }
    Ok(())
}

/// Read-only view of a compound file as a directory.
pub struct CompoundFileReader {
    name: String,
    entries: HashMap<String, IndexInput>,
}

impl CompoundFileReader {
    pub fn open(directory: &dyn Directory, name: &str) -> Result<Self> {
        let mut input = directory.open_input(name)?;
        let count = input.read_vint()? as usize;
        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = input.read_long()?;
            let entry = input.read_string()?;
            let offset = u64::try_from(offset)
                .map_err(|_| Error::corruption(format!("negative offset in {}", name)))?;
            table.push((entry, offset));
        }

        let mut entries = HashMap::with_capacity(count);
        for i in 0..table.len() {
            let (entry, offset) = &table[i];
            let end = table.get(i + 1).map(|(_, o)| *o).unwrap_or(input.len());
            if end < *offset {
                return Err(Error::corruption(format!("overlapping entries in {}", name)));
            }
            let slice = input.slice(entry, *offset, end - offset)?;
            entries.insert(entry.clone(), slice);
        }

        Ok(CompoundFileReader {
            name: name.to_string(),
            entries,
        })
    }

    fn read_only(&self) -> Error {
        Error::unsupported(format!("compound file {} is read only", self.name))
    }
}

impl Directory for CompoundFileReader {
    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.entries
            .get(name)
            .map(|e| e.len())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{} not in {}", name, self.name)))
    }

    fn delete_file(&self, _name: &str) -> Result<()> {
        Err(self.read_only())
    }

    fn rename_file(&self, _from: &str, _to: &str) -> Result<()> {
        Err(self.read_only())
    }

    fn create_output(&self, _name: &str) -> Result<Box<dyn IndexOutput>> {
        Err(self.read_only())
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{} not in {}", name, self.name)))
    }

    fn obtain_lock(&self, _name: &str) -> Result<Box<dyn DirectoryLock>> {
        Err(self.read_only())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ram_directory::RamDirectory;

    fn write(dir: &RamDirectory, name: &str, data: &[u8]) {
        let mut out = dir.create_output(name).unwrap();
        out.write_bytes(data).unwrap();
        out.close().unwrap();
    }

    #[test]
    fn entries_read_back_independently() {
        let dir = RamDirectory::new();
        write(&dir, "_1.fnm", b"fields");
        write(&dir, "_1.frq", b"");
        write(&dir, "_1.tis", b"terms!");

        let mut cfs = CompoundFileWriter::new(&dir, "_1.cfs");
        for f in ["_1.fnm", "_1.frq", "_1.tis"] {
            cfs.add_file(f).unwrap();
        }
        cfs.close().unwrap();

        let reader = CompoundFileReader::open(&dir, "_1.cfs").unwrap();
        assert_eq!(reader.open_input("_1.tis").unwrap().read_bytes(6).unwrap(), b"terms!");
        assert_eq!(reader.file_length("_1.frq").unwrap(), 0);
        assert_eq!(reader.file_length("_1.fnm").unwrap(), 6);
        assert_eq!(reader.create_output("x").err().map(|e| e.kind()), Some(ErrorKind::Unsupported));
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let dir = RamDirectory::new();
        let mut cfs = CompoundFileWriter::new(&dir, "_2.cfs");
        cfs.add_file("a").unwrap();
        assert!(cfs.add_file("a").is_err());
    }
}
