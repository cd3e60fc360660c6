use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::core::error::{Error, ErrorKind, Result};
use crate::mmap::mmap_file::MmapFile;
use crate::storage::directory::{Directory, DirectoryLock};
use crate::storage::file_lock::FileLock;
use crate::storage::index_input::IndexInput;
use crate::storage::index_output::IndexOutput;

/// Directory backed by one filesystem folder. Inputs are memory mapped.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    path: PathBuf,
}

impl FsDirectory {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Ok(FsDirectory { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Directory for FsDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        Ok(fs::metadata(self.file_path(name))?.len())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        fs::remove_file(self.file_path(name))?;
        Ok(())
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.file_path(from), self.file_path(to))?;
        Ok(())
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let file = File::create(self.file_path(name))?;
        Ok(Box::new(FsOutput {
            name: name.to_string(),
            writer: Some(BufWriter::with_capacity(64 * 1024, file)),
            pos: 0,
        }))
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        let mmap = MmapFile::open_read_only(self.file_path(name))?;
        Ok(IndexInput::new(name, Bytes::from_owner(mmap)))
    }

    fn obtain_lock(&self, name: &str) -> Result<Box<dyn DirectoryLock>> {
        Ok(Box::new(FileLock::acquire(&self.path, name)?))
    }
}

struct FsOutput {
    name: String,
    writer: Option<BufWriter<File>>,
    pos: u64,
}

impl FsOutput {
    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let name = &self.name;
        self.writer
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, format!("{} is closed", name)))
    }
}

impl IndexOutput for FsOutput {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer()?.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        // BufWriter flushes before seeking
        self.writer()?.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer
                .into_inner()
                .map_err(|e| Error::from(e.into_error()))?;
            file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_patch_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();
        let mut out = dir.create_output("f").unwrap();
        out.write_long(0).unwrap();
        out.write_string("payload").unwrap();
        out.seek(0).unwrap();
        out.write_long(99).unwrap();
        out.close().unwrap();

        let mut input = dir.open_input("f").unwrap();
        assert_eq!(input.read_long().unwrap(), 99);
        assert_eq!(input.read_string().unwrap(), "payload");
        assert_eq!(dir.file_length("f").unwrap(), 16);
    }

    #[test]
    fn second_lock_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();
        let _held = dir.obtain_lock("write.lock").unwrap();
        assert!(dir.obtain_lock("write.lock").is_err());
    }

    #[test]
    fn empty_file_opens() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = FsDirectory::open(tmp.path()).unwrap();
        dir.create_output("empty").unwrap().close().unwrap();
        assert!(dir.open_input("empty").unwrap().is_empty());
    }
}
