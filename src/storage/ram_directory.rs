use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::directory::{Directory, DirectoryLock};
use crate::storage::index_input::IndexInput;
use crate::storage::index_output::{IndexOutput, RamOutput};

type FileMap = Arc<RwLock<HashMap<String, Bytes>>>;

/// Directory held entirely in memory. Files become visible when their
/// output is closed.
#[derive(Default, Clone)]
pub struct RamDirectory {
    files: FileMap,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl RamDirectory {
    pub fn new() -> Self {
        RamDirectory::default()
    }
}

fn not_found(name: &str) -> Error {
    Error::new(ErrorKind::NotFound, format!("no such file: {}", name))
}

impl Directory for RamDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.files
            .read()
            .get(name)
            .map(|b| b.len() as u64)
            .ok_or_else(|| not_found(name))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.write();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        Ok(Box::new(RamFileOutput {
            name: name.to_string(),
            buffer: RamOutput::new(),
            files: Arc::clone(&self.files),
            closed: false,
        }))
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        let files = self.files.read();
        let data = files.get(name).ok_or_else(|| not_found(name))?;
        Ok(IndexInput::new(name, data.clone()))
    }

    fn obtain_lock(&self, name: &str) -> Result<Box<dyn DirectoryLock>> {
        let mut locks = self.locks.lock();
        if !locks.insert(name.to_string()) {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("lock {} already held", name),
            ));
        }
        Ok(Box::new(RamLock {
            name: name.to_string(),
            locks: Arc::clone(&self.locks),
        }))
    }
}

struct RamFileOutput {
    name: String,
    buffer: RamOutput,
    files: FileMap,
    closed: bool,
}

impl IndexOutput for RamFileOutput {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::new(ErrorKind::InvalidState, format!("{} is closed", self.name)));
        }
        self.buffer.write_bytes(bytes)
    }

    fn file_pointer(&self) -> u64 {
        self.buffer.file_pointer()
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.buffer.seek(pos)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            let data = Bytes::from(std::mem::take(&mut self.buffer).into_inner());
            self.files.write().insert(self.name.clone(), data);
        }
        Ok(())
    }
}

struct RamLock {
    name: String,
    locks: Arc<Mutex<HashSet<String>>>,
}

impl DirectoryLock for RamLock {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RamLock {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.name);
    }
}
