use crate::core::error::Result;
use crate::storage::index_input::IndexInput;
use crate::storage::index_output::IndexOutput;

/// Held while a writer owns an index. Released on drop.
pub trait DirectoryLock: Send {
    fn name(&self) -> &str;
}

/// Flat namespace of named files.
pub trait Directory: Send + Sync {
    fn list(&self) -> Result<Vec<String>>;

    fn file_exists(&self, name: &str) -> bool;

    fn file_length(&self, name: &str) -> Result<u64>;

    fn delete_file(&self, name: &str) -> Result<()>;

    /// Replaces `to` if it exists.
    fn rename_file(&self, from: &str, to: &str) -> Result<()>;

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>>;

    fn open_input(&self, name: &str) -> Result<IndexInput>;

    /// Fails with `InvalidState` if the lock is already held.
    fn obtain_lock(&self, name: &str) -> Result<Box<dyn DirectoryLock>>;
}
