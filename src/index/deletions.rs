//! Deleted documents of a segment, kept as a roaring bitmap in `<segment>.del`.

use roaring::RoaringBitmap;

use crate::core::error::{Error, Result};
use crate::storage::directory::Directory;

pub fn read_deletions(directory: &dyn Directory, file: &str) -> Result<RoaringBitmap> {
    let input = directory.open_input(file)?;
    RoaringBitmap::deserialize_from(input.bytes().as_ref())
        .map_err(|e| Error::corruption(format!("{} in {}", e, file)))
}

/// Replaces `file` atomically.
pub fn write_deletions(directory: &dyn Directory, file: &str, deleted: &RoaringBitmap) -> Result<()> {
    let mut data = Vec::with_capacity(deleted.serialized_size());
    deleted.serialize_into(&mut data)?;
    let tmp = format!("{}.tmp", file);
    let mut out = directory.create_output(&tmp)?;
    out.write_bytes(&data)?;
    out.close()?;
    directory.rename_file(&tmp, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ram_directory::RamDirectory;

    #[test]
    fn bitmap_round_trips() {
        let dir = RamDirectory::new();
        let deleted: RoaringBitmap = [1, 5, 70_000].into_iter().collect();
        write_deletions(&dir, "_3.del", &deleted).unwrap();
        assert_eq!(read_deletions(&dir, "_3.del").unwrap(), deleted);
        assert_eq!(dir.list().unwrap(), vec!["_3.del".to_string()]);
    }

    #[test]
    fn garbage_is_corruption() {
        let dir = RamDirectory::new();
        let mut out = dir.create_output("_4.del").unwrap();
        out.write_bytes(&[1, 2, 3]).unwrap();
        out.close().unwrap();
        assert!(read_deletions(&dir, "_4.del").is_err());
    }
}
