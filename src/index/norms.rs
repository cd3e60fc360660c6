//! Per-field length normalization bytes, one per document, stored in
//! `<segment>.f<field number>`.

use bytes::Bytes;

use crate::core::error::{Error, Result};
use crate::scoring::similarity::encode_norm;
use crate::storage::directory::Directory;

pub fn norms_file(segment: &str, field_number: u32) -> String {
    format!("{}.f{}", segment, field_number)
}

pub fn write_norms(directory: &dyn Directory, segment: &str, field_number: u32, norms: &[u8]) -> Result<()> {
    let mut out = directory.create_output(&norms_file(segment, field_number))?;
    out.write_bytes(norms)?;
    out.close()
}

/// `None` when the field has no norms file in this segment.
pub fn read_norms(
    directory: &dyn Directory,
    segment: &str,
    field_number: u32,
    max_doc: u32,
) -> Result<Option<Bytes>> {
    let name = norms_file(segment, field_number);
    if !directory.file_exists(&name) {
        return Ok(None);
    }
    let input = directory.open_input(&name)?;
    if input.len() != max_doc as u64 {
        return Err(Error::corruption(format!(
            "{} holds {} norms for {} documents",
            name,
            input.len(),
            max_doc
        )));
    }
    Ok(Some(input.bytes().clone()))
}

/// Norms standing in for a field that was never indexed with them.
pub fn fake_norms(max_doc: u32) -> Bytes {
    Bytes::from(vec![encode_norm(1.0); max_doc as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::storage::ram_directory::RamDirectory;

    #[test]
    fn norms_load_with_matching_length() {
        let dir = RamDirectory::new();
        write_norms(&dir, "_0", 2, &[124, 120, 0]).unwrap();
        assert_eq!(read_norms(&dir, "_0", 2, 3).unwrap().unwrap().as_ref(), &[124, 120, 0]);
        assert!(read_norms(&dir, "_0", 1, 3).unwrap().is_none());
        assert_eq!(read_norms(&dir, "_0", 2, 4).unwrap_err().kind(), ErrorKind::Corruption);
        assert_eq!(fake_norms(2).as_ref(), &[124, 124]);
    }
}
