//! Stored field values. `<segment>.fdx` holds one big-endian pointer per
//! document into `<segment>.fdt`, where each document is a compression
//! tag, the raw length, the block length and the block itself. Blocks are
//! bincode-encoded field lists.

use crate::compression::compress::{CompressedBlock, CompressionType};
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document, Field};
use crate::storage::directory::Directory;
use crate::storage::index_input::IndexInput;
use crate::storage::index_output::IndexOutput;

pub struct StoredFieldsWriter {
    index: Box<dyn IndexOutput>,
    data: Box<dyn IndexOutput>,
    count: u32,
}

impl StoredFieldsWriter {
    pub fn new(directory: &dyn Directory, segment: &str) -> Result<Self> {
        Ok(StoredFieldsWriter {
            index: directory.create_output(&format!("{}.fdx", segment))?,
            data: directory.create_output(&format!("{}.fdt", segment))?,
            count: 0,
        })
    }

    /// Writes the stored fields of `doc`; unstored fields are dropped.
    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        let stored: Vec<&Field> = doc.fields.iter().filter(|f| f.stored).collect();
        self.add_fields(&stored)
    }

    fn add_fields(&mut self, fields: &[&Field]) -> Result<()> {
        let raw = bincode::serialize(fields)?;
        let block = CompressedBlock::compress_auto(&raw)?;

        self.index.write_long(self.data.file_pointer() as i64)?;
        self.data.write_byte(block.compression.tag())?;
        self.data.write_vint(block.original_size as u32)?;
        self.data.write_vint(block.data.len() as u32)?;
        self.data.write_bytes(&block.data)?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn close(mut self) -> Result<()> {
        self.index.close()?;
        self.data.close()
    }
}

#[derive(Clone)]
pub struct StoredFieldsReader {
    index: IndexInput,
    data: IndexInput,
    size: u32,
}

impl StoredFieldsReader {
    pub fn open(directory: &dyn Directory, segment: &str) -> Result<Self> {
        let index = directory.open_input(&format!("{}.fdx", segment))?;
        let data = directory.open_input(&format!("{}.fdt", segment))?;
        if index.len() % 8 != 0 {
            return Err(Error::corruption(format!("{} has a partial pointer", index.name())));
        }
        let size = (index.len() / 8) as u32;
        Ok(StoredFieldsReader { index, data, size })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Stored fields of document `n`. Takes private cursors, so shared
    /// readers need no locking.
    pub fn document(&self, n: DocId) -> Result<Document> {
        if n >= self.size {
            return Err(Error::invalid_argument(format!(
                "document {} out of range ({} stored)",
                n, self.size
            )));
        }
        let mut index = self.index.clone();
        index.seek(n as u64 * 8)?;
        let pointer = index.read_long()?;
        let pointer = u64::try_from(pointer)
            .map_err(|_| Error::corruption(format!("negative pointer in {}", index.name())))?;

        let mut data = self.data.clone();
        data.seek(pointer)?;
        let compression = CompressionType::from_tag(data.read_byte()?)?;
        let original_size = data.read_vint()? as usize;
        let len = data.read_vint()? as usize;
        let block = CompressedBlock {
            data: data.read_bytes(len)?.to_vec(),
            original_size,
            compression,
        };
        let raw = block.decompress()?;
        let fields: Vec<Field> = bincode::deserialize(&raw)?;
        Ok(Document { fields, boost: 1.0 })
    }
}
