use std::sync::Arc;

use bytes::Bytes;

use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, Result};

/// Read cursor over an immutable file image.
///
/// Cloning shares the bytes and copies only the position, so each reader
/// of a segment gets an independent cursor without reopening the file.
#[derive(Clone)]
pub struct IndexInput {
    name: Arc<str>,
    data: Bytes,
    pos: usize,
}

impl std::fmt::Debug for IndexInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexInput")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .field("pos", &self.pos)
            .finish()
    }
}

impl IndexInput {
    pub fn new(name: &str, data: Bytes) -> Self {
        IndexInput {
            name: Arc::from(name),
            data,
            pos: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn file_pointer(&self) -> u64 {
        self.pos as u64
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() {
            return Err(Error::corruption(format!(
                "seek past EOF in {}: {} > {}",
                self.name,
                pos,
                self.len()
            )));
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// A new input over `len` bytes starting at `offset`, positioned at 0.
    pub fn slice(&self, name: &str, offset: u64, len: u64) -> Result<IndexInput> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| Error::corruption(format!("slice {} exceeds {}", name, self.name)))?;
        Ok(IndexInput {
            name: Arc::from(name),
            data: self.data.slice(offset as usize..end as usize),
            pos: 0,
        })
    }

    /// The whole underlying image, independent of the position.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    fn eof(&self) -> Error {
        Error::corruption(format!("read past EOF in {}", self.name))
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let b = *self.data.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        match end {
            Some(end) => {
                let start = self.pos;
                self.pos = end;
                Ok(&self.data[start..end])
            }
            None => Err(self.eof()),
        }
    }

    pub fn read_int(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_long(&mut self) -> Result<i64> {
        let b = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_be_bytes(buf))
    }

    pub fn read_vint(&mut self) -> Result<u32> {
        let (value, consumed) = VByteEncoder::decode_u32(&self.data[self.pos..])
            .map_err(|e| Error::corruption(format!("{} in {}", e.context, self.name)))?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_vlong(&mut self) -> Result<u64> {
        let (value, consumed) = VByteEncoder::decode_u64(&self.data[self.pos..])
            .map_err(|e| Error::corruption(format!("{} in {}", e.context, self.name)))?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::corruption(e.to_string()))
    }
}
