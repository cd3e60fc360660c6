use crate::core::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Payloads shorter than this are stored raw.
const MIN_COMPRESS_LEN: usize = 64;

/// Compressed block storage for stored-field records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    LZ4, // Fast compression (~500 MB/s), ratio 2-3x
}

impl CompressionType {
    pub fn tag(self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::LZ4 => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::LZ4),
            other => Err(Error::corruption(format!("unknown compression tag {}", other))),
        }
    }
}

impl CompressedBlock {
    pub fn compress(data: &[u8], compression: CompressionType) -> Result<Self> {
        let compressed = match compression {
            CompressionType::None => data.to_vec(),
            CompressionType::LZ4 => lz4::block::compress(data, None, false)?,
        };

        Ok(CompressedBlock {
            data: compressed,
            original_size: data.len(),
            compression,
        })
    }

    /// LZ4 for anything worth compressing, raw otherwise.
    pub fn compress_auto(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_COMPRESS_LEN {
            Self::compress(data, CompressionType::None)
        } else {
            Self::compress(data, CompressionType::LZ4)
        }
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.compression {
            CompressionType::None => Ok(self.data.clone()),

            CompressionType::LZ4 => {
                let size = i32::try_from(self.original_size)
                    .map_err(|_| Error::corruption("compressed block too large"))?;
                lz4::block::decompress(&self.data, Some(size))
                    .map_err(|e| Error::new(ErrorKind::Corruption, e.to_string()))
            }
        }
    }
}
