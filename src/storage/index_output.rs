use crate::compression::vbyte::VByteEncoder;
use crate::core::error::{Error, Result};

/// Sequential writer with the ability to seek back and patch headers.
pub trait IndexOutput: Send {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    fn file_pointer(&self) -> u64;

    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Flushes and publishes the file. Further writes are an error.
    fn close(&mut self) -> Result<()>;

    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    fn write_int(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_long(&mut self, value: i64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn write_vint(&mut self, value: u32) -> Result<()> {
        let mut buf = [0u8; 5];
        let n = VByteEncoder::encode_u32(&mut buf, value);
        self.write_bytes(&buf[..n])
    }

    fn write_vlong(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; 10];
        let n = VByteEncoder::encode_u64(&mut buf, value);
        self.write_bytes(&buf[..n])
    }

    fn write_string(&mut self, s: &str) -> Result<()> {
        let len = u32::try_from(s.len()).map_err(|_| Error::invalid_argument("string too long"))?;
        self.write_vint(len)?;
        self.write_bytes(s.as_bytes())
    }
}

/// Growable in-memory output.
#[derive(Debug, Default, Clone)]
pub struct RamOutput {
    buffer: Vec<u8>,
    pos: usize,
}

impl RamOutput {
    pub fn new() -> Self {
        RamOutput::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Empties the buffer so it can be refilled.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pos = 0;
    }

    /// Copies the buffered bytes to another output.
    pub fn write_to(&self, out: &mut dyn IndexOutput) -> Result<()> {
        out.write_bytes(&self.buffer)
    }
}

impl IndexOutput for RamOutput {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        if self.pos == self.buffer.len() {
            self.buffer.extend_from_slice(bytes);
        } else {
            if end > self.buffer.len() {
                self.buffer.resize(end, 0);
            }
            self.buffer[self.pos..end].copy_from_slice(bytes);
        }
        self.pos = end;
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.pos as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.buffer.len() as u64 {
            return Err(Error::invalid_argument(format!("seek past end: {}", pos)));
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
