use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::index::term::TermInfo;
use crate::storage::directory::Directory;
use crate::storage::index_output::{IndexOutput, RamOutput};

/// Streams postings into `<segment>.frq` and `<segment>.prx`.
///
/// Usage per term: `start_term`, any number of `add_doc` calls with
/// strictly increasing documents, then `finish_term` for the dictionary
/// entry.
pub struct PostingsWriter {
    freq: Box<dyn IndexOutput>,
    prox: Box<dyn IndexOutput>,
    skip_buffer: RamOutput,
    skip_interval: u32,

    freq_start: u64,
    prox_start: u64,
    doc_freq: u32,
    last_doc: DocId,

    last_skip_doc: DocId,
    last_skip_freq_pointer: u64,
    last_skip_prox_pointer: u64,
}

impl PostingsWriter {
    pub fn new(directory: &dyn Directory, segment: &str, skip_interval: u32) -> Result<Self> {
        if skip_interval < 2 {
            return Err(Error::invalid_argument("skip_interval must be at least 2"));
        }
        Ok(PostingsWriter {
            freq: directory.create_output(&format!("{}.frq", segment))?,
            prox: directory.create_output(&format!("{}.prx", segment))?,
            skip_buffer: RamOutput::new(),
            skip_interval,
            freq_start: 0,
            prox_start: 0,
            doc_freq: 0,
            last_doc: 0,
            last_skip_doc: 0,
            last_skip_freq_pointer: 0,
            last_skip_prox_pointer: 0,
        })
    }

    pub fn start_term(&mut self) {
        self.freq_start = self.freq.file_pointer();
        self.prox_start = self.prox.file_pointer();
        self.doc_freq = 0;
        self.last_doc = 0;

        self.skip_buffer.reset();
        self.last_skip_doc = 0;
        self.last_skip_freq_pointer = self.freq_start;
        self.last_skip_prox_pointer = self.prox_start;
    }

    /// Appends one document. `positions` must be non-decreasing and non-empty.
    pub fn add_doc(&mut self, doc: DocId, positions: &[u32]) -> Result<()> {
        if self.doc_freq > 0 && doc <= self.last_doc {
            return Err(Error::corruption(format!(
                "docs out of order ({} <= {})",
                doc, self.last_doc
            )));
        }
        if positions.is_empty() {
            return Err(Error::invalid_argument(format!("doc {} has no positions", doc)));
        }

        self.doc_freq += 1;
        if self.doc_freq % self.skip_interval == 0 {
            self.buffer_skip(self.last_doc)?;
        }

        let doc_code = (doc - self.last_doc) << 1;
        self.last_doc = doc;
        let freq = positions.len() as u32;
        if freq == 1 {
            self.freq.write_vint(doc_code | 1)?;
        } else {
            self.freq.write_vint(doc_code)?;
            self.freq.write_vint(freq)?;
        }

        let mut last_position = 0;
        for &position in positions {
            let delta = position.checked_sub(last_position).ok_or_else(|| {
                Error::invalid_argument(format!("positions of doc {} decrease", doc))
            })?;
            self.prox.write_vint(delta)?;
            last_position = position;
        }
        Ok(())
    }

    fn buffer_skip(&mut self, doc: DocId) -> Result<()> {
        let freq_pointer = self.freq.file_pointer();
        let prox_pointer = self.prox.file_pointer();
        self.skip_buffer.write_vint(doc - self.last_skip_doc)?;
        self.skip_buffer.write_vint(pointer_delta(freq_pointer, self.last_skip_freq_pointer)?)?;
        self.skip_buffer.write_vint(pointer_delta(prox_pointer, self.last_skip_prox_pointer)?)?;
        self.last_skip_doc = doc;
        self.last_skip_freq_pointer = freq_pointer;
        self.last_skip_prox_pointer = prox_pointer;
        Ok(())
    }

    /// Writes the skip data and returns the dictionary entry, or `None`
    /// when the term got no documents.
    pub fn finish_term(&mut self) -> Result<Option<TermInfo>> {
        if self.doc_freq == 0 {
            return Ok(None);
        }
        let skip_pointer = self.freq.file_pointer();
        self.skip_buffer.write_to(self.freq.as_mut())?;
        let skip_offset = if self.doc_freq >= self.skip_interval {
            pointer_delta(skip_pointer, self.freq_start)?
        } else {
            0
        };
        Ok(Some(TermInfo {
            doc_freq: self.doc_freq,
            freq_pointer: self.freq_start,
            prox_pointer: self.prox_start,
            skip_offset,
        }))
    }

    pub fn close(mut self) -> Result<()> {
        self.freq.close()?;
        self.prox.close()
    }
}

fn pointer_delta(pointer: u64, base: u64) -> Result<u32> {
    pointer
        .checked_sub(base)
        .and_then(|d| u32::try_from(d).ok())
        .ok_or_else(|| Error::invalid_argument(format!("skip delta out of range: {} - {}", pointer, base)))
}
