//! Per-document term vectors.
//!
//! `<segment>.tvx` holds one pointer per document into `<segment>.tvd`.
//! A `.tvd` record lists the document's vector fields as delta-coded field
//! numbers followed by delta-coded pointers into `<segment>.tvf`. A `.tvf`
//! record is the field's term count, a flags byte, then for each term in
//! order its shared prefix length, suffix length, suffix bytes and
//! frequency, followed by delta-coded positions when the flags say so.
//! Every file starts with the format version.

use std::fmt;
use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::core::types::{DocId, TermVector};
use crate::index::field_infos::FieldInfos;
use crate::storage::directory::Directory;
use crate::storage::index_input::IndexInput;
use crate::storage::index_output::IndexOutput;

const FORMAT_VERSION: i32 = 1;
const HEADER_LEN: u64 = 4;
const STORE_POSITIONS: u8 = 0x1;

pub fn vector_files(segment: &str) -> [String; 3] {
    ["tvx", "tvd", "tvf"].map(|ext| format!("{}.{}", segment, ext))
}

/// Terms of one field of one document, in term order, with their
/// frequencies.
pub trait TermFreqVector {
    /// `None` for vectors not taken from an indexed field.
    fn field(&self) -> Option<&str>;

    fn terms(&self) -> &[String];

    fn term_frequencies(&self) -> &[u32];

    fn size(&self) -> usize {
        self.terms().len()
    }

    fn index_of(&self, term: &str) -> Option<usize> {
        self.terms().binary_search_by(|t| t.as_str().cmp(term)).ok()
    }

    fn indexes_of(&self, terms: &[&str]) -> Vec<Option<usize>> {
        terms.iter().map(|t| self.index_of(t)).collect()
    }
}

/// A term vector that can also report where each term occurred.
pub trait TermPositionVector: TermFreqVector {
    /// Positions of the term at `index`; `None` when positions were not
    /// stored or `index` is out of range.
    fn term_positions(&self, index: usize) -> Option<&[u32]>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTermVector {
    field: String,
    terms: Vec<String>,
    freqs: Vec<u32>,
    positions: Option<Vec<Vec<u32>>>,
}

impl SegmentTermVector {
    /// Vector with positions from `(term, positions)` pairs in term order.
    pub fn with_positions(field: &str, entries: Vec<(String, Vec<u32>)>) -> Self {
        let freqs = entries.iter().map(|(_, p)| p.len() as u32).collect();
        let (terms, positions) = entries.into_iter().unzip();
        SegmentTermVector {
            field: field.to_string(),
            terms,
            freqs,
            positions: Some(positions),
        }
    }

    /// Vector of `(term, freq)` pairs in term order.
    pub fn with_freqs(field: &str, entries: Vec<(String, u32)>) -> Self {
        let (terms, freqs) = entries.into_iter().unzip();
        SegmentTermVector {
            field: field.to_string(),
            terms,
            freqs,
            positions: None,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }

    pub fn has_positions(&self) -> bool {
        self.positions.is_some()
    }

    /// Same vector without its positions.
    pub fn without_positions(mut self) -> Self {
        self.positions = None;
        self
    }
}

impl TermFreqVector for SegmentTermVector {
    fn field(&self) -> Option<&str> {
        Some(&self.field)
    }

    fn terms(&self) -> &[String] {
        &self.terms
    }

    fn term_frequencies(&self) -> &[u32] {
        &self.freqs
    }
}

impl TermPositionVector for SegmentTermVector {
    fn term_positions(&self, index: usize) -> Option<&[u32]> {
        self.positions.as_ref()?.get(index).map(Vec::as_slice)
    }
}

impl fmt::Display for SegmentTermVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: ", self.field)?;
        write_pairs(f, &self.terms, &self.freqs)?;
        write!(f, "}}")
    }
}

/// `term/freq` pairs separated by commas.
pub(crate) fn write_pairs(f: &mut fmt::Formatter<'_>, terms: &[String], freqs: &[u32]) -> fmt::Result {
    for (i, (term, freq)) in terms.iter().zip(freqs).enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}/{}", term, freq)?;
    }
    Ok(())
}

pub struct TermVectorsWriter {
    field_infos: Arc<FieldInfos>,
    tvx: Box<dyn IndexOutput>,
    tvd: Box<dyn IndexOutput>,
    tvf: Box<dyn IndexOutput>,
    count: u32,
}

impl TermVectorsWriter {
    pub fn new(directory: &dyn Directory, segment: &str, field_infos: Arc<FieldInfos>) -> Result<Self> {
        let [tvx, tvd, tvf] = vector_files(segment);
        let mut writer = TermVectorsWriter {
            field_infos,
            tvx: directory.create_output(&tvx)?,
            tvd: directory.create_output(&tvd)?,
            tvf: directory.create_output(&tvf)?,
            count: 0,
        };
        writer.tvx.write_int(FORMAT_VERSION)?;
        writer.tvd.write_int(FORMAT_VERSION)?;
        writer.tvf.write_int(FORMAT_VERSION)?;
        Ok(writer)
    }

    /// Writes the vectors of the next document, which may have none.
    /// Positions are kept only for fields declared with positions.
    pub fn add_document(&mut self, vectors: &[SegmentTermVector]) -> Result<()> {
        let mut ordered = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let info = self
                .field_infos
                .by_name(&vector.field)
                .filter(|info| info.stores_term_vector())
                .ok_or_else(|| Error::invalid_argument(format!("field {} does not store term vectors", vector.field)))?;
            check_order(vector)?;
            ordered.push((info.number, info.term_vector == TermVector::WithPositions, vector));
        }
        ordered.sort_unstable_by_key(|(number, _, _)| *number);
        if ordered.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(Error::invalid_argument("a document holds one term vector per field"));
        }

        let mut fields = Vec::with_capacity(ordered.len());
        for (number, keep_positions, vector) in ordered {
            fields.push((number, self.tvf.file_pointer()));
            self.write_field(vector, keep_positions)?;
        }

        self.tvx.write_long(self.tvd.file_pointer() as i64)?;
        self.tvd.write_vint(fields.len() as u32)?;
        let mut last_number = 0;
        for (number, _) in &fields {
            self.tvd.write_vint(number - last_number)?;
            last_number = *number;
        }
        let mut last_pointer = 0;
        for (_, pointer) in &fields {
            self.tvd.write_vlong(pointer - last_pointer)?;
            last_pointer = *pointer;
        }
        self.count += 1;
        Ok(())
    }

    fn write_field(&mut self, vector: &SegmentTermVector, keep_positions: bool) -> Result<()> {
        let positions = vector.positions.as_ref().filter(|_| keep_positions);
        self.tvf.write_vint(vector.terms.len() as u32)?;
        self.tvf.write_byte(if positions.is_some() { STORE_POSITIONS } else { 0 })?;

        let mut last: &[u8] = &[];
        for (i, term) in vector.terms.iter().enumerate() {
            let text = term.as_bytes();
            let prefix = last.iter().zip(text).take_while(|(a, b)| a == b).count();
            self.tvf.write_vint(prefix as u32)?;
            self.tvf.write_vint((text.len() - prefix) as u32)?;
            self.tvf.write_bytes(&text[prefix..])?;
            self.tvf.write_vint(vector.freqs[i])?;
            if let Some(positions) = positions {
                let mut last_position = 0;
                for &position in &positions[i] {
                    let delta = position.checked_sub(last_position).ok_or_else(|| {
                        Error::invalid_argument(format!("positions of {} in {} are out of order", term, vector.field))
                    })?;
                    self.tvf.write_vint(delta)?;
                    last_position = position;
                }
            }
            last = text;
        }
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn close(mut self) -> Result<()> {
        self.tvx.close()?;
        self.tvd.close()?;
        self.tvf.close()
    }
}

fn check_order(vector: &SegmentTermVector) -> Result<()> {
    if let Some(w) = vector.terms.windows(2).find(|w| w[0] >= w[1]) {
        return Err(Error::invalid_argument(format!(
            "term vector of {} is not in strictly increasing term order at {}",
            vector.field, w[1]
        )));
    }
    let positions = vector.positions.as_ref().map_or(vector.terms.len(), Vec::len);
    if vector.freqs.len() != vector.terms.len() || positions != vector.terms.len() {
        return Err(Error::invalid_argument(format!("term vector of {} has mismatched frequencies or positions", vector.field)));
    }
    Ok(())
}

fn check_version(input: &mut IndexInput) -> Result<()> {
    let version = input.read_int()?;
    if version != FORMAT_VERSION {
        return Err(Error::corruption(format!(
            "{} has format {}, expected {}",
            input.name(),
            version,
            FORMAT_VERSION
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TermVectorsReader {
    field_infos: Arc<FieldInfos>,
    tvx: IndexInput,
    tvd: IndexInput,
    tvf: IndexInput,
    size: u32,
}

impl TermVectorsReader {
    pub fn open(directory: &dyn Directory, segment: &str, field_infos: Arc<FieldInfos>) -> Result<Self> {
        let [tvx, tvd, tvf] = vector_files(segment);
        let mut tvx = directory.open_input(&tvx)?;
        let mut tvd = directory.open_input(&tvd)?;
        let mut tvf = directory.open_input(&tvf)?;
        check_version(&mut tvx)?;
        check_version(&mut tvd)?;
        check_version(&mut tvf)?;
        if (tvx.len() - HEADER_LEN) % 8 != 0 {
            return Err(Error::corruption(format!("{} has a partial pointer", tvx.name())));
        }
        let size = ((tvx.len() - HEADER_LEN) / 8) as u32;
        Ok(TermVectorsReader {
            field_infos,
            tvx,
            tvd,
            tvf,
            size,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Field numbers and `.tvf` pointers of document `doc`'s vectors.
    fn fields(&self, doc: DocId) -> Result<Vec<(u32, u64)>> {
        if doc >= self.size {
            return Err(Error::invalid_argument(format!(
                "document {} out of range ({} with vectors)",
                doc, self.size
            )));
        }
        let mut tvx = self.tvx.clone();
        tvx.seek(HEADER_LEN + doc as u64 * 8)?;
        let pointer = u64::try_from(tvx.read_long()?)
            .map_err(|_| Error::corruption(format!("negative pointer in {}", tvx.name())))?;

        let mut tvd = self.tvd.clone();
        tvd.seek(pointer)?;
        let count = tvd.read_vint()? as usize;
        let mut numbers = Vec::with_capacity(count);
        let mut number = 0;
        for _ in 0..count {
            number += tvd.read_vint()?;
            numbers.push(number);
        }
        let mut pointer = 0;
        let mut fields = Vec::with_capacity(count);
        for number in numbers {
            pointer += tvd.read_vlong()?;
            fields.push((number, pointer));
        }
        Ok(fields)
    }

    /// Vector of `field` in document `doc`, if the document has one.
    pub fn get(&self, doc: DocId, field: &str) -> Result<Option<SegmentTermVector>> {
        let Some(number) = self.field_infos.number(field) else {
            return Ok(None);
        };
        match self.fields(doc)?.into_iter().find(|(n, _)| *n == number) {
            Some((_, pointer)) => self.read_field(field, pointer).map(Some),
            None => Ok(None),
        }
    }

    /// Every vector of document `doc`, in field number order.
    pub fn get_all(&self, doc: DocId) -> Result<Vec<SegmentTermVector>> {
        self.fields(doc)?
            .into_iter()
            .map(|(number, pointer)| {
                let name = self
                    .field_infos
                    .name(number)
                    .ok_or_else(|| Error::corruption(format!("unknown field {} in {}", number, self.tvd.name())))?;
                self.read_field(name, pointer)
            })
            .collect()
    }

    fn read_field(&self, field: &str, pointer: u64) -> Result<SegmentTermVector> {
        let mut tvf = self.tvf.clone();
        tvf.seek(pointer)?;
        let count = tvf.read_vint()? as usize;
        let with_positions = tvf.read_byte()? & STORE_POSITIONS != 0;

        let mut terms = Vec::with_capacity(count);
        let mut freqs = Vec::with_capacity(count);
        let mut positions = Vec::new();
        let mut buffer: Vec<u8> = Vec::new();
        for _ in 0..count {
            let start = tvf.read_vint()? as usize;
            let length = tvf.read_vint()? as usize;
            if start > buffer.len() {
                return Err(Error::corruption(format!(
                    "shared prefix {} longer than previous term in {}",
                    start,
                    tvf.name()
                )));
            }
            buffer.truncate(start);
            buffer.extend_from_slice(tvf.read_bytes(length)?);
            let term = String::from_utf8(buffer.clone())
                .map_err(|_| Error::corruption(format!("term vector term is not UTF-8 in {}", tvf.name())))?;
            let freq = tvf.read_vint()?;
            if with_positions {
                let mut term_positions = Vec::with_capacity(freq as usize);
                let mut position = 0;
                for _ in 0..freq {
                    position += tvf.read_vint()?;
                    term_positions.push(position);
                }
                positions.push(term_positions);
            }
            terms.push(term);
            freqs.push(freq);
        }
        Ok(SegmentTermVector {
            field: field.to_string(),
            terms,
            freqs,
            positions: with_positions.then_some(positions),
        })
    }
}
