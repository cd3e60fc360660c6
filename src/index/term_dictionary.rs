//! Two-tier term dictionary.
//!
//! `<segment>.tis` holds every term in order, prefix compressed, with
//! pointer deltas into the postings files. `<segment>.tii` samples every
//! `index_interval`-th entry and is loaded into memory on open. Lookups
//! binary search the samples, seek a [`TermCursor`] to the nearest one and
//! scan forward.

use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::index::field_infos::FieldInfos;
use crate::index::term::{Term, TermInfo};
use crate::storage::directory::Directory;
use crate::storage::index_input::IndexInput;
use crate::storage::index_output::IndexOutput;

pub const FORMAT: i32 = -2;

/// Field number written for the synthetic empty term that opens the index.
const NO_FIELD: u32 = u32::MAX;

struct EntryWriter {
    out: Box<dyn IndexOutput>,
    is_index: bool,
    size: u64,
    last_term: Term,
    last_info: TermInfo,
    last_index_pointer: u64,
}

impl EntryWriter {
    fn new(mut out: Box<dyn IndexOutput>, is_index: bool, index_interval: u32, skip_interval: u32) -> Result<Self> {
        out.write_int(FORMAT)?;
        out.write_long(0)?; // patched on close
        out.write_int(index_interval as i32)?;
        out.write_int(skip_interval as i32)?;
        Ok(EntryWriter {
            out,
            is_index,
            size: 0,
            last_term: Term::default(),
            last_info: TermInfo::default(),
            last_index_pointer: 0,
        })
    }

    fn write(
        &mut self,
        term: Term,
        info: TermInfo,
        field_number: u32,
        skip_interval: u32,
        index_pointer: u64,
    ) -> Result<()> {
        let last = self.last_term.text.as_bytes();
        let text = term.text.as_bytes();
        let prefix = last.iter().zip(text).take_while(|(a, b)| a == b).count();

        let freq_delta = info
            .freq_pointer
            .checked_sub(self.last_info.freq_pointer)
            .ok_or_else(|| Error::invalid_argument(format!("freq pointer moved backwards at {}", term)))?;
        let prox_delta = info
            .prox_pointer
            .checked_sub(self.last_info.prox_pointer)
            .ok_or_else(|| Error::invalid_argument(format!("prox pointer moved backwards at {}", term)))?;

        self.out.write_vint(prefix as u32)?;
        self.out.write_vint((text.len() - prefix) as u32)?;
        self.out.write_bytes(&text[prefix..])?;
        self.out.write_vint(field_number)?;
        self.out.write_vint(info.doc_freq)?;
        self.out.write_vlong(freq_delta)?;
        self.out.write_vlong(prox_delta)?;
        if info.doc_freq >= skip_interval {
            self.out.write_vint(info.skip_offset)?;
        }
        if self.is_index {
            self.out.write_vlong(index_pointer - self.last_index_pointer)?;
            self.last_index_pointer = index_pointer;
        }

        self.last_term = term;
        self.last_info = info;
        self.size += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.out.seek(4)?;
        self.out.write_long(self.size as i64)?;
        self.out.close()
    }
}

/// Writes `.tis` and `.tii` for one segment. Terms must arrive in strictly
/// increasing order.
pub struct TermDictionaryWriter {
    dense: EntryWriter,
    index: EntryWriter,
    field_infos: Arc<FieldInfos>,
    index_interval: u32,
    skip_interval: u32,
}

impl TermDictionaryWriter {
    pub fn new(
        directory: &dyn Directory,
        segment: &str,
        field_infos: Arc<FieldInfos>,
        index_interval: u32,
        skip_interval: u32,
    ) -> Result<Self> {
        let dense = directory.create_output(&format!("{}.tis", segment))?;
        let index = directory.create_output(&format!("{}.tii", segment))?;
        Ok(TermDictionaryWriter {
            dense: EntryWriter::new(dense, false, index_interval, skip_interval)?,
            index: EntryWriter::new(index, true, index_interval, skip_interval)?,
            field_infos,
            index_interval,
            skip_interval,
        })
    }

    fn field_number(&self, term: &Term) -> Result<u32> {
        match self.field_infos.number(&term.field) {
            Some(n) => Ok(n),
            None if term.field.is_empty() => Ok(NO_FIELD),
            None => Err(Error::invalid_argument(format!("unknown field {}", term.field))),
        }
    }

    pub fn add(&mut self, term: Term, info: TermInfo) -> Result<()> {
        if self.dense.size > 0 && term <= self.dense.last_term {
            return Err(Error::invalid_argument(format!(
                "terms out of order: {} after {}",
                term, self.dense.last_term
            )));
        }

        if self.dense.size % self.index_interval as u64 == 0 {
            let pointer = self.dense.out.file_pointer();
            let last_term = self.dense.last_term.clone();
            let last_info = self.dense.last_info;
            let number = self.field_number(&last_term)?;
            self.index.write(last_term, last_info, number, self.skip_interval, pointer)?;
        }

        let number = self.field_number(&term)?;
        self.dense.write(term, info, number, self.skip_interval, 0)
    }

    pub fn size(&self) -> u64 {
        self.dense.size
    }

    pub fn close(mut self) -> Result<()> {
        self.dense.close()?;
        self.index.close()
    }
}

/// Forward-only cursor over a dictionary file.
///
/// A fresh cursor sits before the first term: call `next` to reach it.
/// Cursors returned by [`TermDictionary::iterate_from`] are already on
/// their first term.
#[derive(Clone)]
pub struct TermCursor {
    input: IndexInput,
    field_infos: Arc<FieldInfos>,
    is_index: bool,
    size: u64,
    position: i64,
    index_interval: u32,
    skip_interval: u32,
    buffer: Vec<u8>,
    term: Option<Term>,
    prev: Option<Term>,
    info: TermInfo,
    index_pointer: u64,
}

impl TermCursor {
    fn open(mut input: IndexInput, field_infos: Arc<FieldInfos>, is_index: bool) -> Result<Self> {
        let format = input.read_int()?;
        if format != FORMAT {
            return Err(Error::corruption(format!(
                "unknown term dictionary format {} in {}",
                format,
                input.name()
            )));
        }
        let size = input.read_long()?;
        let index_interval = input.read_int()?;
        let skip_interval = input.read_int()?;
        if size < 0 || index_interval <= 0 || skip_interval <= 0 {
            return Err(Error::corruption(format!("bad term dictionary header in {}", input.name())));
        }
        Ok(TermCursor {
            input,
            field_infos,
            is_index,
            size: size as u64,
            position: -1,
            index_interval: index_interval as u32,
            skip_interval: skip_interval as u32,
            buffer: Vec::new(),
            term: Some(Term::default()),
            prev: None,
            info: TermInfo::default(),
            index_pointer: 0,
        })
    }

    pub fn next(&mut self) -> Result<bool> {
        let at_end = self.position >= self.size as i64 - 1;
        self.position += 1;
        if at_end {
            self.term = None;
            return Ok(false);
        }

        self.prev = self.term.take();
        self.term = Some(self.read_term()?);

        self.info.doc_freq = self.input.read_vint()?;
        self.info.freq_pointer += self.input.read_vlong()?;
        self.info.prox_pointer += self.input.read_vlong()?;
        self.info.skip_offset = if self.info.doc_freq >= self.skip_interval {
            self.input.read_vint()?
        } else {
            0
        };
        if self.is_index {
            self.index_pointer += self.input.read_vlong()?;
        }
        Ok(true)
    }

    fn read_term(&mut self) -> Result<Term> {
        let start = self.input.read_vint()? as usize;
        let length = self.input.read_vint()? as usize;
        if start > self.buffer.len() {
            return Err(Error::corruption(format!(
                "shared prefix {} longer than previous term in {}",
                start,
                self.input.name()
            )));
        }
        self.buffer.truncate(start);
        self.buffer.extend_from_slice(self.input.read_bytes(length)?);

        let number = self.input.read_vint()?;
        let field = if number == NO_FIELD {
            String::new()
        } else {
            self.field_infos
                .name(number)
                .ok_or_else(|| Error::corruption(format!("unknown field number {} in {}", number, self.input.name())))?
                .to_string()
        };
        let text = String::from_utf8(self.buffer.clone())
            .map_err(|e| Error::corruption(format!("{} in {}", e, self.input.name())))?;
        Ok(Term { field, text })
    }

    fn seek(&mut self, pointer: u64, position: i64, term: &Term, info: TermInfo) -> Result<()> {
        self.input.seek(pointer)?;
        self.position = position;
        self.buffer.clear();
        self.buffer.extend_from_slice(term.text.as_bytes());
        self.term = Some(term.clone());
        self.prev = None;
        self.info = info;
        Ok(())
    }

    /// Current term; `None` before the first `next` and after the end.
    pub fn term(&self) -> Option<&Term> {
        if self.position < 0 {
            None
        } else {
            self.term.as_ref()
        }
    }

    pub fn info(&self) -> TermInfo {
        self.info
    }

    pub fn doc_freq(&self) -> u32 {
        self.info.doc_freq
    }

    /// Dense ordinal of the current term.
    pub fn ordinal(&self) -> Option<u64> {
        self.term().map(|_| self.position as u64)
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Read side of a segment's term dictionary. Immutable and shareable; all
/// positional state lives in caller-owned cursors.
pub struct TermDictionary {
    origin: TermCursor,
    size: u64,
    index_interval: u32,
    skip_interval: u32,
    index_terms: Vec<Term>,
    index_infos: Vec<TermInfo>,
    index_pointers: Vec<u64>,
}

impl TermDictionary {
    pub fn open(directory: &dyn Directory, segment: &str, field_infos: Arc<FieldInfos>) -> Result<Self> {
        let dense = directory.open_input(&format!("{}.tis", segment))?;
        let origin = TermCursor::open(dense, Arc::clone(&field_infos), false)?;

        let sparse = directory.open_input(&format!("{}.tii", segment))?;
        let mut index = TermCursor::open(sparse, field_infos, true)?;
        let capacity = index.size as usize;
        let mut index_terms = Vec::with_capacity(capacity);
        let mut index_infos = Vec::with_capacity(capacity);
        let mut index_pointers = Vec::with_capacity(capacity);
        while index.next()? {
            if let Some(term) = &index.term {
                index_terms.push(term.clone());
            }
            index_infos.push(index.info);
            index_pointers.push(index.index_pointer);
        }

        Ok(TermDictionary {
            size: origin.size,
            index_interval: origin.index_interval,
            skip_interval: origin.skip_interval,
            origin,
            index_terms,
            index_infos,
            index_pointers,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn index_interval(&self) -> u32 {
        self.index_interval
    }

    pub fn skip_interval(&self) -> u32 {
        self.skip_interval
    }

    /// A cursor before the first term. Also the scratch cursor for lookups.
    pub fn cursor(&self) -> TermCursor {
        self.origin.clone()
    }

    pub fn iterate(&self) -> TermCursor {
        self.cursor()
    }

    /// A cursor on the first term `>= term`, or exhausted if there is none.
    pub fn iterate_from(&self, term: &Term) -> Result<TermCursor> {
        let mut cursor = self.cursor();
        self.lookup(&mut cursor, term)?;
        Ok(cursor)
    }

    /// Greatest sample `<= term`.
    fn index_offset(&self, term: &Term) -> usize {
        let mut lo: i64 = 0;
        let mut hi: i64 = self.index_terms.len() as i64 - 1;
        while hi >= lo {
            let mid = (lo + hi) >> 1;
            match term.cmp(&self.index_terms[mid as usize]) {
                std::cmp::Ordering::Less => hi = mid - 1,
                std::cmp::Ordering::Greater => lo = mid + 1,
                std::cmp::Ordering::Equal => return mid as usize,
            }
        }
        hi.max(0) as usize
    }

    fn seek_to_sample(&self, cursor: &mut TermCursor, offset: usize) -> Result<()> {
        let position = offset as i64 * self.index_interval as i64 - 1;
        cursor.seek(
            self.index_pointers[offset],
            position,
            &self.index_terms[offset],
            self.index_infos[offset],
        )
    }

    pub fn lookup(&self, cursor: &mut TermCursor, term: &Term) -> Result<Option<TermInfo>> {
        if self.size == 0 {
            return Ok(None);
        }

        if let Some(current) = &cursor.term {
            let after_prev = cursor.prev.as_ref().is_some_and(|prev| term > prev);
            if after_prev || term >= current {
                let next_sample = (cursor.position / self.index_interval as i64 + 1) as usize;
                if next_sample >= self.index_terms.len() || *term < self.index_terms[next_sample] {
                    return self.scan(cursor, term);
                }
            }
        }

        self.seek_to_sample(cursor, self.index_offset(term))?;
        self.scan(cursor, term)
    }

    fn scan_to(&self, cursor: &mut TermCursor, term: &Term) -> Result<()> {
        loop {
            match &cursor.term {
                None => return Ok(()),
                Some(current) if cursor.position >= 0 && term <= current => return Ok(()),
                Some(_) => {}
            }
            if !cursor.next()? {
                return Ok(());
            }
        }
    }

    fn scan(&self, cursor: &mut TermCursor, term: &Term) -> Result<Option<TermInfo>> {
        self.scan_to(cursor, term)?;
        match cursor.term() {
            Some(current) if current == term => Ok(Some(cursor.info)),
            _ => Ok(None),
        }
    }

    /// The `n`th term in dictionary order.
    pub fn lookup_by_ordinal(&self, cursor: &mut TermCursor, n: u64) -> Result<Option<Term>> {
        if n >= self.size {
            return Ok(None);
        }
        let target = n as i64;
        let in_window = cursor.term.is_some()
            && target >= cursor.position
            && target < cursor.position + self.index_interval as i64;
        if !in_window {
            self.seek_to_sample(cursor, (n / self.index_interval as u64) as usize)?;
        }
        while cursor.position < target {
            if !cursor.next()? {
                return Ok(None);
            }
        }
        Ok(cursor.term().cloned())
    }

    pub fn ordinal_of(&self, cursor: &mut TermCursor, term: &Term) -> Result<Option<u64>> {
        if self.size == 0 {
            return Ok(None);
        }
        self.seek_to_sample(cursor, self.index_offset(term))?;
        self.scan_to(cursor, term)?;
        match cursor.term() {
            Some(current) if current == term => Ok(cursor.ordinal()),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::TermVector;
    use crate::storage::ram_directory::RamDirectory;

    fn field_infos() -> Arc<FieldInfos> {
        let mut infos = FieldInfos::new();
        infos.add("body", true, TermVector::No);
        infos.add("title", true, TermVector::No);
        Arc::new(infos)
    }

    fn sample_terms() -> Vec<(Term, TermInfo)> {
        let mut terms = Vec::new();
        for field in ["body", "title"] {
            for i in 0..300u32 {
                terms.push(Term::new(field, &format!("t{:04}", i * 3)));
            }
        }
        terms.sort();
        terms
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let i = i as u64;
                let doc_freq = (i % 9) as u32 + 1;
                let info = TermInfo {
                    doc_freq,
                    freq_pointer: i * 10,
                    prox_pointer: i * 20,
                    skip_offset: if doc_freq >= 4 { doc_freq * 2 } else { 0 },
                };
                (t, info)
            })
            .collect()
    }

    fn build(dir: &RamDirectory, entries: &[(Term, TermInfo)]) -> TermDictionary {
        let fis = field_infos();
        let mut writer = TermDictionaryWriter::new(dir, "_0", Arc::clone(&fis), 16, 4).unwrap();
        for (term, info) in entries {
            writer.add(term.clone(), *info).unwrap();
        }
        writer.close().unwrap();
        TermDictionary::open(dir, "_0", fis).unwrap()
    }

    #[test]
    fn every_written_term_is_found() {
        let dir = RamDirectory::new();
        let entries = sample_terms();
        let dict = build(&dir, &entries);
        assert_eq!(dict.size(), entries.len() as u64);

        let mut cursor = dict.cursor();
        for (term, info) in &entries {
            assert_eq!(dict.lookup(&mut cursor, term).unwrap(), Some(*info), "{}", term);
        }
        // Same lookups in reverse defeat the sequential fast path.
        for (term, info) in entries.iter().rev() {
            assert_eq!(dict.lookup(&mut cursor, term).unwrap(), Some(*info), "{}", term);
        }
    }

    #[test]
    fn absent_terms_are_not_found() {
        let dir = RamDirectory::new();
        let dict = build(&dir, &sample_terms());
        let mut cursor = dict.cursor();
        for text in ["t0001", "t9999", "", "a", "t0002"] {
            assert_eq!(dict.lookup(&mut cursor, &Term::new("body", text)).unwrap(), None);
        }
        assert_eq!(dict.lookup(&mut cursor, &Term::new("", "")).unwrap(), None);
        assert_eq!(dict.lookup(&mut cursor, &Term::new("zzz", "t0003")).unwrap(), None);
    }

    #[test]
    fn ordinals_round_trip() {
        let dir = RamDirectory::new();
        let entries = sample_terms();
        let dict = build(&dir, &entries);
        let mut cursor = dict.cursor();
        for (i, (term, _)) in entries.iter().enumerate() {
            let ordinal = dict.ordinal_of(&mut cursor, term).unwrap();
            assert_eq!(ordinal, Some(i as u64));
            assert_eq!(dict.lookup_by_ordinal(&mut cursor, i as u64).unwrap().as_ref(), Some(term));
        }
        assert_eq!(dict.lookup_by_ordinal(&mut cursor, entries.len() as u64).unwrap(), None);
        assert_eq!(dict.ordinal_of(&mut cursor, &Term::new("body", "t0001")).unwrap(), None);
    }

    #[test]
    fn iterate_from_lands_on_next_term() {
        let dir = RamDirectory::new();
        let dict = build(&dir, &sample_terms());

        let mut cursor = dict.iterate_from(&Term::new("body", "t0004")).unwrap();
        assert_eq!(cursor.term(), Some(&Term::new("body", "t0006")));
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.term(), Some(&Term::new("body", "t0009")));

        let cursor = dict.iterate_from(&Term::new("body", "t9")).unwrap();
        assert_eq!(cursor.term(), Some(&Term::new("title", "t0000")));

        let cursor = dict.iterate_from(&Term::new("zzz", "")).unwrap();
        assert_eq!(cursor.term(), None);
    }

    #[test]
    fn full_iteration_visits_terms_in_order() {
        let dir = RamDirectory::new();
        let entries = sample_terms();
        let dict = build(&dir, &entries);
        let mut cursor = dict.iterate();
        assert_eq!(cursor.term(), None);
        let mut seen = Vec::new();
        while cursor.next().unwrap() {
            seen.push((cursor.term().unwrap().clone(), cursor.info()));
        }
        assert_eq!(seen, entries);
    }

    #[test]
    fn out_of_order_terms_are_rejected() {
        let dir = RamDirectory::new();
        let mut writer = TermDictionaryWriter::new(&dir, "_1", field_infos(), 16, 4).unwrap();
        writer.add(Term::new("body", "b"), TermInfo::default()).unwrap();
        let err = writer.add(Term::new("body", "a"), TermInfo::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = writer.add(Term::new("body", "b"), TermInfo::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn empty_dictionary_finds_nothing() {
        let dir = RamDirectory::new();
        let dict = build(&dir, &[]);
        let mut cursor = dict.cursor();
        assert_eq!(dict.size(), 0);
        assert_eq!(dict.lookup(&mut cursor, &Term::new("body", "x")).unwrap(), None);
        assert_eq!(dict.lookup_by_ordinal(&mut cursor, 0).unwrap(), None);
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn multibyte_prefixes_decode() {
        let dir = RamDirectory::new();
        let mut entries: Vec<(Term, TermInfo)> = ["café", "cafés", "caffè", "über"]
            .iter()
            .map(|t| (Term::new("body", t), TermInfo { doc_freq: 1, ..TermInfo::default() }))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let dict = build(&dir, &entries);
        let mut cursor = dict.cursor();
        for (term, info) in &entries {
            assert_eq!(dict.lookup(&mut cursor, term).unwrap(), Some(*info));
        }
    }
}
