use std::sync::Arc;

use roaring::RoaringBitmap;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::iterator::{DocIterator, TermDocs, TermPositions};
use crate::index::term::TermInfo;
use crate::storage::index_input::IndexInput;

struct ProxCursor {
    input: IndexInput,
    count: u32,
    position: u32,
}

impl ProxCursor {
    fn discard(&mut self, n: u32) -> Result<()> {
        for _ in 0..n {
            self.input.read_vint()?;
        }
        Ok(())
    }
}

/// Reads one term's postings from a segment's `.frq` stream, hiding
/// deleted documents.
pub struct SegmentTermDocs {
    freq_stream: IndexInput,
    skip_stream: Option<IndexInput>,
    deleted: Option<Arc<RoaringBitmap>>,
    skip_interval: u32,

    count: u32,
    df: u32,
    doc: DocId,
    freq: u32,

    num_skips: u32,
    skip_count: u32,
    skip_doc: DocId,
    freq_pointer: u64,
    prox_pointer: u64,
    skip_pointer: u64,
    have_skipped: bool,

    prox: Option<ProxCursor>,
}

impl SegmentTermDocs {
    pub fn new(freq_stream: IndexInput, deleted: Option<Arc<RoaringBitmap>>, skip_interval: u32) -> Self {
        SegmentTermDocs {
            freq_stream,
            skip_stream: None,
            deleted,
            skip_interval,
            count: 0,
            df: 0,
            doc: 0,
            freq: 0,
            num_skips: 0,
            skip_count: 0,
            skip_doc: 0,
            freq_pointer: 0,
            prox_pointer: 0,
            skip_pointer: 0,
            have_skipped: false,
            prox: None,
        }
    }

    /// Repositions on a term. `None` yields an empty iteration.
    pub fn seek(&mut self, info: Option<TermInfo>) -> Result<()> {
        self.count = 0;
        match info {
            None => {
                self.df = 0;
            }
            Some(info) => {
                self.df = info.doc_freq;
                self.doc = 0;
                self.skip_doc = 0;
                self.skip_count = 0;
                self.num_skips = info.doc_freq / self.skip_interval;
                self.freq_pointer = info.freq_pointer;
                self.prox_pointer = info.prox_pointer;
                self.skip_pointer = info.freq_pointer + info.skip_offset as u64;
                self.freq_stream.seek(info.freq_pointer)?;
                self.have_skipped = false;
                if let Some(prox) = &mut self.prox {
                    prox.input.seek(info.prox_pointer)?;
                }
            }
        }
        if let Some(prox) = &mut self.prox {
            prox.count = 0;
        }
        Ok(())
    }

    pub fn doc_freq(&self) -> u32 {
        self.df
    }

    fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.as_ref().is_some_and(|d| d.contains(doc))
    }

    /// Decodes one posting into `doc`/`freq`. Caller checks `count < df`.
    fn read_posting(&mut self) -> Result<()> {
        let code = self.freq_stream.read_vint()?;
        self.doc = self
            .doc
            .checked_add(code >> 1)
            .filter(|d| *d != NO_MORE_DOCS)
            .ok_or_else(|| Error::corruption(format!("doc number overflow in {}", self.freq_stream.name())))?;
        self.freq = if code & 1 != 0 {
            1
        } else {
            self.freq_stream.read_vint()?
        };
        self.count += 1;
        Ok(())
    }

    fn skip_prox(&mut self, pointer: u64) -> Result<()> {
        if let Some(prox) = &mut self.prox {
            prox.input.seek(pointer)?;
            prox.count = 0;
        }
        Ok(())
    }
}

impl DocIterator for SegmentTermDocs {
    fn next(&mut self) -> Result<bool> {
        if let Some(prox) = &mut self.prox {
            let unread = prox.count;
            prox.discard(unread)?;
            prox.count = 0;
        }
        loop {
            if self.count == self.df {
                self.doc = NO_MORE_DOCS;
                return Ok(false);
            }
            self.read_posting()?;
            if !self.is_deleted(self.doc) {
                break;
            }
            let freq = self.freq;
            if let Some(prox) = &mut self.prox {
                prox.discard(freq)?;
            }
        }
        if let Some(prox) = &mut self.prox {
            prox.count = self.freq;
            prox.position = 0;
        }
        Ok(true)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.doc == NO_MORE_DOCS {
            return Ok(false);
        }
        if self.df >= self.skip_interval {
            if !self.have_skipped {
                let stream = self
                    .skip_stream
                    .get_or_insert_with(|| self.freq_stream.clone());
                stream.seek(self.skip_pointer)?;
                self.have_skipped = true;
            }

            let mut last_skip_doc = self.skip_doc;
            let mut last_freq_pointer = self.freq_stream.file_pointer();
            let mut last_prox_pointer = None;
            let mut num_skipped: i64 = -1 - (self.count % self.skip_interval) as i64;

            while target > self.skip_doc {
                last_skip_doc = self.skip_doc;
                last_freq_pointer = self.freq_pointer;
                last_prox_pointer = Some(self.prox_pointer);

                if self.skip_count > 0 && self.skip_doc >= self.doc {
                    num_skipped += self.skip_interval as i64;
                }
                if self.skip_count >= self.num_skips {
                    break;
                }

                let Some(stream) = self.skip_stream.as_mut() else {
                    return Err(Error::new(ErrorKind::InvalidState, "skip stream not open".to_string()));
                };
                self.skip_doc += stream.read_vint()?;
                self.freq_pointer += stream.read_vint()? as u64;
                self.prox_pointer += stream.read_vint()? as u64;
                self.skip_count += 1;
            }

            if last_freq_pointer > self.freq_stream.file_pointer() {
                self.freq_stream.seek(last_freq_pointer)?;
                if let Some(pointer) = last_prox_pointer {
                    self.skip_prox(pointer)?;
                }
                self.doc = last_skip_doc;
                let count = self.count as i64 + num_skipped;
                self.count = u32::try_from(count).map_err(|_| {
                    Error::corruption(format!("inconsistent skip data in {}", self.freq_stream.name()))
                })?;
            }
        }

        loop {
            if !self.next()? {
                return Ok(false);
            }
            if target <= self.doc {
                return Ok(true);
            }
        }
    }

    fn doc(&self) -> DocId {
        self.doc
    }
}

impl TermDocs for SegmentTermDocs {
    fn freq(&self) -> u32 {
        self.freq
    }

    fn read(&mut self, docs: &mut [DocId], freqs: &mut [u32]) -> Result<usize> {
        if self.prox.is_some() {
            return Err(Error::unsupported("bulk read on a positional postings reader"));
        }
        let length = docs.len().min(freqs.len());
        let mut i = 0;
        while i < length && self.count < self.df {
            self.read_posting()?;
            if !self.is_deleted(self.doc) {
                docs[i] = self.doc;
                freqs[i] = self.freq;
                i += 1;
            }
        }
        Ok(i)
    }
}

/// Postings reader that also walks the `.prx` stream.
pub struct SegmentTermPositions {
    docs: SegmentTermDocs,
}

impl SegmentTermPositions {
    pub fn new(
        freq_stream: IndexInput,
        prox_stream: IndexInput,
        deleted: Option<Arc<RoaringBitmap>>,
        skip_interval: u32,
    ) -> Self {
        let mut docs = SegmentTermDocs::new(freq_stream, deleted, skip_interval);
        docs.prox = Some(ProxCursor {
            input: prox_stream,
            count: 0,
            position: 0,
        });
        SegmentTermPositions { docs }
    }

    pub fn seek(&mut self, info: Option<TermInfo>) -> Result<()> {
        self.docs.seek(info)
    }

    pub fn doc_freq(&self) -> u32 {
        self.docs.df
    }
}

impl DocIterator for SegmentTermPositions {
    fn next(&mut self) -> Result<bool> {
        self.docs.next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.docs.skip_to(target)
    }

    fn doc(&self) -> DocId {
        self.docs.doc
    }
}

impl TermDocs for SegmentTermPositions {
    fn freq(&self) -> u32 {
        self.docs.freq
    }

    fn read(&mut self, docs: &mut [DocId], freqs: &mut [u32]) -> Result<usize> {
        self.docs.read(docs, freqs)
    }
}

impl TermPositions for SegmentTermPositions {
    fn next_position(&mut self) -> Result<u32> {
        let Some(prox) = self.docs.prox.as_mut() else {
            return Err(Error::new(ErrorKind::InvalidState, "no position stream".to_string()));
        };
        if prox.count == 0 {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("all positions of doc {} already read", self.docs.doc),
            ));
        }
        prox.count -= 1;
        prox.position += prox.input.read_vint()?;
        Ok(prox.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::postings_writer::PostingsWriter;
    use crate::storage::directory::Directory;
    use crate::storage::ram_directory::RamDirectory;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    type Postings = Vec<(DocId, Vec<u32>)>;

    fn random_postings(rng: &mut StdRng, n: usize) -> Postings {
        let mut doc = 0;
        (0..n)
            .map(|i| {
                doc += if i == 0 { rng.gen_range(0..3) } else { rng.gen_range(1..6) };
                let freq = if rng.gen_bool(0.6) { 1 } else { rng.gen_range(2..5) };
                let mut pos = 0;
                let positions = (0..freq)
                    .map(|_| {
                        pos += rng.gen_range(0..4);
                        pos
                    })
                    .collect();
                (doc, positions)
            })
            .collect()
    }

    fn write_terms(dir: &RamDirectory, terms: &[Postings], skip_interval: u32) -> Vec<TermInfo> {
        let mut writer = PostingsWriter::new(dir, "_0", skip_interval).unwrap();
        let mut infos = Vec::new();
        for postings in terms {
            writer.start_term();
            for (doc, positions) in postings {
                writer.add_doc(*doc, positions).unwrap();
            }
            infos.push(writer.finish_term().unwrap().unwrap());
        }
        writer.close().unwrap();
        infos
    }

    fn positions_reader(dir: &RamDirectory, skip_interval: u32, deleted: Option<RoaringBitmap>) -> SegmentTermPositions {
        SegmentTermPositions::new(
            dir.open_input("_0.frq").unwrap(),
            dir.open_input("_0.prx").unwrap(),
            deleted.map(Arc::new),
            skip_interval,
        )
    }

    fn docs_reader(dir: &RamDirectory, skip_interval: u32, deleted: Option<RoaringBitmap>) -> SegmentTermDocs {
        SegmentTermDocs::new(dir.open_input("_0.frq").unwrap(), deleted.map(Arc::new), skip_interval)
    }

    #[test]
    fn postings_round_trip_with_positions() {
        let mut rng = StdRng::seed_from_u64(7);
        let terms: Vec<Postings> = [1, 3, 15, 16, 17, 100, 333]
            .iter()
            .map(|n| random_postings(&mut rng, *n))
            .collect();
        let dir = RamDirectory::new();
        let infos = write_terms(&dir, &terms, 16);

        let mut reader = positions_reader(&dir, 16, None);
        for (postings, info) in terms.iter().zip(&infos) {
            assert_eq!(info.doc_freq as usize, postings.len());
            reader.seek(Some(*info)).unwrap();
            for (doc, positions) in postings {
                assert!(reader.next().unwrap());
                assert_eq!(reader.doc(), *doc);
                assert_eq!(reader.freq() as usize, positions.len());
                for p in positions {
                    assert_eq!(reader.next_position().unwrap(), *p);
                }
            }
            assert!(!reader.next().unwrap());
            assert_eq!(reader.doc(), NO_MORE_DOCS);
        }
    }

    #[test]
    fn skip_offset_only_above_interval() {
        let mut rng = StdRng::seed_from_u64(3);
        let terms = vec![random_postings(&mut rng, 15), random_postings(&mut rng, 16)];
        let dir = RamDirectory::new();
        let infos = write_terms(&dir, &terms, 16);
        assert_eq!(infos[0].skip_offset, 0);
        assert!(infos[1].skip_offset > 0);
    }

    #[test]
    fn skip_to_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(11);
        let postings = random_postings(&mut rng, 500);
        let last = postings.last().unwrap().0;
        let dir = RamDirectory::new();
        let info = write_terms(&dir, &[postings.clone()], 4)[0];
        let deleted: RoaringBitmap = postings
            .iter()
            .map(|(doc, _)| *doc)
            .filter(|_| rng.gen_bool(0.3))
            .collect();

        for round in 0..400 {
            // a random prefix of next() calls, then one skip_to
            let warmup = rng.gen_range(0..50);
            let target = rng.gen_range(0..last + 10);
            let deletions = (round % 2 == 1).then(|| deleted.clone());

            let mut expected = docs_reader(&dir, 4, deletions.clone());
            expected.seek(Some(info)).unwrap();
            let mut skipping = positions_reader(&dir, 4, deletions);
            skipping.seek(Some(info)).unwrap();
            for _ in 0..warmup {
                expected.next().unwrap();
                skipping.next().unwrap();
            }

            let mut found = false;
            while expected.next().unwrap() {
                if expected.doc() >= target {
                    found = true;
                    break;
                }
            }
            assert_eq!(skipping.skip_to(target).unwrap(), found, "target {}", target);
            if found {
                assert_eq!(skipping.doc(), expected.doc());
                assert_eq!(skipping.freq(), expected.freq());
                let (_, positions) = postings.iter().find(|(d, _)| *d == expected.doc()).unwrap();
                for p in positions {
                    assert_eq!(skipping.next_position().unwrap(), *p);
                }
                // the rest of the stream still lines up
                while expected.next().unwrap() {
                    assert!(skipping.next().unwrap());
                    assert_eq!(skipping.doc(), expected.doc());
                }
                assert!(!skipping.next().unwrap());
            }
        }
    }

    #[test]
    fn skip_to_before_first_returns_first() {
        let dir = RamDirectory::new();
        let postings: Postings = (0..40).map(|i| (10 + i * 2, vec![0])).collect();
        let info = write_terms(&dir, &[postings], 8)[0];
        let mut reader = docs_reader(&dir, 8, None);
        reader.seek(Some(info)).unwrap();
        assert!(reader.skip_to(0).unwrap());
        assert_eq!(reader.doc(), 10);
        assert!(reader.skip_to(55).unwrap());
        assert_eq!(reader.doc(), 56);
        assert!(!reader.skip_to(1000).unwrap());
        assert!(!reader.skip_to(1001).unwrap());
    }

    #[test]
    fn deleted_docs_are_hidden() {
        let dir = RamDirectory::new();
        let postings: Postings = (0..50).map(|d| (d, vec![d % 3, d % 3 + 1])).collect();
        let info = write_terms(&dir, &[postings], 8)[0];
        let deleted: RoaringBitmap = (0..50).filter(|d| d % 4 == 1).collect();

        let mut reader = positions_reader(&dir, 8, Some(deleted.clone()));
        reader.seek(Some(info)).unwrap();
        let mut seen = Vec::new();
        while reader.next().unwrap() {
            assert_eq!(reader.next_position().unwrap(), reader.doc() % 3);
            seen.push(reader.doc());
        }
        let expected: Vec<DocId> = (0..50).filter(|d| !deleted.contains(*d)).collect();
        assert_eq!(seen, expected);

        let mut bulk = docs_reader(&dir, 8, Some(deleted));
        bulk.seek(Some(info)).unwrap();
        let mut docs = [0; 16];
        let mut freqs = [0; 16];
        let mut all = Vec::new();
        loop {
            let n = bulk.read(&mut docs, &mut freqs).unwrap();
            if n == 0 {
                break;
            }
            assert!(freqs[..n].iter().all(|f| *f == 2));
            all.extend_from_slice(&docs[..n]);
        }
        assert_eq!(all, expected);
    }

    #[test]
    fn absent_term_is_empty() {
        let dir = RamDirectory::new();
        write_terms(&dir, &[vec![(1, vec![0])]], 8);
        let mut reader = docs_reader(&dir, 8, None);
        reader.seek(None).unwrap();
        assert!(!reader.next().unwrap());
    }

    #[test]
    fn positional_reader_refuses_bulk_read() {
        let dir = RamDirectory::new();
        let info = write_terms(&dir, &[vec![(1, vec![0])]], 8)[0];
        let mut reader = positions_reader(&dir, 8, None);
        reader.seek(Some(info)).unwrap();
        let err = reader.read(&mut [0; 4], &mut [0; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn out_of_order_docs_are_corruption() {
        let dir = RamDirectory::new();
        let mut writer = PostingsWriter::new(&dir, "_9", 8).unwrap();
        writer.start_term();
        writer.add_doc(5, &[0]).unwrap();
        assert_eq!(writer.add_doc(5, &[0]).unwrap_err().kind(), ErrorKind::Corruption);
        assert!(!dir.file_exists("_9.frq"));
    }
}
