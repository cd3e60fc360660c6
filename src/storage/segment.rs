use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{Error, Result};
use crate::storage::directory::Directory;

pub const SEGMENTS_FILE: &str = "segments";
const SEGMENTS_TMP_FILE: &str = "segments.new";
const FORMAT: i32 = -1;

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        SegmentId::new()
    }
}

/// One committed segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: SegmentId,
    pub name: String,
    pub doc_count: u32,
    pub compound: bool,
    pub created_at: DateTime<Utc>,
}

impl SegmentInfo {
    pub fn new(name: &str, doc_count: u32, compound: bool) -> Self {
        SegmentInfo {
            id: SegmentId::new(),
            name: name.to_string(),
            doc_count,
            compound,
            created_at: Utc::now(),
        }
    }

    /// Deletions file of this segment.
    pub fn del_file(&self) -> String {
        format!("{}.del", self.name)
    }

    pub fn cfs_file(&self) -> String {
        format!("{}.cfs", self.name)
    }

    /// Every file in `directory` that belongs to this segment.
    pub fn files(&self, directory: &dyn Directory) -> Result<Vec<String>> {
        let prefix = format!("{}.", self.name);
        Ok(directory
            .list()?
            .into_iter()
            .filter(|f| f.starts_with(&prefix))
            .collect())
    }
}

/// The list of live segments, as of the last commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentInfos {
    pub version: u64,
    pub counter: u64,
    pub segments: Vec<SegmentInfo>,
}

#[derive(Serialize, Deserialize)]
struct SegmentsHeader {
    format: i32,
    infos: SegmentInfos,
}

impl SegmentInfos {
    pub fn new() -> Self {
        SegmentInfos::default()
    }

    /// Fresh segment name: `_` followed by the counter in base 36.
    pub fn next_segment_name(&mut self) -> String {
        let name = format!("_{}", to_base36(self.counter));
        self.counter += 1;
        name
    }

    pub fn total_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.doc_count as u64).sum()
    }

    pub fn exists(directory: &dyn Directory) -> bool {
        directory.file_exists(SEGMENTS_FILE)
    }

    pub fn read(directory: &dyn Directory) -> Result<Self> {
        let input = directory.open_input(SEGMENTS_FILE)?;
        let data = input.bytes();
        if data.len() < 4 {
            return Err(Error::corruption("segments file too short"));
        }
        let (body, trailer) = data.split_at(data.len() - 4);
        let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);

        let mut hasher = Hasher::new();
        hasher.update(body);
        let actual = hasher.finalize();
        if actual != expected {
            return Err(Error::corruption(format!(
                "segments checksum mismatch: stored {:08x}, computed {:08x}",
                expected, actual
            )));
        }

        let header: SegmentsHeader = bincode::deserialize(body)?;
        if header.format != FORMAT {
            return Err(Error::corruption(format!("unknown segments format {}", header.format)));
        }
        Ok(header.infos)
    }

    /// Bumps the version and atomically replaces the segments file.
    pub fn write(&mut self, directory: &dyn Directory) -> Result<()> {
        self.version += 1;
        let header = SegmentsHeader {
            format: FORMAT,
            infos: self.clone(),
        };
        let body = bincode::serialize(&header)?;
        let mut hasher = Hasher::new();
        hasher.update(&body);

        let mut out = directory.create_output(SEGMENTS_TMP_FILE)?;
        out.write_bytes(&body)?;
        out.write_bytes(&hasher.finalize().to_be_bytes())?;
        out.close()?;
        directory.rename_file(SEGMENTS_TMP_FILE, SEGMENTS_FILE)?;

        log::debug!(
            "committed segments version {} ({} segments, {} docs)",
            self.version,
            self.segments.len(),
            self.total_docs()
        );
        Ok(())
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
