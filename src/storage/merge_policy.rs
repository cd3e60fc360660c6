use std::ops::Range;

use crate::core::config::IndexConfig;
use crate::storage::segment::SegmentInfo;

/// Policy for deciding when and which segments to merge
pub trait MergePolicy: Send + Sync {
    /// Consecutive segments to merge into one, if any.
    fn find_merge(&self, segments: &[SegmentInfo]) -> Option<Range<usize>>;
}

/// Log-structured merge policy.
///
/// Level `k` holds segments smaller than `min_merge_docs * merge_factor^k`
/// documents. Once the newest segments below a level's bound hold at least
/// that many documents together, they are merged into one segment of the
/// next level.
#[derive(Debug, Clone)]
pub struct LogMergePolicy {
    pub min_merge_docs: u32,
    pub merge_factor: u32,
    pub max_merge_docs: u32,
}

impl LogMergePolicy {
    pub fn from_config(config: &IndexConfig) -> Self {
        LogMergePolicy {
            min_merge_docs: config.max_buffered_docs.max(1) as u32,
            merge_factor: config.merge_factor.max(2) as u32,
            max_merge_docs: config.max_merge_docs,
        }
    }
}

impl Default for LogMergePolicy {
    fn default() -> Self {
        LogMergePolicy::from_config(&IndexConfig::default())
    }
}

impl MergePolicy for LogMergePolicy {
    fn find_merge(&self, segments: &[SegmentInfo]) -> Option<Range<usize>> {
        let mut target = u64::from(self.min_merge_docs);
        while target <= u64::from(self.max_merge_docs) {
            let mut start = segments.len();
            let mut docs = 0u64;
            while start > 0 && u64::from(segments[start - 1].doc_count) < target {
                start -= 1;
                docs += u64::from(segments[start].doc_count);
            }
            if docs >= target && segments.len() - start > 1 {
                return Some(start..segments.len());
            }
            target *= u64::from(self.merge_factor);
        }
        None
    }
}
