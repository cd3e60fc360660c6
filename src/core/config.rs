use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub index_interval: u32,          // Dense terms between sparse index samples
    pub skip_interval: u32,           // Postings between skip-list entries
    pub max_buffered_docs: usize,     // Docs held in memory before a segment is flushed
    pub merge_factor: usize,          // Segments per merge level
    pub max_merge_docs: u32,          // Segments above this size are never merged
    pub max_field_length: usize,      // Tokens indexed per field value
    pub use_compound_file: bool,      // Pack segment files into a single .cfs
    pub max_clause_count: usize,      // Limit on boolean clauses and term expansion
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            index_interval: 128,
            skip_interval: 16,
            max_buffered_docs: 10,
            merge_factor: 10,
            max_merge_docs: i32::MAX as u32,
            max_field_length: 10_000,
            use_compound_file: true,
            max_clause_count: 1024,
        }
    }
}

impl IndexConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: IndexConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_interval == 0 {
            return Err(Error::invalid_argument("index_interval must be positive"));
        }
        if self.skip_interval < 2 {
            return Err(Error::invalid_argument("skip_interval must be at least 2"));
        }
        if self.merge_factor < 2 {
            return Err(Error::invalid_argument("merge_factor must be at least 2"));
        }
        if self.max_buffered_docs == 0 {
            return Err(Error::invalid_argument("max_buffered_docs must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index_interval, 128);
        assert_eq!(config.skip_interval, 16);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"skip_interval": 4, "use_compound_file": false}}"#).unwrap();
        let config = IndexConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.skip_interval, 4);
        assert!(!config.use_compound_file);
        assert_eq!(config.merge_factor, 10);
    }

    #[test]
    fn rejects_tiny_merge_factor() {
        let config = IndexConfig { merge_factor: 1, ..IndexConfig::default() };
        assert!(config.validate().is_err());
    }
}
