pub mod compound;
pub mod directory;
pub mod file_lock;
pub mod fs_directory;
pub mod index_input;
pub mod index_output;
pub mod merge_policy;
pub mod ram_directory;
pub mod segment;
pub mod segment_reader;
pub mod segment_writer;
