pub mod vbyte;
pub mod compress;
