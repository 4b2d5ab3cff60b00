//! Transformation module.
//!
//! This module turns a raw measurement grid into tidy records:
//! - Dates: header date parsing
//! - Scanner: date column / date row detection and the date mapping
//! - Segmenter: marker scanning into measurement blocks
//! - Extractor: blocks × dates into long-format records
//! - Pipeline: end-to-end orchestration with the master join

pub mod dates;
pub mod extractor;
pub mod pipeline;
pub mod scanner;
pub mod segmenter;

pub use dates::DateParser;
pub use extractor::extract_records;
pub use pipeline::*;
pub use scanner::{date_mapping, find_date_row, find_date_start_col, locate_header, HeaderLocation};
pub use segmenter::{find_markers, segment_blocks, MarkerHit};
