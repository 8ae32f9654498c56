//! Line protocol
//!
//! Provides the building blocks for ASCII sentence ingest:
//! - Line reassembly from a byte stream
//! - Sentence tokenizing with typed field extraction
//! - NMEA checksum verification and encoding

pub mod checksum;
pub mod framing;
pub mod sentence;

pub use checksum::{ChecksumPolicy, ChecksumStatus};
pub use framing::{LineSplitter, OverflowPolicy};
pub use sentence::{FieldValue, InputLine, Sentence, MAX_TYPE_LEN};
