//! Readable-content extraction from an HTML page snapshot.
//!
//! The extractor temporarily detaches noise nodes (scripts, navigation,
//! ads, ...) to read the main content, then restores every node to its
//! original position, so the snapshot is byte-for-byte identical before
//! and after a call. Extraction never fails outward: a broken snapshot yields
//! a degraded record carrying an error marker instead of an `Err`.

pub mod extractor;
pub mod metadata;
pub mod snapshot;

pub use extractor::{extract, ExtractedContent, DEFAULT_MAX_LENGTH};
pub use metadata::{read_metadata, PageMetadata};
pub use snapshot::PageSnapshot;
