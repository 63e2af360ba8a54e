//! Media store & streamer: uploaded bytes in, byte-range responses out.

pub mod range;
pub mod store;
pub mod streamer;

pub use range::{parse_range, ByteRange, RangeError};
pub use store::{content_type_for, MediaError, MediaStore, StoredObject, UploadSink};
