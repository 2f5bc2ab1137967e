//! On-disk layout of shard and metadata files.
//!
//! All integers and floats are little-endian and fields are packed without padding.
//!
//! ```text
//! MetaHeader   = u64 selectedRecordCount, u32 pathLen, bytes[pathLen] path, f64 startTime
//! MetaRecord   = f64 u, f64 v, f64 w, u32 bandId, u32 antenna1, u32 antenna2
//! PartHeader   = u32 channelStart, u32 channelCount, u32 bandId, u8 hasModel, u8 hasWeights
//! ```
//!
//! A data file is a [`PartHeader`] followed by `selectedRecordCount` rows of complex samples. The
//! weight and model files hold the same rows (real samples for weights) without a header.
mod meta;
mod naming;
mod part;

pub use meta::*;
pub use naming::*;
pub use part::*;
