//! A partitioned, columnar working copy of a visibility dataset.
//!
//! A dataset is a sequence of rows, each holding a `[channel][correlation]` cube of complex
//! visibilities with weights and flags for one baseline, time and band. Imaging pipelines read
//! the same data many times, one channel range and one polarization at a time. This crate
//! rewrites the selected rows once into compact per-(channel range, polarization) shard files
//! that can be consumed sequentially, and memory-maps a model column per shard that many
//! independent passes can update. Model changes are written back into the dataset when the last
//! holder of the partition releases it.
//!
//! # Writing
//!
//! A [`Partitioner`] is configured with [`PartitionOptions`] and run against a [`Dataset`], a
//! [`RowSelection`] and a [`PartitionPlan`]. Rows are pulled from a [`RecordSource`], converted to
//! the requested [`Polarization`]s by a [`PolarizationConverter`] and appended to the shards. The
//! call returns a [`Handle`].
//!
//! # Reading
//!
//! [`Handle::open`] gives a [`PartitionedMs`] for one shard. Data, weights and metadata are read
//! row by row through forward cursors; the model is addressed by row index and written with
//! [`PartitionedMs::write_model`], which skips non-finite values so that passes writing
//! different polarizations into one shard do not overwrite each other.
//!
//! # Committing
//!
//! Releasing the last clone of a [`Handle`] (or calling [`Handle::close`] on it) commits the model
//! files back into the dataset if the options asked for it, then deletes every file.
//!
//! # File Format
//!
//! ```text
//! {prefix}-spw{band}-meta.data               {prefix}-part{NNNN}-{pol}-b{band}.data
//! ┌──────────────────────────────┐           ┌──────────────────────────────┐
//! │ MetaHeader                   │           │ PartHeader (14 bytes)        │
//! │ (record count, source path,  │           ├──────────────────────────────┤
//! │  start time)                 │           │ row 0: channels x complex    │
//! ├──────────────────────────────┤           │ row 1                        │
//! │ MetaRecord 0 (36 bytes)      │           │ ...                          │
//! │ MetaRecord 1                 │           └──────────────────────────────┘
//! │ ...                          │           .weight.data: rows of f32, no header
//! └──────────────────────────────┘           .model.data:  rows of complex, no header
//! ```

mod convert;
mod cursor;
pub mod dataset;
pub mod format;
mod handle;
mod mapped;
mod metrics;
mod partition;
mod polarization;
mod reader;
pub mod sample;
pub mod source;
#[cfg(test)]
mod tests;
mod unpartition;
mod writer;

pub use convert::*;
pub use cursor::*;
pub use dataset::{Dataset, RowSelection, Selection};
pub use handle::*;
pub use mapped::*;
pub use metrics::*;
pub use partition::*;
pub use polarization::*;
pub use reader::*;
pub use source::RecordSource;
pub use unpartition::*;
pub use writer::*;
