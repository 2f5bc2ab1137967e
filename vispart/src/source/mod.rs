//! Sources of input records for the partitioner.
mod direct;
mod noise;

use std::path::Path;

pub use direct::*;
pub use noise::*;
use vispart_error::VispartResult;

use crate::Polarization;
use crate::dataset::InputRecord;

/// A bounded, pull-based sequence of input records.
pub trait RecordSource {
    fn at_end(&self) -> bool;

    /// Pull the next record. Callers check [`RecordSource::at_end`] first.
    fn read_next(&mut self) -> VispartResult<InputRecord>;

    /// Progress so far, in the same unit as [`RecordSource::total_progress`].
    fn current_progress(&self) -> usize;

    fn total_progress(&self) -> usize;

    /// Native correlations of every record's cubes.
    fn polarizations(&self) -> &[Polarization];

    fn channel_count(&self) -> usize;

    fn start_time(&self) -> f64;

    fn source_path(&self) -> &Path;
}
