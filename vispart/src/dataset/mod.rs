//! The interface through which the store reads and writes the original dataset.
//!
//! The store never owns the source data. Everything it needs, at partition time and again when
//! committing model changes, goes through [`Dataset`], so the storage engine behind it can be
//! swapped out (see [`MemDataset`] for the in-memory implementation).
mod memory;
mod scan;
mod selection;

use std::path::Path;

pub use memory::*;
use num_complex::Complex32;
pub use scan::*;
pub use selection::*;
use vispart_error::VispartResult;

use crate::Polarization;

/// Identifying and positional metadata of one dataset row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowMeta {
    pub antenna1: u32,
    pub antenna2: u32,
    pub field_id: u32,
    pub time: f64,
    pub band_id: u32,
    pub uvw: [f64; 3],
}

impl RowMeta {
    /// Projected baseline length in the uv-plane, in the units of the uvw coordinates.
    pub fn uv_distance(&self) -> f64 {
        self.uvw[0].hypot(self.uvw[1])
    }
}

/// One row of the dataset as consumed by the partitioner.
///
/// Cubes are flattened channel-major: the sample for channel `c` and native polarization `p` is
/// at `c * polarization_count + p`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    /// Row index within the dataset.
    pub row: usize,
    pub meta: RowMeta,
    pub data: Vec<Complex32>,
    pub weights: Vec<f32>,
    pub flags: Vec<bool>,
    pub model: Option<Vec<Complex32>>,
}

/// A row-oriented visibility dataset.
///
/// Model writes take `&self`: implementations are shared between the partition handle and its
/// readers, and must provide their own interior mutability for the model column.
pub trait Dataset: Send + Sync {
    /// Path identifying the dataset; shard file names are derived from it.
    fn path(&self) -> &Path;

    /// Native correlations, in cube order.
    fn polarizations(&self) -> &[Polarization];

    fn channel_count(&self) -> usize;

    fn row_count(&self) -> usize;

    /// Time of the first row.
    fn start_time(&self) -> f64;

    fn row_meta(&self, row: usize) -> VispartResult<RowMeta>;

    /// Read data, weights and flags of a row, and its model cube when `include_model` is set.
    fn read_row(&self, row: usize, include_model: bool) -> VispartResult<InputRecord>;

    fn read_model(&self, row: usize, out: &mut [Complex32]) -> VispartResult<()>;

    fn write_model(&self, row: usize, model: &[Complex32]) -> VispartResult<()>;

    /// Make sure a model column exists with the same shape as the data, creating or resetting it
    /// to zeros otherwise. Called once before model values are written back.
    fn prepare_model_column(&self) -> VispartResult<()> {
        Ok(())
    }

    /// Number of samples in one cube.
    fn cube_len(&self) -> usize {
        self.channel_count() * self.polarizations().len()
    }
}
