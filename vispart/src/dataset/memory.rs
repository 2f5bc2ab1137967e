use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use num_complex::Complex32;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vispart_error::{VispartResult, vispart_bail, vispart_err};

use crate::Polarization;
use crate::dataset::{Dataset, InputRecord, RowMeta};

/// One row of a [`MemDataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemRow {
    pub meta: RowMeta,
    pub data: Vec<Complex32>,
    pub weights: Vec<f32>,
    pub flags: Vec<bool>,
}

impl MemRow {
    /// A row with every sample set to `1 + 0i`, unit weight and no flags.
    pub fn constant(meta: RowMeta, channel_count: usize, polarization_count: usize) -> Self {
        let len = channel_count * polarization_count;
        Self {
            meta,
            data: vec![Complex32::new(1.0, 0.0); len],
            weights: vec![1.0; len],
            flags: vec![false; len],
        }
    }
}

/// Shape of a generated [`MemDataset`].
#[derive(Debug, Clone)]
pub struct SyntheticLayout {
    pub antenna_count: u32,
    pub timestep_count: usize,
    pub channel_count: usize,
    pub band_ids: Vec<u32>,
    pub polarizations: Vec<Polarization>,
    /// Fraction of samples that are flagged.
    pub flag_fraction: f64,
}

impl Default for SyntheticLayout {
    fn default() -> Self {
        Self {
            antenna_count: 4,
            timestep_count: 3,
            channel_count: 8,
            band_ids: vec![0],
            polarizations: vec![
                Polarization::XX,
                Polarization::XY,
                Polarization::YX,
                Polarization::YY,
            ],
            flag_fraction: 0.0,
        }
    }
}

/// A dataset held entirely in memory.
///
/// Used for tests and simulation runs. The model column is absent until it is set explicitly or
/// until [`Dataset::prepare_model_column`] creates it.
pub struct MemDataset {
    path: PathBuf,
    polarizations: Vec<Polarization>,
    channel_count: usize,
    rows: Vec<MemRow>,
    model: RwLock<Option<Vec<Vec<Complex32>>>>,
    model_writes: AtomicUsize,
}

impl MemDataset {
    pub fn new(
        path: impl Into<PathBuf>,
        polarizations: Vec<Polarization>,
        channel_count: usize,
    ) -> Self {
        Self {
            path: path.into(),
            polarizations,
            channel_count,
            rows: Vec::new(),
            model: RwLock::new(None),
            model_writes: AtomicUsize::new(0),
        }
    }

    /// Generate a dataset with every baseline of `layout.antenna_count` antennas (no
    /// auto-correlations) for each timestep and band, with random data and weights.
    pub fn synthetic(
        path: impl Into<PathBuf>,
        layout: &SyntheticLayout,
        seed: u64,
    ) -> VispartResult<Self> {
        if !(0.0..=1.0).contains(&layout.flag_fraction) {
            vispart_bail!(
                Configuration: "flag fraction must lie in [0, 1], got {}",
                layout.flag_fraction
            );
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut dataset = Self::new(path, layout.polarizations.clone(), layout.channel_count);
        let cube_len = layout.channel_count * layout.polarizations.len();
        for timestep in 0..layout.timestep_count {
            for &band_id in &layout.band_ids {
                for antenna1 in 0..layout.antenna_count {
                    for antenna2 in antenna1 + 1..layout.antenna_count {
                        let meta = RowMeta {
                            antenna1,
                            antenna2,
                            field_id: 0,
                            time: 4.0e9 + timestep as f64 * 2.0,
                            band_id,
                            uvw: [
                                rng.random_range(-1000.0..1000.0),
                                rng.random_range(-1000.0..1000.0),
                                rng.random_range(-10.0..10.0),
                            ],
                        };
                        let data = (0..cube_len)
                            .map(|_| {
                                Complex32::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0))
                            })
                            .collect();
                        let weights = (0..cube_len).map(|_| rng.random_range(0.5..2.0)).collect();
                        let flags = (0..cube_len)
                            .map(|_| rng.random_bool(layout.flag_fraction))
                            .collect();
                        dataset.rows.push(MemRow {
                            meta,
                            data,
                            weights,
                            flags,
                        });
                    }
                }
            }
        }
        Ok(dataset)
    }

    pub fn push_row(&mut self, row: MemRow) -> VispartResult<()> {
        let len = self.cube_len();
        if row.data.len() != len || row.weights.len() != len || row.flags.len() != len {
            vispart_bail!(
                ShapeMismatch: "row cubes must hold {} samples, got data {} weights {} flags {}",
                len,
                row.data.len(),
                row.weights.len(),
                row.flags.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[MemRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [MemRow] {
        &mut self.rows
    }

    /// Replace the whole model column.
    pub fn set_model(&self, model: Vec<Vec<Complex32>>) -> VispartResult<()> {
        if model.len() != self.rows.len() || model.iter().any(|m| m.len() != self.cube_len()) {
            vispart_bail!(ShapeMismatch: "model column does not match the data shape");
        }
        *self.model.write() = Some(model);
        Ok(())
    }

    /// Copy of the model cube of a row, if the model column exists.
    pub fn model(&self, row: usize) -> Option<Vec<Complex32>> {
        self.model.read().as_ref().and_then(|m| m.get(row).cloned())
    }

    pub fn has_model_column(&self) -> bool {
        self.model.read().is_some()
    }

    /// Number of [`Dataset::write_model`] calls received so far.
    pub fn model_write_count(&self) -> usize {
        self.model_writes.load(Ordering::Relaxed)
    }

    fn row(&self, row: usize) -> VispartResult<&MemRow> {
        self.rows
            .get(row)
            .ok_or_else(|| vispart_err!(OutOfBounds: row, 0, self.rows.len()))
    }
}

impl Dataset for MemDataset {
    fn path(&self) -> &Path {
        &self.path
    }

    fn polarizations(&self) -> &[Polarization] {
        &self.polarizations
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn start_time(&self) -> f64 {
        self.rows.first().map(|r| r.meta.time).unwrap_or_default()
    }

    fn row_meta(&self, row: usize) -> VispartResult<RowMeta> {
        Ok(self.row(row)?.meta)
    }

    fn read_row(&self, row: usize, include_model: bool) -> VispartResult<InputRecord> {
        let stored = self.row(row)?;
        let model = if include_model {
            let mut model = vec![Complex32::default(); self.cube_len()];
            self.read_model(row, &mut model)?;
            Some(model)
        } else {
            None
        };
        Ok(InputRecord {
            row,
            meta: stored.meta,
            data: stored.data.clone(),
            weights: stored.weights.clone(),
            flags: stored.flags.clone(),
            model,
        })
    }

    fn read_model(&self, row: usize, out: &mut [Complex32]) -> VispartResult<()> {
        let model = self.model.read();
        let model = model
            .as_ref()
            .ok_or_else(|| vispart_err!(InvalidState: "dataset {} has no model column", self.path.display()))?;
        let cube = model
            .get(row)
            .ok_or_else(|| vispart_err!(OutOfBounds: row, 0, self.rows.len()))?;
        if out.len() != cube.len() {
            vispart_bail!("model buffer holds {} samples, row has {}", out.len(), cube.len());
        }
        out.copy_from_slice(cube);
        Ok(())
    }

    fn write_model(&self, row: usize, values: &[Complex32]) -> VispartResult<()> {
        let mut model = self.model.write();
        let model = model
            .as_mut()
            .ok_or_else(|| vispart_err!(InvalidState: "dataset {} has no model column", self.path.display()))?;
        let row_count = model.len();
        let cube = model
            .get_mut(row)
            .ok_or_else(|| vispart_err!(OutOfBounds: row, 0, row_count))?;
        if values.len() != cube.len() {
            vispart_bail!("model buffer holds {} samples, row has {}", values.len(), cube.len());
        }
        cube.copy_from_slice(values);
        self.model_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn prepare_model_column(&self) -> VispartResult<()> {
        let mut model = self.model.write();
        let cube_len = self.cube_len();
        let matches_shape = model
            .as_ref()
            .is_some_and(|m| m.len() == self.rows.len() && m.iter().all(|c| c.len() == cube_len));
        if !matches_shape {
            if model.is_some() {
                log::warn!(
                    "Model column of {} does not have the same shape as the data column, resetting it",
                    self.path.display()
                );
            } else {
                log::info!("Adding model data column to {}", self.path.display());
            }
            *model = Some(vec![vec![Complex32::default(); cube_len]; self.rows.len()]);
        }
        Ok(())
    }
}
