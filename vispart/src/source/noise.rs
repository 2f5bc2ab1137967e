use std::path::Path;

use num_complex::Complex32;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use vispart_error::{VispartResult, vispart_bail, vispart_err};

use crate::Polarization;
use crate::dataset::InputRecord;
use crate::source::RecordSource;

/// Replaces the data of every record from an inner source by Gaussian noise.
///
/// Real and imaginary parts are drawn independently with the configured standard deviation.
/// Weights, flags and model values pass through untouched.
pub struct NoiseRecordSource<S> {
    inner: S,
    distribution: Normal<f32>,
    rng: StdRng,
}

impl<S: RecordSource> NoiseRecordSource<S> {
    pub fn new(inner: S, stddev: f32, seed: u64) -> VispartResult<Self> {
        if !(stddev.is_finite() && stddev >= 0.0) {
            vispart_bail!(Configuration: "noise level must be finite and non-negative, got {}", stddev);
        }
        let distribution = Normal::new(0.0, stddev)
            .map_err(|e| vispart_err!(Configuration: "invalid noise level {}: {}", stddev, e))?;
        Ok(Self {
            inner,
            distribution,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl<S: RecordSource> RecordSource for NoiseRecordSource<S> {
    fn at_end(&self) -> bool {
        self.inner.at_end()
    }

    fn read_next(&mut self) -> VispartResult<InputRecord> {
        let mut record = self.inner.read_next()?;
        for value in record.data.iter_mut() {
            *value = Complex32::new(
                self.distribution.sample(&mut self.rng),
                self.distribution.sample(&mut self.rng),
            );
        }
        Ok(record)
    }

    fn current_progress(&self) -> usize {
        self.inner.current_progress()
    }

    fn total_progress(&self) -> usize {
        self.inner.total_progress()
    }

    fn polarizations(&self) -> &[Polarization] {
        self.inner.polarizations()
    }

    fn channel_count(&self) -> usize {
        self.inner.channel_count()
    }

    fn start_time(&self) -> f64 {
        self.inner.start_time()
    }

    fn source_path(&self) -> &Path {
        self.inner.source_path()
    }
}
