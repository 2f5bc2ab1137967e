use std::ops::Range;

use crate::dataset::RowMeta;

/// Predicate deciding which dataset rows take part in a partition.
///
/// The same predicate is evaluated again when model data is written back, so it must be
/// deterministic for a given row.
pub trait RowSelection: Send + Sync {
    /// Timestep interval to restrict the scan to, if any.
    fn interval(&self) -> Option<Range<usize>>;

    fn is_selected(&self, meta: &RowMeta, timestep: usize) -> bool;
}

/// Row selection by field, timestep interval, antenna and baseline length.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    field_ids: Option<Vec<u32>>,
    interval: Option<Range<usize>>,
    antennas: Option<Vec<u32>>,
    min_uv_distance: Option<f64>,
    max_uv_distance: Option<f64>,
    auto_correlations: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            field_ids: None,
            interval: None,
            antennas: None,
            min_uv_distance: None,
            max_uv_distance: None,
            auto_correlations: true,
        }
    }
}

impl Selection {
    /// Select every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_field_ids(mut self, field_ids: impl IntoIterator<Item = u32>) -> Self {
        self.field_ids = Some(field_ids.into_iter().collect());
        self
    }

    /// Restrict to timesteps `start..end`, counting from the first row of the dataset.
    pub fn with_interval(mut self, interval: Range<usize>) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Keep only baselines where both antennas are in the given set.
    pub fn with_antennas(mut self, antennas: impl IntoIterator<Item = u32>) -> Self {
        self.antennas = Some(antennas.into_iter().collect());
        self
    }

    pub fn with_min_uv_distance(mut self, min: f64) -> Self {
        self.min_uv_distance = Some(min);
        self
    }

    pub fn with_max_uv_distance(mut self, max: f64) -> Self {
        self.max_uv_distance = Some(max);
        self
    }

    pub fn with_auto_correlations(mut self, auto_correlations: bool) -> Self {
        self.auto_correlations = auto_correlations;
        self
    }
}

impl RowSelection for Selection {
    fn interval(&self) -> Option<Range<usize>> {
        self.interval.clone()
    }

    fn is_selected(&self, meta: &RowMeta, timestep: usize) -> bool {
        if let Some(fields) = &self.field_ids {
            if !fields.contains(&meta.field_id) {
                return false;
            }
        }
        if let Some(interval) = &self.interval {
            if !interval.contains(&timestep) {
                return false;
            }
        }
        if !self.auto_correlations && meta.antenna1 == meta.antenna2 {
            return false;
        }
        if let Some(antennas) = &self.antennas {
            if !antennas.contains(&meta.antenna1) || !antennas.contains(&meta.antenna2) {
                return false;
            }
        }
        let distance = meta.uv_distance();
        if self.min_uv_distance.is_some_and(|min| distance < min) {
            return false;
        }
        if self.max_uv_distance.is_some_and(|max| distance > max) {
            return false;
        }
        true
    }
}
