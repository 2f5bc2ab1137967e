use std::path::Path;

use vispart_error::{VispartResult, vispart_bail};

use crate::Polarization;
use crate::dataset::{DatasetScan, InputRecord, SelectedRow};

/// Reads the selected rows straight from a [`Dataset`](crate::dataset::Dataset).
///
/// The next selected row is looked up ahead of time so that [`RecordSource::at_end`] can be
/// answered without touching the dataset.
///
/// [`RecordSource::at_end`]: crate::source::RecordSource::at_end
pub struct DatasetRecordSource {
    scan: DatasetScan,
    include_model: bool,
    next: Option<SelectedRow>,
}

impl DatasetRecordSource {
    pub fn new(mut scan: DatasetScan, include_model: bool) -> VispartResult<Self> {
        let next = scan.next().transpose()?;
        Ok(Self {
            scan,
            include_model,
            next,
        })
    }
}

impl super::RecordSource for DatasetRecordSource {
    fn at_end(&self) -> bool {
        self.next.is_none()
    }

    fn read_next(&mut self) -> VispartResult<InputRecord> {
        let Some(selected) = self.next.take() else {
            vispart_bail!(InvalidState: "record source is exhausted");
        };
        let record = self
            .scan
            .dataset()
            .read_row(selected.row, self.include_model)?;
        self.next = self.scan.next().transpose()?;
        Ok(record)
    }

    fn current_progress(&self) -> usize {
        self.scan.position()
    }

    fn total_progress(&self) -> usize {
        self.scan.dataset().row_count()
    }

    fn polarizations(&self) -> &[Polarization] {
        self.scan.dataset().polarizations()
    }

    fn channel_count(&self) -> usize {
        self.scan.dataset().channel_count()
    }

    fn start_time(&self) -> f64 {
        self.scan.dataset().start_time()
    }

    fn source_path(&self) -> &Path {
        self.scan.dataset().path()
    }
}
