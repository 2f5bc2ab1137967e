use std::sync::Arc;

use vispart_error::VispartResult;

use crate::dataset::{Dataset, RowMeta, RowSelection};

/// A dataset row that passed the selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedRow {
    pub row: usize,
    pub timestep: usize,
    pub meta: RowMeta,
}

/// Walks a dataset in row order, yielding the rows that a partition plan selects.
///
/// The timestep counter increases whenever a row's time differs from the previous row's. Rows
/// before the selection's interval are skipped and the scan stops at its end. Rows whose band id
/// is not part of the plan are never yielded.
///
/// Both the partitioner and the unpartitioner drive the same scan, which is what keeps the
/// record order in the shard files aligned with the dataset rows.
pub struct DatasetScan {
    dataset: Arc<dyn Dataset>,
    selection: Arc<dyn RowSelection>,
    band_ids: Vec<u32>,
    next_row: usize,
    timestep: usize,
    previous_time: Option<f64>,
    finished: bool,
}

impl DatasetScan {
    pub fn new(
        dataset: Arc<dyn Dataset>,
        selection: Arc<dyn RowSelection>,
        band_ids: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            dataset,
            selection,
            band_ids: band_ids.into_iter().collect(),
            next_row: 0,
            timestep: 0,
            previous_time: None,
            finished: false,
        }
    }

    /// Index of the next dataset row the scan will look at.
    pub fn position(&self) -> usize {
        self.next_row
    }

    pub fn dataset(&self) -> &Arc<dyn Dataset> {
        &self.dataset
    }

    fn advance(&mut self) -> VispartResult<Option<SelectedRow>> {
        let row_count = self.dataset.row_count();
        let interval = self.selection.interval();
        while !self.finished && self.next_row < row_count {
            let row = self.next_row;
            self.next_row += 1;

            let meta = self.dataset.row_meta(row)?;
            if self.previous_time.is_some_and(|time| time != meta.time) {
                self.timestep += 1;
            }
            self.previous_time = Some(meta.time);

            if let Some(interval) = &interval {
                if self.timestep >= interval.end {
                    self.finished = true;
                    break;
                }
                if self.timestep < interval.start {
                    continue;
                }
            }

            if self.band_ids.contains(&meta.band_id)
                && self.selection.is_selected(&meta, self.timestep)
            {
                return Ok(Some(SelectedRow {
                    row,
                    timestep: self.timestep,
                    meta,
                }));
            }
        }
        self.finished = true;
        Ok(None)
    }
}

impl Iterator for DatasetScan {
    type Item = VispartResult<SelectedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}
