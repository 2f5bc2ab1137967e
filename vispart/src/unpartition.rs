use num_complex::Complex32;
use vispart_error::{VispartResult, vispart_bail, vispart_err};

use crate::Polarization;
use crate::dataset::DatasetScan;
use crate::handle::HandleData;
use crate::mapped::MappedRows;
use crate::partition::{ChannelRange, progress_bar};
use crate::reader::read_meta_header;

/// The model and weight files of one shard, opened for reading during a commit.
struct ShardModel {
    range: ChannelRange,
    polarization: Polarization,
    model: MappedRows<Complex32>,
    weights: MappedRows<f32>,
    values: Vec<Complex32>,
    weight_row: Vec<f32>,
}

/// Writes the model files of a partition back into the dataset.
pub struct Unpartitioner;

impl Unpartitioner {
    /// Rescan the dataset with the selection used at partition time and, for every selected row,
    /// replace its model cube with the unweighted shard model values.
    ///
    /// Samples whose stored weight is zero, or whose unweighted value is not finite, keep the
    /// dataset's current model value.
    pub(crate) fn commit(data: &HandleData) -> VispartResult<()> {
        let dataset = &data.dataset;
        if !data.has_model {
            vispart_bail!(InvalidState: "partition of {} has no model files", dataset.path().display());
        }
        log::info!("Writing changed model back to {}", dataset.path().display());

        let row_counts = data
            .band_ids
            .iter()
            .map(|&band_id| {
                let header = read_meta_header(&data.names.meta_path(band_id))?;
                Ok(usize::try_from(header.selected_record_count)?)
            })
            .collect::<VispartResult<Vec<usize>>>()?;

        let mut shards = Vec::with_capacity(data.ranges.len() * data.polarizations.len());
        for (part, range) in data.ranges.iter().enumerate() {
            let spw_index = data
                .spw_index(range.band_id)
                .ok_or_else(|| vispart_err!(InvalidState: "band {} has no metadata", range.band_id))?;
            let rows = row_counts[spw_index];
            for &polarization in &data.polarizations {
                let row_len = data.row_len(range, polarization);
                let names = &data.names;
                shards.push(ShardModel {
                    range: *range,
                    polarization,
                    model: MappedRows::open(
                        &names.model_path(part, polarization, range.band_id),
                        row_len,
                        rows,
                        false,
                    )?,
                    weights: MappedRows::open(
                        &names.weight_path(part, polarization, range.band_id),
                        row_len,
                        rows,
                        false,
                    )?,
                    values: vec![Complex32::default(); row_len],
                    weight_row: vec![0.0; row_len],
                });
            }
        }

        dataset.prepare_model_column()?;

        let mut cube = vec![Complex32::default(); dataset.cube_len()];
        let mut next_record = vec![0usize; data.band_ids.len()];
        let scan = DatasetScan::new(dataset.clone(), data.selection.clone(), data.band_ids.iter().copied());
        let progress = progress_bar(
            data.show_progress,
            u64::try_from(row_counts.iter().sum::<usize>())?,
        );
        let mut committed = 0usize;
        for selected in scan {
            let selected = selected?;
            let band_id = selected.meta.band_id;
            let spw_index = data
                .spw_index(band_id)
                .ok_or_else(|| vispart_err!(InvalidState: "row of unplanned band {}", band_id))?;
            let record = next_record[spw_index];
            if record >= row_counts[spw_index] {
                vispart_bail!(
                    ShapeMismatch: "selection yields more rows of band {} than the {} partitioned",
                    band_id,
                    row_counts[spw_index]
                );
            }

            dataset.read_model(selected.row, &mut cube)?;
            for shard in shards.iter_mut().filter(|s| s.range.band_id == band_id) {
                shard.model.read_row(record, &mut shard.values)?;
                shard.weights.read_row(record, &mut shard.weight_row)?;
                for (value, weight) in shard.values.iter_mut().zip(&shard.weight_row) {
                    *value = if *weight == 0.0 {
                        Complex32::new(f32::NAN, f32::NAN)
                    } else {
                        *value / *weight
                    };
                }
                data.converter.reverse_copy(
                    &data.native,
                    shard.polarization,
                    shard.range.channels(),
                    &shard.values,
                    &mut cube,
                )?;
            }
            dataset.write_model(selected.row, &cube)?;

            next_record[spw_index] += 1;
            committed += 1;
            progress.inc(1);
        }
        progress.finish();
        log::debug!("Row count during unpartitioning: {}", committed);

        for ((band_id, expected), seen) in data.band_ids.iter().zip(&row_counts).zip(&next_record) {
            if expected != seen {
                vispart_bail!(
                    ShapeMismatch: "selection yields {} rows of band {}, {} were partitioned",
                    seen,
                    band_id,
                    expected
                );
            }
        }

        data.metrics.unpartition_rows().add(i64::try_from(committed)?);
        data.metrics.unpartition_commits().inc();
        Ok(())
    }
}
