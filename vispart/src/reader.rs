use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use num_complex::Complex32;
use vispart_error::{VispartError, VispartResult, vispart_bail, vispart_err};

use crate::Polarization;
use crate::cursor::RowCursor;
use crate::dataset::DatasetScan;
use crate::format::{MetaHeader, MetaRecord, PartHeader};
use crate::handle::Handle;
use crate::mapped::MappedRows;
use crate::partition::ChannelRange;
use crate::sample::{Sample, decode_slice};

pub(crate) fn read_meta_header(path: &Path) -> VispartResult<MetaHeader> {
    let file = File::open(path)
        .map_err(|e| VispartError::from(e).with_context(format!("opening {}", path.display())))?;
    MetaHeader::read_from(&mut BufReader::new(file))
}

fn check_file_len(path: &Path, expected: u64) -> VispartResult<()> {
    let actual = fs::metadata(path)?.len();
    if actual != expected {
        vispart_bail!(
            ShapeMismatch: "{} has {} bytes, expected {}",
            path.display(),
            actual,
            expected
        );
    }
    Ok(())
}

/// Reader and model writer of one shard: one channel range in one polarization.
///
/// Data, weights and metadata are read through independent forward cursors that stay in step
/// with [`PartitionedMs::next_row`] whichever of them are read. The model file is memory-mapped
/// and addressed by row index.
pub struct PartitionedMs {
    meta_header: MetaHeader,
    part_header: PartHeader,
    polarization: Polarization,
    range: ChannelRange,
    row_len: usize,
    rows: usize,
    current_row: usize,
    meta: RowCursor,
    data: RowCursor,
    weights: RowCursor,
    model: Option<MappedRows<Complex32>>,
    model_weights: Option<MappedRows<f32>>,
    weight_scratch: Vec<f32>,
    model_scratch: Vec<Complex32>,
    // Dropped last: releasing the final handle deletes the files opened above.
    handle: Handle,
}

impl PartitionedMs {
    pub(crate) fn open(
        handle: Handle,
        shard_index: usize,
        polarization: Polarization,
    ) -> VispartResult<Self> {
        let data = handle.data();
        let range = *data
            .ranges
            .get(shard_index)
            .ok_or_else(|| vispart_err!(OutOfBounds: shard_index, 0, data.ranges.len()))?;
        if !data.polarizations.contains(&polarization) {
            vispart_bail!("polarization {} was not partitioned", polarization);
        }
        let names = &data.names;

        let meta_path = names.meta_path(range.band_id);
        let meta_header = read_meta_header(&meta_path)?;
        let rows = usize::try_from(meta_header.selected_record_count)?;

        let data_path = names.data_path(shard_index, polarization, range.band_id);
        let part_header = {
            let file = File::open(&data_path).map_err(|e| {
                VispartError::from(e).with_context(format!("opening {}", data_path.display()))
            })?;
            PartHeader::read_from(&mut BufReader::new(file))?
        };
        if usize::try_from(part_header.channel_count)? != range.len()
            || part_header.band_id != range.band_id
        {
            vispart_bail!(
                ShapeMismatch: "{} holds band {} with {} channels, expected band {} with {}",
                data_path.display(),
                part_header.band_id,
                part_header.channel_count,
                range.band_id,
                range.len()
            );
        }

        let row_len = data.row_len(&range, polarization);
        let rows_u64 = rows as u64;
        let data_row_bytes = row_len * Complex32::WIDTH;
        let weight_row_bytes = row_len * f32::WIDTH;
        check_file_len(
            &data_path,
            PartHeader::SIZE as u64 + rows_u64 * data_row_bytes as u64,
        )?;
        let weight_path = names.weight_path(shard_index, polarization, range.band_id);
        check_file_len(&weight_path, rows_u64 * weight_row_bytes as u64)?;
        let meta_start = meta_header.encoded_len() as u64;
        check_file_len(&meta_path, meta_start + rows_u64 * MetaRecord::SIZE as u64)?;

        let (model, model_weights) = if part_header.has_model {
            let model_path = names.model_path(shard_index, polarization, range.band_id);
            (
                Some(MappedRows::open(&model_path, row_len, rows, true)?),
                Some(MappedRows::open(&weight_path, row_len, rows, false)?),
            )
        } else {
            (None, None)
        };

        log::trace!("Opened {} for reading", data_path.display());
        Ok(Self {
            meta: RowCursor::open(&meta_path, meta_start, MetaRecord::SIZE)?,
            data: RowCursor::open(&data_path, PartHeader::SIZE as u64, data_row_bytes)?,
            weights: RowCursor::open(&weight_path, 0, weight_row_bytes)?,
            meta_header,
            part_header,
            polarization,
            range,
            row_len,
            rows,
            current_row: 0,
            model,
            model_weights,
            weight_scratch: vec![0.0; row_len],
            model_scratch: vec![Complex32::default(); row_len],
            handle,
        })
    }

    /// Move every cursor back to the first row.
    pub fn reset(&mut self) -> VispartResult<()> {
        self.meta.rewind()?;
        self.data.rewind()?;
        self.weights.rewind()?;
        self.current_row = 0;
        Ok(())
    }

    pub fn current_row_available(&self) -> bool {
        self.current_row < self.rows
    }

    /// Index of the row the cursors are on.
    pub fn current_row(&self) -> usize {
        self.current_row
    }

    pub fn next_row(&mut self) -> VispartResult<()> {
        self.meta.advance()?;
        self.data.advance()?;
        self.weights.advance()?;
        self.current_row += 1;
        Ok(())
    }

    fn check_available(&self) -> VispartResult<()> {
        if !self.current_row_available() {
            vispart_bail!(OutOfBounds: self.current_row, 0, self.rows);
        }
        Ok(())
    }

    fn check_row_buffer(&self, len: usize) -> VispartResult<()> {
        if len != self.row_len {
            vispart_bail!("row buffer holds {} values, shard rows hold {}", len, self.row_len);
        }
        Ok(())
    }

    pub fn read_meta(&mut self) -> VispartResult<MetaRecord> {
        self.check_available()?;
        MetaRecord::decode(self.meta.read()?)
    }

    /// Read the weighted data of the current row. Repeated calls return the same row.
    pub fn read_data(&mut self, out: &mut [Complex32]) -> VispartResult<()> {
        self.check_available()?;
        self.check_row_buffer(out.len())?;
        decode_slice(self.data.read()?, out);
        Ok(())
    }

    pub fn read_weights(&mut self, out: &mut [f32]) -> VispartResult<()> {
        self.check_available()?;
        self.check_row_buffer(out.len())?;
        decode_slice(self.weights.read()?, out);
        Ok(())
    }

    /// Read the model of the current row.
    pub fn read_model(&self, out: &mut [Complex32]) -> VispartResult<()> {
        self.read_model_row(self.current_row, out)
    }

    pub fn read_model_row(&self, row: usize, out: &mut [Complex32]) -> VispartResult<()> {
        self.model_rows()?.read_row(row, out)
    }

    /// Multiply `values` by the stored weights of `row` and write the finite results into the
    /// model file. Elements that are not finite keep their previous model value.
    pub fn write_model(&mut self, row: usize, values: &[Complex32]) -> VispartResult<()> {
        self.check_row_buffer(values.len())?;
        let (Some(model), Some(weights)) = (self.model.as_mut(), self.model_weights.as_ref()) else {
            vispart_bail!(InvalidState: "shard was partitioned without a model");
        };
        weights.read_row(row, &mut self.weight_scratch)?;
        for ((out, value), weight) in self
            .model_scratch
            .iter_mut()
            .zip(values)
            .zip(&self.weight_scratch)
        {
            *out = *value * *weight;
        }
        model.write_row(row, &self.model_scratch)?;
        self.handle.model_changed();
        self.handle.data().metrics.model_writes().inc();
        Ok(())
    }

    /// Flush model writes to disk.
    pub fn flush(&self) -> VispartResult<()> {
        self.model_rows()?.flush()
    }

    fn model_rows(&self) -> VispartResult<&MappedRows<Complex32>> {
        self.model
            .as_ref()
            .ok_or_else(|| vispart_err!(InvalidState: "shard was partitioned without a model"))
    }

    /// Dataset row index of every record in this shard, in record order.
    pub fn dataset_rows(&self) -> VispartResult<Vec<usize>> {
        let data = self.handle.data();
        let scan = DatasetScan::new(data.dataset.clone(), data.selection.clone(), [self.range.band_id]);
        let rows = scan
            .map(|selected| selected.map(|s| s.row))
            .collect::<VispartResult<Vec<_>>>()?;
        if rows.len() != self.rows {
            vispart_bail!(
                ShapeMismatch: "selection yields {} rows of band {}, shard holds {}",
                rows.len(),
                self.range.band_id,
                self.rows
            );
        }
        Ok(rows)
    }

    pub fn meta_header(&self) -> &MetaHeader {
        &self.meta_header
    }

    pub fn part_header(&self) -> &PartHeader {
        &self.part_header
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Values per row: channels times the values each channel holds for this polarization.
    pub fn row_stride(&self) -> usize {
        self.row_len
    }

    pub fn source_path(&self) -> &str {
        &self.meta_header.source_path
    }

    pub fn polarization(&self) -> Polarization {
        self.polarization
    }

    pub fn channel_range(&self) -> ChannelRange {
        self.range
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}
