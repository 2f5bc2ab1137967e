use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use itertools::Itertools;
use num_complex::Complex32;
use vispart_error::{VispartResult, vispart_bail, vispart_err};

use crate::Polarization;
use crate::convert::{CubeView, PolarizationConverter, StokesConverter};
use crate::dataset::{Dataset, DatasetScan, RowSelection};
use crate::format::{FileNames, MetaHeader, MetaRecord, PartHeader};
use crate::handle::{Handle, HandleData};
use crate::metrics::StoreMetrics;
use crate::source::{DatasetRecordSource, NoiseRecordSource, RecordSource};
use crate::writer::{MetaWriter, ShardWriter, write_zero_model};

/// A contiguous range of channels of one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelRange {
    pub band_id: u32,
    pub start: usize,
    pub end: usize,
}

impl ChannelRange {
    pub fn new(band_id: u32, channels: Range<usize>) -> Self {
        Self {
            band_id,
            start: channels.start,
            end: channels.end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn channels(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// The channel ranges a dataset is split into. Each range becomes one shard per polarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    ranges: Vec<ChannelRange>,
}

impl PartitionPlan {
    pub fn new(ranges: Vec<ChannelRange>) -> VispartResult<Self> {
        if ranges.is_empty() {
            vispart_bail!(Configuration: "a partition plan needs at least one channel range");
        }
        if let Some(range) = ranges.iter().find(|r| r.is_empty()) {
            vispart_bail!(
                Configuration: "channel range {}..{} of band {} is empty",
                range.start,
                range.end,
                range.band_id
            );
        }
        Ok(Self { ranges })
    }

    /// Split `channel_count` channels of every band into `parts` ranges of nearly equal size.
    pub fn split(band_ids: &[u32], channel_count: usize, parts: usize) -> VispartResult<Self> {
        if parts == 0 || parts > channel_count {
            vispart_bail!(
                Configuration: "cannot split {} channels into {} parts",
                channel_count,
                parts
            );
        }
        let ranges = band_ids
            .iter()
            .flat_map(|&band_id| {
                (0..parts).map(move |part| {
                    ChannelRange::new(
                        band_id,
                        channel_count * part / parts..channel_count * (part + 1) / parts,
                    )
                })
            })
            .collect();
        Self::new(ranges)
    }

    pub fn ranges(&self) -> &[ChannelRange] {
        &self.ranges
    }

    /// Distinct band ids, in the order they first appear in the plan.
    pub fn band_ids(&self) -> Vec<u32> {
        self.ranges.iter().map(|r| r.band_id).unique().collect()
    }
}

/// Options of a partition call.
#[derive(Clone)]
pub struct PartitionOptions {
    polarizations: BTreeSet<Polarization>,
    temporary_directory: Option<PathBuf>,
    include_model: bool,
    initial_model_required: bool,
    model_update_required: bool,
    simulated_noise: Option<f32>,
    show_progress: bool,
    converter: Arc<dyn PolarizationConverter>,
    metrics: StoreMetrics,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            polarizations: BTreeSet::from([Polarization::StokesI]),
            temporary_directory: None,
            include_model: false,
            initial_model_required: false,
            model_update_required: false,
            simulated_noise: None,
            show_progress: false,
            converter: Arc::new(StokesConverter),
            metrics: StoreMetrics::default(),
        }
    }
}

impl PartitionOptions {
    pub fn with_polarizations(mut self, polarizations: impl IntoIterator<Item = Polarization>) -> Self {
        self.polarizations = polarizations.into_iter().collect();
        self
    }

    /// Write the shard files into `directory` instead of next to the dataset.
    pub fn with_temporary_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.temporary_directory = Some(directory.into());
        self
    }

    /// Create a model file for every shard, filled with zeros.
    pub fn with_include_model(mut self, include_model: bool) -> Self {
        self.include_model = include_model;
        self
    }

    /// Fill the model files from the dataset's model column instead of zeros.
    pub fn with_initial_model_required(mut self, initial_model_required: bool) -> Self {
        self.initial_model_required = initial_model_required;
        self
    }

    /// Write the model files back into the dataset when the handle is released.
    pub fn with_model_update_required(mut self, model_update_required: bool) -> Self {
        self.model_update_required = model_update_required;
        self
    }

    /// Replace the data by Gaussian noise with the given standard deviation.
    pub fn with_simulated_noise(mut self, stddev: f32) -> Self {
        self.simulated_noise = Some(stddev);
        self
    }

    /// Draw a progress bar on stderr while writing and committing.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn PolarizationConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_metrics(mut self, metrics: StoreMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn polarizations(&self) -> &BTreeSet<Polarization> {
        &self.polarizations
    }

    pub fn temporary_directory(&self) -> Option<&Path> {
        self.temporary_directory.as_deref()
    }

    pub fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }
}

/// Writes the shard and metadata files of a dataset.
pub struct Partitioner {
    options: PartitionOptions,
}

struct Shard {
    range: ChannelRange,
    polarization: Polarization,
    writer: ShardWriter,
}

impl Partitioner {
    pub fn new(options: PartitionOptions) -> Self {
        Self { options }
    }

    /// Partition the rows of `dataset` picked by `selection` according to `plan`.
    ///
    /// The returned handle owns every file written. If writing fails, the files created so far are
    /// removed again when the internal handle is dropped.
    pub fn partition(
        self,
        dataset: Arc<dyn Dataset>,
        selection: Arc<dyn RowSelection>,
        plan: &PartitionPlan,
    ) -> VispartResult<Handle> {
        let scan = DatasetScan::new(dataset.clone(), selection.clone(), plan.band_ids());
        let source = DatasetRecordSource::new(scan, self.options.initial_model_required)?;
        self.partition_source(source, dataset, selection, plan)
    }

    /// Partition the records pulled from `source`.
    ///
    /// `source` must yield the rows of `dataset` picked by `selection`, in scan order, since the
    /// commit rescans the dataset with that selection to find the rows to write back to.
    pub fn partition_source<S: RecordSource>(
        self,
        source: S,
        dataset: Arc<dyn Dataset>,
        selection: Arc<dyn RowSelection>,
        plan: &PartitionPlan,
    ) -> VispartResult<Handle> {
        let options = self.options;
        let duration = options.metrics.partition_duration();
        let _timer = duration.time();
        let native = source.polarizations().to_vec();

        if native != dataset.polarizations() {
            vispart_bail!(
                Configuration: "{} yields correlations {} but {} stores {}",
                source.source_path().display(),
                native.iter().join(","),
                dataset.path().display(),
                dataset.polarizations().iter().join(",")
            );
        }
        if options.polarizations.is_empty() {
            vispart_bail!(Configuration: "no polarizations requested");
        }
        for polarization in &options.polarizations {
            options.converter.validate(&native, *polarization)?;
        }
        if let Some(range) = plan.ranges().iter().find(|r| r.end > source.channel_count()) {
            vispart_bail!(
                Configuration: "channel range {}..{} exceeds the {} channels of {}",
                range.start,
                range.end,
                source.channel_count(),
                source.source_path().display()
            );
        }

        log::debug!(
            "Partitioning in {} channel ranges: {}",
            plan.ranges().len(),
            plan.ranges()
                .iter()
                .map(|r| format!("{}:{}-{}", r.band_id, r.start, r.end))
                .join(" ")
        );
        log::info!(
            "Reordering {} into {} x {} parts",
            dataset.path().display(),
            plan.ranges().len(),
            options.polarizations.len()
        );

        let band_ids = plan.band_ids();
        let has_model = options.include_model || options.initial_model_required;
        let names = FileNames::new(dataset.path(), options.temporary_directory())?;
        let polarizations: Vec<Polarization> = options.polarizations.iter().copied().collect();

        // Created before any file so that a failed pass still cleans up after itself.
        let handle = Handle::new(HandleData {
            dataset: dataset.clone(),
            selection,
            names: names.clone(),
            ranges: plan.ranges().to_vec(),
            band_ids: band_ids.clone(),
            polarizations: polarizations.clone(),
            native: native.clone(),
            has_model,
            initial_model_required: options.initial_model_required,
            model_update_required: options.model_update_required,
            show_progress: options.show_progress,
            converter: options.converter.clone(),
            metrics: options.metrics.clone(),
        });

        let mut shards = Vec::with_capacity(plan.ranges().len() * polarizations.len());
        for (part, range) in plan.ranges().iter().enumerate() {
            let header = PartHeader {
                channel_start: u32::try_from(range.start)?,
                channel_count: u32::try_from(range.len())?,
                band_id: range.band_id,
                has_model,
                has_weights: true,
            };
            for &polarization in &polarizations {
                let model_path = options
                    .initial_model_required
                    .then(|| names.model_path(part, polarization, range.band_id));
                let writer = ShardWriter::create(
                    &names.data_path(part, polarization, range.band_id),
                    &names.weight_path(part, polarization, range.band_id),
                    model_path.as_deref(),
                    &header,
                    range.len() * polarization.values_per_channel(&native),
                )?;
                shards.push(Shard {
                    range: *range,
                    polarization,
                    writer,
                });
            }
        }

        let source_path = source.source_path().to_string_lossy().into_owned();
        let mut meta_writers = band_ids
            .iter()
            .map(|&band_id| {
                MetaWriter::create(
                    names.meta_path(band_id),
                    &MetaHeader::new(source_path.clone(), source.start_time()),
                )
            })
            .collect::<VispartResult<Vec<_>>>()?;

        let progress = progress_bar(options.show_progress, 0);
        let mut pass = WritePass {
            native: &native,
            band_ids: &band_ids,
            converter: options.converter.as_ref(),
            initial_model_required: options.initial_model_required,
            shards: &mut shards,
            meta_writers: &mut meta_writers,
            progress: &progress,
        };
        let total_rows = match options.simulated_noise {
            Some(stddev) => pass.run(NoiseRecordSource::new(source, stddev, 0)?)?,
            None => pass.run(source)?,
        };
        progress.finish();
        log::debug!("Total selected rows: {}", total_rows);

        let row_counts = meta_writers
            .into_iter()
            .map(MetaWriter::finish)
            .collect::<VispartResult<Vec<_>>>()?;

        let mut bytes = 0;
        for (index, shard) in shards.into_iter().enumerate() {
            let row_len = shard.range.len() * shard.polarization.values_per_channel(&native);
            let rows = shard.writer.rows();
            bytes += shard.writer.finish()?;
            if options.include_model && !options.initial_model_required {
                let part = index / polarizations.len();
                bytes += write_zero_model(
                    &names.model_path(part, shard.polarization, shard.range.band_id),
                    rows,
                    row_len,
                )?;
            }
        }
        log::trace!(
            "Rows per band: {}",
            band_ids
                .iter()
                .zip(&row_counts)
                .map(|(band, rows)| format!("{}:{}", band, rows))
                .join(" ")
        );

        options.metrics.partition_rows().add(i64::try_from(total_rows)?);
        options.metrics.partition_bytes().add(i64::try_from(bytes)?);
        handle.set_commit_pending(handle.commit_owed());
        Ok(handle)
    }
}

/// A bar of `len` steps, or a hidden one that only keeps count.
pub(crate) fn progress_bar(visible: bool, len: u64) -> ProgressBar {
    if visible {
        ProgressBar::new(len)
    } else {
        ProgressBar::hidden()
    }
}

/// State of the sequential pass over the record source.
struct WritePass<'a> {
    native: &'a [Polarization],
    band_ids: &'a [u32],
    converter: &'a dyn PolarizationConverter,
    initial_model_required: bool,
    shards: &'a mut [Shard],
    meta_writers: &'a mut [MetaWriter],
    progress: &'a ProgressBar,
}

impl WritePass<'_> {
    fn run<S: RecordSource>(&mut self, mut source: S) -> VispartResult<u64> {
        let mut data = Vec::new();
        let mut weights = Vec::new();
        let mut model = Vec::new();
        let mut model_weights = Vec::new();
        let mut rows = 0u64;

        self.progress.set_length(u64::try_from(source.total_progress())?);
        while !source.at_end() {
            let record = source.read_next()?;
            self.progress.set_position(u64::try_from(source.current_progress())?);
            let band_id = record.meta.band_id;
            let spw_index = self
                .band_ids
                .iter()
                .position(|b| *b == band_id)
                .ok_or_else(|| vispart_err!(InvalidState: "record of unplanned band {}", band_id))?;
            self.meta_writers[spw_index].append(&MetaRecord {
                u: record.meta.uvw[0],
                v: record.meta.uvw[1],
                w: record.meta.uvw[2],
                band_id,
                antenna1: record.meta.antenna1,
                antenna2: record.meta.antenna2,
            })?;

            let initial_model = match (&record.model, self.initial_model_required) {
                (Some(model), true) => Some(model.as_slice()),
                (None, true) => vispart_bail!(InvalidState: "record {} has no model data", record.row),
                _ => None,
            };

            for shard in self.shards.iter_mut().filter(|s| s.range.band_id == band_id) {
                let len = shard.range.len() * shard.polarization.values_per_channel(self.native);
                data.resize(len, Complex32::default());
                weights.resize(len, 0.0);
                self.converter.weighted_data(
                    self.native,
                    shard.polarization,
                    shard.range.channels(),
                    CubeView {
                        data: &record.data,
                        weights: &record.weights,
                        flags: &record.flags,
                    },
                    &mut data,
                    &mut weights,
                )?;

                let model_row = match initial_model {
                    Some(initial) => {
                        model.resize(len, Complex32::default());
                        model_weights.resize(len, 0.0);
                        self.converter.weighted_data(
                            self.native,
                            shard.polarization,
                            shard.range.channels(),
                            CubeView {
                                data: initial,
                                weights: &record.weights,
                                flags: &record.flags,
                            },
                            &mut model,
                            &mut model_weights,
                        )?;
                        Some(model.as_slice())
                    }
                    None => None,
                };
                shard.writer.append(&data, &weights, model_row)?;
            }
            rows += 1;
        }
        Ok(rows)
    }
}
