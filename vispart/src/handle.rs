use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use vispart_error::{VispartResult, vispart_bail};

use crate::Polarization;
use crate::convert::PolarizationConverter;
use crate::dataset::{Dataset, RowSelection};
use crate::format::FileNames;
use crate::metrics::StoreMetrics;
use crate::partition::ChannelRange;
use crate::reader::PartitionedMs;
use crate::unpartition::Unpartitioner;

/// Everything a partition call decided, shared by all holders of its handle.
pub(crate) struct HandleData {
    pub dataset: Arc<dyn Dataset>,
    pub selection: Arc<dyn RowSelection>,
    pub names: FileNames,
    pub ranges: Vec<ChannelRange>,
    pub band_ids: Vec<u32>,
    pub polarizations: Vec<Polarization>,
    pub native: Vec<Polarization>,
    pub has_model: bool,
    pub initial_model_required: bool,
    pub model_update_required: bool,
    pub show_progress: bool,
    pub converter: Arc<dyn PolarizationConverter>,
    pub metrics: StoreMetrics,
}

impl HandleData {
    /// Index into `band_ids` of a band, which is also the order of the metadata files.
    pub fn spw_index(&self, band_id: u32) -> Option<usize> {
        self.band_ids.iter().position(|b| *b == band_id)
    }

    /// Values per shard row for `range` and `polarization`.
    pub fn row_len(&self, range: &ChannelRange, polarization: Polarization) -> usize {
        range.len() * polarization.values_per_channel(&self.native)
    }

    fn cleanup(&self) {
        log::info!("Cleaning up temporary files");
        for (part, range) in self.ranges.iter().enumerate() {
            for &polarization in &self.polarizations {
                remove_file(&self.names.data_path(part, polarization, range.band_id));
                remove_file(&self.names.weight_path(part, polarization, range.band_id));
                if self.has_model {
                    remove_file(&self.names.model_path(part, polarization, range.band_id));
                }
            }
        }
        for &band_id in &self.band_ids {
            remove_file(&self.names.meta_path(band_id));
        }
        self.metrics.cleanup_passes().inc();
    }
}

fn remove_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::trace!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("{} was never created", path.display())
        }
        Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
    }
}

struct HandleInner {
    data: HandleData,
    /// Set while model data written through the shards has not been committed yet.
    commit_pending: AtomicBool,
    finished: AtomicBool,
}

impl HandleInner {
    /// Commit if owed, then delete every file. Runs at most once.
    fn finish(&self) -> VispartResult<()> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = if self.commit_pending.swap(false, Ordering::AcqRel) {
            Unpartitioner::commit(&self.data)
        } else {
            Ok(())
        };
        self.data.cleanup();
        result
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!(
                "Writing model data back to {} failed: {}",
                self.data.dataset.path().display(),
                e
            );
        }
    }
}

/// Shared ownership of the files of one partition call.
///
/// Clones share the same files. When the last clone is released the model files are committed to
/// the dataset (if that is owed) and every shard and metadata file is deleted. [`Handle::close`]
/// performs that transition explicitly and reports a failed commit; dropping the last clone does
/// the same but can only log the failure.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

impl Handle {
    pub(crate) fn new(data: HandleData) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                data,
                commit_pending: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn data(&self) -> &HandleData {
        &self.inner.data
    }

    pub(crate) fn set_commit_pending(&self, pending: bool) {
        self.inner.commit_pending.store(pending, Ordering::Release);
    }

    /// Mark model data as changed, so that it is committed on release when a commit is owed.
    pub(crate) fn model_changed(&self) {
        if self.commit_owed() {
            self.set_commit_pending(true);
        }
    }

    /// Open the reader of shard `shard_index` (an index into [`Handle::channel_ranges`]) for
    /// `polarization`.
    pub fn open(&self, shard_index: usize, polarization: Polarization) -> VispartResult<PartitionedMs> {
        PartitionedMs::open(self.clone(), shard_index, polarization)
    }

    /// Write the model files back into the dataset now.
    pub fn commit(&self) -> VispartResult<()> {
        if !self.inner.data.has_model {
            vispart_bail!(InvalidState: "partition of {} has no model files", self.source_path().display());
        }
        Unpartitioner::commit(&self.inner.data)?;
        self.set_commit_pending(false);
        Ok(())
    }

    /// Release this holder. If it is the last one, commit if owed and delete every file, returning
    /// the commit error if there was one.
    pub fn close(self) -> VispartResult<()> {
        match Arc::into_inner(self.inner) {
            Some(inner) => inner.finish(),
            None => Ok(()),
        }
    }

    /// Whether releasing the last holder writes the model back into the dataset.
    pub fn commit_owed(&self) -> bool {
        let data = &self.inner.data;
        data.has_model && data.model_update_required && !data.initial_model_required
    }

    /// Whether model changes are waiting to be committed.
    pub fn commit_pending(&self) -> bool {
        self.inner.commit_pending.load(Ordering::Acquire)
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn shard_count(&self) -> usize {
        self.inner.data.ranges.len()
    }

    pub fn channel_ranges(&self) -> &[ChannelRange] {
        &self.inner.data.ranges
    }

    pub fn polarizations(&self) -> &[Polarization] {
        &self.inner.data.polarizations
    }

    pub fn has_model(&self) -> bool {
        self.inner.data.has_model
    }

    pub fn source_path(&self) -> &Path {
        self.inner.data.dataset.path()
    }

    pub fn file_names(&self) -> &FileNames {
        &self.inner.data.names
    }
}
