use std::ffi::OsString;
use std::path::{Path, PathBuf};

use vispart_error::{VispartResult, vispart_err};

use crate::Polarization;

/// Derives the names of every file a partition operation creates.
///
/// All names share a prefix: the dataset path itself, or the dataset's file name inside the
/// temporary directory when one is configured.
#[derive(Debug, Clone)]
pub struct FileNames {
    prefix: PathBuf,
}

impl FileNames {
    pub fn new(dataset_path: &Path, temporary_directory: Option<&Path>) -> VispartResult<Self> {
        // Collecting the components drops any trailing separator.
        let dataset_path: PathBuf = dataset_path.components().collect();
        let prefix = match temporary_directory {
            None => dataset_path,
            Some(dir) => {
                let name = dataset_path.file_name().ok_or_else(|| {
                    vispart_err!("dataset path {} has no file name", dataset_path.display())
                })?;
                dir.join(name)
            }
        };
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.prefix.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn part_suffix(part_index: usize, polarization: Polarization, band_id: u32) -> String {
        format!(
            "-part{:04}-{}-b{}",
            part_index,
            polarization.short_code(),
            band_id
        )
    }

    pub fn data_path(&self, part_index: usize, polarization: Polarization, band_id: u32) -> PathBuf {
        self.with_suffix(&format!(
            "{}.data",
            Self::part_suffix(part_index, polarization, band_id)
        ))
    }

    pub fn weight_path(&self, part_index: usize, polarization: Polarization, band_id: u32) -> PathBuf {
        self.with_suffix(&format!(
            "{}.weight.data",
            Self::part_suffix(part_index, polarization, band_id)
        ))
    }

    pub fn model_path(&self, part_index: usize, polarization: Polarization, band_id: u32) -> PathBuf {
        self.with_suffix(&format!(
            "{}.model.data",
            Self::part_suffix(part_index, polarization, band_id)
        ))
    }

    pub fn meta_path(&self, band_id: u32) -> PathBuf {
        self.with_suffix(&format!("-spw{}-meta.data", band_id))
    }
}
