use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use num_complex::Complex32;
use vispart_error::{VispartError, VispartResult, vispart_bail};

use crate::format::{MetaHeader, MetaRecord, PartHeader};
use crate::sample::{Sample, encode_slice};

pub(crate) fn create_file(path: &Path) -> VispartResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| VispartError::from(e).with_context(format!("creating {}", path.display())))
}

/// Appends row blocks to the data, weight and (optionally) model files of one shard.
pub struct ShardWriter {
    data: BufWriter<File>,
    weights: BufWriter<File>,
    model: Option<BufWriter<File>>,
    row_len: usize,
    rows: u64,
    bytes: u64,
    scratch: Vec<u8>,
}

impl ShardWriter {
    /// Create the files and write the part header. `row_len` is the number of values per row.
    pub fn create(
        data_path: &Path,
        weight_path: &Path,
        model_path: Option<&Path>,
        header: &PartHeader,
        row_len: usize,
    ) -> VispartResult<Self> {
        let mut data = create_file(data_path)?;
        header.write_to(&mut data)?;
        let weights = create_file(weight_path)?;
        let model = model_path.map(create_file).transpose()?;
        log::trace!("Opened shard {}", data_path.display());
        Ok(Self {
            data,
            weights,
            model,
            row_len,
            rows: 0,
            bytes: PartHeader::SIZE as u64,
            scratch: Vec::new(),
        })
    }

    /// Append one row. `model` must be given exactly when the shard was created with a model file.
    pub fn append(
        &mut self,
        data: &[Complex32],
        weights: &[f32],
        model: Option<&[Complex32]>,
    ) -> VispartResult<()> {
        if data.len() != self.row_len || weights.len() != self.row_len {
            vispart_bail!(
                ShapeMismatch: "shard rows hold {} values, got {} data and {} weights",
                self.row_len,
                data.len(),
                weights.len()
            );
        }
        match (&self.model, model) {
            (Some(_), Some(values)) if values.len() != self.row_len => vispart_bail!(
                ShapeMismatch: "shard rows hold {} values, got {} model values",
                self.row_len,
                values.len()
            ),
            (Some(_), None) => vispart_bail!(InvalidState: "shard expects model values"),
            (None, Some(_)) => vispart_bail!(InvalidState: "shard has no model file"),
            _ => {}
        }

        encode_slice(data, &mut self.scratch);
        self.data.write_all(&self.scratch)?;
        self.bytes += self.scratch.len() as u64;

        encode_slice(weights, &mut self.scratch);
        self.weights.write_all(&self.scratch)?;
        self.bytes += self.scratch.len() as u64;

        if let (Some(file), Some(values)) = (&mut self.model, model) {
            encode_slice(values, &mut self.scratch);
            file.write_all(&self.scratch)?;
            self.bytes += self.scratch.len() as u64;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush every file, returning the number of bytes written.
    pub fn finish(mut self) -> VispartResult<u64> {
        self.data.flush()?;
        self.weights.flush()?;
        if let Some(model) = self.model.as_mut() {
            model.flush()?;
        }
        Ok(self.bytes)
    }
}

/// Create a model file holding `rows` rows of `row_len` zeros, written one row at a time.
pub fn write_zero_model(path: &Path, rows: u64, row_len: usize) -> VispartResult<u64> {
    let mut file = create_file(path)?;
    let block = vec![0u8; row_len * Complex32::WIDTH];
    for _ in 0..rows {
        file.write_all(&block)?;
    }
    file.flush()?;
    Ok(rows * block.len() as u64)
}

/// Writes the metadata file of one band.
///
/// The header goes out first with a zero record count, which [`MetaWriter::finish`] patches.
pub struct MetaWriter {
    path: PathBuf,
    file: BufWriter<File>,
    count: u64,
}

impl MetaWriter {
    pub fn create(path: PathBuf, header: &MetaHeader) -> VispartResult<Self> {
        let mut file = create_file(&path)?;
        header.write_to(&mut file)?;
        Ok(Self {
            path,
            file,
            count: 0,
        })
    }

    pub fn append(&mut self, record: &MetaRecord) -> VispartResult<()> {
        self.file.write_all(&record.encode())?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Patch the record count into the header and flush. Returns the count.
    pub fn finish(mut self) -> VispartResult<u64> {
        // The count is the first header field; the rest of the header keeps its size.
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.count.to_le_bytes())?;
        self.file.flush().map_err(|e| {
            VispartError::from(e).with_context(format!("writing {}", self.path.display()))
        })?;
        Ok(self.count)
    }
}
