use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::ops::Range;
use std::path::Path;

use memmap2::{Mmap, MmapMut, MmapOptions};
use vispart_error::{VispartError, VispartResult, vispart_bail, vispart_err};

use crate::sample::{Sample, decode_slice};

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(map) => &map[..],
            Mapping::ReadWrite(map) => &map[..],
        }
    }
}

/// A memory-mapped file of fixed-size rows of `T`.
///
/// The file length is checked against `rows * row_len` before mapping. An empty file is never
/// mapped. The mapping is released before the file is closed.
pub struct MappedRows<T> {
    // Declared before `file` so that it is dropped first.
    map: Option<Mapping>,
    file: File,
    row_len: usize,
    rows: usize,
    phantom: PhantomData<T>,
}

impl<T: Sample> MappedRows<T> {
    pub fn open(path: &Path, row_len: usize, rows: usize, writable: bool) -> VispartResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(|e| VispartError::from(e).with_context(format!("opening {}", path.display())))?;

        let expected = rows
            .checked_mul(row_len)
            .and_then(|n| n.checked_mul(T::WIDTH))
            .ok_or_else(|| vispart_err!(ShapeMismatch: "{} rows of {} values overflow", rows, row_len))?;
        let actual = file.metadata()?.len();
        if actual != expected as u64 {
            vispart_bail!(
                ShapeMismatch: "{} has {} bytes, expected {} rows of {} values ({} bytes)",
                path.display(),
                actual,
                rows,
                row_len,
                expected
            );
        }

        let map = if expected == 0 {
            None
        } else if writable {
            // SAFETY: shard files are owned by the partition handle and are never truncated while
            // a reader holds them. Concurrent writers only touch disjoint rows or skip non-finite
            // values, and the bytes are always accessed as plain values.
            Some(Mapping::ReadWrite(unsafe { MmapOptions::new().map_mut(&file)? }))
        } else {
            // SAFETY: as above; this mapping is never written.
            Some(Mapping::ReadOnly(unsafe { MmapOptions::new().map(&file)? }))
        };

        Ok(Self {
            map,
            file,
            row_len,
            rows,
            phantom: PhantomData,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn row_len(&self) -> usize {
        self.row_len
    }

    fn row_range(&self, row: usize) -> VispartResult<Range<usize>> {
        if row >= self.rows {
            vispart_bail!(OutOfBounds: row, 0, self.rows);
        }
        let stride = self.row_len * T::WIDTH;
        Ok(row * stride..(row + 1) * stride)
    }

    fn check_buffer(&self, len: usize) -> VispartResult<()> {
        if len != self.row_len {
            vispart_bail!("row buffer holds {} values, rows hold {}", len, self.row_len);
        }
        Ok(())
    }

    /// Copy row `row` into `out`.
    pub fn read_row(&self, row: usize, out: &mut [T]) -> VispartResult<()> {
        self.check_buffer(out.len())?;
        let range = self.row_range(row)?;
        if let Some(map) = &self.map {
            decode_slice(&map.bytes()[range], out);
        }
        Ok(())
    }

    /// Write the finite values of `values` into row `row`, leaving the others untouched.
    ///
    /// Returns the number of values written.
    pub fn write_row(&mut self, row: usize, values: &[T]) -> VispartResult<usize> {
        self.check_buffer(values.len())?;
        let range = self.row_range(row)?;
        let map = match &mut self.map {
            Some(Mapping::ReadWrite(map)) => map,
            Some(Mapping::ReadOnly(_)) => vispart_bail!(InvalidState: "mapping is read-only"),
            None => return Ok(0),
        };
        let mut written = 0;
        for (value, chunk) in values
            .iter()
            .zip(map[range].chunks_exact_mut(T::WIDTH))
        {
            if value.is_finite() {
                value.encode(chunk);
                written += 1;
            }
        }
        Ok(written)
    }

    /// Flush outstanding writes to the file.
    pub fn flush(&self) -> VispartResult<()> {
        if let Some(Mapping::ReadWrite(map)) = &self.map {
            map.flush()?;
        }
        self.file.sync_data()?;
        Ok(())
    }
}
