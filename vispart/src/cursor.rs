use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use vispart_error::{VispartError, VispartResult};

/// Whether the record under a cursor has been read yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Positioned at the start of the current record.
    Fresh,
    /// Positioned just past the current record, whose bytes are buffered.
    Consumed,
}

/// A forward-only cursor over fixed-size records in one file.
///
/// The file position always equals the start of the current record plus zero record widths
/// when [`CursorState::Fresh`] or one record width when [`CursorState::Consumed`]. Reading the
/// same record twice returns the buffered bytes; advancing skips the record if it was not read.
pub struct RowCursor {
    file: BufReader<File>,
    body_start: u64,
    record_len: usize,
    row: u64,
    state: CursorState,
    buffer: Vec<u8>,
}

impl RowCursor {
    /// Open `path` with records starting at byte `body_start`.
    pub fn open(path: &Path, body_start: u64, record_len: usize) -> VispartResult<Self> {
        let file = File::open(path)
            .map_err(|e| VispartError::from(e).with_context(format!("opening {}", path.display())))?;
        let mut cursor = Self {
            file: BufReader::new(file),
            body_start,
            record_len,
            row: 0,
            state: CursorState::Fresh,
            buffer: vec![0; record_len],
        };
        cursor.rewind()?;
        Ok(cursor)
    }

    pub fn rewind(&mut self) -> VispartResult<()> {
        self.file.seek(SeekFrom::Start(self.body_start))?;
        self.row = 0;
        self.state = CursorState::Fresh;
        Ok(())
    }

    /// Bytes of the current record.
    pub fn read(&mut self) -> VispartResult<&[u8]> {
        if self.state == CursorState::Fresh {
            self.file.read_exact(&mut self.buffer)?;
            self.state = CursorState::Consumed;
        }
        Ok(&self.buffer)
    }

    /// Move to the next record.
    pub fn advance(&mut self) -> VispartResult<()> {
        if self.state == CursorState::Fresh {
            self.file.seek_relative(i64::try_from(self.record_len)?)?;
        }
        self.row += 1;
        self.state = CursorState::Fresh;
        Ok(())
    }

    pub fn row(&self) -> u64 {
        self.row
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// The file offset the cursor should be at.
    pub fn position(&self) -> u64 {
        let consumed = match self.state {
            CursorState::Fresh => 0,
            CursorState::Consumed => self.record_len as u64,
        };
        self.body_start + self.row * self.record_len as u64 + consumed
    }

    #[cfg(test)]
    fn file_position(&mut self) -> u64 {
        self.file.stream_position().unwrap_or(u64::MAX)
    }
}
