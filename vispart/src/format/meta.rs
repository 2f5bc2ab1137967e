use std::io::{Read, Write};

use vispart_error::{VispartResult, vispart_bail, vispart_err};

/// Header of a per-band metadata file.
///
/// The header is written with a zero record count before the partitioning pass and patched in
/// place once the pass has seen every record of the band.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaHeader {
    pub selected_record_count: u64,
    pub source_path: String,
    pub start_time: f64,
}

impl MetaHeader {
    /// Size of the fixed-width fields, excluding the path bytes.
    pub const FIXED_SIZE: usize = 8 + 4 + 8;

    pub fn new(source_path: impl Into<String>, start_time: f64) -> Self {
        Self {
            selected_record_count: 0,
            source_path: source_path.into(),
            start_time,
        }
    }

    /// Total encoded size; the metadata records start at this offset.
    pub fn encoded_len(&self) -> usize {
        Self::FIXED_SIZE + self.source_path.len()
    }

    pub fn write_to<W: Write>(&self, write: &mut W) -> VispartResult<()> {
        let path_len = u32::try_from(self.source_path.len())
            .map_err(|_| vispart_err!("source path of {} bytes is too long", self.source_path.len()))?;
        write.write_all(&self.selected_record_count.to_le_bytes())?;
        write.write_all(&path_len.to_le_bytes())?;
        write.write_all(self.source_path.as_bytes())?;
        write.write_all(&self.start_time.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(read: &mut R) -> VispartResult<Self> {
        let mut count = [0u8; 8];
        read.read_exact(&mut count)?;
        let mut path_len = [0u8; 4];
        read.read_exact(&mut path_len)?;
        let path_len = usize::try_from(u32::from_le_bytes(path_len))?;

        let mut path = vec![0u8; path_len];
        read.read_exact(&mut path)?;
        let source_path = String::from_utf8(path)
            .map_err(|e| vispart_err!(InvalidSerde: "metadata source path is not utf-8: {}", e))?;

        let mut start_time = [0u8; 8];
        read.read_exact(&mut start_time)?;

        Ok(Self {
            selected_record_count: u64::from_le_bytes(count),
            source_path,
            start_time: f64::from_le_bytes(start_time),
        })
    }
}

/// Positional metadata of one selected record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetaRecord {
    pub u: f64,
    pub v: f64,
    pub w: f64,
    pub band_id: u32,
    pub antenna1: u32,
    pub antenna2: u32,
}

impl MetaRecord {
    pub const SIZE: usize = 3 * 8 + 3 * 4;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.u.to_le_bytes());
        out[8..16].copy_from_slice(&self.v.to_le_bytes());
        out[16..24].copy_from_slice(&self.w.to_le_bytes());
        out[24..28].copy_from_slice(&self.band_id.to_le_bytes());
        out[28..32].copy_from_slice(&self.antenna1.to_le_bytes());
        out[32..36].copy_from_slice(&self.antenna2.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> VispartResult<Self> {
        if bytes.len() < Self::SIZE {
            vispart_bail!(
                InvalidSerde: "metadata record needs {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            );
        }
        let f64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[at..at + 8]);
            f64::from_le_bytes(b)
        };
        let u32_at = |at: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[at..at + 4]);
            u32::from_le_bytes(b)
        };
        Ok(Self {
            u: f64_at(0),
            v: f64_at(8),
            w: f64_at(16),
            band_id: u32_at(24),
            antenna1: u32_at(28),
            antenna2: u32_at(32),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn header_layout_has_no_padding() {
        let header = MetaHeader {
            selected_record_count: 3,
            source_path: "obs.ms".to_string(),
            start_time: 4.5e9,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), header.encoded_len());
        assert_eq!(bytes.len(), 8 + 4 + 6 + 8);
        assert_eq!(&bytes[0..8], &3u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &6u32.to_le_bytes());
        assert_eq!(&bytes[12..18], b"obs.ms");

        let decoded = MetaHeader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn truncated_header_is_an_io_error() {
        let err = MetaHeader::read_from(&mut Cursor::new(vec![0u8; 10])).unwrap_err();
        assert!(err.is_io_kind(std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn record_is_fixed_width() {
        let record = MetaRecord {
            u: 1.0,
            v: -2.0,
            w: 0.5,
            band_id: 7,
            antenna1: 3,
            antenna2: 12,
        };
        let bytes = record.encode();
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[24..28], &7u32.to_le_bytes());
        assert_eq!(MetaRecord::decode(&bytes).unwrap(), record);
        assert!(MetaRecord::decode(&bytes[..20]).is_err());
    }
}
