use std::io::{Read, Write};

use vispart_error::{VispartResult, vispart_bail};

/// Header at the start of every shard data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartHeader {
    pub channel_start: u32,
    pub channel_count: u32,
    pub band_id: u32,
    pub has_model: bool,
    pub has_weights: bool,
}

impl PartHeader {
    pub const SIZE: usize = 3 * 4 + 2;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.channel_start.to_le_bytes());
        out[4..8].copy_from_slice(&self.channel_count.to_le_bytes());
        out[8..12].copy_from_slice(&self.band_id.to_le_bytes());
        out[12] = u8::from(self.has_model);
        out[13] = u8::from(self.has_weights);
        out
    }

    pub fn write_to<W: Write>(&self, write: &mut W) -> VispartResult<()> {
        write.write_all(&self.encode())?;
        Ok(())
    }

    pub fn read_from<R: Read>(read: &mut R) -> VispartResult<Self> {
        let mut bytes = [0u8; Self::SIZE];
        read.read_exact(&mut bytes)?;
        Self::decode(&bytes)
    }

    pub fn decode(bytes: &[u8; Self::SIZE]) -> VispartResult<Self> {
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Ok(Self {
            channel_start: u32_at(0),
            channel_count: u32_at(4),
            band_id: u32_at(8),
            has_model: decode_bool(bytes[12], "hasModel")?,
            has_weights: decode_bool(bytes[13], "hasWeights")?,
        })
    }
}

fn decode_bool(byte: u8, field: &str) -> VispartResult<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => vispart_bail!(InvalidSerde: "part header field {} has invalid value {}", field, other),
    }
}
