//! Fixed-width little-endian encoding of the sample types held in shard bodies.

use num_complex::Complex32;

/// A fixed-size value that can be stored in a shard body.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Decode a value from exactly [`Sample::WIDTH`] bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Encode this value into exactly [`Sample::WIDTH`] bytes.
    fn encode(&self, out: &mut [u8]);

    /// Whether every component of this value is finite.
    fn is_finite(&self) -> bool;
}

impl Sample for f32 {
    const WIDTH: usize = 4;

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    #[inline]
    fn encode(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn is_finite(&self) -> bool {
        f32::is_finite(*self)
    }
}

impl Sample for Complex32 {
    const WIDTH: usize = 8;

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        Complex32::new(f32::decode(&bytes[..4]), f32::decode(&bytes[4..8]))
    }

    #[inline]
    fn encode(&self, out: &mut [u8]) {
        self.re.encode(&mut out[..4]);
        self.im.encode(&mut out[4..8]);
    }

    #[inline]
    fn is_finite(&self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

/// Encode a run of samples into a contiguous byte buffer, replacing its contents.
pub fn encode_slice<T: Sample>(values: &[T], out: &mut Vec<u8>) {
    out.clear();
    out.resize(values.len() * T::WIDTH, 0);
    for (value, chunk) in values.iter().zip(out.chunks_exact_mut(T::WIDTH)) {
        value.encode(chunk);
    }
}

/// Decode `out.len()` samples from the front of `bytes`.
pub fn decode_slice<T: Sample>(bytes: &[u8], out: &mut [T]) {
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(T::WIDTH)) {
        *value = T::decode(chunk);
    }
}
