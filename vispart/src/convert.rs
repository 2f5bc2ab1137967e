//! Conversion between a dataset's native correlations and the polarizations stored in shards.
//!
//! Shard values are always weighted: the partitioner stores `w * v` together with `w`, and the
//! model written back by the imaging passes is divided by the stored weight before it is turned
//! back into native correlations.

use std::ops::Range;

use num_complex::Complex32;
use vispart_error::{VispartResult, vispart_bail, vispart_err};

use crate::Polarization;

/// Data, weights and flags of one record, flattened channel-major.
#[derive(Debug, Clone, Copy)]
pub struct CubeView<'a> {
    pub data: &'a [Complex32],
    pub weights: &'a [f32],
    pub flags: &'a [bool],
}

/// Turns native correlations into shard values and back.
pub trait PolarizationConverter: Send + Sync {
    /// Check that `requested` can be formed from the `native` correlations.
    fn validate(&self, native: &[Polarization], requested: Polarization) -> VispartResult<()>;

    /// Compute the weighted values and the weights of `requested` over a channel range.
    ///
    /// Both outputs hold `channels.len() * requested.values_per_channel(native)` values.
    fn weighted_data(
        &self,
        native: &[Polarization],
        requested: Polarization,
        channels: Range<usize>,
        cube: CubeView<'_>,
        data_out: &mut [Complex32],
        weights_out: &mut [f32],
    ) -> VispartResult<()>;

    /// Fold unweighted shard values of `requested` back into a native model cube.
    ///
    /// Non-finite values leave the corresponding native correlations untouched.
    fn reverse_copy(
        &self,
        native: &[Polarization],
        requested: Polarization,
        channels: Range<usize>,
        values: &[Complex32],
        model: &mut [Complex32],
    ) -> VispartResult<()>;
}

/// How a shard polarization is formed from native correlation indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combination {
    Native(usize),
    Bundle(usize),
    /// `a + b`
    Sum(usize, usize),
    /// `a - b`
    Difference(usize, usize),
    /// `-i (a - b)`
    RotatedDifference(usize, usize),
}

/// The standard conversion between linear or circular feeds and Stokes parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StokesConverter;

impl StokesConverter {
    fn combination(native: &[Polarization], requested: Polarization) -> VispartResult<Combination> {
        use Polarization::*;

        if requested == Instrumental {
            return Ok(Combination::Bundle(native.len()));
        }
        if requested.is_native() {
            return requested
                .index_in(native)
                .map(Combination::Native)
                .ok_or_else(|| {
                    vispart_err!(
                        Configuration: "polarization {} is not stored in the dataset",
                        requested
                    )
                });
        }

        let pair = |a: Polarization, b: Polarization| a.index_in(native).zip(b.index_in(native));
        let resolved = match requested {
            StokesI => pair(XX, YY)
                .or_else(|| pair(RR, LL))
                .map(|(a, b)| Combination::Sum(a, b)),
            StokesQ => pair(XX, YY)
                .map(|(a, b)| Combination::Difference(a, b))
                .or_else(|| pair(RL, LR).map(|(a, b)| Combination::Sum(a, b))),
            StokesU => pair(XY, YX)
                .map(|(a, b)| Combination::Sum(a, b))
                .or_else(|| pair(RL, LR).map(|(a, b)| Combination::RotatedDifference(a, b))),
            StokesV => pair(XY, YX)
                .map(|(a, b)| Combination::RotatedDifference(a, b))
                .or_else(|| pair(RR, LL).map(|(a, b)| Combination::Difference(a, b))),
            _ => None,
        };
        resolved.ok_or_else(|| {
            vispart_err!(
                Configuration: "the dataset does not hold the correlations needed for {}",
                requested
            )
        })
    }
}

fn usable(cube: &CubeView<'_>, index: usize) -> bool {
    !cube.flags[index] && cube.data[index].is_finite() && cube.weights[index].is_finite()
}

fn check_len(name: &str, actual: usize, expected: usize) -> VispartResult<()> {
    if actual != expected {
        vispart_bail!(
            ShapeMismatch: "{} buffer holds {} values, expected {}",
            name,
            actual,
            expected
        );
    }
    Ok(())
}

impl PolarizationConverter for StokesConverter {
    fn validate(&self, native: &[Polarization], requested: Polarization) -> VispartResult<()> {
        Self::combination(native, requested).map(|_| ())
    }

    fn weighted_data(
        &self,
        native: &[Polarization],
        requested: Polarization,
        channels: Range<usize>,
        cube: CubeView<'_>,
        data_out: &mut [Complex32],
        weights_out: &mut [f32],
    ) -> VispartResult<()> {
        let combination = Self::combination(native, requested)?;
        let npol = native.len();
        let per_channel = requested.values_per_channel(native);
        let expected = channels.len() * per_channel;
        check_len("data", data_out.len(), expected)?;
        check_len("weight", weights_out.len(), expected)?;
        check_len("input", cube.data.len(), cube.weights.len())?;
        check_len("flag", cube.flags.len(), cube.data.len())?;
        if channels.end * npol > cube.data.len() {
            vispart_bail!(OutOfBounds: channels.end, 0, cube.data.len() / npol.max(1));
        }

        let zero = Complex32::default();
        for (out, channel) in channels.enumerate() {
            let base = channel * npol;
            let slot = out * per_channel;
            match combination {
                Combination::Native(p) => {
                    let i = base + p;
                    (data_out[slot], weights_out[slot]) = if usable(&cube, i) {
                        (cube.data[i] * cube.weights[i], cube.weights[i])
                    } else {
                        (zero, 0.0)
                    };
                }
                Combination::Bundle(n) => {
                    for p in 0..n {
                        let i = base + p;
                        (data_out[slot + p], weights_out[slot + p]) = if usable(&cube, i) {
                            (cube.data[i] * cube.weights[i], cube.weights[i])
                        } else {
                            (zero, 0.0)
                        };
                    }
                }
                Combination::Sum(a, b)
                | Combination::Difference(a, b)
                | Combination::RotatedDifference(a, b) => {
                    let (ia, ib) = (base + a, base + b);
                    if !usable(&cube, ia) || !usable(&cube, ib) {
                        data_out[slot] = zero;
                        weights_out[slot] = 0.0;
                        continue;
                    }
                    let va = cube.data[ia] * cube.weights[ia];
                    let vb = cube.data[ib] * cube.weights[ib];
                    data_out[slot] = match combination {
                        Combination::Sum(..) => va + vb,
                        Combination::Difference(..) => va - vb,
                        _ => {
                            let diff = va - vb;
                            Complex32::new(diff.im, -diff.re)
                        }
                    };
                    weights_out[slot] = cube.weights[ia] + cube.weights[ib];
                }
            }
        }
        Ok(())
    }

    fn reverse_copy(
        &self,
        native: &[Polarization],
        requested: Polarization,
        channels: Range<usize>,
        values: &[Complex32],
        model: &mut [Complex32],
    ) -> VispartResult<()> {
        let combination = Self::combination(native, requested)?;
        let npol = native.len();
        let per_channel = requested.values_per_channel(native);
        check_len("model", values.len(), channels.len() * per_channel)?;
        if channels.end * npol > model.len() {
            vispart_bail!(OutOfBounds: channels.end, 0, model.len() / npol.max(1));
        }

        let i = Complex32::i();
        for (out, channel) in channels.enumerate() {
            let base = channel * npol;
            let slot = out * per_channel;
            match combination {
                Combination::Native(p) => {
                    if values[slot].is_finite() {
                        model[base + p] = values[slot];
                    }
                }
                Combination::Bundle(n) => {
                    for p in 0..n {
                        if values[slot + p].is_finite() {
                            model[base + p] = values[slot + p];
                        }
                    }
                }
                Combination::Sum(a, b) => {
                    let value = values[slot];
                    if value.is_finite() {
                        model[base + a] = value;
                        model[base + b] = value;
                    }
                }
                Combination::Difference(a, b) => {
                    let value = values[slot];
                    if value.is_finite() {
                        let mean = (model[base + a] + model[base + b]) * 0.5;
                        model[base + a] = mean + value;
                        model[base + b] = mean - value;
                    }
                }
                Combination::RotatedDifference(a, b) => {
                    let value = values[slot];
                    if value.is_finite() {
                        let mean = (model[base + a] + model[base + b]) * 0.5;
                        model[base + a] = mean + i * value;
                        model[base + b] = mean - i * value;
                    }
                }
            }
        }
        Ok(())
    }
}
