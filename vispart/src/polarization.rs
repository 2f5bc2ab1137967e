use std::fmt::{Display, Formatter};
use std::str::FromStr;

use vispart_error::{VispartError, vispart_err};

/// A polarization product that a shard can hold.
///
/// The first eight variants are correlations as they are stored natively in a dataset; the
/// Stokes parameters are linear combinations of two of them. [`Polarization::Instrumental`]
/// bundles every native correlation of a channel into one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Polarization {
    XX,
    XY,
    YX,
    YY,
    RR,
    RL,
    LR,
    LL,
    StokesI,
    StokesQ,
    StokesU,
    StokesV,
    Instrumental,
}

impl Polarization {
    pub const ALL: [Polarization; 13] = [
        Polarization::XX,
        Polarization::XY,
        Polarization::YX,
        Polarization::YY,
        Polarization::RR,
        Polarization::RL,
        Polarization::LR,
        Polarization::LL,
        Polarization::StokesI,
        Polarization::StokesQ,
        Polarization::StokesU,
        Polarization::StokesV,
        Polarization::Instrumental,
    ];

    /// The code used for this polarization in shard file names.
    pub fn short_code(self) -> &'static str {
        match self {
            Polarization::XX => "XX",
            Polarization::XY => "XY",
            Polarization::YX => "YX",
            Polarization::YY => "YY",
            Polarization::RR => "RR",
            Polarization::RL => "RL",
            Polarization::LR => "LR",
            Polarization::LL => "LL",
            Polarization::StokesI => "I",
            Polarization::StokesQ => "Q",
            Polarization::StokesU => "U",
            Polarization::StokesV => "V",
            Polarization::Instrumental => "instr",
        }
    }

    /// Whether this is a correlation that a dataset can store natively.
    pub fn is_native(self) -> bool {
        matches!(
            self,
            Polarization::XX
                | Polarization::XY
                | Polarization::YX
                | Polarization::YY
                | Polarization::RR
                | Polarization::RL
                | Polarization::LR
                | Polarization::LL
        )
    }

    /// Position of this polarization within a dataset's native correlation list.
    pub fn index_in(self, native: &[Polarization]) -> Option<usize> {
        native.iter().position(|p| *p == self)
    }

    /// Number of values a shard row stores per channel for this polarization.
    pub fn values_per_channel(self, native: &[Polarization]) -> usize {
        if self == Polarization::Instrumental {
            native.len()
        } else {
            1
        }
    }
}

impl Display for Polarization {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_code())
    }
}

impl FromStr for Polarization {
    type Err = VispartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Polarization::ALL
            .into_iter()
            .find(|p| p.short_code().to_ascii_lowercase() == lower)
            .ok_or_else(|| vispart_err!("unknown polarization \"{}\"", s))
    }
}
