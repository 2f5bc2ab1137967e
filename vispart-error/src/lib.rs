#![deny(missing_docs)]

//! This crate defines error & result types for Vispart.
//! It also contains a variety of useful macros for error handling.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::num::TryFromIntError;
use std::ops::Deref;
use std::{env, fmt, io};

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    #[allow(clippy::panic)]
    fn from(msg: T) -> Self {
        if env::var("VISPART_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}\nBacktrace:\n{}", msg.into(), Backtrace::capture());
        } else {
            Self(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A backtrace captured where an error was created.
///
/// Boxed so that the error derive does not try to provide it through `Error::provide`, which is
/// still unstable.
pub type Trace = Box<Backtrace>;

#[doc(hidden)]
pub fn __capture() -> Trace {
    Box::new(Backtrace::capture())
}

/// The top-level error type for Vispart.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum VispartError {
    /// An index is out of bounds.
    #[error("index {0} out of bounds from {1} to {2}\nBacktrace:\n{3}")]
    OutOfBounds(usize, usize, usize, Trace),
    /// An invalid argument was provided.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Trace),
    /// An operation was attempted on an object in a state that does not permit it.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidState(ErrString, Trace),
    /// The size of an on-disk region does not agree with the shape it must hold.
    #[error("{0}\nBacktrace:\n{1}")]
    ShapeMismatch(ErrString, Trace),
    /// The requested partitioning cannot be realized for the dataset, e.g. a requested
    /// polarization cannot be formed from the available correlations.
    #[error("{0}\nBacktrace:\n{1}")]
    Configuration(ErrString, Trace),
    /// An on-disk header could not be decoded.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidSerde(ErrString, Trace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, #[source] Box<VispartError>),
    /// A wrapper for IO errors.
    #[error("{0}\nBacktrace:\n{1}")]
    IOError(#[source] io::Error, Trace),
    /// A wrapper for integer conversion errors.
    #[error("{0}\nBacktrace:\n{1}")]
    TryFromInt(#[source] TryFromIntError, Trace),
}

impl VispartError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        VispartError::Context(msg.into(), Box::new(self))
    }

    /// Returns true if this error, or any error it wraps, is an I/O error of the given kind.
    pub fn is_io_kind(&self, kind: io::ErrorKind) -> bool {
        match self {
            VispartError::IOError(err, _) => err.kind() == kind,
            VispartError::Context(_, inner) => inner.is_io_kind(kind),
            _ => false,
        }
    }
}

impl Debug for VispartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for VispartError {
    fn from(value: io::Error) -> Self {
        VispartError::IOError(value, __capture())
    }
}

impl From<TryFromIntError> for VispartError {
    fn from(value: TryFromIntError) -> Self {
        VispartError::TryFromInt(value, __capture())
    }
}

/// A convenient macro for creating a VispartError.
#[macro_export]
macro_rules! vispart_err {
    (OutOfBounds: $idx:expr, $start:expr, $stop:expr) => {
        $crate::VispartError::OutOfBounds($idx, $start, $stop, $crate::__capture())
    };
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::VispartError::$variant(format!($fmt, $($arg),*).into(), $crate::__capture())
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::vispart_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a VispartError.
#[macro_export]
macro_rules! vispart_bail {
    ($($tt:tt)+) => {
        return Err($crate::vispart_err!($($tt)+))
    };
}

/// A type alias for Results that return VispartErrors as their error type.
pub type VispartResult<T> = Result<T, VispartError>;
