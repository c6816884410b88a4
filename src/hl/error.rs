use core::fmt;

use crate::{
    bits,
    channels::InvalidChannel,
    codec::OutOfRange,
    configs::{TableError, UnsupportedChannelCombination},
    ll,
    transport::Transport,
};

/// An error that can occur when controlling the AD9959
pub enum Error<T>
where
    T: Transport,
{
    /// Error occured while communicating with the board
    Ll(ll::Error<T>),

    /// An argument was rejected before any transfer took place
    InvalidArgument(InvalidArgument),

    /// A channel index outside of `0..=3`
    InvalidChannel(InvalidChannel),

    /// The channel group can't be modulated at the requested level
    UnsupportedChannelCombination(UnsupportedChannelCombination),

    /// The register write went through, but Load I/O failed
    LoadFailed(ll::Error<T>),

    /// Every register write of the operation is staged, but Update I/O failed
    ///
    /// Operations that write several registers only attempt Update I/O once,
    /// after the last write was staged. The chip still runs with its previous
    /// settings. Call [`AD9959::io_update`] to retry latching the staged
    /// writes. Repeating the whole operation is not necessary.
    ///
    /// [`AD9959::io_update`]: struct.AD9959.html#method.io_update
    NotUpdated(ll::Error<T>),

    /// The modulation channel group table is invalid
    InvalidTable(TableError),

    /// Another thread panicked while holding a [`Shared`] driver
    ///
    /// [`Shared`]: struct.Shared.html
    Poisoned,
}

impl<T> Error<T>
where
    T: Transport,
{
    /// Whether the error was reported by the transport
    ///
    /// This is the only kind of error that can go away by retrying.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Ll(ll::Error::Transport(_))
                | Error::LoadFailed(ll::Error::Transport(_))
                | Error::NotUpdated(ll::Error::Transport(_))
        )
    }
}

/// Describes why an argument was rejected
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InvalidArgument {
    /// A physical value was outside of its legal range
    OutOfRange {
        /// The name of the argument
        argument: &'static str,
        /// The value and the legal range
        range: OutOfRange,
    },

    /// Clock multipliers are 1 or between 4 and 20
    ClockMultiplier(u8),

    /// Modulation levels are 2, 4 or 16
    ModulationLevel(u8),

    /// Channel words are numbered 0 to 16
    ChannelWord(u8),

    /// The operation needs at least one channel
    NoChannels,

    /// A precomputed tuning word was computed for another system clock
    StaleTuningWord {
        /// System clock the word was computed for, in Hz
        computed_for: f64,
        /// Current system clock, in Hz
        current: f64,
    },
}

impl<T> From<ll::Error<T>> for Error<T>
where
    T: Transport,
{
    fn from(error: ll::Error<T>) -> Self {
        Error::Ll(error)
    }
}

impl<T> From<bits::Error> for Error<T>
where
    T: Transport,
{
    fn from(error: bits::Error) -> Self {
        Error::Ll(ll::Error::Bits(error))
    }
}

impl<T> From<InvalidArgument> for Error<T>
where
    T: Transport,
{
    fn from(error: InvalidArgument) -> Self {
        Error::InvalidArgument(error)
    }
}

impl<T> From<InvalidChannel> for Error<T>
where
    T: Transport,
{
    fn from(error: InvalidChannel) -> Self {
        Error::InvalidChannel(error)
    }
}

impl<T> From<UnsupportedChannelCombination> for Error<T>
where
    T: Transport,
{
    fn from(error: UnsupportedChannelCombination) -> Self {
        Error::UnsupportedChannelCombination(error)
    }
}

impl<T> From<TableError> for Error<T>
where
    T: Transport,
{
    fn from(error: TableError) -> Self {
        Error::InvalidTable(error)
    }
}

// We can't derive this implementation, as the compiler would require `T`
// itself to implement `Debug`.
impl<T> fmt::Debug for Error<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Ll(error) => write!(f, "Ll({:?})", error),
            Error::InvalidArgument(error) => write!(f, "InvalidArgument({:?})", error),
            Error::InvalidChannel(error) => write!(f, "InvalidChannel({:?})", error),
            Error::UnsupportedChannelCombination(error) => {
                write!(f, "UnsupportedChannelCombination({:?})", error)
            }
            Error::LoadFailed(error) => write!(f, "LoadFailed({:?})", error),
            Error::NotUpdated(error) => write!(f, "NotUpdated({:?})", error),
            Error::InvalidTable(error) => write!(f, "InvalidTable({:?})", error),
            Error::Poisoned => write!(f, "Poisoned"),
        }
    }
}

impl<T> fmt::Display for Error<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Ll(error) => error.fmt(f),
            Error::InvalidArgument(error) => error.fmt(f),
            Error::InvalidChannel(error) => error.fmt(f),
            Error::UnsupportedChannelCombination(error) => error.fmt(f),
            Error::LoadFailed(error) => write!(f, "load I/O failed: {}", error),
            Error::NotUpdated(error) => {
                write!(f, "write is staged, but update I/O failed: {}", error)
            }
            Error::InvalidTable(error) => write!(f, "invalid modulation table: {}", error),
            Error::Poisoned => write!(f, "driver lock is poisoned"),
        }
    }
}

impl<T> std::error::Error for Error<T> where T: Transport {}

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvalidArgument::OutOfRange { argument, range } => write!(f, "{}: {}", argument, range),
            InvalidArgument::ClockMultiplier(factor) => write!(
                f,
                "clock multiplier {} is neither 1 nor between 4 and 20",
                factor
            ),
            InvalidArgument::ModulationLevel(level) => {
                write!(f, "modulation level {} is not one of 2, 4 or 16", level)
            }
            InvalidArgument::ChannelWord(word) => {
                write!(f, "channel word {} doesn't exist, valid words are 0 to 16", word)
            }
            InvalidArgument::NoChannels => write!(f, "no channel given"),
            InvalidArgument::StaleTuningWord {
                computed_for,
                current,
            } => write!(
                f,
                "tuning word was computed for a {} Hz system clock, which is now {} Hz",
                computed_for, current
            ),
        }
    }
}
