//! Channel sets and the channel select mask

use core::fmt;

use crate::bits::BitString;


/// The number of output channels of the AD9959
pub const CHANNEL_COUNT: u8 = 4;


/// A set of output channels
///
/// Per-channel registers are written to every channel in the set at once,
/// after the set has been written to the channel select register.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channels(u8);

impl Channels {
    /// No channel at all
    pub const NONE: Channels = Channels(0b0000);

    /// All four channels
    pub const ALL: Channels = Channels(0b1111);

    /// Creates a set from a list of channel indices
    ///
    /// Duplicates are allowed. Fails on the first index that isn't in
    /// `0..=3`.
    pub fn new(channels: &[u8]) -> Result<Self, InvalidChannel> {
        channels
            .iter()
            .try_fold(Channels::NONE, |set, &channel| set.with(channel))
    }

    /// Creates a set that contains only `channel`
    pub fn single(channel: u8) -> Result<Self, InvalidChannel> {
        Channels::NONE.with(channel)
    }

    /// Returns a copy of this set with `channel` added
    pub fn with(self, channel: u8) -> Result<Self, InvalidChannel> {
        if channel >= CHANNEL_COUNT {
            return Err(InvalidChannel(channel));
        }

        Ok(Channels(self.0 | 1 << channel))
    }

    /// Whether `channel` is part of the set
    pub fn contains(&self, channel: u8) -> bool {
        channel < CHANNEL_COUNT && self.0 & 1 << channel != 0
    }

    /// The number of channels in the set
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates over the channel indices in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> {
        let set = *self;
        (0..CHANNEL_COUNT).filter(move |&channel| set.contains(channel))
    }

    /// The 4-bit channel select mask for this set
    ///
    /// Bit `i` of the mask is set for every channel `i`, then the order of
    /// the four bits is reversed: channel 0 ends up in the first, most
    /// significant position and channel 3 in the last. The board's channel
    /// select nibble expects exactly this inverted order.
    pub fn select_mask(&self) -> BitString {
        let mask = BitString::from_uint(self.0.into(), CHANNEL_COUNT as usize);
        mask.iter().rev().collect()
    }
}

impl TryFrom<&[u8]> for Channels {
    type Error = InvalidChannel;

    fn try_from(channels: &[u8]) -> Result<Self, Self::Error> {
        Channels::new(channels)
    }
}

impl TryFrom<u8> for Channels {
    type Error = InvalidChannel;

    fn try_from(channel: u8) -> Result<Self, Self::Error> {
        Channels::single(channel)
    }
}

impl fmt::Debug for Channels {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}


/// Computes the channel select mask for a list of channel indices
///
/// See [`Channels::select_mask`].
pub fn select_mask(channels: &[u8]) -> Result<BitString, InvalidChannel> {
    Channels::new(channels).map(|channels| channels.select_mask())
}


/// A channel index outside of `0..=3`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidChannel(pub u8);

impl fmt::Display for InvalidChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "channel {} doesn't exist, valid channels are 0 to 3", self.0)
    }
}

impl std::error::Error for InvalidChannel {}
