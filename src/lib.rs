//! Driver crate for the AD9959 DDS evaluation board
//!
//! The AD9959 is a four-channel direct digital synthesizer. On its evaluation
//! board it is controlled through a USB bridge, which forwards register
//! accesses to the chip's serial port one bit per byte.
//!
//! The entry point is [`AD9959`]. It needs an implementation of [`Transport`]
//! for the USB side and a delay, then [`AD9959::init`] configures the clock
//! multiplier:
//!
//! ``` ignore
//! let dds = AD9959::new(transport, StdDelay, DeviceConfig::default())?
//!     .init(20)?;
//! dds.set_frequency(20e6, &[0, 1], 0)?;
//! ```
//!
//! Every register change is staged and then latched (Load I/O, then Update
//! I/O). With [`DeviceConfig::auto_update`] disabled, writes are only staged
//! until [`AD9959::io_update`] is called.
//!
//! [`AD9959::init`]: hl/struct.AD9959.html#method.init
//! [`AD9959::io_update`]: hl/struct.AD9959.html#method.io_update


#![deny(missing_docs)]


pub mod bits;
pub mod channels;
pub mod codec;
pub mod command;
pub mod configs;
pub mod hl;
pub mod ll;
pub mod transport;

#[cfg(test)]
mod mock;


pub use crate::{
    bits::BitString,
    channels::Channels,
    codec::TuningWord,
    configs::{DeviceConfig, ModulationLevel, ModulationType, UsbLocation},
    hl::{Error, InvalidArgument, Ready, Shared, Uninitialized, AD9959},
    transport::{Endpoint, Open, StdDelay, Transport},
};
