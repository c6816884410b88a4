//! High-level interface to the AD9959
//!
//! The entry point to this API is the [AD9959] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to the AD9959. This is the
//! recommended way to access the AD9959 using this crate, unless you need the
//! greater flexibility provided by the [register-level interface].
//!
//! [register-level interface]: ../ll/index.html

use core::fmt;

use crate::{
    channels::Channels,
    configs::{DeviceConfig, ModulationTable},
    ll,
};

pub use error::*;
pub use shared::*;
pub use state_impls::*;

mod error;
mod modulation;
mod ready;
mod shared;
mod state_impls;
mod uninitialized;

/// Entry point to the AD9959 driver API
///
/// Every mutating operation runs the same sequence under one exclusive
/// borrow: select the channels it applies to (per-channel registers only),
/// write the encoded register value, then load I/O and, if auto-update is
/// enabled, update I/O. Arguments are checked before the first transfer.
pub struct AD9959<T, D, State> {
    ll: ll::AD9959<T, D>,
    config: DeviceConfig,
    modulation_table: ModulationTable,
    system_clock_frequency: f64,
    auto_update: bool,
    selected: Channels,
    state: State,
}

impl<T, D, State> AD9959<T, D, State> {
    /// Get the low-level interface
    pub fn ll(&mut self) -> &mut ll::AD9959<T, D> {
        &mut self.ll
    }

    /// The configuration this instance was created with
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The reference clock frequency, in Hz
    pub fn reference_clock_frequency(&self) -> f64 {
        self.config.reference_clock_frequency
    }

    /// The system clock frequency, in Hz
    ///
    /// Equals the reference clock until a clock multiplier is set.
    pub fn system_clock_frequency(&self) -> f64 {
        self.system_clock_frequency
    }

    /// Whether register writes are latched immediately
    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    /// The channels the last per-channel operation selected
    pub fn selected_channels(&self) -> Channels {
        self.selected
    }

    /// Releases the transport and the delay
    pub fn free(self) -> (T, D) {
        self.ll.free()
    }
}

// Can't be derived without putting requirements on `T` and `D`.
impl<T, D, State> fmt::Debug for AD9959<T, D, State>
where
    State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AD9959")
            .field("state", &self.state)
            .field("system_clock_frequency", &self.system_clock_frequency)
            .field("auto_update", &self.auto_update)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}
