//! The seam between this driver and the USB stack
//!
//! The evaluation board carries a Cypress USB microcontroller that forwards
//! commands to the AD9959. This crate doesn't talk USB itself. It expects an
//! implementation of [`Transport`] that performs bulk transfers on the board's
//! endpoints. Implementations that can find the board on their own also
//! implement [`Open`], which takes the ids and location from
//! [`DeviceConfig`].
//!
//! [`DeviceConfig`]: ../configs/struct.DeviceConfig.html

use core::fmt;
use std::{thread, time::Duration};

use embedded_hal::blocking::delay::DelayMs;
use num_enum::IntoPrimitive;

use crate::configs::UsbLocation;


/// Bulk endpoints of the bridge
///
/// Converts into the endpoint address with `u8::from`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive)]
#[repr(u8)]
pub enum Endpoint {
    /// Bridge control commands: readback mode, load and update I/O
    Control = 0x01,

    /// One status byte in response to load and update I/O
    Status = 0x81,

    /// Commands that are forwarded to the AD9959's serial port
    Data = 0x04,

    /// Register contents while readback mode is enabled
    Readback = 0x88,
}


/// Bulk transfer access to the evaluation board
///
/// Implementations are expected to enforce `timeout` and report an expired
/// timeout as an error, so a stalled board never blocks the caller forever.
pub trait Transport {
    /// The error type of the underlying USB stack
    type Error: fmt::Debug;

    /// Writes `data` to `endpoint`, returning the number of bytes written
    fn bulk_write(
        &mut self,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error>;

    /// Reads from `endpoint` into `buffer`, returning the number of bytes read
    fn bulk_read(
        &mut self,
        endpoint: Endpoint,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error>;

    /// Resets the USB device
    ///
    /// Used to recover when the board is still busy with a previous client.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

/// A transport that can find and open the board itself
pub trait Open: Transport + Sized {
    /// Opens the first board with the given ids
    ///
    /// If `location` is given, only a board attached at that bus and port
    /// path qualifies.
    fn open(
        vendor_id: u16,
        product_id: u16,
        location: Option<&UsbLocation>,
    ) -> Result<Self, Self::Error>;
}

impl<T> Transport for &mut T
where
    T: Transport + ?Sized,
{
    type Error = T::Error;

    fn bulk_write(
        &mut self,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error> {
        (**self).bulk_write(endpoint, data, timeout)
    }

    fn bulk_read(
        &mut self,
        endpoint: Endpoint,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error> {
        (**self).bulk_read(endpoint, buffer, timeout)
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        (**self).reset()
    }
}


/// A delay that puts the current thread to sleep
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl DelayMs<u32> for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}
