use std::sync::{Arc, Mutex};

use embedded_hal::blocking::delay::DelayMs;
use tracing::warn;

use crate::{transport::Transport, Error, Ready, AD9959};

/// A ready driver that can be shared between threads
///
/// Every call to [`with`](#method.with) holds the lock for the entire
/// closure, so a channel selection, the write that depends on it and the
/// latch can't be interleaved with another thread's.
pub struct Shared<T, D>(Arc<Mutex<AD9959<T, D, Ready>>>);

impl<T, D> Clone for Shared<T, D> {
    fn clone(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }
}

impl<T, D> Shared<T, D>
where
    T: Transport,
    D: DelayMs<u32>,
{
    /// Wraps a ready driver
    pub fn new(dds: AD9959<T, D, Ready>) -> Self {
        Shared(Arc::new(Mutex::new(dds)))
    }

    /// Runs `f` with exclusive access to the driver
    pub fn with<F, R>(&self, f: F) -> Result<R, Error<T>>
    where
        F: FnOnce(&mut AD9959<T, D, Ready>) -> Result<R, Error<T>>,
    {
        let mut dds = self.0.lock().map_err(|_| Error::Poisoned)?;
        f(&mut dds)
    }

    /// Returns the driver, if this is the last handle
    ///
    /// A poisoned driver is returned as well, so the caller can get the
    /// transport back with [`AD9959::free`]. The chip may have been left in
    /// the middle of an operation, so it should be configured again before
    /// it is used.
    ///
    /// [`AD9959::free`]: struct.AD9959.html#method.free
    pub fn into_inner(self) -> Result<AD9959<T, D, Ready>, Self> {
        match Arc::try_unwrap(self.0) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(|poisoned| {
                warn!("recovering a driver from a thread that panicked");
                poisoned.into_inner()
            })),
            Err(shared) => Err(Shared(shared)),
        }
    }
}
