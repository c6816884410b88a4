//! A simulated evaluation board
//!
//! [`MockBridge`] records every transfer, keeps a register file per channel
//! and answers readbacks and status reads the way the board does. Clones share
//! their state, so a test can keep a handle while the driver owns another.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use embedded_hal::blocking::delay::DelayMs;

use crate::{
    bits::BitString,
    channels::CHANNEL_COUNT,
    command::ADDRESS_BITS,
    configs::UsbLocation,
    ll,
    transport::{Endpoint, Open, Transport},
};


#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Write(Endpoint, Vec<u8>),
    Read(Endpoint, usize),
    Delay(u32),
    Reset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockError {
    Timeout,
    Busy,
    NotFound,
}

thread_local! {
    // Boards `Open::open` can find, per test thread
    static ATTACHED: RefCell<Vec<(u16, u16, Option<UsbLocation>, MockBridge)>> =
        RefCell::new(Vec::new());
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    shared: HashMap<u8, BitString>,
    channels: [HashMap<u8, BitString>; CHANNEL_COUNT as usize],
    readback_size: Option<usize>,
    readback: VecDeque<u8>,
    status: VecDeque<u8>,

    busy_until_reset: bool,
    fail_update: bool,
    fail_reads_from: Option<Endpoint>,
    short_writes_to: Option<Endpoint>,
    fail_after: Option<usize>,
    transfers: usize,
}

impl State {
    fn selected(&self) -> Vec<usize> {
        let csr = self.register(0x00, 0);
        (0..CHANNEL_COUNT as usize)
            .filter(|&i| csr.get(i) == Some(true))
            .collect()
    }

    fn register(&self, address: u8, channel: usize) -> BitString {
        let file = if ll::is_per_channel(address) {
            &self.channels[channel]
        } else {
            &self.shared
        };
        file.get(&address).cloned().unwrap_or_else(|| {
            BitString::zeros(ll::register(address).map_or(0, |info| info.width))
        })
    }

    fn check(&mut self) -> Result<(), MockError> {
        if self.busy_until_reset {
            return Err(MockError::Busy);
        }
        if let Some(limit) = self.fail_after {
            if self.transfers >= limit {
                return Err(MockError::Timeout);
            }
        }
        self.transfers += 1;

        Ok(())
    }

    fn execute_control(&mut self, data: &[u8]) {
        match data {
            [0x07, 0x00, size] => self.readback_size = Some(*size as usize),
            [0x04, 0x00] => self.readback_size = None,
            [0x0C, 0x00] | [0x0C, 0x10] => self.status.push_back(1),
            _ => {}
        }
    }

    fn execute_data(&mut self, data: &[u8]) {
        let address = data[1..1 + ADDRESS_BITS]
            .iter()
            .fold(0, |address, &bit| address << 1 | bit);
        let payload: BitString = data[1 + ADDRESS_BITS..].iter().map(|&b| b == 1).collect();

        match data[0] {
            0x00 if ll::is_per_channel(address) => {
                for channel in self.selected() {
                    self.channels[channel].insert(address, payload.clone());
                }
            }
            0x00 => {
                self.shared.insert(address, payload);
            }
            _ => {
                if let Some(size) = self.readback_size {
                    let channel = self.selected().first().copied().unwrap_or(0);
                    let value = self.register(address, channel);
                    self.readback
                        .extend(value.to_wire().chain(std::iter::repeat(0)).take(size));
                }
            }
        }
    }
}


#[derive(Clone, Default)]
pub struct MockBridge(Arc<Mutex<State>>);

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<State> {
        self.0.lock().unwrap()
    }

    pub fn delay(&self) -> MockDelay {
        MockDelay(self.0.clone())
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Register contents, as seen by `channel` for per-channel registers
    pub fn register(&self, address: u8, channel: u8) -> BitString {
        self.state().register(address, channel as usize)
    }

    /// Presets a register, for all channels if `channel` is `None`
    pub fn set_register(&self, address: u8, channel: Option<u8>, bits: BitString) {
        let mut state = self.state();
        if !ll::is_per_channel(address) {
            state.shared.insert(address, bits);
            return;
        }
        match channel {
            Some(channel) => {
                state.channels[channel as usize].insert(address, bits);
            }
            None => {
                for file in state.channels.iter_mut() {
                    file.insert(address, bits.clone());
                }
            }
        }
    }

    /// Makes the board available to `Open::open` on the current thread
    pub fn attach(&self, vendor_id: u16, product_id: u16, location: Option<UsbLocation>) {
        ATTACHED.with(|attached| {
            attached
                .borrow_mut()
                .push((vendor_id, product_id, location, self.clone()))
        });
    }

    pub fn busy_until_reset(&self) {
        self.state().busy_until_reset = true;
    }

    pub fn fail_updates(&self) {
        self.state().fail_update = true;
    }

    pub fn restore_updates(&self) {
        self.state().fail_update = false;
    }

    pub fn fail_reads_from(&self, endpoint: Endpoint) {
        self.state().fail_reads_from = Some(endpoint);
    }

    /// Accepts all but the last byte of every write to `endpoint`
    pub fn short_writes_to(&self, endpoint: Endpoint) {
        self.state().short_writes_to = Some(endpoint);
    }

    /// Lets `transfers` more transfers succeed, then fails every one after
    pub fn fail_after(&self, transfers: usize) {
        let mut state = self.state();
        state.fail_after = Some(state.transfers + transfers);
    }

    /// All register writes, as address and payload
    pub fn register_writes(&self) -> Vec<(u8, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Write(Endpoint::Data, data) if data[0] == 0x00 => {
                    let address = data[1..1 + ADDRESS_BITS]
                        .iter()
                        .fold(0, |address, &bit| address << 1 | bit);
                    let payload = data[1 + ADDRESS_BITS..]
                        .iter()
                        .map(|&b| if b == 1 { '1' } else { '0' })
                        .collect();
                    Some((address, payload))
                }
                _ => None,
            })
            .collect()
    }

    /// All commands sent to the control endpoint
    pub fn control_commands(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Write(Endpoint::Control, data) => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Number of transfers and resets, delays excluded
    pub fn transfer_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| !matches!(event, Event::Delay(_)))
            .count()
    }
}

impl Transport for MockBridge {
    type Error = MockError;

    fn bulk_write(
        &mut self,
        endpoint: Endpoint,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, Self::Error> {
        let mut state = self.state();
        state.events.push(Event::Write(endpoint, data.to_vec()));

        if state.fail_update && endpoint == Endpoint::Control && data == [0x0C, 0x10] {
            return Err(MockError::Timeout);
        }
        state.check()?;

        if state.short_writes_to == Some(endpoint) {
            return Ok(data.len().saturating_sub(1));
        }

        match endpoint {
            Endpoint::Control => state.execute_control(data),
            Endpoint::Data => state.execute_data(data),
            _ => {}
        }

        Ok(data.len())
    }

    fn bulk_read(
        &mut self,
        endpoint: Endpoint,
        buffer: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, Self::Error> {
        let mut state = self.state();
        state.events.push(Event::Read(endpoint, buffer.len()));

        if state.fail_reads_from == Some(endpoint) {
            return Err(MockError::Timeout);
        }
        state.check()?;

        let queue = match endpoint {
            Endpoint::Status => &mut state.status,
            Endpoint::Readback => &mut state.readback,
            _ => return Ok(0),
        };
        let mut read = 0;
        for b in buffer.iter_mut() {
            match queue.pop_front() {
                Some(value) => {
                    *b = value;
                    read += 1;
                }
                None => break,
            }
        }

        Ok(read)
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.events.push(Event::Reset);
        state.busy_until_reset = false;

        Ok(())
    }
}

impl Open for MockBridge {
    fn open(
        vendor_id: u16,
        product_id: u16,
        location: Option<&UsbLocation>,
    ) -> Result<Self, Self::Error> {
        ATTACHED.with(|attached| {
            attached
                .borrow()
                .iter()
                .find(|(v, p, l, _)| {
                    *v == vendor_id
                        && *p == product_id
                        && location.map_or(true, |location| l.as_ref() == Some(location))
                })
                .map(|(.., bridge)| bridge.clone())
                .ok_or(MockError::NotFound)
        })
    }
}


/// Records delays instead of sleeping
pub struct MockDelay(Arc<Mutex<State>>);

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.lock().unwrap().events.push(Event::Delay(ms));
    }
}
