//! Low-level interface to the AD9959
//!
//! This module implements a register-level interface to the AD9959, as seen
//! through the evaluation board's USB bridge. Users of this library should
//! typically not need to use this. Please consider using the
//! [high-level interface] instead.
//!
//! Register contents are [`BitString`]s in wire order: position `0` is the
//! most significant bit of the register. Field ranges use the same positions,
//! so the clock multiplier field of function register 1 (register bits 22:18)
//! is the range `1..6`.
//!
//! Per-channel registers are written to, and read from, whatever the channel
//! select register currently selects.
//!
//! [high-level interface]: ../hl/index.html

use core::{fmt, marker::PhantomData, ops::Range};
use std::time::Duration;

use embedded_hal::blocking::delay::DelayMs;
use tracing::{debug, trace, warn};

use crate::{
    bits::{self, BitString},
    command::{self, Command},
    transport::{Endpoint, Transport},
};


/// Entry point to the AD9959 driver's low-level API
///
/// Please consider using [hl::AD9959] instead.
///
/// [hl::AD9959]: ../hl/struct.AD9959.html
pub struct AD9959<T, D> {
    transport: T,
    delay: D,
    timeout: Duration,
    readback_settle: Duration,
}

impl<T, D> AD9959<T, D> {
    /// Create a new instance of `AD9959`
    ///
    /// `timeout` applies to every bulk transfer. `readback_settle` is the time
    /// the bridge is given between a read command and the readback.
    pub fn new(transport: T, delay: D, timeout: Duration, readback_settle: Duration) -> Self {
        AD9959 {
            transport,
            delay,
            timeout,
            readback_settle,
        }
    }

    /// Releases the transport and the delay
    pub fn free(self) -> (T, D) {
        (self.transport, self.delay)
    }
}

impl<T, D> AD9959<T, D>
where
    T: Transport,
    D: DelayMs<u32>,
{
    /// Frames `command` and sends it to its endpoint
    pub fn send(&mut self, command: Command) -> Result<(), Error<T>> {
        let frame = command.encode().map_err(Error::Frame)?;
        let endpoint = command.endpoint();
        trace!(?endpoint, ?frame, "sending command");

        let written = self
            .transport
            .bulk_write(endpoint, &frame, self.timeout)
            .map_err(Error::Transport)?;
        if written != frame.len() {
            return Err(Error::ShortWrite {
                endpoint,
                expected: frame.len(),
                actual: written,
            });
        }

        Ok(())
    }

    fn receive(&mut self, endpoint: Endpoint, len: usize) -> Result<Vec<u8>, Error<T>> {
        let mut buffer = vec![0; len];
        let read = self
            .transport
            .bulk_read(endpoint, &mut buffer, self.timeout)
            .map_err(Error::Transport)?;
        if read != len {
            return Err(Error::ShortRead {
                endpoint,
                expected: len,
                actual: read,
            });
        }
        trace!(?endpoint, ?buffer, "received");

        Ok(buffer)
    }

    /// Writes `bits` to the register at `address`
    ///
    /// `bits` must have exactly the register's width.
    pub fn write_register(&mut self, address: u8, bits: &BitString) -> Result<(), Error<T>> {
        let width = register_width::<T>(address)?;
        if bits.len() != width {
            return Err(Error::Bits(bits::Error::LengthMismatch {
                expected: width,
                actual: bits.len(),
            }));
        }

        debug!(address, %bits, "writing register");
        self.send(Command::WriteRegister {
            address,
            payload: bits,
        })
    }

    /// Reads the register at `address`
    ///
    /// Switches the bridge to readback mode, triggers the read, waits for the
    /// bridge to settle and collects one byte per register bit. The bridge is
    /// returned to normal mode even if the read fails.
    pub fn read_register(&mut self, address: u8) -> Result<BitString, Error<T>> {
        let width = register_width::<T>(address)?;

        // Register widths never exceed 32 bits.
        self.send(Command::BeginReadback { size: width as u8 })?;

        let result = self.read_in_readback_mode(address, width);

        match (result, self.send(Command::EndReadback)) {
            (Ok(bits), Ok(())) => {
                debug!(address, %bits, "read register");
                Ok(bits)
            }
            (Ok(_), Err(error)) => Err(error),
            (Err(error), end) => {
                if let Err(end_error) = end {
                    warn!(?end_error, "failed to leave readback mode");
                }
                Err(error)
            }
        }
    }

    fn read_in_readback_mode(&mut self, address: u8, width: usize) -> Result<BitString, Error<T>> {
        self.send(Command::ReadRegister { address })?;

        let settle_ms = u32::try_from(self.readback_settle.as_millis()).unwrap_or(u32::MAX);
        self.delay.delay_ms(settle_ms);

        let readout = self.receive(Endpoint::Readback, width)?;
        command::parse_readback(&readout).map_err(Error::Frame)
    }

    /// Stages pending register writes, returning the bridge's status byte
    pub fn load_io(&mut self) -> Result<u8, Error<T>> {
        self.send(Command::LoadIo)?;
        let status = self.receive(Endpoint::Status, 1)?[0];
        debug!(status, "load I/O");

        Ok(status)
    }

    /// Latches staged register writes, returning the bridge's status byte
    pub fn update_io(&mut self) -> Result<u8, Error<T>> {
        self.send(Command::UpdateIo)?;
        let status = self.receive(Endpoint::Status, 1)?[0];
        debug!(status, "update I/O");

        Ok(status)
    }

    /// Resets the USB device
    pub fn reset(&mut self) -> Result<(), Error<T>> {
        self.transport.reset().map_err(Error::Transport)
    }

    /// Replaces one field of the register at `address`, looked up by name
    ///
    /// Returns the new register value.
    pub fn modify_field(
        &mut self,
        address: u8,
        field: &str,
        new_bits: &BitString,
    ) -> Result<BitString, Error<T>> {
        let range = field_range::<T>(address, field)?;
        let old = self.read_register(address)?;
        let new = old.splice(range, new_bits).map_err(Error::Bits)?;
        self.write_register(address, &new)?;

        Ok(new)
    }
}

/// Provides access to a register
///
/// You can get an instance for a given register using one of the methods on
/// [`AD9959`].
pub struct RegAccessor<'s, R, T, D>(&'s mut AD9959<T, D>, PhantomData<R>);

impl<'s, R, T, D> RegAccessor<'s, R, T, D>
where
    R: Register,
    T: Transport,
    D: DelayMs<u32>,
{
    /// Read from the register
    pub fn read(&mut self) -> Result<BitString, Error<T>> {
        self.0.read_register(R::ADDRESS)
    }

    /// Write to the register
    pub fn write(&mut self, bits: &BitString) -> Result<(), Error<T>> {
        self.0.write_register(R::ADDRESS, bits)
    }

    /// Modify the register
    ///
    /// Reads the register, passes its value to `f` and writes back what `f`
    /// returns. Returns the written value.
    pub fn modify<F>(&mut self, f: F) -> Result<BitString, Error<T>>
    where
        F: FnOnce(&BitString) -> Result<BitString, bits::Error>,
    {
        let old = self.read()?;
        let new = f(&old).map_err(Error::Bits)?;
        self.write(&new)?;

        Ok(new)
    }
}


/// A named, contiguous range of bits within a register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    /// Name of the field
    pub name: &'static str,
    /// Position of the first bit
    pub start: usize,
    /// Position after the last bit
    pub end: usize,
}

impl Field {
    /// The positions the field occupies
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The width of the field
    pub fn width(&self) -> usize {
        self.end - self.start
    }

    /// Extracts the field from a register value
    pub fn get(&self, register: &BitString) -> Result<BitString, bits::Error> {
        register.field(self.range())
    }

    /// Replaces the field in a register value
    pub fn set(&self, register: &BitString, bits: &BitString) -> Result<BitString, bits::Error> {
        register.splice(self.range(), bits)
    }
}

/// Implemented for all registers
///
/// This is a mostly internal trait that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Register {
    /// The register address
    const ADDRESS: u8;

    /// The width of the register in bits
    const WIDTH: usize;

    /// The register's mnemonic
    const NAME: &'static str;

    /// The register's named fields
    const FIELDS: &'static [Field];
}

/// Static description of a register, for lookups by address
#[derive(Clone, Copy, Debug)]
pub struct RegisterInfo {
    /// The register address
    pub address: u8,
    /// The width of the register in bits
    pub width: usize,
    /// The register's mnemonic
    pub name: &'static str,
    /// The register's named fields
    pub fields: &'static [Field],
}

/// Looks up a register by address
pub fn register(address: u8) -> Option<&'static RegisterInfo> {
    REGISTERS.iter().find(|info| info.address == address)
}

/// The width of the register at `address`, in bits
pub fn register_width<T: Transport>(address: u8) -> Result<usize, Error<T>> {
    register(address)
        .map(|info| info.width)
        .ok_or(Error::UnknownRegister(address))
}

/// The bit range of the field `name` of the register at `address`
pub fn field_range<T: Transport>(address: u8, name: &str) -> Result<Range<usize>, Error<T>> {
    let info = register(address).ok_or(Error::UnknownRegister(address))?;

    info.fields
        .iter()
        .find(|field| field.name == name)
        .map(Field::range)
        .ok_or_else(|| Error::UnknownField {
            address,
            field: name.to_owned(),
        })
}


/// Generates register implementations
macro_rules! impl_register {
    (
        $(
            $address:expr,
            $width:expr,
            $name:ident($name_lower:ident) {
            #[$doc:meta]
            $(
                $field_const:ident($field:ident),
                $start:expr,
                $end:expr;
                #[$field_doc:meta]
            )*
            }
        )*
    ) => {
        $(
            #[$doc]
            #[allow(non_camel_case_types)]
            pub struct $name;

            impl Register for $name {
                const ADDRESS: u8    = $address;
                const WIDTH:   usize = $width;
                const NAME:    &'static str = stringify!($name);
                const FIELDS:  &'static [Field] = &[
                    $($name_lower::$field_const,)*
                ];
            }

            #[$doc]
            pub mod $name_lower {
                #[allow(unused_imports)]
                use super::Field;

                $(
                    #[$field_doc]
                    pub const $field_const: Field = Field {
                        name:  stringify!($field),
                        start: $start,
                        end:   $end,
                    };
                )*
            }
        )*

        /// All registers, for lookups by address
        pub const REGISTERS: &[RegisterInfo] = &[
            $(
                RegisterInfo {
                    address: $name::ADDRESS,
                    width:   $name::WIDTH,
                    name:    $name::NAME,
                    fields:  $name::FIELDS,
                },
            )*
        ];

        impl<T, D> AD9959<T, D> {
            $(
                #[$doc]
                pub fn $name_lower(&mut self) -> RegAccessor<$name, T, D> {
                    RegAccessor(self, PhantomData)
                }
            )*
        }
    }
}

// All registers are implemented in this macro invocation. It follows the
// following syntax:
// <address>, <width-bits>, <name-upper>(name-lower) { /// <doc>
//     <field 1>
//     <field 2>
//     ...
// }
//
// Each field follows the following syntax:
// <NAME>(<name>), <first-position>, <position-after-last>; /// <doc>
//
// Positions count from the most significant bit. Positions not covered by a
// field are reserved and preserved by read-modify-write.
impl_register! {
    0x00, 8, CSR(csr) { /// Channel Select Register
        CHANNEL_ENABLE(channel_enable), 0, 4; /// Channel enables, channel 0 first
        IO_MODE(io_mode),               5, 7; /// Serial I/O mode select
        LSB_FIRST(lsb_first),           7, 8; /// LSB first
    }
    0x01, 24, FR1(fr1) { /// Function Register 1
        VCO_GAIN(vco_gain),                     0,  1; /// VCO gain control
        CLOCK_MULTIPLIER(clock_multiplier),     1,  6; /// PLL divider ratio
        CHARGE_PUMP(charge_pump),               6,  8; /// Charge pump control
        PROFILE_PIN_CONFIG(profile_pin_config), 9, 12; /// Profile pin configuration
        RAMP_UP_DOWN(ramp_up_down),            12, 14; /// Amplitude ramp-up/ramp-down control
        MODULATION_LEVEL(modulation_level),    14, 16; /// Modulation level
    }
    0x02, 16, FR2(fr2) { /// Function Register 2
    }
    0x03, 24, CFR(cfr) { /// Channel Function Register
        MODULATION_TYPE(modulation_type),          0,  2; /// Amplitude/frequency/phase modulation select
        LINEAR_SWEEP_NO_DWELL(linear_sweep_no_dwell), 8, 9; /// Linear sweep no-dwell
        LINEAR_SWEEP_ENABLE(linear_sweep_enable),  9, 10; /// Linear sweep enable
        LOAD_SRR(load_srr),                       10, 11; /// Load sweep ramp rate at I/O update
        DAC_FULL_SCALE(dac_full_scale),           14, 16; /// DAC full-scale current control
        DIGITAL_POWER_DOWN(digital_power_down),   16, 17; /// Digital power-down
        DAC_POWER_DOWN(dac_power_down),           17, 18; /// DAC power-down
        MATCHED_PIPE_DELAYS(matched_pipe_delays), 18, 19; /// Matched pipe delays active
        AUTOCLEAR_SWEEP(autoclear_sweep),         19, 20; /// Autoclear sweep accumulator
        CLEAR_SWEEP(clear_sweep),                 20, 21; /// Clear sweep accumulator
        AUTOCLEAR_PHASE(autoclear_phase),         21, 22; /// Autoclear phase accumulator
        CLEAR_PHASE(clear_phase),                 22, 23; /// Clear phase accumulator
        SINE_OUTPUT(sine_output),                 23, 24; /// Sine wave output enable
    }
    0x04, 32, CFTW0(cftw0) { /// Channel Frequency Tuning Word 0
        WORD(word), 0, 32; /// Frequency tuning word
    }
    0x05, 16, CPOW0(cpow0) { /// Channel Phase Offset Word 0
        WORD(word), 0, 16; /// Phase offset word
    }
    0x07, 16, LSRR(lsrr) { /// Linear Sweep Ramp Rate
        FALLING(falling), 0,  8; /// Falling sweep ramp rate
        RISING(rising),   8, 16; /// Rising sweep ramp rate
    }
    0x08, 32, RDW(rdw) { /// Linear Sweep Rising Delta Word
        WORD(word), 0, 32; /// Rising delta word
    }
    0x09, 32, FDW(fdw) { /// Linear Sweep Falling Delta Word
        WORD(word), 0, 32; /// Falling delta word
    }
    0x0A, 32, CW1(cw1) { /// Channel Word 1
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x0B, 32, CW2(cw2) { /// Channel Word 2
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x0C, 32, CW3(cw3) { /// Channel Word 3
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x0D, 32, CW4(cw4) { /// Channel Word 4
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x0E, 32, CW5(cw5) { /// Channel Word 5
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x0F, 32, CW6(cw6) { /// Channel Word 6
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x10, 32, CW7(cw7) { /// Channel Word 7
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x11, 32, CW8(cw8) { /// Channel Word 8
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x12, 32, CW9(cw9) { /// Channel Word 9
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x13, 32, CW10(cw10) { /// Channel Word 10
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x14, 32, CW11(cw11) { /// Channel Word 11
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x15, 32, CW12(cw12) { /// Channel Word 12
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x16, 32, CW13(cw13) { /// Channel Word 13
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x17, 32, CW14(cw14) { /// Channel Word 14
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x18, 32, CW15(cw15) { /// Channel Word 15
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
    0x19, 32, CW16(cw16) { /// Channel Word 16
        WORD(word), 0, 32; /// Profile frequency tuning word
    }
}

/// Address of the first channel word register
pub const CHANNEL_WORD_BASE: u8 = CW1::ADDRESS;

/// Number of channel word registers
pub const CHANNEL_WORDS: u8 = 16;

/// Registers that exist once per channel
///
/// All other registers are shared by the four channels.
pub fn is_per_channel(address: u8) -> bool {
    address >= CFR::ADDRESS && address < CHANNEL_WORD_BASE + CHANNEL_WORDS
}


/// An error that can occur when communicating with the AD9959
pub enum Error<T>
where
    T: Transport,
{
    /// The transport failed, e.g. because the board is busy or timed out
    Transport(T::Error),

    /// The transport accepted fewer bytes than the command has
    ShortWrite {
        /// Endpoint written to
        endpoint: Endpoint,
        /// Length of the command
        expected: usize,
        /// Bytes actually written
        actual: usize,
    },

    /// The bridge answered with fewer bytes than expected
    ShortRead {
        /// Endpoint read from
        endpoint: Endpoint,
        /// Bytes expected
        expected: usize,
        /// Bytes actually read
        actual: usize,
    },

    /// A command couldn't be framed, or a readback couldn't be parsed
    Frame(byte::Error),

    /// No register exists at this address
    UnknownRegister(u8),

    /// The register has no field of this name
    UnknownField {
        /// Address of the register
        address: u8,
        /// The requested field name
        field: String,
    },

    /// A register value or field value had the wrong length
    Bits(bits::Error),
}

// We can't derive this implementation, as the compiler would require `T`
// itself to implement `Debug`.
impl<T> fmt::Debug for Error<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transport(error) => write!(f, "Transport({:?})", error),
            Error::ShortWrite {
                endpoint,
                expected,
                actual,
            } => write!(
                f,
                "ShortWrite {{ endpoint: {:?}, expected: {}, actual: {} }}",
                endpoint, expected, actual
            ),
            Error::ShortRead {
                endpoint,
                expected,
                actual,
            } => write!(
                f,
                "ShortRead {{ endpoint: {:?}, expected: {}, actual: {} }}",
                endpoint, expected, actual
            ),
            Error::Frame(error) => write!(f, "Frame({:?})", error),
            Error::UnknownRegister(address) => write!(f, "UnknownRegister({:#04x})", address),
            Error::UnknownField { address, field } => write!(
                f,
                "UnknownField {{ address: {:#04x}, field: {:?} }}",
                address, field
            ),
            Error::Bits(error) => write!(f, "Bits({:?})", error),
        }
    }
}

impl<T> fmt::Display for Error<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transport(error) => write!(f, "transport error: {:?}", error),
            Error::ShortWrite {
                endpoint,
                expected,
                actual,
            } => write!(
                f,
                "wrote {} of {} bytes to {:?}",
                actual, expected, endpoint
            ),
            Error::ShortRead {
                endpoint,
                expected,
                actual,
            } => write!(
                f,
                "read {} of {} bytes from {:?}",
                actual, expected, endpoint
            ),
            Error::Frame(error) => write!(f, "framing error: {:?}", error),
            Error::UnknownRegister(address) => write!(f, "no register at {:#04x}", address),
            Error::UnknownField { address, field } => write!(
                f,
                "register {:#04x} has no field {:?}",
                address, field
            ),
            Error::Bits(error) => error.fmt(f),
        }
    }
}

impl<T> std::error::Error for Error<T> where T: Transport {}
