//! Bridge command framing
//!
//! The USB bridge understands six commands. Two of them are forwarded to the
//! AD9959's serial port through [`Endpoint::Data`], and carry one byte per
//! bit: a read/write flag, the 7-bit register address and, for writes, the
//! register payload. The other four switch the bridge's readback mode or pulse
//! the I/O update line, and are sent to [`Endpoint::Control`].
//!
//! | Command          | Bytes                                     |
//! |------------------|-------------------------------------------|
//! | Register write   | `0x00`, 7 address bits, N payload bits    |
//! | Register read    | `0x01`, 7 address bits                    |
//! | Begin readback   | `0x07 0x00 <size>`                        |
//! | End readback     | `0x04 0x00`                               |
//! | Load I/O         | `0x0C 0x00`                               |
//! | Update I/O       | `0x0C 0x10`                               |
//!
//! Framing is pure. Executing commands is up to [`ll::AD9959`].
//!
//! [`ll::AD9959`]: ../ll/struct.AD9959.html

use core::{fmt, ops::Deref};

use byte::{ctx::BE, BytesExt as _};

use crate::{bits::BitString, transport::Endpoint};


/// Number of address bits in a register access
pub const ADDRESS_BITS: usize = 7;

/// The widest register of the AD9959
pub const MAX_PAYLOAD_BITS: usize = 32;

/// The longest frame: flag, address and a full-width payload
pub const MAX_FRAME_LEN: usize = 1 + ADDRESS_BITS + MAX_PAYLOAD_BITS;

const FLAG_WRITE: u8 = 0x00;
const FLAG_READ: u8 = 0x01;


/// A command for the USB bridge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Write `payload` to the register at `address`
    WriteRegister {
        /// Register address, 7 bits
        address: u8,
        /// Register contents, most significant bit first
        payload: &'a BitString,
    },

    /// Trigger the readout of the register at `address`
    ///
    /// Only meaningful while readback mode is enabled.
    ReadRegister {
        /// Register address, 7 bits
        address: u8,
    },

    /// Switch the bridge to readback mode, expecting `size` bytes
    BeginReadback {
        /// Number of bytes, one per register bit
        size: u8,
    },

    /// Return the bridge to normal mode
    EndReadback,

    /// Stage pending register writes
    LoadIo,

    /// Latch staged register writes into the live chip state
    UpdateIo,
}

impl<'a> Command<'a> {
    /// The endpoint this command is sent to
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Command::WriteRegister { .. } | Command::ReadRegister { .. } => Endpoint::Data,
            _ => Endpoint::Control,
        }
    }

    /// Frames the command
    ///
    /// Fails, if the address doesn't fit into 7 bits, or if the payload is
    /// wider than any AD9959 register.
    pub fn encode(&self) -> Result<Frame, byte::Error> {
        let mut frame = Frame {
            buffer: [0; MAX_FRAME_LEN],
            len: 0,
        };
        let buffer = &mut frame.buffer[..];
        let offset = &mut 0;

        match *self {
            Command::WriteRegister { address, payload } => {
                buffer.write_with::<u8>(offset, FLAG_WRITE, BE)?;
                write_address(buffer, offset, address)?;
                for bit in payload.to_wire() {
                    buffer.write_with::<u8>(offset, bit, BE)?;
                }
            }
            Command::ReadRegister { address } => {
                buffer.write_with::<u8>(offset, FLAG_READ, BE)?;
                write_address(buffer, offset, address)?;
            }
            Command::BeginReadback { size } => {
                for &b in [0x07, 0x00, size].iter() {
                    buffer.write_with::<u8>(offset, b, BE)?;
                }
            }
            Command::EndReadback => write_bytes(buffer, offset, &[0x04, 0x00])?,
            Command::LoadIo => write_bytes(buffer, offset, &[0x0C, 0x00])?,
            Command::UpdateIo => write_bytes(buffer, offset, &[0x0C, 0x10])?,
        }

        frame.len = *offset;
        Ok(frame)
    }
}

fn write_address(buffer: &mut [u8], offset: &mut usize, address: u8) -> Result<(), byte::Error> {
    if address >> ADDRESS_BITS != 0 {
        return Err(byte::Error::BadInput {
            err: "register address exceeds 7 bits",
        });
    }

    for shift in (0..ADDRESS_BITS).rev() {
        buffer.write_with::<u8>(offset, (address >> shift) & 1, BE)?;
    }

    Ok(())
}

fn write_bytes(buffer: &mut [u8], offset: &mut usize, bytes: &[u8]) -> Result<(), byte::Error> {
    for &b in bytes {
        buffer.write_with::<u8>(offset, b, BE)?;
    }

    Ok(())
}


/// A framed command, ready to be handed to the transport
#[derive(Clone, Copy)]
pub struct Frame {
    buffer: [u8; MAX_FRAME_LEN],
    len: usize,
}

impl Frame {
    /// The bytes of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Frame(")?;
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}


/// Parses the bytes read back from [`Endpoint::Readback`]
///
/// The bridge returns one `0x00`/`0x01` byte per register bit, most
/// significant bit first.
pub fn parse_readback(bytes: &[u8]) -> Result<BitString, byte::Error> {
    let offset = &mut 0;
    let mut bits = Vec::with_capacity(bytes.len());

    while *offset < bytes.len() {
        match bytes.read_with::<u8>(offset, BE)? {
            0x00 => bits.push(false),
            0x01 => bits.push(true),
            _ => {
                return Err(byte::Error::BadInput {
                    err: "readback byte is neither 0x00 nor 0x01",
                })
            }
        }
    }

    Ok(bits.into_iter().collect())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_write_expands_every_bit_to_a_byte() {
        let payload: BitString = "1011".parse().unwrap();
        let frame = Command::WriteRegister {
            address: 0x05,
            payload: &payload,
        }
        .encode()
        .unwrap();

        assert_eq!(frame.as_bytes(), [0, 0, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1]);
    }

    #[test]
    fn register_write_of_a_full_width_register() {
        let payload = BitString::from_uint(0xffff_ffff, 32);
        let frame = Command::WriteRegister {
            address: 0x04,
            payload: &payload,
        }
        .encode()
        .unwrap();

        assert_eq!(frame.len(), MAX_FRAME_LEN);
        assert_eq!(&frame[..8], [0, 0, 0, 0, 0, 1, 0, 0]);
        assert!(frame[8..].iter().all(|&b| b == 1));
    }

    #[test]
    fn register_write_rejects_oversized_payloads() {
        let payload = BitString::zeros(MAX_PAYLOAD_BITS + 1);
        let result = Command::WriteRegister {
            address: 0x04,
            payload: &payload,
        }
        .encode();

        assert!(result.is_err());
    }

    #[test]
    fn addresses_are_limited_to_seven_bits() {
        assert!(Command::ReadRegister { address: 0x7f }.encode().is_ok());
        assert!(Command::ReadRegister { address: 0x80 }.encode().is_err());
    }

    #[test]
    fn register_read_sets_the_read_flag() {
        let frame = Command::ReadRegister { address: 0x01 }.encode().unwrap();

        assert_eq!(frame.as_bytes(), [1, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(Command::ReadRegister { address: 0x01 }.endpoint(), Endpoint::Data);
    }

    #[test]
    fn control_commands() {
        let cases: [(Command, &[u8]); 4] = [
            (Command::BeginReadback { size: 24 }, &[0x07, 0x00, 0x18]),
            (Command::EndReadback, &[0x04, 0x00]),
            (Command::LoadIo, &[0x0C, 0x00]),
            (Command::UpdateIo, &[0x0C, 0x10]),
        ];

        for (command, bytes) in cases.iter() {
            assert_eq!(command.encode().unwrap().as_bytes(), *bytes);
            assert_eq!(command.endpoint(), Endpoint::Control);
        }
    }

    #[test]
    fn readback_parsing() {
        assert_eq!(parse_readback(&[1, 0, 0, 1]).unwrap().to_string(), "1001");
        assert!(parse_readback(&[]).unwrap().is_empty());
        assert!(parse_readback(&[0, 2]).is_err());
    }
}
