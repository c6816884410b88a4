//! Configuration structs and modulation settings
//!
//! [`DeviceConfig`] describes the board a driver talks to. The modulation
//! types in this module describe the settings that
//! [`AD9959::enable_modulation`] translates into register fields, and
//! [`ModulationTable`] holds the hardware-defined mapping between modulated
//! channel groups and profile pin configurations.
//!
//! [`AD9959::enable_modulation`]: ../hl/struct.AD9959.html#method.enable_modulation

use core::fmt;
use std::{collections::HashMap, time::Duration};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::{bits::BitString, channels::Channels};


/// Configuration of an evaluation board
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB vendor id of the bridge
    pub vendor_id: u16,
    /// USB product id of the bridge
    pub product_id: u16,
    /// Where the board is attached, to tell several identical boards apart
    ///
    /// If `None`, the first board with matching ids is used.
    pub location: Option<UsbLocation>,
    /// Frequency of the reference clock, in Hz
    pub reference_clock_frequency: f64,
    /// Latch every register write immediately
    ///
    /// If `false`, writes are only staged, and take effect on the next
    /// [`AD9959::io_update`].
    ///
    /// [`AD9959::io_update`]: ../hl/struct.AD9959.html#method.io_update
    pub auto_update: bool,
    /// Timeout for each bulk transfer
    pub timeout: Duration,
    /// Time the bridge needs between a read command and the readback
    pub readback_settle: Duration,
}

/// Position of a USB device in the bus topology
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbLocation {
    /// Number of the bus the device is attached to
    pub bus: u8,
    /// Port numbers from the root hub down to the device
    pub ports: Vec<u8>,
}


impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            vendor_id: 0x0456,
            product_id: 0xee25,
            location: None,
            reference_clock_frequency: 20e6,
            auto_update: true,
            timeout: Duration::from_secs(1),
            readback_settle: Duration::from_millis(100),
        }
    }
}


/// Number of modulation levels
///
/// The discriminant is the number of levels, so a level can be converted from
/// the plain integer with `ModulationLevel::try_from(4)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ModulationLevel {
    /// 2-level modulation, one profile pin per channel
    Two = 2,
    /// 4-level modulation of two channels
    Four = 4,
    /// 16-level modulation of a single channel
    Sixteen = 16,
}

impl ModulationLevel {
    /// The value of the modulation level field in function register 1
    pub fn bits(&self) -> BitString {
        let value = match self {
            ModulationLevel::Two => 0b00,
            ModulationLevel::Four => 0b01,
            ModulationLevel::Sixteen => 0b11,
        };
        BitString::from_uint(value, 2)
    }

    /// The number of channels that can be modulated at this level
    ///
    /// `None` for 2-level modulation, which works with any channel group.
    pub fn group_size(&self) -> Option<usize> {
        match self {
            ModulationLevel::Two => None,
            ModulationLevel::Four => Some(2),
            ModulationLevel::Sixteen => Some(1),
        }
    }
}


/// The quantity that is modulated
///
/// The discriminant is the channel's amplitude/frequency/phase select value.
/// Amplitude modulation is not supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ModulationType {
    /// Modulation disabled
    Disabled = 0b00,
    /// Frequency modulation
    Frequency = 0b10,
    /// Phase modulation
    Phase = 0b11,
}

impl ModulationType {
    /// The value of the modulation type field in the channel function register
    pub fn bits(&self) -> BitString {
        BitString::from_uint(u8::from(*self).into(), 2)
    }
}


/// Valid channel groups for 4-level modulation, with their profile pin
/// configuration
const FOUR_LEVEL_GROUPS: [(&[u8], u8); 6] = [
    (&[0, 1], 0b000),
    (&[0, 2], 0b001),
    (&[0, 3], 0b010),
    (&[1, 2], 0b011),
    (&[1, 3], 0b100),
    (&[2, 3], 0b101),
];

/// Valid channel groups for 16-level modulation, with their profile pin
/// configuration
const SIXTEEN_LEVEL_GROUPS: [(&[u8], u8); 4] = [
    (&[0], 0b000),
    (&[1], 0b001),
    (&[2], 0b010),
    (&[3], 0b011),
];

/// Width of the profile pin configuration field
const PPC_WIDTH: usize = 3;


/// Maps modulated channel groups to profile pin configurations
///
/// The AD9959 only has four profile pins, so at 4 and 16 levels only some
/// channel groups can be modulated. Each valid group corresponds to one value
/// of the profile pin configuration (PPC) field.
#[derive(Clone, Debug)]
pub struct ModulationTable {
    four_level: HashMap<Channels, u8>,
    sixteen_level: HashMap<Channels, u8>,
}

impl ModulationTable {
    /// Builds and validates the AD9959's table
    pub fn new() -> Result<Self, TableError> {
        Ok(ModulationTable {
            four_level: Self::build(ModulationLevel::Four, &FOUR_LEVEL_GROUPS)?,
            sixteen_level: Self::build(ModulationLevel::Sixteen, &SIXTEEN_LEVEL_GROUPS)?,
        })
    }

    /// Validates one level's list of `(channels, ppc)` entries
    ///
    /// Every group must have the size the level requires, and neither groups
    /// nor PPC values may repeat.
    pub fn build(
        level: ModulationLevel,
        entries: &[(&[u8], u8)],
    ) -> Result<HashMap<Channels, u8>, TableError> {
        let mut map = HashMap::with_capacity(entries.len());

        for &(channels, ppc) in entries {
            let group = Channels::new(channels)
                .map_err(|error| TableError::InvalidChannel(error.0))?;

            if let Some(expected) = level.group_size() {
                if group.len() != expected {
                    return Err(TableError::GroupSize {
                        level,
                        expected,
                        actual: group.len(),
                    });
                }
            }
            if ppc >> PPC_WIDTH != 0 {
                return Err(TableError::PpcOutOfRange(ppc));
            }
            if map.values().any(|&existing| existing == ppc) {
                return Err(TableError::DuplicatePpc(ppc));
            }
            if map.insert(group, ppc).is_some() {
                return Err(TableError::DuplicateGroup(group));
            }
        }

        Ok(map)
    }

    /// Looks up the profile pin configuration for a modulated channel group
    ///
    /// Returns `Ok(None)` for 2-level modulation, which leaves the PPC field
    /// alone.
    pub fn profile_pin_configuration(
        &self,
        level: ModulationLevel,
        channels: Channels,
    ) -> Result<Option<BitString>, UnsupportedChannelCombination> {
        let table = match level {
            ModulationLevel::Two => return Ok(None),
            ModulationLevel::Four => &self.four_level,
            ModulationLevel::Sixteen => &self.sixteen_level,
        };

        table
            .get(&channels)
            .map(|&ppc| Some(BitString::from_uint(ppc.into(), PPC_WIDTH)))
            .ok_or(UnsupportedChannelCombination { level, channels })
    }
}


/// The channel group can't be modulated at the requested level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsupportedChannelCombination {
    /// The requested modulation level
    pub level: ModulationLevel,
    /// The requested channel group
    pub channels: Channels,
}

impl fmt::Display for UnsupportedChannelCombination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "channels {:?} can't be modulated with {} levels",
            self.channels,
            u8::from(self.level)
        )
    }
}

impl std::error::Error for UnsupportedChannelCombination {}


/// A modulation table entry is invalid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableError {
    /// An entry names a channel that doesn't exist
    InvalidChannel(u8),

    /// An entry's group doesn't have the size its level requires
    GroupSize {
        /// Level of the table
        level: ModulationLevel,
        /// Required group size
        expected: usize,
        /// Size of the entry's group
        actual: usize,
    },

    /// A PPC value doesn't fit into its 3-bit field
    PpcOutOfRange(u8),

    /// Two entries share a channel group
    DuplicateGroup(Channels),

    /// Two entries share a PPC value
    DuplicatePpc(u8),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TableError::InvalidChannel(channel) => {
                write!(f, "table names nonexistent channel {}", channel)
            }
            TableError::GroupSize {
                level,
                expected,
                actual,
            } => write!(
                f,
                "{}-level groups have {} channels, found one with {}",
                u8::from(*level),
                expected,
                actual
            ),
            TableError::PpcOutOfRange(ppc) => write!(f, "PPC value {:#05b} exceeds 3 bits", ppc),
            TableError::DuplicateGroup(group) => write!(f, "group {:?} listed twice", group),
            TableError::DuplicatePpc(ppc) => write!(f, "PPC value {:#05b} listed twice", ppc),
        }
    }
}

impl std::error::Error for TableError {}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_evaluation_board() {
        let config = DeviceConfig::default();

        assert_eq!(config.vendor_id, 0x0456);
        assert_eq!(config.product_id, 0xee25);
        assert_eq!(config.reference_clock_frequency, 20e6);
        assert!(config.auto_update);
        assert_eq!(config.readback_settle, Duration::from_millis(100));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: DeviceConfig =
            serde_json::from_str(r#"{ "reference_clock_frequency": 25e6, "auto_update": false }"#)
                .unwrap();

        assert_eq!(config.reference_clock_frequency, 25e6);
        assert!(!config.auto_update);
        assert_eq!(config.product_id, 0xee25);
        assert_eq!(config.location, None);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_with_a_usb_location() {
        let config: DeviceConfig =
            serde_json::from_str(r#"{ "location": { "bus": 3, "ports": [1, 4] } }"#).unwrap();

        assert_eq!(
            config.location,
            Some(UsbLocation {
                bus: 3,
                ports: vec![1, 4],
            })
        );
        assert_eq!(config.vendor_id, 0x0456);
    }

    #[test]
    fn modulation_levels_from_integers() {
        assert_eq!(ModulationLevel::try_from(4).ok(), Some(ModulationLevel::Four));
        assert!(ModulationLevel::try_from(8).is_err());
        assert_eq!(ModulationLevel::Sixteen.bits().to_string(), "11");
        assert_eq!(ModulationType::Frequency.bits().to_string(), "10");
        assert_eq!(ModulationType::Disabled.bits().to_string(), "00");
    }

    #[test]
    fn hardware_table_is_valid() {
        let table = ModulationTable::new().unwrap();

        assert_eq!(table.four_level.len(), 6);
        assert_eq!(table.sixteen_level.len(), 4);
    }

    #[test]
    fn four_level_groups() {
        let table = ModulationTable::new().unwrap();
        let group = Channels::new(&[3, 1]).unwrap();

        assert_eq!(
            table
                .profile_pin_configuration(ModulationLevel::Four, group)
                .unwrap()
                .unwrap()
                .to_string(),
            "100"
        );

        let group = Channels::new(&[0, 1, 2]).unwrap();
        assert_eq!(
            table.profile_pin_configuration(ModulationLevel::Four, group),
            Err(UnsupportedChannelCombination {
                level: ModulationLevel::Four,
                channels: group
            })
        );
    }

    #[test]
    fn sixteen_level_groups() {
        let table = ModulationTable::new().unwrap();

        for channel in 0..4 {
            let ppc = table
                .profile_pin_configuration(ModulationLevel::Sixteen, Channels::single(channel).unwrap())
                .unwrap()
                .unwrap();
            assert_eq!(ppc.to_uint(), channel as u64);
        }
        assert!(table
            .profile_pin_configuration(ModulationLevel::Sixteen, Channels::new(&[0, 1]).unwrap())
            .is_err());
    }

    #[test]
    fn two_level_accepts_any_group() {
        let table = ModulationTable::new().unwrap();

        assert_eq!(
            table.profile_pin_configuration(ModulationLevel::Two, Channels::ALL),
            Ok(None)
        );
    }

    #[test]
    fn invalid_tables_are_rejected() {
        assert_eq!(
            ModulationTable::build(ModulationLevel::Four, &[(&[0, 1], 0), (&[1, 0], 1)]),
            Err(TableError::DuplicateGroup(Channels::new(&[0, 1]).unwrap()))
        );
        assert_eq!(
            ModulationTable::build(ModulationLevel::Four, &[(&[0, 1], 0), (&[2, 3], 0)]),
            Err(TableError::DuplicatePpc(0))
        );
        assert_eq!(
            ModulationTable::build(ModulationLevel::Sixteen, &[(&[0, 1], 0)]),
            Err(TableError::GroupSize {
                level: ModulationLevel::Sixteen,
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(
            ModulationTable::build(ModulationLevel::Four, &[(&[0, 5], 0)]),
            Err(TableError::InvalidChannel(5))
        );
        assert_eq!(
            ModulationTable::build(ModulationLevel::Sixteen, &[(&[0], 8)]),
            Err(TableError::PpcOutOfRange(8))
        );
        assert_eq!(
            ModulationTable::build(ModulationLevel::Four, &[(&[1, 1], 0)]),
            Err(TableError::GroupSize {
                level: ModulationLevel::Four,
                expected: 2,
                actual: 1
            })
        );
    }
}
