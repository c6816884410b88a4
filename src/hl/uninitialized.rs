use embedded_hal::blocking::delay::DelayMs;
use tracing::{debug, warn};

use crate::{
    channels::Channels,
    configs::{DeviceConfig, ModulationTable},
    ll,
    transport::{Open, Transport},
    Error, Ready, Uninitialized, AD9959,
};

impl<T, D> AD9959<T, D, Uninitialized>
where
    T: Transport,
    D: DelayMs<u32>,
{
    /// Create a new instance of `AD9959`
    ///
    /// Requires a transport connected to the evaluation board, and a delay
    /// used to let the bridge settle during register readback. Validates the
    /// modulation channel group table, but doesn't talk to the board yet.
    pub fn new(transport: T, delay: D, config: DeviceConfig) -> Result<Self, Error<T>> {
        let modulation_table = ModulationTable::new()?;

        Ok(AD9959 {
            ll: ll::AD9959::new(transport, delay, config.timeout, config.readback_settle),
            system_clock_frequency: config.reference_clock_frequency,
            auto_update: config.auto_update,
            selected: Channels::NONE,
            modulation_table,
            config,
            state: Uninitialized,
        })
    }

    /// Initialize the AD9959
    ///
    /// Configures the clock multiplier, which establishes the system clock
    /// frequency every later encoding depends on. If the board doesn't
    /// respond, because it's still busy with a previous client for example,
    /// the USB device is reset and the configuration is attempted once more.
    pub fn init(self, multiplier: u8) -> Result<AD9959<T, D, Ready>, Error<T>> {
        let mut dds = AD9959 {
            ll: self.ll,
            config: self.config,
            modulation_table: self.modulation_table,
            system_clock_frequency: self.system_clock_frequency,
            auto_update: self.auto_update,
            selected: self.selected,
            state: Ready,
        };

        match dds.set_clock_multiplier(multiplier) {
            Err(error) if error.is_transport() => {
                warn!(?error, "board didn't respond, resetting it");
                dds.ll.reset()?;
                dds.set_clock_multiplier(multiplier)?;
            }
            result => result?,
        }

        Ok(dds)
    }
}

impl<T, D> AD9959<T, D, Uninitialized>
where
    T: Open,
    D: DelayMs<u32>,
{
    /// Opens the board described by `config`
    ///
    /// Looks the board up by the vendor id, product id and, if given, the
    /// USB location in `config`, then proceeds like [`new`](#method.new).
    pub fn open(delay: D, config: DeviceConfig) -> Result<Self, Error<T>> {
        let transport = T::open(config.vendor_id, config.product_id, config.location.as_ref())
            .map_err(ll::Error::<T>::Transport)?;
        debug!(
            vendor_id = config.vendor_id,
            product_id = config.product_id,
            location = ?config.location,
            "opened board"
        );

        Self::new(transport, delay, config)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        configs::UsbLocation,
        ll::Register as _,
        mock::{MockBridge, MockDelay, MockError},
    };

    #[test]
    fn open_uses_the_configured_ids() {
        let bridge = MockBridge::new();
        bridge.attach(0x0456, 0xee25, None);

        let dds = AD9959::<MockBridge, MockDelay, Uninitialized>::open(
            bridge.delay(),
            DeviceConfig::default(),
        )
        .unwrap()
        .init(20)
        .unwrap();

        assert_eq!(dds.system_clock_frequency(), 400e6);
        assert_eq!(bridge.register(ll::FR1::ADDRESS, 0).len(), 24);
        assert!(bridge.transfer_count() > 0);
    }

    #[test]
    fn open_picks_the_board_at_the_configured_location() {
        let first = MockBridge::new();
        let second = MockBridge::new();
        let location = UsbLocation {
            bus: 2,
            ports: vec![1, 3],
        };
        first.attach(0x0456, 0xee25, Some(UsbLocation { bus: 1, ports: vec![2] }));
        second.attach(0x0456, 0xee25, Some(location.clone()));

        let config = DeviceConfig {
            location: Some(location),
            ..DeviceConfig::default()
        };
        AD9959::<MockBridge, MockDelay, Uninitialized>::open(second.delay(), config)
            .unwrap()
            .init(4)
            .unwrap();

        assert_eq!(first.transfer_count(), 0);
        assert!(second.transfer_count() > 0);
    }

    #[test]
    fn open_reports_a_missing_board() {
        let bridge = MockBridge::new();
        bridge.attach(0x0456, 0x0001, None);

        let result = AD9959::<MockBridge, MockDelay, Uninitialized>::open(
            bridge.delay(),
            DeviceConfig::default(),
        );

        assert!(matches!(
            result,
            Err(Error::Ll(ll::Error::Transport(MockError::NotFound)))
        ));
    }
}
