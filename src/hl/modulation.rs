use embedded_hal::blocking::delay::DelayMs;
use tracing::{debug, info, warn};

use crate::{
    bits::BitString,
    channels::Channels,
    codec::{self, RampRate, FREQUENCY_WIDTH},
    configs::{ModulationLevel, ModulationType},
    ll::{cfr, fr1, lsrr, Register as _, LSRR},
    transport::Transport,
    Error, InvalidArgument, Ready, AD9959,
};

impl<T, D> AD9959<T, D, Ready>
where
    T: Transport,
    D: DelayMs<u32>,
{
    /// Enables modulation for a group of channels
    ///
    /// `level` is the number of modulation levels: 2, 4 or 16. With 2 levels
    /// any channels can be modulated. With 4 levels, exactly two channels
    /// share the profile pins, with 16 levels a single channel uses all of
    /// them.
    ///
    /// Sets the modulation level and profile pin configuration, then the
    /// modulation type of every channel in the group, one at a time. Each
    /// write is staged, and all of them are latched together. The
    /// modulated values are the channel words, see
    /// [`set_frequency`](#method.set_frequency).
    pub fn enable_modulation(
        &mut self,
        level: u8,
        channels: &[u8],
        modulation_type: ModulationType,
    ) -> Result<(), Error<T>> {
        let level =
            ModulationLevel::try_from(level).map_err(|_| InvalidArgument::ModulationLevel(level))?;
        let channels = Self::non_empty(channels)?;
        let ppc = self
            .modulation_table
            .profile_pin_configuration(level, channels)?;

        self.ll.fr1().modify(|fr1| {
            let fr1 = fr1::MODULATION_LEVEL.set(fr1, &level.bits())?;
            match &ppc {
                Some(ppc) => fr1::PROFILE_PIN_CONFIG.set(&fr1, ppc),
                None => Ok(fr1),
            }
        })?;
        self.stage()?;
        debug!(?level, ppc = ?ppc.as_ref().map(ToString::to_string), "modulation level set");

        self.set_modulation_type(channels, modulation_type)?;
        self.commit()?;

        info!(?level, ?channels, ?modulation_type, "modulation enabled");
        Ok(())
    }

    /// Disables modulation for the given channels
    ///
    /// Leaves the global modulation level alone, as other channels may still
    /// be modulated.
    pub fn disable_modulation(&mut self, channels: &[u8]) -> Result<(), Error<T>> {
        let channels = Self::non_empty(channels)?;
        self.set_modulation_type(channels, ModulationType::Disabled)?;
        self.commit()?;

        info!(?channels, "modulation disabled");
        Ok(())
    }

    fn set_modulation_type(
        &mut self,
        channels: Channels,
        modulation_type: ModulationType,
    ) -> Result<(), Error<T>> {
        let bits = modulation_type.bits();

        for channel in channels.iter() {
            self.select(Channels::single(channel)?)?;
            self.ll
                .cfr()
                .modify(|cfr| cfr::MODULATION_TYPE.set(cfr, &bits))?;
            self.stage()?;
        }

        Ok(())
    }

    /// Configures linear sweeps for the given channels
    ///
    /// `rising_ramp_rate` and `falling_ramp_rate` are the times per sweep
    /// step, in seconds. The chip supports 1 to 256 steps of `4 / f_sys`.
    /// Rates outside of that range are clamped, not rejected.
    ///
    /// `rising_delta` and `falling_delta` are the frequency steps, in Hz. They
    /// may not exceed the system clock frequency.
    ///
    /// The sweep runs between the channel's frequency tuning word and channel
    /// word 1, and requires frequency modulation to be enabled at 2 levels.
    ///
    /// If `disable` is set, only the linear sweep enable bit is cleared and
    /// all other arguments are ignored.
    pub fn configure_linear_sweep(
        &mut self,
        channels: &[u8],
        rising_ramp_rate: f64,
        falling_ramp_rate: f64,
        rising_delta: f64,
        falling_delta: f64,
        disable: bool,
    ) -> Result<(), Error<T>> {
        let channels = Self::non_empty(channels)?;

        if disable {
            self.set_linear_sweep_enable(channels, false)?;
            self.commit()?;

            info!(?channels, "linear sweep disabled");
            return Ok(());
        }

        let fsys = self.system_clock_frequency;
        let rising_delta = self.delta_word("rising delta", rising_delta)?;
        let falling_delta = self.delta_word("falling delta", falling_delta)?;
        let rising = ramp_rate("rising", rising_ramp_rate, fsys);
        let falling = ramp_rate("falling", falling_ramp_rate, fsys);

        let rates = BitString::zeros(LSRR::WIDTH);
        let rates = lsrr::RISING.set(&rates, &rising.bits())?;
        let rates = lsrr::FALLING.set(&rates, &falling.bits())?;

        self.select(channels)?;
        self.ll.lsrr().write(&rates)?;
        self.ll.rdw().write(&rising_delta)?;
        self.ll.fdw().write(&falling_delta)?;
        self.stage()?;

        self.set_linear_sweep_enable(channels, true)?;
        self.commit()?;

        info!(
            ?channels,
            rising_ramp_rate = rising.rate(fsys),
            falling_ramp_rate = falling.rate(fsys),
            rising_delta = codec::decode(&rising_delta, fsys),
            falling_delta = codec::decode(&falling_delta, fsys),
            "linear sweep configured"
        );
        Ok(())
    }

    fn delta_word(&self, argument: &'static str, delta: f64) -> Result<BitString, Error<T>> {
        codec::encode_checked(delta, FREQUENCY_WIDTH, self.system_clock_frequency)
            .map_err(|range| InvalidArgument::OutOfRange { argument, range }.into())
    }

    fn set_linear_sweep_enable(&mut self, channels: Channels, enable: bool) -> Result<(), Error<T>> {
        let bit = BitString::from_uint(enable.into(), 1);

        for channel in channels.iter() {
            self.select(Channels::single(channel)?)?;
            self.ll
                .cfr()
                .modify(|cfr| cfr::LINEAR_SWEEP_ENABLE.set(cfr, &bit))?;
            self.stage()?;
        }

        Ok(())
    }
}

fn ramp_rate(direction: &'static str, rate: f64, system_clock_frequency: f64) -> RampRate {
    let ramp_rate = RampRate::encode(rate, system_clock_frequency);
    if ramp_rate.clamped {
        warn!(
            direction,
            requested = rate,
            actual = ramp_rate.rate(system_clock_frequency),
            "sweep ramp rate out of range, clamped"
        );
    }

    ramp_rate
}
