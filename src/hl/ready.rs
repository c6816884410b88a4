use embedded_hal::blocking::delay::DelayMs;
use tracing::{debug, info, warn};

use crate::{
    bits::BitString,
    channels::Channels,
    codec::{self, TuningWord, PHASE_SCALE, PHASE_WIDTH},
    ll::{self, cfr, csr, fr1, Register as _},
    transport::Transport,
    Error, InvalidArgument, Ready, AD9959,
};

/// System clocks above this frequency require the VCO gain bit
const VCO_GAIN_THRESHOLD: f64 = 255e6;

impl<T, D> AD9959<T, D, Ready>
where
    T: Transport,
    D: DelayMs<u32>,
{
    /// Sets the multiplier for the reference clock
    ///
    /// The system clock frequency is `factor` times the reference clock
    /// frequency. A `factor` of 1 disables the PLL, other factors must be
    /// between 4 and 20. The VCO gain bit is set whenever the resulting
    /// system clock exceeds 255 MHz.
    ///
    /// Tuning words computed before this call, including
    /// [`precompute_frequency`](#method.precompute_frequency)'s, are invalid
    /// afterwards.
    pub fn set_clock_multiplier(&mut self, factor: u8) -> Result<(), Error<T>> {
        let divider = match factor {
            1 => 0,
            4..=20 => factor,
            _ => return Err(InvalidArgument::ClockMultiplier(factor).into()),
        };
        let system_clock_frequency = self.reference_clock_frequency() * f64::from(factor);
        let vco_gain = system_clock_frequency > VCO_GAIN_THRESHOLD;
        let divider = BitString::from_uint(divider.into(), fr1::CLOCK_MULTIPLIER.width());

        self.ll.fr1().modify(|fr1| {
            let fr1 = fr1::CLOCK_MULTIPLIER.set(fr1, &divider)?;
            if vco_gain {
                fr1::VCO_GAIN.set(&fr1, &BitString::from_uint(1, 1))
            } else {
                Ok(fr1)
            }
        })?;
        if vco_gain {
            warn!(system_clock_frequency, "system clock exceeds 255 MHz, VCO gain bit set");
        }

        // The write went through, so the chip has the new multiplier staged.
        self.system_clock_frequency = system_clock_frequency;
        self.latch()?;

        info!(factor, system_clock_frequency, "clock multiplier set");
        Ok(())
    }

    /// Sets a new frequency for the given channels
    ///
    /// `frequency` is in Hz and may not exceed the system clock frequency.
    /// The closest frequency the chip can produce is logged.
    ///
    /// `channel_word` 0 is the channel's frequency tuning word. Channel words
    /// 1 to 16 are the profile registers used by modulation and linear
    /// sweeps.
    pub fn set_frequency(
        &mut self,
        frequency: f64,
        channels: &[u8],
        channel_word: u8,
    ) -> Result<(), Error<T>> {
        let channels = Self::non_empty(channels)?;
        let address = Self::channel_word_address(channel_word)?;
        let word = self.precompute_frequency(frequency)?;

        self.write_tuning_word(&word, channels, address)
    }

    /// Computes the tuning word for `frequency` without talking to the chip
    ///
    /// Apply it with
    /// [`set_precomputed_frequency`](#method.set_precomputed_frequency).
    pub fn precompute_frequency(&self, frequency: f64) -> Result<TuningWord, Error<T>> {
        TuningWord::new(frequency, self.system_clock_frequency).map_err(|range| {
            InvalidArgument::OutOfRange {
                argument: "frequency",
                range,
            }
            .into()
        })
    }

    /// Applies a tuning word computed by
    /// [`precompute_frequency`](#method.precompute_frequency)
    ///
    /// Fails, if the system clock changed since the word was computed. The
    /// write is latched like any other write.
    pub fn set_precomputed_frequency(
        &mut self,
        word: &TuningWord,
        channels: &[u8],
        channel_word: u8,
    ) -> Result<(), Error<T>> {
        let channels = Self::non_empty(channels)?;
        let address = Self::channel_word_address(channel_word)?;
        if word.system_clock_frequency() != self.system_clock_frequency {
            return Err(InvalidArgument::StaleTuningWord {
                computed_for: word.system_clock_frequency(),
                current: self.system_clock_frequency,
            }
            .into());
        }

        self.write_tuning_word(word, channels, address)
    }

    fn write_tuning_word(
        &mut self,
        word: &TuningWord,
        channels: Channels,
        address: u8,
    ) -> Result<(), Error<T>> {
        self.select(channels)?;
        self.ll.write_register(address, word.bits())?;
        self.latch()?;

        info!(
            frequency = word.frequency(),
            ?channels,
            address,
            "frequency set to closest possible value"
        );
        Ok(())
    }

    /// Sets the phase offset for the given channels
    ///
    /// `phase` is in degrees, between 0 and 360.
    pub fn set_phase(&mut self, phase: f64, channels: &[u8]) -> Result<(), Error<T>> {
        let channels = Self::non_empty(channels)?;
        let bits = codec::encode_checked(phase, PHASE_WIDTH, PHASE_SCALE).map_err(|range| {
            InvalidArgument::OutOfRange {
                argument: "phase",
                range,
            }
        })?;

        self.select(channels)?;
        self.ll.cpow0().write(&bits)?;
        self.latch()?;

        info!(
            phase = codec::decode(&bits, PHASE_SCALE),
            ?channels,
            "phase set to closest possible value"
        );
        Ok(())
    }

    /// Flips the autoclear phase accumulator bit of each given channel
    ///
    /// Each channel's function register is read, modified and staged on its
    /// own, so channels with different settings each get theirs flipped. All
    /// channels are latched together at the end.
    pub fn toggle_autoclear_phase_accumulation(&mut self, channels: &[u8]) -> Result<(), Error<T>> {
        let channels = Self::non_empty(channels)?;

        for channel in channels.iter() {
            self.select(Channels::single(channel)?)?;
            let cfr = self.ll.cfr().modify(|cfr| {
                let flipped = cfr::AUTOCLEAR_PHASE.get(cfr)?.to_uint() ^ 1;
                cfr::AUTOCLEAR_PHASE.set(cfr, &BitString::from_uint(flipped, 1))
            })?;
            self.stage()?;

            let autoclear = cfr::AUTOCLEAR_PHASE.get(&cfr)?.to_uint();
            debug!(channel, autoclear, "autoclear phase accumulator toggled");
        }

        self.commit()
    }

    /// Reads back the frequency of a channel, in Hz
    ///
    /// Decodes the live tuning word against the current system clock.
    pub fn frequency(&mut self, channel: u8, channel_word: u8) -> Result<f64, Error<T>> {
        let channels = Channels::single(channel)?;
        let address = Self::channel_word_address(channel_word)?;

        self.select(channels)?;
        let bits = self.ll.read_register(address)?;

        Ok(codec::decode(&bits, self.system_clock_frequency))
    }

    /// Reads back the phase offset of a channel, in degrees
    pub fn phase(&mut self, channel: u8) -> Result<f64, Error<T>> {
        let channels = Channels::single(channel)?;

        self.select(channels)?;
        let bits = self.ll.cpow0().read()?;

        Ok(codec::decode(&bits, PHASE_SCALE))
    }

    /// Latches all staged register writes
    ///
    /// Only needed if auto-update is disabled, or to recover from
    /// [`Error::NotUpdated`].
    ///
    /// [`Error::NotUpdated`]: enum.Error.html#variant.NotUpdated
    pub fn io_update(&mut self) -> Result<(), Error<T>> {
        let status = self.ll.update_io().map_err(Error::NotUpdated)?;
        debug!(status, "staged writes latched");

        Ok(())
    }

    /// Enables or disables latching after every write
    ///
    /// With auto-update disabled, writes are only staged. Several writes can
    /// then be latched at once with [`io_update`](#method.io_update).
    pub fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
    }

    /// Selects `channels` in the channel select register
    ///
    /// Only the channel enable nibble is replaced, the serial I/O settings in
    /// the rest of the register are kept.
    pub(super) fn select(&mut self, channels: Channels) -> Result<(), Error<T>> {
        let mask = channels.select_mask();
        self.ll
            .csr()
            .modify(|csr| csr::CHANNEL_ENABLE.set(csr, &mask))?;
        self.selected = channels;

        debug!(?channels, %mask, "channels selected");
        Ok(())
    }

    /// Stages the preceding write, and latches it if auto-update is enabled
    pub(super) fn latch(&mut self) -> Result<(), Error<T>> {
        self.stage()?;
        self.commit()
    }

    /// Stages the preceding write without latching it
    ///
    /// Operations that write several registers stage each of them and
    /// [`commit`](#method.commit) once at the end, so a failed Update I/O
    /// always leaves the complete operation staged.
    pub(super) fn stage(&mut self) -> Result<(), Error<T>> {
        let status = self.ll.load_io().map_err(Error::LoadFailed)?;
        debug!(status, "write staged");

        Ok(())
    }

    /// Latches everything staged so far, if auto-update is enabled
    pub(super) fn commit(&mut self) -> Result<(), Error<T>> {
        if self.auto_update {
            self.io_update()?;
        }

        Ok(())
    }

    /// Validates a channel list that must not be empty
    pub(super) fn non_empty(channels: &[u8]) -> Result<Channels, Error<T>> {
        let channels = Channels::new(channels)?;
        if channels.is_empty() {
            return Err(InvalidArgument::NoChannels.into());
        }

        Ok(channels)
    }

    /// The register address of a channel word
    ///
    /// Word 0 is the frequency tuning word, words 1 to 16 are the channel word
    /// registers.
    fn channel_word_address(channel_word: u8) -> Result<u8, Error<T>> {
        match channel_word {
            0 => Ok(ll::CFTW0::ADDRESS),
            1..=ll::CHANNEL_WORDS => Ok(ll::CHANNEL_WORD_BASE + channel_word - 1),
            _ => Err(InvalidArgument::ChannelWord(channel_word).into()),
        }
    }
}
