//! Immutable configuration for the SonicTag physical layer.
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Header block size in bytes: 2-byte symbol count + 4-byte mini-RS parity.
pub const HEADER_BLOCK_BYTES: usize = 6;
pub const HEADER_BLOCK_BITS: usize = HEADER_BLOCK_BYTES * 8;
pub const HEADER_MINI_RS_PARITY: usize = 4;

/// Configuration for a SonicTag transmitter/receiver pair.
///
/// Created once, validated eagerly, and read-only for the lifetime of any
/// `Transmitter`/`Receiver` built from it. Both endpoints of a link must be
/// constructed from equal configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SonicTagConfig {
    pub sample_rate: usize,
    pub fft_size: usize,
    pub cp_len: usize,
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    pub pilot_spacing: usize,
    pub rs_nsym: usize,
    pub chirp_duration_secs: f64,
    pub corr_threshold: f64,
}

impl Default for SonicTagConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 1024,
            cp_len: 256,
            band_low_hz: 17_500.0,
            band_high_hz: 20_500.0,
            pilot_spacing: 4,
            rs_nsym: 16,
            chirp_duration_secs: 0.05,
            corr_threshold: 0.5,
        }
    }
}

impl SonicTagConfig {
    /// Bin spacing in Hz: `sample_rate / fft_size`.
    pub fn bin_spacing_hz(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Guard silence samples between the chirp and the header symbol.
    pub fn guard_samples(&self) -> usize {
        (0.01 * self.sample_rate as f64).round() as usize
    }

    pub fn chirp_samples(&self) -> usize {
        (self.chirp_duration_secs * self.sample_rate as f64).round() as usize
    }

    pub fn symbol_samples(&self) -> usize {
        self.fft_size + self.cp_len
    }

    /// Active FFT bins: contiguous bins (excluding DC and Nyquist) whose
    /// center frequency falls inside `[band_low_hz, band_high_hz]`.
    pub fn active_bins(&self) -> Vec<usize> {
        let spacing = self.bin_spacing_hz();
        let nyquist_bin = self.fft_size / 2;
        (1..nyquist_bin)
            .filter(|&k| {
                let freq = k as f64 * spacing;
                freq >= self.band_low_hz && freq <= self.band_high_hz
            })
            .collect()
    }

    /// Pilot bins: every `pilot_spacing`-th active bin, by position in the
    /// active-bin list (index 0, `pilot_spacing`, `2*pilot_spacing`, ...).
    pub fn pilot_bins(&self) -> Vec<usize> {
        let active = self.active_bins();
        active
            .iter()
            .enumerate()
            .filter(|(i, _)| i % self.pilot_spacing == 0)
            .map(|(_, &k)| k)
            .collect()
    }

    /// Data bins: active bins that are not pilots, in ascending FFT-bin order.
    pub fn data_bins(&self) -> Vec<usize> {
        let pilots = self.pilot_bins();
        self.active_bins()
            .into_iter()
            .filter(|k| !pilots.contains(k))
            .collect()
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.data_bins().len()
    }

    /// Maximum payload bytes the RS block permits (`255 - 2 - 4 - rs_nsym`).
    pub fn max_payload_len(&self) -> usize {
        255usize.saturating_sub(2 + 4 + self.rs_nsym)
    }

    /// Upper bound on data symbols a well-formed frame can declare, derived
    /// from the largest possible RS block (255 bytes).
    pub fn max_data_symbols(&self) -> usize {
        let max_block_bits = 255 * 8;
        let bits_per_symbol = self.bits_per_symbol().max(1);
        (max_block_bits + bits_per_symbol - 1) / bits_per_symbol
    }

    pub fn max_frame_samples(&self) -> usize {
        self.chirp_samples()
            + self.guard_samples()
            + self.symbol_samples() * (1 + self.max_data_symbols())
    }

    /// Validate the configuration, returning the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate { rate: self.sample_rate });
        }
        if !self.fft_size.is_power_of_two() {
            return Err(ConfigError::FftSizeNotPowerOfTwo { size: self.fft_size });
        }
        if self.cp_len == 0 || self.cp_len >= self.fft_size {
            return Err(ConfigError::InvalidCyclicPrefix {
                cp_len: self.cp_len,
                fft_size: self.fft_size,
            });
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        if self.band_high_hz >= nyquist {
            return Err(ConfigError::NyquistViolation {
                band_high_hz: self.band_high_hz,
                nyquist_hz: nyquist,
            });
        }
        if self.band_low_hz <= 0.0 || self.band_low_hz >= self.band_high_hz {
            return Err(ConfigError::InvalidBand {
                band_low_hz: self.band_low_hz,
                band_high_hz: self.band_high_hz,
            });
        }
        if self.pilot_spacing == 0 {
            return Err(ConfigError::InvalidPilotSpacing { spacing: self.pilot_spacing });
        }
        if self.rs_nsym == 0 || 2 + 4 + self.rs_nsym >= 255 {
            return Err(ConfigError::InvalidRsParity { rs_nsym: self.rs_nsym });
        }
        if self.active_bins().is_empty() {
            return Err(ConfigError::EmptyActiveBand {
                band_low_hz: self.band_low_hz,
                band_high_hz: self.band_high_hz,
            });
        }
        if self.data_bins().is_empty() {
            return Err(ConfigError::NoDataBins);
        }
        if self.bits_per_symbol() < HEADER_BLOCK_BITS {
            return Err(ConfigError::HeaderDoesNotFit {
                bits_per_symbol: self.bits_per_symbol(),
                header_bits: HEADER_BLOCK_BITS,
            });
        }
        if self.corr_threshold <= 0.0 || self.corr_threshold > 1.0 {
            return Err(ConfigError::InvalidCorrThreshold { threshold: self.corr_threshold });
        }
        Ok(())
    }
}
