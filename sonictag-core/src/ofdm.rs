//! Bits <-> time-domain samples: differential BPSK across active subcarriers,
//! IFFT/FFT, cyclic prefix, Hermitian symmetry, pilot-based phase correction.
use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::config::SonicTagConfig;
use crate::errors::DspError;

/// Target peak amplitude of a synthesized time-domain symbol, before the
/// cyclic prefix is prepended.
const SYMBOL_PEAK: f64 = 0.9;

/// Bins whose magnitude, relative to the symbol's RMS, falls below this
/// floor are erasure-marked rather than sliced.
const ERASURE_FLOOR_RATIO: f64 = 0.05;

pub struct Ofdm {
    fft_size: usize,
    cp_len: usize,
    pilot_bins: Vec<usize>,
    data_bins: Vec<usize>,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
}

/// Result of demodulating one OFDM symbol.
pub struct Demodulated {
    pub bits: Vec<bool>,
    pub erasures: Vec<bool>,
    pub spectrum: Vec<Complex64>,
}

impl Ofdm {
    pub fn new(config: &SonicTagConfig) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        let ifft = planner.plan_fft_inverse(config.fft_size);
        Self {
            fft_size: config.fft_size,
            cp_len: config.cp_len,
            pilot_bins: config.pilot_bins(),
            data_bins: config.data_bins(),
            fft,
            ifft,
        }
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.data_bins.len()
    }

    pub fn data_bins(&self) -> &[usize] {
        &self.data_bins
    }

    /// Modulate one symbol's worth of bits (`bits.len() <= bits_per_symbol`,
    /// zero-padded if shorter) using differential BPSK against `phase_state`
    /// (one entry per data bin, updated in place for the next call). Returns
    /// the time-domain samples (with cyclic prefix) and the full spectrum,
    /// which the caller keeps as the differential reference for the next
    /// symbol.
    pub fn modulate_symbol(&self, bits: &[bool], phase_state: &mut [f64]) -> (Vec<f64>, Vec<Complex64>) {
        debug_assert_eq!(phase_state.len(), self.data_bins.len());
        let mut spectrum = vec![Complex64::new(0.0, 0.0); self.fft_size];

        for &bin in &self.pilot_bins {
            spectrum[bin] = Complex64::new(1.0, 0.0);
        }

        for (i, &bin) in self.data_bins.iter().enumerate() {
            let bit = bits.get(i).copied().unwrap_or(false);
            if bit {
                phase_state[i] += PI;
            }
            spectrum[bin] = Complex64::from_polar(1.0, phase_state[i]);
        }

        self.enforce_hermitian_symmetry(&mut spectrum);

        let samples = self.ifft_to_time_domain(&spectrum);
        (samples, spectrum)
    }

    /// Demodulate one received symbol (already CP-stripped or with CP still
    /// attached; `samples.len()` must be exactly `fft_size + cp_len`).
    /// `prev_spectrum` is the previous symbol's full spectrum (the header
    /// symbol's spectrum for the first data symbol).
    pub fn demodulate_symbol(
        &self,
        samples: &[f64],
        prev_spectrum: &[Complex64],
    ) -> Result<Demodulated, DspError> {
        if samples.len() < self.fft_size + self.cp_len {
            return Err(DspError::Truncated);
        }

        let body = &samples[self.cp_len..self.cp_len + self.fft_size];
        let mut buffer: Vec<Complex64> = body.iter().map(|&s| Complex64::new(s, 0.0)).collect();
        self.fft.process(&mut buffer);

        let rms = (buffer.iter().map(|c| c.norm_sqr()).sum::<f64>() / buffer.len() as f64).sqrt();
        let floor = rms * ERASURE_FLOOR_RATIO;

        let pilot_correction = if self.pilot_bins.is_empty() {
            0.0
        } else {
            let sum: f64 = self
                .pilot_bins
                .iter()
                .map(|&bin| (buffer[bin] * prev_spectrum[bin].conj()).arg())
                .sum();
            sum / self.pilot_bins.len() as f64
        };

        let mut bits = Vec::with_capacity(self.data_bins.len());
        let mut erasures = Vec::with_capacity(self.data_bins.len());
        for &bin in &self.data_bins {
            erasures.push(buffer[bin].norm() < floor);
            let delta = (buffer[bin] * prev_spectrum[bin].conj()).arg() - pilot_correction;
            let wrapped = wrap_to_pi(delta);
            bits.push(wrapped.abs() >= PI / 2.0);
        }

        Ok(Demodulated {
            bits,
            erasures,
            spectrum: buffer,
        })
    }

    /// Inverse FFT, cyclic-prefix, and peak-normalize to [`SYMBOL_PEAK`].
    fn ifft_to_time_domain(&self, spectrum: &[Complex64]) -> Vec<f64> {
        let mut buffer = spectrum.to_vec();
        self.ifft.process(&mut buffer);
        let scale = 1.0 / self.fft_size as f64;
        let mut samples: Vec<f64> = buffer.iter().map(|c| c.re * scale).collect();

        let peak = samples.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        if peak > 0.0 {
            let gain = SYMBOL_PEAK / peak;
            for s in samples.iter_mut() {
                *s *= gain;
            }
        }

        let mut with_cp = Vec::with_capacity(self.fft_size + self.cp_len);
        with_cp.extend_from_slice(&samples[self.fft_size - self.cp_len..]);
        with_cp.extend_from_slice(&samples);
        with_cp
    }

    fn enforce_hermitian_symmetry(&self, spectrum: &mut [Complex64]) {
        let n = self.fft_size;
        spectrum[0] = Complex64::new(0.0, 0.0);
        spectrum[n / 2] = Complex64::new(0.0, 0.0);
        for k in 1..n / 2 {
            spectrum[n - k] = spectrum[k].conj();
        }
    }
}

fn wrap_to_pi(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ofdm() -> Ofdm {
        Ofdm::new(&SonicTagConfig::default())
    }

    #[test]
    fn symbol_has_cp_plus_fft_length() {
        let ofdm = ofdm();
        let mut phase = vec![0.0; ofdm.bits_per_symbol()];
        let (samples, _) = ofdm.modulate_symbol(&[], &mut phase);
        assert_eq!(samples.len(), ofdm.fft_size + ofdm.cp_len);
    }

    #[test]
    fn cyclic_prefix_matches_tail() {
        let ofdm = ofdm();
        let bits: Vec<bool> = (0..ofdm.bits_per_symbol()).map(|i| i % 3 == 0).collect();
        let mut phase = vec![0.0; ofdm.bits_per_symbol()];
        let (samples, _) = ofdm.modulate_symbol(&bits, &mut phase);
        let tail = &samples[ofdm.fft_size..];
        let body_tail = &samples[ofdm.cp_len..ofdm.cp_len + ofdm.cp_len];
        for (a, b) in tail.iter().zip(body_tail.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn samples_are_peak_normalized() {
        let ofdm = ofdm();
        let bits: Vec<bool> = (0..ofdm.bits_per_symbol()).map(|i| i % 2 == 0).collect();
        let mut phase = vec![0.0; ofdm.bits_per_symbol()];
        let (samples, _) = ofdm.modulate_symbol(&bits, &mut phase);
        let peak = samples.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        assert_abs_diff_eq!(peak, SYMBOL_PEAK, epsilon = 1e-6);
    }

    #[test]
    fn roundtrip_single_symbol_recovers_bits() {
        let ofdm = ofdm();
        let n = ofdm.bits_per_symbol();
        let bits: Vec<bool> = (0..n).map(|i| i % 5 == 0).collect();

        let ref_spectrum = vec![Complex64::new(1.0, 0.0); ofdm.fft_size];
        let mut phase = vec![0.0; n];
        let (samples, spectrum) = ofdm.modulate_symbol(&bits, &mut phase);

        let demod = ofdm.demodulate_symbol(&samples, &ref_spectrum).unwrap();
        assert_eq!(demod.bits, bits);
        assert_eq!(demod.spectrum.len(), spectrum.len());
    }

    #[test]
    fn differential_chain_roundtrips_across_symbols() {
        let ofdm = ofdm();
        let n = ofdm.bits_per_symbol();
        let bits_a: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();
        let bits_b: Vec<bool> = (0..n).map(|i| i % 3 == 0).collect();

        let mut phase = vec![0.0; n];
        let (samples_a, spec_a) = ofdm.modulate_symbol(&bits_a, &mut phase);
        let (samples_b, _spec_b) = ofdm.modulate_symbol(&bits_b, &mut phase);

        let header_ref = vec![Complex64::new(1.0, 0.0); ofdm.fft_size];
        let demod_a = ofdm.demodulate_symbol(&samples_a, &header_ref).unwrap();
        assert_eq!(demod_a.bits, bits_a);
        assert_eq!(demod_a.spectrum, spec_a);

        let demod_b = ofdm.demodulate_symbol(&samples_b, &demod_a.spectrum).unwrap();
        assert_eq!(demod_b.bits, bits_b);
    }

    #[test]
    fn hermitian_symmetry_yields_real_time_domain() {
        let ofdm = ofdm();
        let n = ofdm.bits_per_symbol();
        let bits: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();
        let mut phase = vec![0.0; n];
        let (_, spectrum) = ofdm.modulate_symbol(&bits, &mut phase);
        assert_eq!(spectrum[0], Complex64::new(0.0, 0.0));
        assert_eq!(spectrum[ofdm.fft_size / 2], Complex64::new(0.0, 0.0));
        for k in 1..ofdm.fft_size / 2 {
            let diff = spectrum[ofdm.fft_size - k] - spectrum[k].conj();
            assert_abs_diff_eq!(diff.norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn truncated_symbol_is_rejected() {
        let ofdm = ofdm();
        let ref_spectrum = vec![Complex64::new(1.0, 0.0); ofdm.fft_size];
        let short = vec![0.0; ofdm.fft_size];
        assert!(matches!(
            ofdm.demodulate_symbol(&short, &ref_spectrum),
            Err(DspError::Truncated)
        ));
    }

    #[test]
    fn silent_bin_is_erasure_marked() {
        let ofdm = ofdm();
        let n = ofdm.bits_per_symbol();
        let mut phase = vec![0.0; n];
        let (samples, _) = ofdm.modulate_symbol(&vec![false; n], &mut phase);
        // A fully zero symbol should erasure-mark every data bin: no signal
        // energy anywhere means every bin is below the RMS floor.
        let silence = vec![0.0; samples.len()];
        let ref_spectrum = vec![Complex64::new(1.0, 0.0); ofdm.fft_size];
        let demod = ofdm.demodulate_symbol(&silence, &ref_spectrum).unwrap();
        assert!(demod.erasures.iter().all(|&e| e));
    }
}
