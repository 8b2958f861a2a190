//! Chirp generation and matched-filter detection for frame synchronization.
use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::config::SonicTagConfig;

/// Once the rolling buffer exceeds this multiple of the chirp length,
/// detection switches from direct time-domain correlation to overlap-save
/// block FFT convolution.
const OVERLAP_SAVE_THRESHOLD: usize = 4;

/// A candidate chirp detection: the sample offset of the chirp's first
/// sample and its normalized correlation peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub offset: usize,
    pub peak: f64,
}

pub struct ChirpSync {
    chirp: Vec<f64>,
    matched_filter: Vec<f64>,
    energy: f64,
    threshold: f64,
    fft_len: usize,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    kernel_freq: Vec<Complex64>,
}

impl ChirpSync {
    pub fn new(config: &SonicTagConfig) -> Self {
        let chirp = generate_chirp(config);
        let matched_filter: Vec<f64> = chirp.iter().rev().copied().collect();
        let energy: f64 = chirp.iter().map(|&s| s * s).sum();

        let fft_len = (chirp.len() * (OVERLAP_SAVE_THRESHOLD + 1)).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_len);
        let ifft = planner.plan_fft_inverse(fft_len);

        let mut kernel_freq: Vec<Complex64> = matched_filter
            .iter()
            .map(|&s| Complex64::new(s, 0.0))
            .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
            .take(fft_len)
            .collect();
        fft.process(&mut kernel_freq);

        Self {
            chirp,
            matched_filter,
            energy,
            threshold: config.corr_threshold,
            fft_len,
            fft,
            ifft,
            kernel_freq,
        }
    }

    pub fn chirp_len(&self) -> usize {
        self.chirp.len()
    }

    pub fn chirp_samples(&self) -> &[f64] {
        &self.chirp
    }

    /// Run matched-filter detection over `buffer`, returning the strongest
    /// detection whose normalized correlation exceeds the configured
    /// threshold and dominates any other candidate within one chirp length.
    pub fn detect(&self, buffer: &[f64]) -> Option<Detection> {
        if buffer.len() < self.chirp.len() {
            return None;
        }

        let corr = if buffer.len() > self.chirp.len() * OVERLAP_SAVE_THRESHOLD {
            self.correlate_overlap_save(buffer)
        } else {
            self.correlate_direct(buffer)
        };

        self.pick_peak(&corr)
    }

    fn correlate_direct(&self, buffer: &[f64]) -> Vec<f64> {
        let chirp_len = self.chirp.len();
        let n_positions = buffer.len() - chirp_len + 1;
        let mut out = Vec::with_capacity(n_positions);
        let mut local_energy = 0.0;
        for &s in &buffer[0..chirp_len.min(buffer.len())] {
            local_energy += s * s;
        }

        for n in 0..n_positions {
            if n > 0 {
                local_energy -= buffer[n - 1] * buffer[n - 1];
                local_energy += buffer[n + chirp_len - 1] * buffer[n + chirp_len - 1];
            }
            let window = &buffer[n..n + chirp_len];
            let dot: f64 = window
                .iter()
                .zip(self.chirp.iter())
                .map(|(&x, &h)| x * h)
                .sum();
            let denom = (local_energy.max(1e-12) * self.energy).sqrt();
            out.push(dot / denom);
        }
        out
    }

    fn correlate_overlap_save(&self, buffer: &[f64]) -> Vec<f64> {
        let chirp_len = self.chirp.len();
        let block_valid = self.fft_len - chirp_len + 1;
        let mut out = vec![0.0; buffer.len() - chirp_len + 1];

        let mut local_energy = vec![0.0; buffer.len()];
        let mut running = 0.0;
        for i in 0..buffer.len() {
            running += buffer[i] * buffer[i];
            if i >= chirp_len {
                running -= buffer[i - chirp_len] * buffer[i - chirp_len];
            }
            if i + 1 >= chirp_len {
                local_energy[i + 1 - chirp_len] = running;
            }
        }

        let mut start = 0usize;
        while start < out.len() {
            let block_end = (start + self.fft_len).min(buffer.len());
            let mut block: Vec<Complex64> = buffer[start..block_end]
                .iter()
                .map(|&s| Complex64::new(s, 0.0))
                .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
                .take(self.fft_len)
                .collect();

            self.fft.process(&mut block);
            for (b, k) in block.iter_mut().zip(self.kernel_freq.iter()) {
                *b *= k;
            }
            self.ifft.process(&mut block);
            let scale = 1.0 / self.fft_len as f64;

            let valid_count = block_valid.min(out.len() - start);
            for i in 0..valid_count {
                let dot = block[chirp_len - 1 + i].re * scale;
                let denom = (local_energy[start + i].max(1e-12) * self.energy).sqrt();
                out[start + i] = dot / denom;
            }
            start += block_valid;
        }
        out
    }

    fn pick_peak(&self, corr: &[f64]) -> Option<Detection> {
        let chirp_len = self.chirp.len();
        let mut best: Option<Detection> = None;
        for (n, &c) in corr.iter().enumerate() {
            if c < self.threshold {
                continue;
            }
            let lo = n.saturating_sub(chirp_len);
            let hi = (n + chirp_len).min(corr.len());
            let is_local_max = corr[lo..hi].iter().all(|&other| other <= c);
            if is_local_max {
                match best {
                    Some(b) if b.peak >= c => {}
                    _ => best = Some(Detection { offset: n, peak: c }),
                }
            }
        }
        best
    }
}

/// Generate a Hann-windowed linear chirp sweeping `band_low_hz` to
/// `band_high_hz` over `chirp_duration_secs`.
fn generate_chirp(config: &SonicTagConfig) -> Vec<f64> {
    let n = config.chirp_samples();
    let fs = config.sample_rate as f64;
    let duration = n as f64 / fs;
    let sweep_rate = (config.band_high_hz - config.band_low_hz) / duration;

    (0..n)
        .map(|s| {
            let t = s as f64 / fs;
            let phase = 2.0 * PI * (config.band_low_hz * t + 0.5 * sweep_rate * t * t);
            let window = if n > 1 {
                0.5 - 0.5 * (2.0 * PI * s as f64 / (n as f64 - 1.0)).cos()
            } else {
                1.0
            };
            phase.cos() * window
        })
        .collect()
}
