//! AWGN channel simulation, used by noise-tolerance tests and benches.
use rand::Rng;
use rand_distr::StandardNormal;

/// Add white Gaussian noise to `signal` at the given SNR, measured against
/// the signal's own average power.
pub fn apply_awgn<R: Rng>(signal: &[f64], snr_db: f64, rng: &mut R) -> Vec<f64> {
    let noise_std = noise_std_for_snr(signal, snr_db);
    signal
        .iter()
        .map(|&s| {
            let noise: f64 = rng.sample(StandardNormal);
            s + noise * noise_std
        })
        .collect()
}

/// Noise standard deviation that yields the requested SNR (in dB) against
/// the mean power of `signal`.
pub fn noise_std_for_snr(signal: &[f64], snr_db: f64) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let signal_power = signal.iter().map(|&s| s * s).sum::<f64>() / signal.len() as f64;
    let snr_linear = 10f64.powf(snr_db / 10.0);
    (signal_power / snr_linear).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn deterministic_with_seed() {
        let signal = vec![0.1, -0.2, 0.3, 0.0];
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        assert_eq!(
            apply_awgn(&signal, 20.0, &mut rng1),
            apply_awgn(&signal, 20.0, &mut rng2)
        );
    }

    #[test]
    fn higher_snr_adds_less_noise_energy() {
        let signal = vec![0.5; 1000];
        let mut rng_hi = StdRng::seed_from_u64(1);
        let mut rng_lo = StdRng::seed_from_u64(1);

        let noisy_hi = apply_awgn(&signal, 40.0, &mut rng_hi);
        let noisy_lo = apply_awgn(&signal, 5.0, &mut rng_lo);

        let err_hi: f64 = noisy_hi.iter().zip(&signal).map(|(a, b)| (a - b).powi(2)).sum();
        let err_lo: f64 = noisy_lo.iter().zip(&signal).map(|(a, b)| (a - b).powi(2)).sum();
        assert!(err_hi < err_lo);
    }

    #[test]
    fn empty_signal_has_zero_noise_std() {
        assert_eq!(noise_std_for_snr(&[], 20.0), 0.0);
    }
}
