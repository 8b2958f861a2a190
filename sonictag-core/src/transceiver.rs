//! End-to-end pipeline: `Transmitter::encode` and the streaming
//! `Receiver::push` state machine (SEARCHING -> HEADER -> PAYLOAD -> EMIT).
use num_complex::Complex64;
use reed_solomon::{Decoder as RsDecoder, Encoder as RsEncoder};

use crate::chirp::ChirpSync;
use crate::config::{SonicTagConfig, HEADER_BLOCK_BITS, HEADER_MINI_RS_PARITY};
use crate::errors::{ConfigError, DspError, ErrorKind, FramingError};
use crate::framing::DataHandler;
use crate::ofdm::Ofdm;
use crate::utils::{bits_to_bytes, bytes_to_bits};

/// Stateless transmit pipeline: `DataHandler::encode` -> bit-pack -> OFDM
/// symbols, prefixed by a chirp and the header symbol.
pub struct Transmitter {
    config: SonicTagConfig,
    data_handler: DataHandler,
    ofdm: Ofdm,
    chirp: ChirpSync,
    header_encoder: RsEncoder,
}

impl Transmitter {
    pub fn new(config: SonicTagConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            data_handler: DataHandler::new(&config),
            ofdm: Ofdm::new(&config),
            chirp: ChirpSync::new(&config),
            header_encoder: RsEncoder::new(HEADER_MINI_RS_PARITY),
            config,
        })
    }

    /// Produce one complete audio frame (chirp + guard + header + data
    /// symbols) at `config.sample_rate`, values in `[-1, 1]`.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<f32>, FramingError> {
        let framed = self.data_handler.encode(payload)?;
        let bits = bytes_to_bits(&framed);
        let bits_per_symbol = self.ofdm.bits_per_symbol();
        let num_data_symbols = ((bits.len() + bits_per_symbol - 1) / bits_per_symbol).max(1);

        let mut header_block = (num_data_symbols as u16).to_be_bytes().to_vec();
        let header_ecc = self.header_encoder.encode(&header_block);
        header_block.extend_from_slice(header_ecc.ecc());
        let mut header_bits = bytes_to_bits(&header_block);
        header_bits.resize(bits_per_symbol, false);

        let mut samples = Vec::with_capacity(self.config.max_frame_samples());
        samples.extend_from_slice(self.chirp.chirp_samples());
        samples.extend(std::iter::repeat(0.0).take(self.config.guard_samples()));

        let mut phase_state = vec![0.0_f64; bits_per_symbol];
        let (header_samples, _) = self.ofdm.modulate_symbol(&header_bits, &mut phase_state);
        samples.extend(header_samples);

        for chunk in bits.chunks(bits_per_symbol) {
            let (sym_samples, _) = self.ofdm.modulate_symbol(chunk, &mut phase_state);
            samples.extend(sym_samples);
        }

        Ok(samples.into_iter().map(|s| s as f32).collect())
    }
}

#[derive(Clone)]
enum State {
    Searching,
    Header {
        start: usize,
    },
    Payload {
        start: usize,
        num_data_symbols: usize,
        header_spectrum: Vec<Complex64>,
    },
}

/// Stateful streaming receiver. All methods must be called from a single
/// execution context; independent `Receiver`s share no state.
pub struct Receiver {
    config: SonicTagConfig,
    data_handler: DataHandler,
    ofdm: Ofdm,
    chirp: ChirpSync,
    header_decoder: RsDecoder,
    buffer: Vec<f64>,
    state: State,
    last_error: ErrorKind,
}

impl Receiver {
    pub fn new(config: SonicTagConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            data_handler: DataHandler::new(&config),
            ofdm: Ofdm::new(&config),
            chirp: ChirpSync::new(&config),
            header_decoder: RsDecoder::new(HEADER_MINI_RS_PARITY),
            buffer: Vec::new(),
            state: State::Searching,
            last_error: ErrorKind::None,
            config,
        })
    }

    /// Empties the rolling buffer and returns to SEARCHING.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::Searching;
        self.last_error = ErrorKind::None;
    }

    /// The diagnostic hook: the fault that most recently moved the state
    /// machine back to SEARCHING, or `ErrorKind::None` after a clean decode.
    pub fn last_error(&self) -> ErrorKind {
        self.last_error
    }

    /// Accepts an arbitrary-size chunk of samples and returns zero or more
    /// payloads decoded from complete frames now contained in the buffer.
    /// Never blocks; partial frames remain pending for the next call.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<u8>> {
        self.buffer.extend(samples.iter().map(|&s| s as f64));
        let mut outputs = Vec::new();

        loop {
            let current = std::mem::replace(&mut self.state, State::Searching);
            match current {
                State::Searching => {
                    let Some(detection) = self.chirp.detect(&self.buffer) else {
                        let max_span = self.config.max_frame_samples() + self.chirp.chirp_len();
                        if self.buffer.len() > max_span {
                            let drop = self.chirp.chirp_len().min(self.buffer.len());
                            self.buffer.drain(0..drop);
                        }
                        self.last_error = ErrorKind::NoSyncDetected;
                        break;
                    };
                    if detection.offset > 0 {
                        self.buffer.drain(0..detection.offset);
                    }
                    let start = self.chirp.chirp_len() + self.config.guard_samples();
                    log::debug!(target: "sonictag_core::transceiver", "chirp detected (peak {:.3}), entering HEADER", detection.peak);
                    self.state = State::Header { start };
                }

                State::Header { start } => {
                    let needed = start + self.config.symbol_samples();
                    if self.buffer.len() < needed {
                        self.state = State::Header { start };
                        break;
                    }
                    let symbol = self.buffer[start..needed].to_vec();
                    let reference = vec![Complex64::new(1.0, 0.0); self.config.fft_size];

                    match self.ofdm.demodulate_symbol(&symbol, &reference) {
                        Ok(demod) => match self.decode_header(&demod.bits) {
                            Some(num_data_symbols) if num_data_symbols <= self.config.max_data_symbols() => {
                                log::trace!(target: "sonictag_core::transceiver", "header ok, {num_data_symbols} data symbols, entering PAYLOAD");
                                self.state = State::Payload {
                                    start: needed,
                                    num_data_symbols,
                                    header_spectrum: demod.spectrum,
                                };
                            }
                            _ => self.resync(DspError::HeaderInvalid.into()),
                        },
                        Err(err) => self.resync(err.into()),
                    }
                }

                State::Payload {
                    start,
                    num_data_symbols,
                    header_spectrum,
                } => {
                    let symbol_len = self.config.symbol_samples();
                    let needed = start + symbol_len * num_data_symbols;
                    if self.buffer.len() < needed {
                        self.state = State::Payload { start, num_data_symbols, header_spectrum };
                        break;
                    }

                    let mut prev_spectrum = header_spectrum;
                    let mut bits = Vec::with_capacity(self.ofdm.bits_per_symbol() * num_data_symbols);
                    let mut truncated = false;
                    for i in 0..num_data_symbols {
                        let s = start + i * symbol_len;
                        match self.ofdm.demodulate_symbol(&self.buffer[s..s + symbol_len], &prev_spectrum) {
                            Ok(demod) => {
                                bits.extend(demod.bits);
                                prev_spectrum = demod.spectrum;
                            }
                            Err(_) => {
                                truncated = true;
                                break;
                            }
                        }
                    }

                    if truncated {
                        self.resync(DspError::Truncated.into());
                        continue;
                    }

                    let frame_bytes = bits_to_bytes(&bits);
                    match self.data_handler.decode(&frame_bytes, None) {
                        Ok(payload) => {
                            log::debug!(target: "sonictag_core::framing", "frame decoded ({} bytes)", payload.len());
                            outputs.push(payload);
                            self.last_error = ErrorKind::None;
                            self.buffer.drain(0..needed);
                            self.state = State::Searching;
                        }
                        Err(err) => {
                            log::debug!(target: "sonictag_core::framing", "frame rejected: {err}");
                            self.resync(err.into());
                        }
                    }
                }
            }
        }

        outputs
    }

    /// Return to SEARCHING, recording `kind` and draining one sample so the
    /// next detection attempt cannot re-lock onto the exact same false
    /// chirp at the same offset.
    fn resync(&mut self, kind: ErrorKind) {
        self.last_error = kind;
        if !self.buffer.is_empty() {
            self.buffer.remove(0);
        }
        self.state = State::Searching;
    }

    fn decode_header(&self, bits: &[bool]) -> Option<usize> {
        if bits.len() < HEADER_BLOCK_BITS {
            return None;
        }
        let mut block = bits_to_bytes(&bits[..HEADER_BLOCK_BITS]);
        let corrected = self.header_decoder.correct(&mut block, None).ok()?;
        let data = corrected.data();
        if data.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([data[0], data[1]]) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::apply_awgn;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pair() -> (Transmitter, Receiver) {
        let cfg = SonicTagConfig::default();
        (
            Transmitter::new(cfg.clone()).unwrap(),
            Receiver::new(cfg).unwrap(),
        )
    }

    #[test]
    fn roundtrip_short_payload() {
        let (tx, mut rx) = pair();
        let frame = tx.encode(b"Hi").unwrap();
        let payloads = rx.push(&frame);
        assert_eq!(payloads, vec![b"Hi".to_vec()]);
    }

    #[test]
    fn roundtrip_max_size_payload() {
        let cfg = SonicTagConfig::default();
        let (tx, mut rx) = pair();
        let payload = vec![0u8; cfg.max_payload_len()];
        let frame = tx.encode(&payload).unwrap();
        let payloads = rx.push(&frame);
        assert_eq!(payloads, vec![payload]);
    }

    #[test]
    fn silence_padding_before_and_after_still_decodes_once() {
        let (tx, mut rx) = pair();
        let frame = tx.encode(b"Hello, World!").unwrap();
        let mut samples = vec![0.0f32; 4800];
        samples.extend(frame);
        samples.extend(vec![0.0f32; 4800]);
        let payloads = rx.push(&samples);
        assert_eq!(payloads, vec![b"Hello, World!".to_vec()]);
    }

    #[test]
    fn two_frames_decode_in_order() {
        let (tx, mut rx) = pair();
        let mut samples = tx.encode(b"first").unwrap();
        samples.extend(vec![0.0f32; 2000]);
        samples.extend(tx.encode(b"second").unwrap());
        let payloads = rx.push(&samples);
        assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn streaming_in_small_chunks_matches_single_call() {
        let (tx, mut rx_chunked) = pair();
        let (_, mut rx_whole) = pair();
        let frame = tx.encode(b"chunked").unwrap();

        let whole = rx_whole.push(&frame);

        let mut chunked = Vec::new();
        for chunk in frame.chunks(37) {
            chunked.extend(rx_chunked.push(chunk));
        }
        assert_eq!(chunked, whole);
        assert_eq!(chunked, vec![b"chunked".to_vec()]);
    }

    #[test]
    fn pure_noise_never_emits_and_stays_bounded() {
        let cfg = SonicTagConfig::default();
        let mut rx = Receiver::new(cfg.clone()).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let noise = apply_awgn(&vec![0.0; cfg.sample_rate * 5], 0.0, &mut rng);
        let noise_f32: Vec<f32> = noise.iter().map(|&s| s as f32).collect();

        for chunk in noise_f32.chunks(1024) {
            let payloads = rx.push(chunk);
            assert!(payloads.is_empty());
        }
        assert!(rx.buffer.len() <= cfg.max_frame_samples() + rx.chirp.chirp_len() + 1024);
    }

    #[test]
    fn reset_clears_buffer_and_state() {
        let (tx, mut rx) = pair();
        let frame = tx.encode(b"partial").unwrap();
        rx.push(&frame[..frame.len() / 2]);
        rx.reset();
        assert!(rx.buffer.is_empty());
        assert_eq!(rx.last_error(), ErrorKind::None);
    }

    #[test]
    fn noisy_channel_at_20db_snr_still_decodes() {
        let (tx, mut rx) = pair();
        let frame = tx.encode(b"noisy ok").unwrap();
        let samples: Vec<f64> = frame.iter().map(|&s| s as f64).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let noisy = apply_awgn(&samples, 20.0, &mut rng);
        let noisy_f32: Vec<f32> = noisy.iter().map(|&s| s as f32).collect();
        let payloads = rx.push(&noisy_f32);
        assert_eq!(payloads, vec![b"noisy ok".to_vec()]);
    }
}
