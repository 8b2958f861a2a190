//! Packet framing: length + CRC-32 integrity + Reed-Solomon FEC.
//!
//! Wire layout of an encoded block, before Reed-Solomon parity is appended:
//! `LEN (u16, big-endian) | payload (LEN bytes) | CRC32 (u32, big-endian)`.
//! The whole block is then protected end-to-end by a single RS(255, 255 -
//! rs_nsym) codeword.
use reed_solomon::{Decoder, Encoder};

use crate::config::SonicTagConfig;
use crate::errors::FramingError;

/// Stateless packet encoder/decoder. Holds only RS encoder/decoder instances
/// sized from the configuration; never logs, never mutates shared state.
pub struct DataHandler {
    rs_nsym: usize,
    max_payload_len: usize,
    encoder: Encoder,
    decoder: Decoder,
}

impl DataHandler {
    pub fn new(config: &SonicTagConfig) -> Self {
        Self {
            rs_nsym: config.rs_nsym,
            max_payload_len: config.max_payload_len(),
            encoder: Encoder::new(config.rs_nsym),
            decoder: Decoder::new(config.rs_nsym),
        }
    }

    /// Frame `payload` into an RS-protected byte block.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, FramingError> {
        if payload.len() > self.max_payload_len {
            return Err(FramingError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload_len,
            });
        }

        let mut block = Vec::with_capacity(2 + payload.len() + 4);
        block.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        block.extend_from_slice(payload);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&block);
        block.extend_from_slice(&crc.finalize().to_be_bytes());

        let encoded = self.encoder.encode(&block);
        let mut frame = Vec::with_capacity(block.len() + self.rs_nsym);
        frame.extend_from_slice(&block);
        frame.extend_from_slice(encoded.ecc());
        Ok(frame)
    }

    /// Recover a payload from a received RS-protected block, correcting up
    /// to `rs_nsym / 2` byte errors. `erasures` marks byte positions the
    /// caller already believes are unreliable (currently always empty; see
    /// module docs on erasure handling).
    pub fn decode(&self, frame: &[u8], erasures: Option<&[u8]>) -> Result<Vec<u8>, FramingError> {
        if frame.len() < self.rs_nsym + 6 {
            return Err(FramingError::BadLength {
                declared: 0,
                available: frame.len(),
            });
        }

        let mut corrupted = frame.to_vec();
        let corrected = self
            .decoder
            .correct(&mut corrupted, erasures)
            .map_err(|_| FramingError::UncorrectableErrors)?;
        let block = corrected.data();

        if block.len() < 6 {
            return Err(FramingError::BadLength {
                declared: 0,
                available: block.len(),
            });
        }

        let declared_len = u16::from_be_bytes([block[0], block[1]]) as usize;
        let available = block.len().saturating_sub(6);
        if declared_len > available {
            return Err(FramingError::BadLength {
                declared: declared_len,
                available,
            });
        }

        let payload = &block[2..2 + declared_len];
        let crc_bytes = &block[2 + declared_len..6 + declared_len];
        let expected = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&block[..2 + declared_len]);
        let computed = crc.finalize();

        if computed != expected {
            return Err(FramingError::BadCrc { expected, computed });
        }

        Ok(payload.to_vec())
    }
}
