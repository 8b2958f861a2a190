//! Bit-packing helpers shared by framing, header encoding and OFDM mapping.

/// Unpack `bytes` into MSB-first bits.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits
}

/// Pack MSB-first bits into bytes, zero-padding the final byte if `bits.len()`
/// is not a multiple of 8.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((bits.len() + 7) / 8);
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            if bit {
                byte |= 1 << (7 - i);
            }
        }
        bytes.push(byte);
    }
    bytes
}

/// Encode a `u16` as MSB-first bits, big-endian byte order.
pub fn u16_to_bits(value: u16) -> Vec<bool> {
    bytes_to_bits(&value.to_be_bytes())
}

/// Decode a big-endian `u16` from the first 16 MSB-first bits.
pub fn bits_to_u16(bits: &[bool]) -> u16 {
    let bytes = bits_to_bytes(bits);
    u16::from_be_bytes([bytes[0], bytes[1]])
}
