//! Error taxonomy for the SonicTag physical layer.
//!
//! Mirrors the granular-enum-per-concern style: a top-level
//! [`SonicTagError`] wraps category enums via `#[from]`, each carrying the
//! field data needed to explain the failure without a second lookup.
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SonicTagError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Dsp(#[from] DspError),
}

/// Raised when constructing or validating a [`crate::config::SonicTagConfig`].
#[derive(Debug, Error, PartialEq, Clone, Copy)]
pub enum ConfigError {
    #[error("sample_rate must be nonzero, got {rate}")]
    InvalidSampleRate { rate: usize },

    #[error("fft_size must be a power of two, got {size}")]
    FftSizeNotPowerOfTwo { size: usize },

    #[error("cp_len {cp_len} must be nonzero and smaller than fft_size {fft_size}")]
    InvalidCyclicPrefix { cp_len: usize, fft_size: usize },

    #[error("band_high_hz {band_high_hz} must be below Nyquist {nyquist_hz}")]
    NyquistViolation { band_high_hz: f64, nyquist_hz: f64 },

    #[error("invalid band [{band_low_hz}, {band_high_hz}]")]
    InvalidBand { band_low_hz: f64, band_high_hz: f64 },

    #[error("pilot_spacing must be nonzero, got {spacing}")]
    InvalidPilotSpacing { spacing: usize },

    #[error("rs_nsym {rs_nsym} leaves no room for a valid RS(255) block")]
    InvalidRsParity { rs_nsym: usize },

    #[error("no FFT bins fall inside band [{band_low_hz}, {band_high_hz}]")]
    EmptyActiveBand { band_low_hz: f64, band_high_hz: f64 },

    #[error("pilot_spacing consumes every active bin, leaving no data bins")]
    NoDataBins,

    #[error("bits_per_symbol {bits_per_symbol} is smaller than the {header_bits}-bit header block")]
    HeaderDoesNotFit { bits_per_symbol: usize, header_bits: usize },

    #[error("corr_threshold must be in (0, 1], got {threshold}")]
    InvalidCorrThreshold { threshold: f64 },
}

/// Raised by [`crate::framing::DataHandler`] encode/decode.
#[derive(Debug, Error, PartialEq, Clone, Copy)]
pub enum FramingError {
    #[error("payload of {len} bytes exceeds the {max} byte limit for this configuration")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("declared length {declared} does not match available data {available}")]
    BadLength { declared: usize, available: usize },

    #[error("CRC-32 mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    BadCrc { expected: u32, computed: u32 },

    #[error("Reed-Solomon block had more errors than it could correct")]
    UncorrectableErrors,
}

/// Internal receiver-side faults, never surfaced from `Receiver::push`;
/// recorded as an [`ErrorKind`] for [`crate::transceiver::Receiver::last_error`].
#[derive(Debug, Error, PartialEq, Clone, Copy)]
pub enum DspError {
    #[error("buffer ended before the expected frame was complete")]
    Truncated,

    #[error("header block failed its mini Reed-Solomon check")]
    HeaderInvalid,
}

/// `Copy` summary of the last fault observed by the receiver state machine.
///
/// Distinct from the `thiserror` types above: `push` never returns a
/// `Result`, so callers poll this instead of matching on an error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    #[default]
    None,
    NoSyncDetected,
    HeaderInvalid,
    PayloadTruncated,
    PayloadCrcMismatch,
    PayloadUncorrectable,
}

impl From<DspError> for ErrorKind {
    fn from(err: DspError) -> Self {
        match err {
            DspError::Truncated => ErrorKind::PayloadTruncated,
            DspError::HeaderInvalid => ErrorKind::HeaderInvalid,
        }
    }
}

impl From<FramingError> for ErrorKind {
    fn from(err: FramingError) -> Self {
        match err {
            FramingError::BadCrc { .. } => ErrorKind::PayloadCrcMismatch,
            FramingError::UncorrectableErrors => ErrorKind::PayloadUncorrectable,
            FramingError::BadLength { .. } | FramingError::PayloadTooLarge { .. } => {
                ErrorKind::PayloadUncorrectable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_sonictag_error() {
        let err: SonicTagError = ConfigError::InvalidSampleRate { rate: 0 }.into();
        assert!(matches!(err, SonicTagError::Config(_)));
    }

    #[test]
    fn framing_error_maps_to_error_kind() {
        let kind: ErrorKind = FramingError::BadCrc { expected: 1, computed: 2 }.into();
        assert_eq!(kind, ErrorKind::PayloadCrcMismatch);
    }

    #[test]
    fn default_error_kind_is_none() {
        assert_eq!(ErrorKind::default(), ErrorKind::None);
    }
}
