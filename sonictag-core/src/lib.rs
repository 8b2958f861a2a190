//! SonicTag physical layer: ultrasonic OFDM framing, modulation, chirp
//! synchronization and the streaming receive state machine.
//!
//! Audio device I/O, container formats (WAV/MP3), and the demo CLI are
//! external collaborators; this crate only ever touches in-memory sample
//! buffers.

pub mod channel;
pub mod chirp;
pub mod config;
pub mod errors;
pub mod framing;
pub mod ofdm;
pub mod transceiver;
pub mod utils;

pub use config::SonicTagConfig;
pub use errors::{ConfigError, DspError, ErrorKind, FramingError, SonicTagError};
pub use transceiver::{Receiver, Transmitter};
