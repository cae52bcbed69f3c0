//! SSTV codec
//!
//! Mode catalog, image encoder, FM demodulator and the streaming decoder.
//! Encoder and decoder read timing from the same catalog entries.

pub mod decoder;
pub mod demod;
pub mod encoder;
pub mod image;
pub mod modes;
pub mod sync;
pub mod vis;

pub use decoder::{
    decode_buffer, decode_buffer_with, start_session, Completion, DecodeStatus, DecoderConfig,
    DecoderState, ScanlineEvent, SyncState,
};
pub use encoder::{encode, resize_to_mode, Encoder, EncoderConfig};
pub use image::{DecodedImage, RgbImage};
pub use modes::{lookup, ModeId, ModeSpec, MODES};
