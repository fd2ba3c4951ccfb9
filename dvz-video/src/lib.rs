//! Frame-stream video encoder orchestrator: a `dvz_stream::SinkBackend`
//! implementation that muxes a rendered frame stream into an MP4 file via
//! a GPU (NVENC) or CPU (kvazaar) encoder backend (§4.J/K/L).
//!
//! Austin Shafer - 2020

pub mod backend;
pub mod bt601;
pub mod config;
pub mod duration;
pub mod encoder;
pub mod mp4;
pub mod sample;
pub mod sink;

#[cfg(feature = "gpu-encoder")]
pub mod gpu;

#[cfg(feature = "cpu-encoder")]
pub mod cpu;

pub use backend::{BackendError, EncodedSample, EncoderBackend};
pub use config::{Codec, ColorFormat, EncoderConfig, MuxMode};
pub use duration::DurationAccumulator;
pub use encoder::{EncoderError, StartParams, VideoEncoder};
pub use sink::video_sink_backend;
