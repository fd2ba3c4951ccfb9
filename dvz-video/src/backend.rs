// Encoder backend trait and selection registry (§4.J.1), mirroring
// `dvz_stream::Registry`'s register/find/pick shape but specialized to the
// small, closed set of encoder backends this crate ships (third-party
// backend registration is out of scope).
//
// Austin Shafer - 2020

use thiserror::Error;

use crate::config::EncoderConfig;
use crate::encoder::StartParams;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no encoder backend available for this configuration")]
    NoBackendAvailable,
    #[error("backend does not support this configuration: {0}")]
    Unsupported(String),
    #[error("encoder backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// One encoded access unit handed back from a backend, ready to be muxed.
/// Duration is assigned by the orchestrator, not the backend (§4.J.2/.3).
pub struct EncodedSample {
    pub data: Vec<u8>,
    /// `true` for parameter-set NALs (SPS/PPS/VPS) or IDR frames.
    pub keyframe: bool,
}

impl EncodedSample {
    pub fn new(data: Vec<u8>, keyframe: bool) -> Self {
        Self { data, keyframe }
    }
}

/// A concrete hardware- or software-encoder implementation. `dvz-video`
/// ships at most two of these (`gpu`, `cpu`), each behind its own cargo
/// feature, so unlike `dvz_stream::SinkBackend` there is no third-party
/// registration API - just a fixed pick order.
pub trait EncoderBackend: Send {
    fn name(&self) -> &'static str;

    /// Probe whether this backend can handle `cfg` at all (§4.L.1's
    /// even-width/height + HEVC-only precondition, for example).
    fn probe(cfg: &EncoderConfig) -> bool
    where
        Self: Sized;

    /// Import GPU resources, open the driver/encoder session, and return
    /// any duration-0 header samples (SPS/PPS/VPS, §4.J.4).
    fn start(&mut self, params: &StartParams) -> Result<Vec<EncodedSample>>;

    /// Encode the frame currently resident in the imported memory and
    /// return zero or more encoded samples (encoders may buffer).
    fn submit(&mut self, wait_value: u64, frame_idx: u64) -> Result<Vec<EncodedSample>>;

    /// Drain any frames still buffered inside the encoder and tear down
    /// driver/session resources.
    fn stop(&mut self) -> Result<Vec<EncodedSample>>;
}

/// Construct the first backend whose `cfg.backend` matches (or, for
/// `"auto"`, the first compiled-in backend that probes successfully), in
/// priority order GPU then CPU - matching §4.J.1's "prefer hardware
/// encode when available" and §4.K.5's fallback-to-next-backend policy.
/// §4.K/§4.L name the backends "NVENC" and "kvazaar" respectively, so both
/// those names and the shorter `gpu`/`cpu` aliases select them.
pub fn pick_backend(cfg: &EncoderConfig) -> Result<Box<dyn EncoderBackend>> {
    let want_gpu = matches!(cfg.backend.as_str(), "auto" | "gpu" | "nvenc");
    let want_cpu = matches!(cfg.backend.as_str(), "auto" | "cpu" | "kvazaar");

    #[cfg(feature = "gpu-encoder")]
    if want_gpu && crate::gpu::GpuEncoder::probe(cfg) {
        return Ok(Box::new(crate::gpu::GpuEncoder::new(cfg)));
    }
    #[cfg(not(feature = "gpu-encoder"))]
    let _ = want_gpu;

    #[cfg(feature = "cpu-encoder")]
    if want_cpu && crate::cpu::CpuEncoder::probe(cfg) {
        return Ok(Box::new(crate::cpu::CpuEncoder::new(cfg)));
    }
    #[cfg(not(feature = "cpu-encoder"))]
    let _ = want_cpu;

    Err(BackendError::NoBackendAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "cpu-encoder")]
    use crate::config::Codec;

    #[test]
    fn pick_backend_without_any_feature_fails_cleanly() {
        let cfg = EncoderConfig::default();
        let result = pick_backend(&cfg);
        #[cfg(not(any(feature = "gpu-encoder", feature = "cpu-encoder")))]
        assert!(matches!(result, Err(BackendError::NoBackendAvailable)));
        #[cfg(any(feature = "gpu-encoder", feature = "cpu-encoder"))]
        let _ = result;
    }

    #[cfg(feature = "cpu-encoder")]
    #[test]
    fn scenario_5_backend_kvazaar_selects_the_cpu_backend() {
        let mut cfg = EncoderConfig::default();
        cfg.codec = Codec::Hevc;
        cfg.backend = "kvazaar".to_string();
        let backend = pick_backend(&cfg).expect("kvazaar must resolve to the CPU backend");
        assert_eq!(backend.name(), "cpu");
    }
}
