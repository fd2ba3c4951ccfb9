// Bridges `VideoEncoder` into the `dvz_stream::SinkBackend` callback table
// (§4.H/I), the way the orchestrator is actually consumed by a running
// frame stream: `dvz-video` owns no stream lifecycle of its own, it just
// registers itself as one more sink.
//
// Austin Shafer - 2020

use dvz_stream::{FrameDescriptor, SinkBackend, SinkConfig, SinkState};

use utils::log;

use crate::config::EncoderConfig;
use crate::encoder::{StartParams, VideoEncoder};

fn params_from_frame(frame: &FrameDescriptor) -> StartParams {
    StartParams {
        image: frame.image,
        memory: frame.memory,
        memory_size: frame.memory_size,
        memory_fd: frame.memory_fd.unwrap_or(-1),
        wait_semaphore_fd: frame.wait_semaphore_fd.unwrap_or(-1),
    }
}

/// Build the `"video"` sink backend, ready to hand to
/// `dvz_stream::Registry::register`.
pub fn video_sink_backend() -> SinkBackend {
    let mut backend = SinkBackend::new("video");

    backend.probe = Some(Box::new(|cfg: &SinkConfig| {
        cfg.downcast_ref::<EncoderConfig>().is_some()
    }));

    backend.create = Some(Box::new(|cfg: &SinkConfig| {
        let cfg = cfg
            .downcast_ref::<EncoderConfig>()
            .ok_or_else(|| dvz_stream::StreamError::CreateFailed("video".to_string()))?;
        let encoder = VideoEncoder::create(cfg.clone())
            .map_err(|e| {
                log::error!("video sink create failed: {}", e);
                dvz_stream::StreamError::CreateFailed("video".to_string())
            })?;
        Ok(Box::new(encoder) as SinkState)
    }));

    backend.start = Some(Box::new(|state: &mut SinkState, frame: &FrameDescriptor| {
        let encoder = match state.downcast_mut::<VideoEncoder>() {
            Some(e) => e,
            None => return -1,
        };
        match encoder.start(params_from_frame(frame)) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("video sink start failed: {}", e);
                -1
            }
        }
    }));

    backend.submit = Some(Box::new(|state: &mut SinkState, wait_value: u64| {
        let encoder = match state.downcast_mut::<VideoEncoder>() {
            Some(e) => e,
            None => return -1,
        };
        match encoder.submit(wait_value) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("video sink submit failed: {}", e);
                -1
            }
        }
    }));

    backend.stop = Some(Box::new(|state: &mut SinkState| {
        if let Some(encoder) = state.downcast_mut::<VideoEncoder>() {
            if let Err(e) = encoder.stop() {
                log::error!("video sink stop failed: {}", e);
            }
        }
    }));

    backend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_accepts_encoder_config_and_rejects_other_payloads() {
        let backend = video_sink_backend();
        let good: SinkConfig = Box::new(EncoderConfig::default());
        let bad: SinkConfig = Box::new(());
        assert!((backend.probe.as_ref().unwrap())(&good));
        assert!(!(backend.probe.as_ref().unwrap())(&bad));
    }
}
