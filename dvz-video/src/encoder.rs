// Video encoder orchestrator (§4.J): owns the backend, the MP4/raw-stream
// mux state machine, and the 90kHz duration accumulator. Grounded on
// `examples/original_source/src/video/encoder_mux_mp4.c`'s
// open_mp4_stream/mux_sample/record_sample/mux_post sequencing.
//
// Austin Shafer - 2020

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use thiserror::Error;

use utils::log;

use crate::backend::{pick_backend, BackendError, EncodedSample, EncoderBackend};
use crate::config::{Codec, EncoderConfig, MuxMode};
use crate::duration::DurationAccumulator;
use crate::mp4::{Mp4Error, Mp4Writer};
use crate::sample::{SampleEntry, SampleList};

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("encoder already started")]
    AlreadyStarted,
    #[error("encoder not started")]
    NotStarted,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Mp4(#[from] Mp4Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EncoderError>;

/// Vulkan-adjacent handles the caller owns; this crate never touches
/// `ash` types directly, treating them as opaque integers/fds instead.
pub struct StartParams {
    pub image: u64,
    pub memory: u64,
    pub memory_size: u64,
    pub memory_fd: i32,
    pub wait_semaphore_fd: i32,
}

enum MuxState {
    Streaming { writer: Option<Mp4Writer> },
    Post { raw_file: Option<File>, samples: SampleList },
}

pub struct VideoEncoder {
    cfg: EncoderConfig,
    backend: Box<dyn EncoderBackend>,
    mux: MuxState,
    duration_acc: Option<DurationAccumulator>,
    started: bool,
    frame_idx: u64,
}

impl VideoEncoder {
    /// §4.J.1 `create`: pick a backend via the registry; on failure the
    /// caller gets an error (the C original frees and returns null).
    pub fn create(cfg: EncoderConfig) -> Result<Self> {
        let backend = pick_backend(&cfg)?;
        let mux = match cfg.mux {
            MuxMode::Mp4Streaming => MuxState::Streaming { writer: None },
            MuxMode::Mp4Post => MuxState::Post { raw_file: None, samples: SampleList::new() },
        };
        Ok(Self {
            cfg,
            backend,
            mux,
            duration_acc: None,
            started: false,
            frame_idx: 0,
        })
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn frame_idx(&self) -> u64 {
        self.frame_idx
    }

    /// §4.J.1 `start`.
    pub fn start(&mut self, params: StartParams) -> Result<()> {
        if self.started {
            return Err(EncoderError::AlreadyStarted);
        }
        self.duration_acc = Some(DurationAccumulator::new(self.cfg.fps));

        match &mut self.mux {
            MuxState::Streaming { writer } => {
                let is_hevc = self.cfg.codec == Codec::Hevc;
                *writer = Some(Mp4Writer::create(&self.cfg.mp4_path, self.cfg.width, self.cfg.height, is_hevc)?);
            }
            MuxState::Post { raw_file, .. } => {
                let f = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&self.cfg.raw_path)?;
                *raw_file = Some(f);
            }
        }

        let headers = self.backend.start(&params)?;
        for h in headers {
            self.emit_sample(h, 0)?;
        }

        self.started = true;
        self.frame_idx = 0;
        Ok(())
    }

    /// §4.J.1 `submit`: delegate to the backend; on success advance
    /// `frame_idx`.
    pub fn submit(&mut self, wait_value: u64) -> Result<()> {
        if !self.started {
            return Err(EncoderError::NotStarted);
        }
        let samples = self.backend.submit(wait_value, self.frame_idx)?;
        for s in samples {
            let duration = self.duration_acc.as_mut().unwrap().next_duration();
            self.emit_sample(s, duration)?;
        }
        self.frame_idx += 1;
        Ok(())
    }

    /// §4.J.1 `stop`: delegate to the backend (draining buffered
    /// samples), then finalize muxing.
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        let flushed = self.backend.stop()?;
        for s in flushed {
            let duration = self.duration_acc.as_mut().unwrap().next_duration();
            self.emit_sample(s, duration)?;
        }

        match &mut self.mux {
            MuxState::Streaming { writer } => {
                if let Some(w) = writer.take() {
                    w.close()?;
                }
            }
            MuxState::Post { raw_file, samples } => {
                if let Some(mut f) = raw_file.take() {
                    Self::mux_post(&self.cfg, &mut f, samples)?;
                }
                samples.clear();
            }
        }

        self.started = false;
        Ok(())
    }

    /// §4.J.3 `on_sample`.
    fn emit_sample(&mut self, sample: EncodedSample, duration: u64) -> Result<()> {
        match &mut self.mux {
            MuxState::Streaming { writer } => {
                if let Some(w) = writer {
                    if let Err(e) = w.write_nal(&sample.data, duration) {
                        log::error!("mp4 streaming writer failed, degrading stream: {}", e);
                        *writer = None;
                    }
                }
            }
            MuxState::Post { raw_file, samples } => {
                if let Some(f) = raw_file {
                    let offset = f.stream_position()?;
                    f.write_all(&sample.data)?;
                    samples.push(SampleEntry {
                        raw_offset: offset,
                        size: sample.data.len() as u64,
                        duration,
                        keyframe: sample.keyframe,
                    });
                }
            }
        }
        Ok(())
    }

    /// §4.J.3 `mux_post`: re-open the raw stream, reopen a fresh muxer,
    /// and replay every recorded sample through it.
    fn mux_post(cfg: &EncoderConfig, raw_file: &mut File, samples: &SampleList) -> Result<()> {
        raw_file.seek(SeekFrom::Start(0))?;
        let is_hevc = cfg.codec == Codec::Hevc;
        let mut writer = Mp4Writer::create(&cfg.mp4_path, cfg.width, cfg.height, is_hevc)?;
        let mut scratch = crate::mp4::ScratchBuffer::new();
        for entry in samples.iter() {
            let buf = scratch.read_exact_from(raw_file, entry.raw_offset, entry.size as usize)?;
            writer.write_nal(buf, entry.duration)?;
        }
        writer.close()?;
        Ok(())
    }
}
