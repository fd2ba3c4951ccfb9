// MP4 container writer, wrapping the `minimp4` crate - the same muxer the
// original C used (`minimp4.h`, single-header, vendored into this pack's
// `examples/original_source/` build); §6 explicitly calls out "streaming
// mode writes `moov` after frames the way `minimp4` emits it".
//
// Austin Shafer - 2020

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Mp4Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mp4 mux error: {0}")]
    Mux(String),
}

pub type Result<T> = std::result::Result<T, Mp4Error>;

/// A single video-track MP4 writer. Streaming instances write sample
/// headers as NALs arrive (`moov` trails the `mdat`); post-mux instances
/// are only ever constructed once, after the full raw stream is known, so
/// they can write `moov` first.
pub struct Mp4Writer {
    muxer: minimp4::Mp4Muxer<BufWriter<File>>,
    is_hevc: bool,
}

impl Mp4Writer {
    pub fn create(path: &str, width: u32, height: u32, is_hevc: bool) -> Result<Self> {
        let file = File::create(path)?;
        let mut muxer = minimp4::Mp4Muxer::new(BufWriter::new(file));
        muxer.init_video(width as i32, height as i32, is_hevc, path);
        Ok(Self { muxer, is_hevc })
    }

    /// Feed one (possibly multi-NAL) Annex-B encoded access unit with its
    /// 90kHz-tick duration.
    pub fn write_nal(&mut self, data: &[u8], duration_ticks: u64) -> Result<()> {
        self.muxer
            .write_video_with_fps(data, self.fps_from_duration(duration_ticks))
            .map_err(|e| Mp4Error::Mux(format!("{:?}", e)))
    }

    fn fps_from_duration(&self, duration_ticks: u64) -> u32 {
        if duration_ticks == 0 {
            // Duration-0 samples are SPS/PPS/VPS headers (§4.J.4); fps is
            // irrelevant for them, `minimp4` just needs a nonzero divisor.
            1
        } else {
            (90_000 / duration_ticks.max(1)) as u32
        }
    }

    pub fn close(mut self) -> Result<()> {
        self.muxer
            .close()
            .map_err(|e| Mp4Error::Mux(format!("{:?}", e)))
    }

    pub fn is_hevc(&self) -> bool {
        self.is_hevc
    }
}

/// Used by `mux_post`: the final flush has to (re)create a fresh writer
/// after the raw stream is fully known, so finalizing is just `close`.
pub fn flush_writer(writer: Option<Mp4Writer>) -> Result<()> {
    if let Some(w) = writer {
        w.close()?;
    }
    Ok(())
}

/// A small grow-on-demand scratch buffer used by `mux_post` to read each
/// recorded sample's raw bytes back out of the raw stream file before
/// re-feeding them to a fresh writer.
pub struct ScratchBuffer {
    bytes: Vec<u8>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn read_exact_from(&mut self, file: &mut File, offset: u64, size: usize) -> Result<&[u8]> {
        if self.bytes.len() < size {
            self.bytes.resize(size, 0);
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut self.bytes[..size])?;
        Ok(&self.bytes[..size])
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}
