// Video encoder configuration (§4.J default table).
//
// Austin Shafer - 2020

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Hevc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    Rgba8Unorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxMode {
    /// Write `moov` as frames arrive, the way `minimp4` emits it.
    Mp4Streaming,
    /// Write the raw bitstream during encoding, then finalize the MP4
    /// (writing `moov` first) from the raw stream after `stop`.
    Mp4Post,
}

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub color_format: ColorFormat,
    pub codec: Codec,
    pub mux: MuxMode,
    pub mp4_path: String,
    pub raw_path: String,
    /// Backend name, or `"auto"` to let the registry pick.
    pub backend: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 60,
            color_format: ColorFormat::Rgba8Unorm,
            codec: Codec::Hevc,
            mux: MuxMode::Mp4Streaming,
            mp4_path: "out.mp4".to_string(),
            raw_path: "out.h26x".to_string(),
            backend: "auto".to_string(),
        }
    }
}
