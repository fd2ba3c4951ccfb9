// Custom binary serialization for a built font atlas (§4.M): a small
// fixed-layout header, a per-glyph record table, then the raw RGB
// bitmap - deliberately not `bincode`/`serde` (unlike the request
// protocol's `Batch`) since the format here is a stable on-disk asset
// format meant to be loaded by non-Rust consumers too, the way the C
// original's atlas file was a plain byte layout rather than a tagged
// encoding.
//
// Austin Shafer - 2020

use std::convert::TryInto;

use thiserror::Error;

use crate::font::{FontAtlas, Glyph};

const MAGIC: &[u8; 4] = b"DVZA";
const VERSION: u32 = 1;
const GLYPH_RECORD_SIZE: usize = 4 + 4 + 4 + 4 + 4 + 4; // codepoint,x,y,w,h,advance

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported atlas format version {0}")]
    BadVersion(u32),
    #[error("pixel data length mismatch: expected {expected}, got {got}")]
    PixelLengthMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, SerializeError>;

pub fn serialize_atlas(atlas: &FontAtlas) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + atlas.glyphs.len() * GLYPH_RECORD_SIZE + atlas.rgb.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&atlas.width.to_le_bytes());
    out.extend_from_slice(&atlas.height.to_le_bytes());
    out.extend_from_slice(&(atlas.glyphs.len() as u32).to_le_bytes());

    for g in &atlas.glyphs {
        out.extend_from_slice(&g.codepoint.to_le_bytes());
        out.extend_from_slice(&g.x.to_le_bytes());
        out.extend_from_slice(&g.y.to_le_bytes());
        out.extend_from_slice(&g.w.to_le_bytes());
        out.extend_from_slice(&g.h.to_le_bytes());
        out.extend_from_slice(&g.advance.to_le_bytes());
    }

    out.extend_from_slice(&atlas.rgb);
    out
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let end = offset + 4;
    if buf.len() < end {
        return Err(SerializeError::Truncated { need: end, have: buf.len() });
    }
    Ok(u32::from_le_bytes(buf[offset..end].try_into().unwrap()))
}

fn read_f32(buf: &[u8], offset: usize) -> Result<f32> {
    Ok(f32::from_bits(read_u32(buf, offset)?))
}

pub fn deserialize_atlas(buf: &[u8]) -> Result<FontAtlas> {
    if buf.len() < 20 {
        return Err(SerializeError::Truncated { need: 20, have: buf.len() });
    }
    if &buf[0..4] != MAGIC {
        return Err(SerializeError::BadMagic);
    }
    let version = read_u32(buf, 4)?;
    if version != VERSION {
        return Err(SerializeError::BadVersion(version));
    }
    let width = read_u32(buf, 8)?;
    let height = read_u32(buf, 12)?;
    let glyph_count = read_u32(buf, 16)? as usize;

    let mut offset = 20usize;
    let mut glyphs = Vec::with_capacity(glyph_count);
    for _ in 0..glyph_count {
        let codepoint = read_u32(buf, offset)?;
        let x = read_u32(buf, offset + 4)?;
        let y = read_u32(buf, offset + 8)?;
        let w = read_u32(buf, offset + 12)?;
        let h = read_u32(buf, offset + 16)?;
        let advance = read_f32(buf, offset + 20)?;
        glyphs.push(Glyph { codepoint, x, y, w, h, advance });
        offset += GLYPH_RECORD_SIZE;
    }

    let expected_pixels = width as usize * height as usize * 3;
    let got_pixels = buf.len() - offset;
    if got_pixels != expected_pixels {
        return Err(SerializeError::PixelLengthMismatch { expected: expected_pixels, got: got_pixels });
    }
    let rgb = buf[offset..].to_vec();

    Ok(FontAtlas { width, height, rgb, glyphs })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_atlas() -> FontAtlas {
        FontAtlas {
            width: 4,
            height: 4,
            rgb: vec![7u8; 4 * 4 * 3],
            glyphs: vec![
                Glyph { codepoint: 'A' as u32, x: 0, y: 0, w: 2, h: 2, advance: 10.5 },
                Glyph { codepoint: 'B' as u32, x: 2, y: 2, w: 2, h: 2, advance: 11.0 },
            ],
        }
    }

    #[test]
    fn round_trips_through_serialize_and_deserialize() {
        let atlas = sample_atlas();
        let bytes = serialize_atlas(&atlas);
        let back = deserialize_atlas(&bytes).unwrap();
        assert_eq!(back.width, atlas.width);
        assert_eq!(back.height, atlas.height);
        assert_eq!(back.rgb, atlas.rgb);
        assert_eq!(back.glyphs.len(), atlas.glyphs.len());
        assert_eq!(back.glyphs[1].codepoint, 'B' as u32);
        assert_eq!(back.glyphs[1].advance, 11.0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = serialize_atlas(&sample_atlas());
        bytes[0] = b'X';
        assert!(matches!(deserialize_atlas(&bytes), Err(SerializeError::BadMagic)));
    }

    #[test]
    fn rejects_truncated_pixel_data() {
        let mut bytes = serialize_atlas(&sample_atlas());
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(deserialize_atlas(&bytes), Err(SerializeError::PixelLengthMismatch { .. })));
    }
}
