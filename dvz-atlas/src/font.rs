// Font atlas builder (§4.M): TTF ingestion, glyph outline flattening,
// square packing, and per-glyph SDF rasterization into one shared atlas
// bitmap plus a `(x, y, w, h)` table.
//
// TTF ingestion uses `ttf-parser` (a dependency-light outline reader in the
// same family as `ab_glyph`/`fontdue`/`rusttype`) rather than linking
// FreeType, since this crate only needs static glyph outlines, not text
// shaping.
//
// Austin Shafer - 2020

use thiserror::Error;
use ttf_parser::{Face, GlyphId, OutlineBuilder, Rect as TtfRect};

use crate::packer::{pack_square, Rect};
use crate::sdf::{generate_sdf, Point, Segment, PIXEL_RANGE};

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("failed to parse TTF data: {0}")]
    Parse(String),
    #[error("codepoint list is empty")]
    EmptyCodepoints,
}

pub type Result<T> = std::result::Result<T, AtlasError>;

/// One glyph's placement in the shared atlas bitmap, in the atlas's
/// y-flipped coordinate system (matching
/// `examples/original_source/src/scene/atlas.cpp`'s `dvz_atlas_glyph`).
#[derive(Debug, Clone, Copy)]
pub struct Glyph {
    pub codepoint: u32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub advance: f32,
}

pub struct FontAtlas {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` contiguous RGB bytes.
    pub rgb: Vec<u8>,
    pub glyphs: Vec<Glyph>,
}

impl FontAtlas {
    pub fn glyph(&self, codepoint: u32) -> Option<&Glyph> {
        self.glyphs.iter().find(|g| g.codepoint == codepoint)
    }
}

/// Default charset: printable ASCII, matching `Charset::ASCII` in the
/// original when the caller supplies no explicit codepoint list.
pub fn ascii_codepoints() -> Vec<u32> {
    (0x20u32..=0x7eu32).collect()
}

struct OutlineCollector {
    segments: Vec<Segment>,
    cur: Point,
    start: Point,
    bbox_min: (f64, f64),
    scale: f64,
    pad: f64,
    tile_h: f64,
}

impl OutlineCollector {
    fn transform(&self, x: f32, y: f32) -> Point {
        let px = (x as f64 - self.bbox_min.0) * self.scale + self.pad;
        let py = self.tile_h - ((y as f64 - self.bbox_min.1) * self.scale + self.pad);
        Point::new(px, py)
    }

    fn push(&mut self, to: Point) {
        self.segments.push(Segment { a: self.cur, b: to });
        self.cur = to;
    }

    fn flatten_quad(&mut self, ctrl: Point, to: Point) {
        const STEPS: usize = 8;
        let (p0, p1, p2) = (self.cur, ctrl, to);
        for i in 1..=STEPS {
            let t = i as f64 / STEPS as f64;
            let mt = 1.0 - t;
            let x = mt * mt * p0.x + 2.0 * mt * t * p1.x + t * t * p2.x;
            let y = mt * mt * p0.y + 2.0 * mt * t * p1.y + t * t * p2.y;
            self.push(Point::new(x, y));
        }
    }

    fn flatten_cubic(&mut self, c1: Point, c2: Point, to: Point) {
        const STEPS: usize = 10;
        let (p0, p1, p2, p3) = (self.cur, c1, c2, to);
        for i in 1..=STEPS {
            let t = i as f64 / STEPS as f64;
            let mt = 1.0 - t;
            let x = mt * mt * mt * p0.x
                + 3.0 * mt * mt * t * p1.x
                + 3.0 * mt * t * t * p2.x
                + t * t * t * p3.x;
            let y = mt * mt * mt * p0.y
                + 3.0 * mt * mt * t * p1.y
                + 3.0 * mt * t * t * p2.y
                + t * t * t * p3.y;
            self.push(Point::new(x, y));
        }
    }
}

impl OutlineBuilder for OutlineCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.transform(x, y);
        self.cur = p;
        self.start = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.transform(x, y);
        self.push(p);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let ctrl = self.transform(x1, y1);
        let to = self.transform(x, y);
        self.flatten_quad(ctrl, to);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let c1 = self.transform(x1, y1);
        let c2 = self.transform(x2, y2);
        let to = self.transform(x, y);
        self.flatten_cubic(c1, c2, to);
    }

    fn close(&mut self) {
        let start = self.start;
        self.push(start);
    }
}

struct PendingGlyph {
    codepoint: u32,
    gid: Option<GlyphId>,
    bbox: Option<TtfRect>,
    advance: f32,
}

/// Build a font atlas from raw TTF bytes and an explicit codepoint list
/// (`dvz_atlas` + `dvz_atlas_codepoints`/`dvz_atlas_string` +
/// `dvz_atlas_generate`). `font_size` is the target em size in pixels.
pub fn build_atlas(ttf_bytes: &[u8], codepoints: &[u32], font_size: f64) -> Result<FontAtlas> {
    if codepoints.is_empty() {
        return Err(AtlasError::EmptyCodepoints);
    }
    let face = Face::parse(ttf_bytes, 0).map_err(|e| AtlasError::Parse(format!("{:?}", e)))?;
    let upm = face.units_per_em() as f64;
    let scale = font_size / upm;
    let pad = (PIXEL_RANGE / 2.0).ceil() + 1.0;

    let pending: Vec<PendingGlyph> = codepoints
        .iter()
        .map(|&cp| {
            let ch = char::from_u32(cp);
            let gid = ch.and_then(|c| face.glyph_index(c));
            let bbox = gid.and_then(|g| face.glyph_bounding_box(g));
            let advance = gid
                .and_then(|g| face.glyph_hor_advance(g))
                .map(|a| a as f64 * scale)
                .unwrap_or(0.0) as f32;
            PendingGlyph { codepoint: cp, gid, bbox, advance }
        })
        .collect();

    let sizes: Vec<(u32, u32)> = pending
        .iter()
        .map(|g| match g.bbox {
            Some(b) => {
                let w = ((b.width() as f64) * scale + 2.0 * pad).ceil().max(1.0) as u32;
                let h = ((b.height() as f64) * scale + 2.0 * pad).ceil().max(1.0) as u32;
                (w, h)
            }
            None => (0, 0),
        })
        .collect();

    let (rects, side) = pack_square(&sizes, 0);
    let mut rgb = vec![0u8; (side * side * 3) as usize];
    let mut glyphs = Vec::with_capacity(pending.len());

    for (i, g) in pending.iter().enumerate() {
        let rect = rects[i];
        if let (Some(gid), Some(bbox)) = (g.gid, g.bbox) {
            if rect.w > 0 && rect.h > 0 {
                let mut collector = OutlineCollector {
                    segments: Vec::new(),
                    cur: Point::new(0.0, 0.0),
                    start: Point::new(0.0, 0.0),
                    bbox_min: (bbox.x_min as f64, bbox.y_min as f64),
                    scale,
                    pad,
                    tile_h: rect.h as f64,
                };
                face.outline_glyph(gid, &mut collector);
                let field = generate_sdf(&collector.segments, rect.w, rect.h, PIXEL_RANGE);
                blit_channel(&mut rgb, side, rect, &field);
            }
        }
        // §4.M / atlas.cpp: table y is flipped relative to the raster.
        let flipped_y = side - rect.h - rect.y;
        glyphs.push(Glyph {
            codepoint: g.codepoint,
            x: rect.x,
            y: flipped_y,
            w: rect.w,
            h: rect.h,
            advance: g.advance,
        });
    }

    Ok(FontAtlas { width: side, height: side, rgb, glyphs })
}

fn blit_channel(rgb: &mut [u8], atlas_side: u32, rect: Rect, field: &[u8]) {
    for row in 0..rect.h {
        for col in 0..rect.w {
            let v = field[(row * rect.w + col) as usize];
            let ax = rect.x + col;
            let ay = rect.y + row;
            let offset = 3 * (ay * atlas_side + ax) as usize;
            rgb[offset] = v;
            rgb[offset + 1] = v;
            rgb[offset + 2] = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_codepoints_spans_printable_range() {
        let cps = ascii_codepoints();
        assert_eq!(cps.first(), Some(&0x20));
        assert_eq!(cps.last(), Some(&0x7e));
        assert_eq!(cps.len(), 95);
    }

    #[test]
    fn build_atlas_rejects_empty_codepoint_list() {
        let result = build_atlas(&[], &[], 32.0);
        assert!(matches!(result, Err(AtlasError::EmptyCodepoints)));
    }
}
