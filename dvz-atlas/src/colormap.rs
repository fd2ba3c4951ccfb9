// Colormap atlas lookup (§4.M), grounded on
// `examples/original_source/src/scene/colormaps.c` (`_scale_uint8`,
// `_colormap_idx`, `dvz_colormap*`) and its header's CPAL032 constants.
//
// The C original keeps the atlas as a lazily-loaded process-global byte
// array (`_load_colormaps`/`DVZ_COLORMAP_ARRAY`). Per this crate's Open
// Question resolution, `ColormapAtlas` is instead an explicit resource the
// caller constructs once and passes by reference rather than a lazy-static
// singleton, trading the original's implicit global for an ordinary owned
// value - any synchronization across threads is the caller's to add (e.g.
// wrapping it in an `RwLock` themselves); this crate does not impose
// synchronization the custom colormap API never promised.
//
// Austin Shafer - 2020

pub const ATLAS_SIZE: usize = 256;
pub const ATLAS_BYTES: usize = ATLAS_SIZE * ATLAS_SIZE * 4;

pub const CMAP_OFS: u16 = 0;
pub const CMAP_NAT: u16 = 144;
pub const CMAP_USR_OFS: u16 = CMAP_NAT;
pub const CMAP_USR: u16 = 32;
pub const CMAP_TOT: u16 = CMAP_NAT + CMAP_USR;

pub const CPAL256_OFS: u16 = CMAP_TOT;
pub const CPAL256_NAT: u16 = 32;
pub const CPAL256_USR_OFS: u16 = CPAL256_OFS + CPAL256_NAT;
pub const CPAL256_USR: u16 = 32;
pub const CPAL256_TOT: u16 = CPAL256_NAT + CPAL256_USR;

pub const CPAL032_OFS: u16 = CPAL256_OFS + CPAL256_TOT;
pub const CPAL032_NAT: u16 = 8;
pub const CPAL032_USR_OFS: u16 = CPAL032_OFS + CPAL032_NAT;
pub const CPAL032_USR: u16 = 8;
pub const CPAL032_PER_ROW: u16 = 8;
pub const CPAL032_SIZ: u16 = 32;
pub const CPAL032_TOT: u16 = CPAL032_NAT + CPAL032_USR;

pub const CMAP_CUSTOM_COUNT: u16 = 16;
pub const CMAP_CUSTOM: u16 = CMAP_TOT - CMAP_CUSTOM_COUNT;
pub const CPAL256_CUSTOM: u16 = CPAL032_OFS - CMAP_CUSTOM_COUNT;

const EPSILON: f32 = 1e-7;

/// Rescale a float value to a byte, clamping into `[vmin, vmax)` first
/// (`_scale_uint8`).
pub fn scale_u8(value: f32, vmin: f32, vmax: f32) -> u8 {
    if vmin == vmax {
        utils::log::error!("scale_u8: vmin == vmax");
        return 0;
    }
    let d = vmax - vmin;
    let mut x = (value.clamp(vmin, vmax - d * EPSILON) - vmin) / d;
    if x >= 1.0 - EPSILON {
        x = 1.0 - EPSILON;
    }
    debug_assert!((0.0..1.0).contains(&x));
    (x * 256.0).floor() as u8
}

/// `(row, col)` for a colormap index and an 8-bit value (`_colormap_idx`).
pub fn colormap_idx(cmap: u16, value: u8) -> (u8, u8) {
    if cmap >= CPAL032_OFS {
        let row = CPAL032_OFS + (cmap - CPAL032_OFS) / CPAL032_PER_ROW;
        let col = CPAL032_SIZ * ((cmap - CPAL032_OFS) % CPAL032_PER_ROW) + value as u16;
        (row as u8, col as u8)
    } else {
        (cmap as u8, value)
    }
}

fn offset_for(row: u8, col: u8) -> usize {
    row as usize * ATLAS_SIZE * 4 + col as usize * 4
}

/// An explicit, owned 256x256 RGBA colormap atlas. Not a global: the
/// caller constructs one (typically once, at startup) and threads it
/// through wherever lookups or custom-colormap writes are needed.
pub struct ColormapAtlas {
    bytes: Vec<u8>,
}

impl ColormapAtlas {
    /// An all-zero atlas; real content is expected to come from
    /// `from_bytes` (e.g. an embedded resource loaded at startup).
    pub fn empty() -> Self {
        Self { bytes: vec![0u8; ATLAS_BYTES] }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        assert_eq!(bytes.len(), ATLAS_BYTES, "colormap atlas must be exactly 256x256x4 bytes");
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `dvz_colormap`: look up an RGBA color for `cmap`/`value`. Alpha is
    /// always forced to 255, matching the original.
    pub fn colormap(&self, cmap: u16, value: u8) -> [u8; 4] {
        let (row, col) = colormap_idx(cmap, value);
        let offset = offset_for(row, col);
        [self.bytes[offset], self.bytes[offset + 1], self.bytes[offset + 2], 255]
    }

    /// `dvz_colormap_scale`: continuous scaling into `[vmin, vmax]` then
    /// lookup.
    pub fn colormap_scale(&self, cmap: u16, value: f32, vmin: f32, vmax: f32) -> [u8; 4] {
        self.colormap(cmap, scale_u8(value, vmin, vmax))
    }

    /// `dvz_colormap_array`.
    pub fn colormap_array(&self, cmap: u16, values: &[f32], vmin: f32, vmax: f32) -> Vec<[u8; 4]> {
        values.iter().map(|&v| self.colormap_scale(cmap, v, vmin, vmax)).collect()
    }

    /// Overwrite one color slot (the custom colormap API's primitive).
    pub fn set_color(&mut self, row: u8, col: u8, color: [u8; 4]) {
        let offset = offset_for(row, col);
        self.bytes[offset..offset + 4].copy_from_slice(&color);
    }

    /// Register a custom colormap (`dvz_colormap_custom`): `cmap` must
    /// fall in the continuous-custom or 256-palette-custom ranges.
    pub fn set_custom(&mut self, cmap: u16, colors: &[[u8; 4]]) {
        assert!(
            (CMAP_CUSTOM..CMAP_TOT).contains(&cmap) || (CPAL256_CUSTOM..CPAL032_OFS).contains(&cmap),
            "custom colormap index out of range"
        );
        assert!(!colors.is_empty());
        for (i, &color) in colors.iter().enumerate() {
            let (row, col) = colormap_idx(cmap, i as u8);
            self.set_color(row, col, color);
        }
    }
}

impl Default for ColormapAtlas {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_u8_maps_range_to_full_byte_span() {
        assert_eq!(scale_u8(0.0, 0.0, 1.0), 0);
        assert_eq!(scale_u8(1.0, 0.0, 1.0), 255);
        assert_eq!(scale_u8(0.5, 0.0, 1.0), 127);
    }

    #[test]
    fn scale_u8_clamps_out_of_range_values() {
        assert_eq!(scale_u8(-10.0, 0.0, 1.0), 0);
        assert_eq!(scale_u8(10.0, 0.0, 1.0), 255);
    }

    #[test]
    fn continuous_colormap_idx_is_row_k_col_v() {
        assert_eq!(colormap_idx(5, 200), (5, 200));
    }

    #[test]
    fn palette_colormap_idx_packs_eight_per_row() {
        // First palette in the CPAL032 block starts at CPAL032_OFS itself.
        let (row, col) = colormap_idx(CPAL032_OFS, 0);
        assert_eq!(row, CPAL032_OFS as u8);
        assert_eq!(col, 0);

        // The 9th palette (index CPAL032_OFS + 8) wraps to the next row.
        let (row2, col2) = colormap_idx(CPAL032_OFS + 8, 5);
        assert_eq!(row2, (CPAL032_OFS + 1) as u8);
        assert_eq!(col2, 5);
    }

    #[test]
    fn lookup_reflects_loaded_bytes() {
        let mut bytes = vec![0u8; ATLAS_BYTES];
        let offset = offset_for(10, 20);
        bytes[offset..offset + 4].copy_from_slice(&[1, 2, 3, 4]);
        let atlas = ColormapAtlas::from_bytes(bytes);
        assert_eq!(atlas.colormap(10, 20), [1, 2, 3, 255]);
    }

    #[test]
    fn set_custom_writes_sequential_colors() {
        let mut atlas = ColormapAtlas::empty();
        atlas.set_custom(CMAP_CUSTOM, &[[10, 20, 30, 255], [40, 50, 60, 255]]);
        assert_eq!(atlas.colormap(CMAP_CUSTOM, 0), [10, 20, 30, 255]);
        assert_eq!(atlas.colormap(CMAP_CUSTOM, 1), [40, 50, 60, 255]);
    }
}
