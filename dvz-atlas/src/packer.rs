// Tight square atlas packer (§4.M), grounded on
// `examples/original_source/src/scene/atlas.cpp`'s use of
// `msdf-atlas-gen`'s `TightAtlasPacker` with `DimensionsConstraint::SQUARE`
// and `setMinimumScale`. No Rust crate in this pack wraps `msdf-atlas-gen`,
// so the packing itself - a shelf bin-packer constrained to grow as a
// square and a minimum-scale floor - is reimplemented directly; it's
// ordinary 2D geometry, not something that needs an external dependency.
//
// Austin Shafer - 2020

pub const MINIMUM_SCALE: f64 = 64.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Pack `sizes` (width, height in pixels) into a square atlas, returning
/// one `Rect` per input (in the same order) plus the final atlas
/// dimensions. Uses a simple shelf strategy: glyphs are packed tallest
/// first into horizontal shelves, doubling the square side until
/// everything fits.
pub fn pack_square(sizes: &[(u32, u32)], padding: u32) -> (Vec<Rect>, u32) {
    if sizes.is_empty() {
        return (Vec::new(), MINIMUM_SCALE as u32);
    }

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].1.cmp(&sizes[a].1));

    let mut side = MINIMUM_SCALE as u32;
    loop {
        if let Some(rects) = try_pack(sizes, &order, side, padding) {
            return (rects, side);
        }
        side *= 2;
    }
}

fn try_pack(sizes: &[(u32, u32)], order: &[usize], side: u32, padding: u32) -> Option<Vec<Rect>> {
    let mut rects = vec![Rect::default(); sizes.len()];
    let mut cursor_x = padding;
    let mut cursor_y = padding;
    let mut shelf_height = 0u32;

    for &idx in order {
        let (w, h) = sizes[idx];
        if w == 0 || h == 0 {
            rects[idx] = Rect { x: 0, y: 0, w: 0, h: 0 };
            continue;
        }
        if cursor_x + w + padding > side {
            cursor_x = padding;
            cursor_y += shelf_height + padding;
            shelf_height = 0;
        }
        if cursor_y + h + padding > side {
            return None;
        }
        rects[idx] = Rect { x: cursor_x, y: cursor_y, w, h };
        cursor_x += w + padding;
        shelf_height = shelf_height.max(h);
    }

    Some(rects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_square_places_every_glyph_without_overlap() {
        let sizes = vec![(20, 30), (15, 15), (40, 10), (5, 5), (25, 25)];
        let (rects, side) = pack_square(&sizes, 2);
        assert_eq!(rects.len(), sizes.len());
        for (i, r) in rects.iter().enumerate() {
            assert_eq!(r.w, sizes[i].0);
            assert_eq!(r.h, sizes[i].1);
            assert!(r.x + r.w <= side);
            assert!(r.y + r.h <= side);
        }
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                assert!(!overlaps(&rects[i], &rects[j]), "{:?} overlaps {:?}", rects[i], rects[j]);
            }
        }
    }

    #[test]
    fn zero_sized_glyphs_are_placed_at_origin() {
        let sizes = vec![(0, 0), (10, 10)];
        let (rects, _side) = pack_square(&sizes, 1);
        assert_eq!(rects[0].w, 0);
        assert_eq!(rects[0].h, 0);
    }

    #[test]
    fn large_glyph_sets_force_atlas_growth_beyond_minimum_scale() {
        let sizes: Vec<(u32, u32)> = (0..2000).map(|_| (40, 40)).collect();
        let (_rects, side) = pack_square(&sizes, 1);
        assert!(side as f64 > MINIMUM_SCALE);
    }

    fn overlaps(a: &Rect, b: &Rect) -> bool {
        if a.w == 0 || a.h == 0 || b.w == 0 || b.h == 0 {
            return false;
        }
        a.x < b.x + b.w && b.x < a.x + a.w && a.y < b.y + b.h && b.y < a.y + a.h
    }
}
