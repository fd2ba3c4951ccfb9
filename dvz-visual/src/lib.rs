// Visual / Params (§4.G): per-visual attribute and uniform/parameter
// plumbing into the request protocol.
//
// Attribute tables are described as binding/location/offset/format tuples,
// generalized to an arbitrary attribute count; params blocks follow a CPU
// staging buffer, upload-on-change pattern.
//
// Austin Shafer - 2020

use dvz_request::{Builder, DatType, Id};
use thiserror::Error;

#[cfg(test)]
mod tests;

bitflags::bitflags! {
    pub struct VisualFlags: u32 {
        const INDEXED = 1 << 0;
        const INDIRECT = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Per-vertex attribute flags. `REPEAT_X4`: the helper writes the same
    /// value four times consecutively in the attribute buffer, used by
    /// quad-expansion visuals (glyphs, segments, paths).
    pub struct AttrFlags: u32 {
        const REPEAT_X4 = 1 << 0;
    }
}

#[derive(Debug, Error)]
pub enum VisualError {
    #[error("attribute {0} was never alloc'd before a data write")]
    NotAllocated(usize),
    #[error(
        "attribute {0} mixes REPEAT_X4 and non-repeat writes without an intervening alloc()"
    )]
    RepeatModeConflict(usize),
    #[error("attribute index {0} out of range")]
    BadAttrIndex(usize),
}

pub type Result<T> = std::result::Result<T, VisualError>;

/// One entry in a visual's attribute table: `(location, offset_in_vertex,
/// format, per-vertex flags)`.
#[derive(Debug, Clone, Copy)]
pub struct Attribute {
    pub location: u32,
    pub offset_in_vertex: u32,
    pub format: u32,
    pub item_size: usize,
    pub flags: AttrFlags,
}

impl Attribute {
    pub fn new(location: u32, offset_in_vertex: u32, format: u32, item_size: usize) -> Self {
        Self {
            location,
            offset_in_vertex,
            format,
            item_size,
            flags: AttrFlags::empty(),
        }
    }

    pub fn repeating(mut self) -> Self {
        self.flags |= AttrFlags::REPEAT_X4;
        self
    }
}

/// Host-side staging buffer for one attribute, plus the dirty range that
/// needs to be re-uploaded.
struct AttrBuffer {
    attr: Attribute,
    bytes: Vec<u8>,
    /// `n` if this attribute's buffer was last written with REPEAT_X4
    /// semantics, `None` otherwise; used to detect a mode conflict on the
    /// next write without an intervening `alloc`.
    last_write_was_repeat: Option<bool>,
}

/// A uniform/parameter struct, described by an offset table, backed by a
/// host-side buffer uploaded to a `Dat` whenever it's mutated.
pub struct ParamsBlock {
    pub dat: Id,
    bytes: Vec<u8>,
    dirty: bool,
}

impl ParamsBlock {
    pub fn new(dat: Id, size: usize) -> Self {
        Self {
            dat,
            bytes: vec![0u8; size],
            dirty: false,
        }
    }

    /// Write `value`'s raw bytes at `offset`, marking this block dirty.
    pub fn set_field(&mut self, offset: usize, value: &[u8]) {
        self.bytes[offset..offset + value.len()].copy_from_slice(value);
        self.dirty = true;
    }

    /// Upload the backing buffer to its dat if dirty, clearing the dirty
    /// flag. Returns `true` if an upload request was emitted.
    pub fn flush(&mut self, builder: &mut Builder) -> bool {
        if !self.dirty {
            return false;
        }
        builder.upload_dat(self.dat, 0, &self.bytes, false);
        self.dirty = false;
        true
    }
}

pub type DrawCallback = Box<dyn Fn(u32, u32) -> (u32, u32) + Send + Sync>;

/// A visual is identified by topology and flags and carries an attribute
/// table, a slot table, zero or more params blocks, and an optional draw
/// callback that overrides the default `(first, count)` mapping (§4.G).
pub struct Visual {
    pub topology: u32,
    pub flags: VisualFlags,
    pub vertex_dat: Id,
    pub index_dat: Option<Id>,
    vertex_stride: usize,
    attrs: Vec<AttrBuffer>,
    slots: std::collections::HashMap<u32, Id>,
    params: Vec<ParamsBlock>,
    item_count: usize,
    draw_callback: Option<DrawCallback>,
}

impl Visual {
    pub fn new(topology: u32, flags: VisualFlags, vertex_dat: Id, vertex_stride: usize) -> Self {
        Self {
            topology,
            flags,
            vertex_dat,
            index_dat: None,
            vertex_stride,
            attrs: Vec::new(),
            slots: std::collections::HashMap::new(),
            params: Vec::new(),
            item_count: 0,
            draw_callback: None,
        }
    }

    pub fn with_index_dat(mut self, index_dat: Id) -> Self {
        self.index_dat = Some(index_dat);
        self.flags |= VisualFlags::INDEXED;
        self
    }

    pub fn add_attribute(&mut self, attr: Attribute) -> usize {
        self.attrs.push(AttrBuffer {
            attr,
            bytes: Vec::new(),
            last_write_was_repeat: None,
        });
        self.attrs.len() - 1
    }

    pub fn set_slot(&mut self, slot_idx: u32, descriptor: Id) {
        self.slots.insert(slot_idx, descriptor);
    }

    pub fn add_params_block(&mut self, dat: Id, size: usize) -> usize {
        self.params.push(ParamsBlock::new(dat, size));
        self.params.len() - 1
    }

    pub fn params_mut(&mut self, idx: usize) -> &mut ParamsBlock {
        &mut self.params[idx]
    }

    pub fn set_draw_callback(&mut self, cb: DrawCallback) {
        self.draw_callback = Some(cb);
    }

    /// Size this visual's vertex (and, if indexed, index) buffers for `n`
    /// items, resetting per-attribute staging buffers.
    pub fn alloc(&mut self, n: usize) {
        self.item_count = n;
        for ab in &mut self.attrs {
            ab.bytes = vec![0u8; n * ab.attr.item_size];
            ab.last_write_was_repeat = None;
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Write `values` (each `item_size` bytes) starting at item `first`
    /// into the given attribute's CPU-side buffer, and schedule an
    /// UPLOAD to the vertex dat for the touched byte range.
    pub fn data(
        &mut self,
        attr_idx: usize,
        first: usize,
        values: &[u8],
        builder: &mut Builder,
    ) -> Result<()> {
        let item_size = {
            let ab = self
                .attrs
                .get(attr_idx)
                .ok_or(VisualError::BadAttrIndex(attr_idx))?;
            ab.attr.item_size
        };
        self.check_repeat_conflict(attr_idx, false)?;
        {
            let ab = self.attrs.get_mut(attr_idx).unwrap();
            if ab.bytes.is_empty() {
                return Err(VisualError::NotAllocated(attr_idx));
            }
            let start = first * item_size;
            let end = start + values.len();
            ab.bytes[start..end].copy_from_slice(values);
        }
        let offset = (first * self.vertex_stride) as u64;
        builder.upload_dat(self.vertex_dat, offset, values, false);
        Ok(())
    }

    /// Expand one `(u0, v0, u1, v1)` rectangle per item into four `vec2`
    /// corners in the attribute buffer (REPEAT_X4 quad-expansion helper).
    pub fn data_quads(
        &mut self,
        attr_idx: usize,
        first: usize,
        corners: &[(f32, f32, f32, f32)],
        builder: &mut Builder,
    ) -> Result<()> {
        self.check_repeat_conflict(attr_idx, true)?;
        let mut expanded = Vec::with_capacity(corners.len() * 4 * 8);
        for &(u0, v0, u1, v1) in corners {
            for (x, y) in [(u0, v0), (u1, v0), (u0, v1), (u1, v1)] {
                expanded.extend_from_slice(&x.to_le_bytes());
                expanded.extend_from_slice(&y.to_le_bytes());
            }
        }
        {
            let ab = self
                .attrs
                .get_mut(attr_idx)
                .ok_or(VisualError::BadAttrIndex(attr_idx))?;
            if ab.bytes.is_empty() {
                return Err(VisualError::NotAllocated(attr_idx));
            }
            let start = first * ab.attr.item_size;
            let end = start + expanded.len();
            ab.bytes[start..end].copy_from_slice(&expanded);
            ab.last_write_was_repeat = Some(true);
        }
        let offset = (first * self.vertex_stride) as u64;
        builder.upload_dat(self.vertex_dat, offset, &expanded, false);
        Ok(())
    }

    fn check_repeat_conflict(&mut self, attr_idx: usize, is_repeat: bool) -> Result<()> {
        let ab = self
            .attrs
            .get_mut(attr_idx)
            .ok_or(VisualError::BadAttrIndex(attr_idx))?;
        if let Some(prev) = ab.last_write_was_repeat {
            if prev != is_repeat {
                return Err(VisualError::RepeatModeConflict(attr_idx));
            }
        }
        ab.last_write_was_repeat = Some(is_repeat);
        Ok(())
    }

    /// Default `(first, count) -> (first_vertex, vertex_count)` mapping,
    /// overridden by `draw_callback` when set (e.g. glyph/segment/path
    /// visuals turning a per-item count into a per-vertex count, such as 4
    /// or 6 vertices per item).
    pub fn draw_range(&self, first: u32, count: u32) -> (u32, u32) {
        match &self.draw_callback {
            Some(cb) => cb(first, count),
            None => (first, count),
        }
    }
}

pub fn dat_type_for_vertex() -> DatType {
    DatType::Vertex
}
