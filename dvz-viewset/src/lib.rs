// Viewset Compositor (§4.F): the mapping from declarative scene state
// (views, visuals, transforms, indexed/indirect draws, instancing,
// visibility) to an ordered sequence of record requests fed back into the
// request protocol.
//
// Grounded on `examples/original_source/src/scene/viewset.c`'s
// `dvz_viewset_build` for the exact emission order (one `record_begin`,
// per-view `record_viewport` + per-visible-instance draw call, one final
// `record_end`), and on the Instance/View/Viewset ownership split from
// spec.md §3 ("viewset owns its views; view owns its instance records;
// instance records reference but do not own visuals").
//
// Austin Shafer - 2020

use dvz_request::{Builder, Id};

#[cfg(test)]
mod tests;

/// A 2D integer offset or extent in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point2 {
    pub x: u32,
    pub y: u32,
}

impl Point2 {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// How an [`Instance`]'s draw call is dispatched, mirroring the
/// `instance.visual.flags & {INDIRECT, INDEXED}` check in spec.md §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Direct,
    Indexed,
    Indirect,
}

/// A vertex/index range plus an instance range, and the indirect-draw dat
/// when `mode == Indirect`.
#[derive(Debug, Clone, Copy)]
pub struct DrawRange {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub index_count: u32,
    pub first_instance: u32,
    pub instance_count: u32,
    pub indirect_dat: Id,
    pub indirect_count: u32,
}

impl Default for DrawRange {
    fn default() -> Self {
        Self {
            first_vertex: 0,
            vertex_count: 0,
            first_index: 0,
            vertex_offset: 0,
            index_count: 0,
            first_instance: 0,
            instance_count: 1,
            indirect_dat: 0,
            indirect_count: 1,
        }
    }
}

/// One `(visual, range, instance range, visibility, transform)` entry
/// inside a [`View`] (glossary: Instance record). References but does not
/// own its visual.
#[derive(Debug, Clone, Copy)]
pub struct Instance {
    pub visual: Id,
    pub graphics: Id,
    pub mode: DrawMode,
    pub range: DrawRange,
    pub visible: bool,
}

impl Instance {
    pub fn new(visual: Id, graphics: Id, mode: DrawMode) -> Self {
        Self {
            visual,
            graphics,
            mode,
            range: DrawRange::default(),
            visible: true,
        }
    }

    pub fn with_range(mut self, range: DrawRange) -> Self {
        self.range = range;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// A rectangular sub-region of a canvas hosting a list of draw instances
/// (glossary: View).
#[derive(Debug, Clone)]
pub struct View {
    pub offset: Point2,
    pub shape: Point2,
    pub content_scale: f64,
    instances: Vec<Instance>,
}

impl View {
    pub fn new(offset: Point2, shape: Point2) -> Self {
        Self {
            offset,
            shape,
            content_scale: 1.0,
            instances: Vec::new(),
        }
    }

    pub fn add_instance(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Map a point in canvas pixels ("global") to pixels relative to this
    /// view's offset, bounded by its shape ("local"); §4.F.
    pub fn global_to_local(&self, global: (f64, f64)) -> (f64, f64) {
        (global.0 - self.offset.x as f64, global.1 - self.offset.y as f64)
    }

    /// Map a local-space point to normalized device coordinates ("scaled"):
    /// `view.offset` maps to `(-1, +1)`, the opposite corner maps to
    /// `(+1, -1)` (note the y-inversion), extrapolating linearly outside
    /// the view's extent.
    pub fn local_to_scaled(&self, local: (f64, f64)) -> (f64, f64) {
        let w = self.shape.x as f64;
        let h = self.shape.y as f64;
        let sx = if w != 0.0 { (local.0 / w) * 2.0 - 1.0 } else { -1.0 };
        let sy = if h != 0.0 { 1.0 - (local.1 / h) * 2.0 } else { 1.0 };
        (sx, sy)
    }

    /// `global -> local -> scaled` in one call, per §4.F's interaction-layer
    /// coordinate transform.
    pub fn global_to_scaled(&self, global: (f64, f64)) -> (f64, f64) {
        self.local_to_scaled(self.global_to_local(global))
    }
}

/// The set of views bound to a canvas (glossary: Viewset). Owns its views;
/// tracks a dirty flag so a no-op rebuild is cheap.
pub struct Viewset {
    canvas: Id,
    views: Vec<View>,
    dirty: bool,
}

impl Viewset {
    pub fn new(canvas: Id) -> Self {
        Self {
            canvas,
            views: Vec::new(),
            dirty: true,
        }
    }

    pub fn canvas(&self) -> Id {
        self.canvas
    }

    pub fn add_view(&mut self, view: View) -> usize {
        self.views.push(view);
        self.dirty = true;
        self.views.len() - 1
    }

    pub fn view_mut(&mut self, idx: usize) -> Option<&mut View> {
        self.dirty = true;
        self.views.get_mut(idx)
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Emit a fresh ordered sequence of record requests for the current
    /// viewset state (§4.F's pseudocode, reproduced verbatim): one
    /// `record_begin`, then per view a `record_viewport` followed by one
    /// record-draw-variant call per *visible* instance, then one final
    /// `record_end`. Idempotent: depends only on current viewset state, so
    /// two consecutive calls with an unchanged viewset emit identical
    /// sequences (§8 invariant 3).
    pub fn build(&self, builder: &mut Builder) {
        builder.record_begin(self.canvas);
        for view in &self.views {
            builder.record_viewport(
                self.canvas,
                (view.offset.x, view.offset.y),
                (view.shape.x, view.shape.y),
            );
            for instance in view.instances.iter().filter(|i| i.visible) {
                let r = &instance.range;
                match instance.mode {
                    DrawMode::Indirect => {
                        builder.record_draw_indirect(
                            self.canvas,
                            instance.graphics,
                            r.indirect_dat,
                            r.indirect_count,
                        );
                    }
                    DrawMode::Indexed => {
                        builder.record_draw_indexed(
                            self.canvas,
                            instance.graphics,
                            r.first_index,
                            r.vertex_offset,
                            r.index_count,
                            r.first_instance,
                            r.instance_count,
                        );
                    }
                    DrawMode::Direct => {
                        builder.record_draw(
                            self.canvas,
                            instance.graphics,
                            r.first_vertex,
                            r.vertex_count,
                            r.first_instance,
                            r.instance_count,
                        );
                    }
                }
            }
        }
        builder.record_end(self.canvas);
    }
}
