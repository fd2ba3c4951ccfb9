// Request record types: action/object enums, flags, the tagged payload
// union, and the `Request` record itself.
//
// A discriminated union over action x object (spec.md §9's "tagged payload
// union" design note) is expressed here as a flat `Payload` enum with one
// variant per (action, type) pair the protocol actually uses, rather than
// nested generics - the same flattening strategy the note recommends for
// implementations that cannot express nested unions, applied idiomatically
// with Rust's own enum instead of a C flat struct + manual variant tag.
//
// Austin Shafer - 2020

use serde::{Deserialize, Serialize};

use crate::id::ID_NONE;

/// Current protocol schema version. Bumped whenever `Payload`'s on-wire
/// shape changes in a way that isn't backward compatible; loaders reject a
/// `Request::version` that doesn't match (§4.D.4 - no auto-migration).
pub const CURRENT_VERSION: u32 = 1;

pub type Id = u64;
pub type Size = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    None,
    Create,
    Delete,
    Resize,
    Update,
    Bind,
    Record,
    Upload,
    Upfill,
    Download,
    Set,
    Get,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Resize => "resize",
            Action::Update => "update",
            Action::Bind => "bind",
            Action::Record => "record",
            Action::Upload => "upload",
            Action::Upfill => "upfill",
            Action::Download => "download",
            Action::Set => "set",
            Action::Get => "get",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    Canvas,
    Dat,
    Tex,
    Sampler,
    Shader,
    Graphics,
    Background,
    Vertex,
    Index,
    Record,
}

impl ObjectType {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::Canvas => "canvas",
            ObjectType::Dat => "dat",
            ObjectType::Tex => "tex",
            ObjectType::Sampler => "sampler",
            ObjectType::Shader => "shader",
            ObjectType::Graphics => "graphics",
            ObjectType::Background => "background",
            ObjectType::Vertex => "vertex",
            ObjectType::Index => "index",
            ObjectType::Record => "record",
        }
    }
}

bitflags::bitflags! {
    #[derive(Serialize, Deserialize)]
    pub struct Flags: u32 {
        /// Suppresses the protocol's default deep-copy of caller-owned
        /// variable-length buffers (§4.D.1 step 3); the caller is
        /// responsible for keeping the buffer alive until consumed.
        const NOCOPY = 1 << 0;
        /// Hints the YAML printer to elide binary payloads above its
        /// size bound with `<snip>` rather than base64-encoding them.
        const SMALL = 1 << 1;
        const INDEXED = 1 << 2;
        const INDIRECT = 1 << 3;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatType {
    Vertex,
    Index,
    Uniform,
    Storage,
    Indirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TexDims {
    Tex1D,
    Tex2D,
    Tex3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TexFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    R32Sfloat,
    Rgba32Sfloat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderFormat {
    Glsl,
    Spirv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    Dat,
    Tex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Shape3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Shape3 {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn product(&self) -> u64 {
        self.x as u64 * self.y.max(1) as u64 * self.z.max(1) as u64
    }

    /// Dimensionality implied by trailing zero extent components, per
    /// §3's "shape: three u32 with zeros trailing the dimensionality".
    pub fn dims(&self) -> TexDims {
        if self.z > 0 {
            TexDims::Tex3D
        } else if self.y > 0 {
            TexDims::Tex2D
        } else {
            TexDims::Tex1D
        }
    }
}

/// Sub-command variant of a `RECORD+RECORD` request, per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordCommand {
    Begin,
    Viewport {
        offset: (u32, u32),
        shape: (u32, u32),
    },
    Push {
        graphics: Id,
        slot_idx: u32,
        offset: u32,
        size: u32,
        data: Vec<u8>,
    },
    Draw {
        graphics: Id,
        first_vertex: u32,
        vertex_count: u32,
        first_instance: u32,
        instance_count: u32,
    },
    DrawIndexed {
        graphics: Id,
        first_index: u32,
        vertex_offset: i32,
        index_count: u32,
        first_instance: u32,
        instance_count: u32,
    },
    DrawIndirect {
        graphics: Id,
        indirect_dat: Id,
        draw_count: u32,
    },
    DrawIndexedIndirect {
        graphics: Id,
        indirect_dat: Id,
        draw_count: u32,
    },
    End,
}

/// The tagged payload carried by a `Request`. One variant per (action,
/// type) pair the protocol helpers in §4.D.1 construct; `Request::print_yaml`
/// dispatches on this enum's discriminant the way the C original switched on
/// `(action, type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    None,

    CreateCanvas {
        width: u32,
        height: u32,
    },
    ResizeCanvas {
        width: u32,
        height: u32,
    },
    DeleteCanvas,
    SetBackground {
        rgba: [u8; 4],
    },

    CreateDat {
        dat_type: DatType,
        size: Size,
    },
    ResizeDat {
        size: Size,
    },
    UploadDat {
        offset: Size,
        size: Size,
        data: Vec<u8>,
    },
    DeleteDat,

    CreateTex {
        dims: TexDims,
        shape: Shape3,
        format: TexFormat,
    },
    ResizeTex {
        shape: Shape3,
    },
    UploadTex {
        offset: Shape3,
        shape: Shape3,
        size: Size,
        data: Vec<u8>,
    },
    DeleteTex,

    CreateSampler {
        filter: u32,
        address_mode: u32,
    },
    DeleteSampler,

    CreateShader {
        format: ShaderFormat,
        size: Size,
        /// GLSL source (format == Glsl) or raw SPIR-V bytes (format ==
        /// Spirv, `size` must be a multiple of 4).
        code: Vec<u8>,
    },

    CreateGraphics {
        topology: u32,
    },
    DeleteGraphics,
    SetPrimitive {
        topology: u32,
    },
    SetBlend {
        blend_type: u32,
    },
    SetMask {
        mask: u32,
    },
    SetDepth {
        depth_test: u32,
    },
    SetPolygon {
        polygon_mode: u32,
    },
    SetCull {
        cull_mode: u32,
    },
    SetFront {
        front_face: u32,
    },
    SetShader {
        shader: Id,
    },
    SetVertex {
        binding_idx: u32,
        stride: u32,
    },
    SetAttr {
        location: u32,
        binding_idx: u32,
        offset: u32,
        format: u32,
    },
    SetSlot {
        slot_idx: u32,
        kind: SlotKind,
    },
    SetPush {
        size: u32,
        shader_stage: u32,
    },
    SetSpecialization {
        idx: u32,
        size: u32,
        data: Vec<u8>,
    },

    BindVertex {
        binding_idx: u32,
        dat: Id,
        offset: Size,
    },
    BindIndex {
        dat: Id,
        offset: Size,
    },
    BindDat {
        slot_idx: u32,
        dat: Id,
    },
    BindTex {
        slot_idx: u32,
        tex: Id,
        sampler: Id,
    },

    Record(RecordCommand),
}

/// Immutable-once-emitted command record. Matches spec.md §3's field list
/// exactly: `version`, `action`, `type`, `id`, `flags`, optional `desc`,
/// and the tagged `content` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub version: u32,
    pub action: Action,
    pub object_type: ObjectType,
    pub id: Id,
    pub flags: Flags,
    pub desc: Option<String>,
    pub content: Payload,
}

impl Request {
    pub fn new(action: Action, object_type: ObjectType, id: Id, content: Payload) -> Self {
        Self {
            version: CURRENT_VERSION,
            action,
            object_type,
            id,
            flags: Flags::empty(),
            desc: None,
            content,
        }
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }
}

/// `id == ID_NONE` is only ever valid for requests that mint a fresh id
/// (creation helpers); anything else referencing `ID_NONE` is a precondition
/// violation per §7 category 1, asserted rather than returned as an error.
pub fn assert_valid_target_id(id: Id) {
    assert_ne!(id, ID_NONE, "request target id must not be DVZ_ID_NONE");
}
