//! Colormap atlas lookup, and MSDF font atlas generation/serialization
//! (§4.M).
//!
//! Austin Shafer - 2020

pub mod colormap;
pub mod font;
pub mod packer;
pub mod sdf;
pub mod serialize;

pub use colormap::{scale_u8, ColormapAtlas};
pub use font::{build_atlas, ascii_codepoints, AtlasError, FontAtlas, Glyph};
pub use serialize::{deserialize_atlas, serialize_atlas, SerializeError};
