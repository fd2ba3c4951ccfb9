// YAML pretty-printing (§4.D.2) and dump/load round-trip support.
//
// Austin Shafer - 2020

use crate::batch::Batch;
use crate::types::{Payload, Request};

/// Binary fields above this size (bytes) and at or under 1 MiB render as
/// base64; above 1 MiB (or when the `SMALL` flag forces it) they render as
/// `<snip>`.
const HEX_MAX_SIZE: usize = 1024;
const BASE64_MAX_SIZE: usize = 1024 * 1024;

fn render_binary(data: &[u8], force_small: bool) -> String {
    if force_small && data.len() > HEX_MAX_SIZE {
        return "<snip>".to_string();
    }
    if data.len() <= HEX_MAX_SIZE {
        data.iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    } else if data.len() <= BASE64_MAX_SIZE {
        base64::encode_config(data, base64::STANDARD_NO_PAD)
    } else {
        "<snip>".to_string()
    }
}

fn indent_block(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|l| format!("{}{}", pad, l))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Request {
    /// Render this request's `content` block as a YAML mapping fragment
    /// (no leading `content:` key - the caller supplies the nesting).
    pub fn content_yaml(&self) -> String {
        let small = self.flags.contains(crate::types::Flags::SMALL);
        match &self.content {
            Payload::None => "type: none".to_string(),
            Payload::CreateCanvas { width, height } | Payload::ResizeCanvas { width, height } => {
                format!("width: {}\nheight: {}", width, height)
            }
            Payload::DeleteCanvas => "{}".to_string(),
            Payload::SetBackground { rgba } => {
                format!("rgba: [{}, {}, {}, {}]", rgba[0], rgba[1], rgba[2], rgba[3])
            }
            Payload::CreateDat { dat_type, size } => {
                format!("dat_type: {:?}\nsize: {}", dat_type, size)
            }
            Payload::ResizeDat { size } => format!("size: {}", size),
            Payload::UploadDat { offset, size, data } => format!(
                "offset: {}\nsize: {}\ndata: {}",
                offset,
                size,
                render_binary(data, small)
            ),
            Payload::DeleteDat => "{}".to_string(),
            Payload::CreateTex { dims, shape, format } => format!(
                "dims: {:?}\nshape: [{}, {}, {}]\nformat: {:?}",
                dims, shape.x, shape.y, shape.z, format
            ),
            Payload::ResizeTex { shape } => format!("shape: [{}, {}, {}]", shape.x, shape.y, shape.z),
            Payload::UploadTex {
                offset,
                shape,
                size,
                data,
            } => format!(
                "offset: [{}, {}, {}]\nshape: [{}, {}, {}]\nsize: {}\ndata: {}",
                offset.x,
                offset.y,
                offset.z,
                shape.x,
                shape.y,
                shape.z,
                size,
                render_binary(data, small)
            ),
            Payload::DeleteTex => "{}".to_string(),
            Payload::CreateSampler {
                filter,
                address_mode,
            } => format!("filter: {}\naddress_mode: {}", filter, address_mode),
            Payload::DeleteSampler => "{}".to_string(),
            Payload::CreateShader { format, size, code } => match format {
                crate::types::ShaderFormat::Glsl => {
                    let src = String::from_utf8_lossy(code);
                    format!(
                        "format: glsl\nsize: {}\ncode: |\n{}",
                        size,
                        indent_block(&src, 8)
                    )
                }
                crate::types::ShaderFormat::Spirv => format!(
                    "format: spirv\nsize: {}\nbuffer: {}",
                    size,
                    render_binary(code, small)
                ),
            },
            Payload::CreateGraphics { topology } => format!("topology: {}", topology),
            Payload::DeleteGraphics => "{}".to_string(),
            Payload::SetPrimitive { topology } => format!("topology: {}", topology),
            Payload::SetBlend { blend_type } => format!("blend_type: {}", blend_type),
            Payload::SetMask { mask } => format!("mask: {}", mask),
            Payload::SetDepth { depth_test } => format!("depth_test: {}", depth_test),
            Payload::SetPolygon { polygon_mode } => format!("polygon_mode: {}", polygon_mode),
            Payload::SetCull { cull_mode } => format!("cull_mode: {}", cull_mode),
            Payload::SetFront { front_face } => format!("front_face: {}", front_face),
            Payload::SetShader { shader } => format!("shader: 0x{:016x}", shader),
            Payload::SetVertex { binding_idx, stride } => {
                format!("binding_idx: {}\nstride: {}", binding_idx, stride)
            }
            Payload::SetAttr {
                location,
                binding_idx,
                offset,
                format,
            } => format!(
                "location: {}\nbinding_idx: {}\noffset: {}\nformat: {}",
                location, binding_idx, offset, format
            ),
            Payload::SetSlot { slot_idx, kind } => format!("slot_idx: {}\nkind: {:?}", slot_idx, kind),
            Payload::SetPush { size, shader_stage } => {
                format!("size: {}\nshader_stage: {}", size, shader_stage)
            }
            Payload::SetSpecialization { idx, size, data } => format!(
                "idx: {}\nsize: {}\ndata: {}",
                idx,
                size,
                render_binary(data, small)
            ),
            Payload::BindVertex {
                binding_idx,
                dat,
                offset,
            } => format!(
                "binding_idx: {}\ndat: 0x{:016x}\noffset: {}",
                binding_idx, dat, offset
            ),
            Payload::BindIndex { dat, offset } => {
                format!("dat: 0x{:016x}\noffset: {}", dat, offset)
            }
            Payload::BindDat { slot_idx, dat } => {
                format!("slot_idx: {}\ndat: 0x{:016x}", slot_idx, dat)
            }
            Payload::BindTex {
                slot_idx,
                tex,
                sampler,
            } => format!(
                "slot_idx: {}\ntex: 0x{:016x}\nsampler: 0x{:016x}",
                slot_idx, tex, sampler
            ),
            Payload::Record(cmd) => format!("{:?}", cmd),
        }
    }

    pub fn print_yaml(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("- action: {}\n", self.action.name()));
        s.push_str(&format!("  type: {}\n", self.object_type.name()));
        s.push_str(&format!("  id: 0x{:016x}\n", self.id));
        if !self.flags.is_empty() {
            s.push_str(&format!("  flags: {}\n", self.flags.bits()));
        }
        if let Some(desc) = &self.desc {
            s.push_str(&format!("  desc: {}\n", desc));
        }
        s.push_str("  content:\n");
        s.push_str(&indent_block(&self.content_yaml(), 4));
        s.push('\n');
        s
    }
}

impl Batch {
    /// Render the full batch as the stable top-level YAML stream described
    /// in §6 ("YAML print stream"): a version header followed by a
    /// `requests:` list.
    pub fn print_yaml(&self) -> String {
        let mut s = String::new();
        s.push_str("---\n");
        s.push_str(&format!("version: '{}'\n", crate::types::CURRENT_VERSION));
        s.push_str("requests:\n");
        for req in self.requests() {
            s.push_str(&req.print_yaml());
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ObjectType, Request};

    #[test]
    fn stream_starts_with_version_header() {
        let batch = Batch::new();
        let yaml = batch.print_yaml();
        assert!(yaml.starts_with("---\nversion:"));
    }

    #[test]
    fn request_renders_action_type_and_hex_id() {
        let req = Request::new(
            Action::Create,
            ObjectType::Dat,
            0x0123456789abcdef,
            Payload::CreateDat {
                dat_type: crate::types::DatType::Vertex,
                size: 16384,
            },
        );
        let yaml = req.print_yaml();
        assert!(yaml.contains("action: create"));
        assert!(yaml.contains("type: dat"));
        assert!(yaml.contains("id: 0x0123456789abcdef"));
        assert!(yaml.contains("size: 16384"));
    }

    #[test]
    fn small_binary_renders_as_hex() {
        let req = Request::new(
            Action::Upload,
            ObjectType::Dat,
            1,
            Payload::UploadDat {
                offset: 0,
                size: 3,
                data: vec![0xAB, 0xCD, 0xEF],
            },
        );
        assert!(req.content_yaml().contains("AB CD EF"));
    }

    #[test]
    fn glsl_source_renders_as_literal_block() {
        let req = Request::new(
            Action::Create,
            ObjectType::Shader,
            1,
            Payload::CreateShader {
                format: crate::types::ShaderFormat::Glsl,
                size: 13,
                code: b"void main(){}".to_vec(),
            },
        );
        let yaml = req.content_yaml();
        assert!(yaml.contains("code: |"));
        assert!(yaml.contains("        void main(){}"));
    }
}
