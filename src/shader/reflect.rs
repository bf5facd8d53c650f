//! Uniform interface reflection.
//!
//! WGSL has no loose uniforms, so horizon shaders follow one convention: all
//! scalars live as members of a single `var<uniform>` struct, textures and
//! samplers are individual `@group(0)` globals. Reflection turns that into a
//! name → [`UniformLocation`] table, the equivalent of a GL program's
//! uniform-location cache.

use crate::gpu::pipeline_helpers;
use crate::gpu::texture::TextureKind;

/// Scalar shape of a uniform-buffer member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `f32`
    Float,
    /// `vec2<f32>`
    Vec2,
}

impl ParamKind {
    /// Size in bytes.
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Self::Float => 4,
            Self::Vec2 => 8,
        }
    }
}

/// One member of the uniform buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamField {
    /// Member name, as written in WGSL.
    pub name: String,
    /// Byte offset within the buffer.
    pub offset: u32,
    /// Member type.
    pub kind: ParamKind,
}

/// The single uniform buffer a fragment stage may declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBlock {
    /// Binding index in group 0.
    pub binding: u32,
    /// Buffer size in bytes, rounded up to 16.
    pub size: u32,
    /// Members in declaration order.
    pub fields: Vec<ParamField>,
}

/// A sampled texture global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlot {
    /// Global variable name.
    pub name: String,
    /// Binding index in group 0.
    pub binding: u32,
    /// Declared dimensionality.
    pub kind: TextureKind,
}

/// Where a named uniform lives in a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformLocation {
    /// A member of the uniform buffer.
    Param {
        /// Byte offset.
        offset: u32,
        /// Member type.
        kind: ParamKind,
    },
    /// A texture binding.
    Texture {
        /// Binding index in group 0.
        binding: u32,
        /// Declared dimensionality.
        kind: TextureKind,
    },
}

/// Reflected resource interface of a fragment stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformInterface {
    /// The uniform buffer, if any.
    pub params: Option<ParamBlock>,
    /// Sampled textures, in declaration order.
    pub textures: Vec<TextureSlot>,
    /// Binding indices of sampler globals.
    pub samplers: Vec<u32>,
}

impl UniformInterface {
    /// Reflect every bound global of `module`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first resource that does not follow the
    /// group-0 / single-uniform-buffer convention.
    pub fn reflect(module: &naga::Module) -> Result<Self, String> {
        let mut interface = Self::default();

        for (_, global) in module.global_variables.iter() {
            let Some(binding) = &global.binding else {
                continue;
            };
            let name = global
                .name
                .clone()
                .unwrap_or_else(|| format!("unnamed@{}", binding.binding));
            if binding.group != 0 {
                return Err(format!(
                    "resource '{name}' uses bind group {}; only group 0 is supported",
                    binding.group
                ));
            }

            let inner = &module.types[global.ty].inner;
            match global.space {
                naga::AddressSpace::Uniform => {
                    if interface.params.is_some() {
                        return Err(format!(
                            "uniform buffer '{name}' is the second uniform buffer; only one is supported"
                        ));
                    }
                    interface.params =
                        Some(reflect_block(module, &name, binding.binding, inner)?);
                }
                naga::AddressSpace::Handle => match *inner {
                    naga::TypeInner::Image {
                        dim,
                        arrayed: false,
                        class:
                            naga::ImageClass::Sampled {
                                kind: naga::ScalarKind::Float,
                                multi: false,
                            },
                    } => {
                        let kind = match dim {
                            naga::ImageDimension::D2 => TextureKind::D2,
                            naga::ImageDimension::Cube => TextureKind::Cube,
                            _ => {
                                return Err(format!(
                                    "texture '{name}' has unsupported dimension {dim:?}"
                                ))
                            }
                        };
                        interface.textures.push(TextureSlot {
                            name,
                            binding: binding.binding,
                            kind,
                        });
                    }
                    naga::TypeInner::Sampler { comparison: false } => {
                        interface.samplers.push(binding.binding);
                    }
                    _ => {
                        return Err(format!(
                            "resource '{name}' has an unsupported handle type"
                        ))
                    }
                },
                _ => {
                    return Err(format!(
                        "resource '{name}' uses unsupported address space {:?}",
                        global.space
                    ))
                }
            }
        }

        Ok(interface)
    }

    /// Look up a uniform by name. `None` means the program does not declare
    /// it.
    #[must_use]
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        if let Some(field) = self
            .params
            .as_ref()
            .and_then(|p| p.fields.iter().find(|f| f.name == name))
        {
            return Some(UniformLocation::Param {
                offset: field.offset,
                kind: field.kind,
            });
        }
        self.textures
            .iter()
            .find(|t| t.name == name)
            .map(|t| UniformLocation::Texture {
                binding: t.binding,
                kind: t.kind,
            })
    }

    /// Every binding index the interface occupies.
    pub fn bindings(&self) -> impl Iterator<Item = u32> + '_ {
        self.params
            .iter()
            .map(|p| p.binding)
            .chain(self.textures.iter().map(|t| t.binding))
            .chain(self.samplers.iter().copied())
    }

    /// Bind group layout entries matching the interface.
    #[must_use]
    pub fn layout_entries(&self) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = Vec::new();
        if let Some(params) = &self.params {
            entries.push(pipeline_helpers::uniform_buffer(params.binding));
        }
        for slot in &self.textures {
            entries.push(pipeline_helpers::sampled_texture(
                slot.binding,
                slot.kind,
            ));
        }
        for &binding in &self.samplers {
            entries.push(pipeline_helpers::filtering_sampler(binding));
        }
        entries
    }
}

fn reflect_block(
    module: &naga::Module,
    name: &str,
    binding: u32,
    inner: &naga::TypeInner,
) -> Result<ParamBlock, String> {
    let naga::TypeInner::Struct { members, span } = inner else {
        return Err(format!("uniform buffer '{name}' must be a struct"));
    };

    let mut fields = Vec::with_capacity(members.len());
    for member in members {
        let member_name = member.name.clone().unwrap_or_default();
        let kind = match module.types[member.ty].inner {
            naga::TypeInner::Scalar(naga::Scalar::F32) => ParamKind::Float,
            naga::TypeInner::Vector {
                size: naga::VectorSize::Bi,
                scalar: naga::Scalar::F32,
            } => ParamKind::Vec2,
            _ => {
                return Err(format!(
                    "uniform '{name}.{member_name}' must be f32 or vec2<f32>"
                ))
            }
        };
        fields.push(ParamField {
            name: member_name,
            offset: member.offset,
            kind,
        });
    }

    Ok(ParamBlock {
        binding,
        size: span.div_ceil(16).max(1) * 16,
        fields,
    })
}

/// Shader-interface locations of an entry point, with their types.
pub(crate) type StageIo = Vec<(u32, naga::TypeInner)>;

/// Find an entry point by name and stage.
pub(crate) fn entry_point<'a>(
    module: &'a naga::Module,
    name: &str,
    stage: naga::ShaderStage,
) -> Option<&'a naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == stage)
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut StageIo,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.push((*location, module.types[ty].inner.clone()));
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } =
                &module.types[ty].inner
            {
                for member in members {
                    collect_locations(
                        module,
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

/// User-defined outputs of a vertex entry point.
pub(crate) fn stage_outputs(
    module: &naga::Module,
    ep: &naga::EntryPoint,
) -> StageIo {
    let mut out = Vec::new();
    if let Some(result) = &ep.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

/// User-defined inputs of a fragment entry point.
pub(crate) fn stage_inputs(
    module: &naga::Module,
    ep: &naga::EntryPoint,
) -> StageIo {
    let mut out = Vec::new();
    for arg in &ep.function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> naga::Module {
        naga::front::wgsl::parse_str(source).unwrap()
    }

    const COMPOSITE_LIKE: &str = r"
struct Params {
    resolution: vec2<f32>,
    time: f32,
    bloomStrength: f32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var texture0: texture_2d<f32>;
@group(0) @binding(2) var galaxy: texture_cube<f32>;
@group(0) @binding(3) var linear_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let a = textureSampleLevel(texture0, linear_sampler, uv, 0.0);
    let b = textureSampleLevel(galaxy, linear_sampler, vec3<f32>(uv, 1.0), 0.0);
    return a + b * params.bloomStrength + vec4<f32>(params.resolution, params.time, 0.0);
}
";

    #[test]
    fn reflects_params_textures_and_samplers() {
        let interface = UniformInterface::reflect(&parse(COMPOSITE_LIKE)).unwrap();

        let params = interface.params.as_ref().unwrap();
        assert_eq!(params.binding, 0);
        assert_eq!(params.size, 16);
        assert_eq!(
            interface.location("resolution"),
            Some(UniformLocation::Param {
                offset: 0,
                kind: ParamKind::Vec2
            })
        );
        assert_eq!(
            interface.location("bloomStrength"),
            Some(UniformLocation::Param {
                offset: 12,
                kind: ParamKind::Float
            })
        );
        assert_eq!(
            interface.location("galaxy"),
            Some(UniformLocation::Texture {
                binding: 2,
                kind: TextureKind::Cube
            })
        );
        assert_eq!(interface.samplers, vec![3]);
        assert_eq!(interface.location("mouseX"), None);
        assert_eq!(interface.layout_entries().len(), 4);
    }

    #[test]
    fn rejects_non_zero_groups() {
        let module = parse(
            r"
@group(1) @binding(0) var t: texture_2d<f32>;
@group(1) @binding(1) var s: sampler;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureSampleLevel(t, s, vec2<f32>(0.5), 0.0);
}
",
        );
        let err = UniformInterface::reflect(&module).unwrap_err();
        assert!(err.contains("bind group 1"), "{err}");
    }

    #[test]
    fn rejects_non_float_uniform_members() {
        let module = parse(
            r"
struct Params { count: u32 }
@group(0) @binding(0) var<uniform> params: Params;
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(f32(params.count));
}
",
        );
        let err = UniformInterface::reflect(&module).unwrap_err();
        assert!(err.contains("params.count"), "{err}");
    }

    #[test]
    fn stage_io_follows_struct_members() {
        let module = parse(
            r"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}
@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = vec4<f32>(position, 0.0, 1.0);
    out.uv = position;
    return out;
}
",
        );
        let ep = entry_point(&module, "vs_main", naga::ShaderStage::Vertex)
            .unwrap();
        let outputs = stage_outputs(&module, ep);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, 0);
        assert_eq!(stage_inputs(&module, ep).len(), 1);
        assert!(entry_point(&module, "vs_main", naga::ShaderStage::Fragment)
            .is_none());
    }
}
