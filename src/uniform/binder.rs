//! Resolve a [`UniformBag`] against a program's reflected interface.
//!
//! Binding happens in two steps. [`plan`] is pure: it walks the bag in name
//! order, assigns texture units and packs scalar values into the uniform
//! buffer image. [`apply`] turns a plan into a `wgpu::BindGroup` by
//! resolving texture handles against the arena.

use std::fmt;

use wgpu::util::DeviceExt;

use crate::gpu::texture::{FallbackTextures, TextureArena, TextureId, TextureKind};
use crate::shader::program::Program;
use crate::shader::reflect::{ParamKind, UniformInterface, UniformLocation};
use crate::uniform::{UniformBag, UniformValue};

/// Most texture units a single pass may allocate.
pub const MAX_TEXTURE_UNITS: usize = 16;

/// A texture unit allocated to one bag entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUnit {
    /// Sequential unit index, starting at 0.
    pub unit: u32,
    /// Bag entry name.
    pub name: String,
    /// Handle bound to the unit.
    pub texture: TextureId,
    /// Declared dimensionality of the bag entry.
    pub kind: TextureKind,
    /// Shader binding the unit feeds, `None` when the program does not
    /// declare a matching texture.
    pub binding: Option<u32>,
}

/// Why a bag entry had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// The program does not declare the name.
    Undeclared,
    /// The program declares the name with a different type.
    TypeMismatch,
}

/// A bag entry that was ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUniform {
    /// Bag entry name.
    pub name: String,
    /// Why it was ignored.
    pub kind: SkipKind,
}

/// Everything needed to bind one bag to one program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingPlan {
    /// Uniform buffer contents (empty when the program has no buffer).
    pub params: Vec<u8>,
    /// Allocated texture units, in allocation order.
    pub units: Vec<TextureUnit>,
    /// Entries that were ignored.
    pub skipped: Vec<SkippedUniform>,
}

/// Problems that prevent a bag from being bound. Each one disables the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformError {
    /// The bag holds more texture entries than there are units.
    TooManyTextures {
        /// Texture entries in the bag.
        count: usize,
    },
    /// A texture entry is the zero handle or unknown to the arena.
    InvalidTexture {
        /// Bag entry name.
        name: String,
        /// The offending handle.
        texture: TextureId,
    },
    /// A texture entry's tag disagrees with the stored texture.
    WrongDimension {
        /// Bag entry name.
        name: String,
    },
}

impl fmt::Display for UniformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyTextures { count } => write!(
                f,
                "{count} texture uniforms exceed the {MAX_TEXTURE_UNITS} available units"
            ),
            Self::InvalidTexture { name, texture } => write!(
                f,
                "uniform '{name}' refers to invalid texture handle {}",
                texture.raw()
            ),
            Self::WrongDimension { name } => {
                write!(f, "uniform '{name}' has the wrong texture dimension")
            }
        }
    }
}

impl std::error::Error for UniformError {}

fn write_param(
    params: &mut [u8],
    offset: u32,
    kind: ParamKind,
    value: UniformValue,
) -> bool {
    let start = offset as usize;
    match (kind, value) {
        (ParamKind::Float, UniformValue::Float(v)) => {
            params[start..start + 4].copy_from_slice(bytemuck::bytes_of(&v));
            true
        }
        (ParamKind::Vec2, UniformValue::Vec2(v)) => {
            params[start..start + 8].copy_from_slice(bytemuck::bytes_of(&v));
            true
        }
        _ => false,
    }
}

/// Resolve `bag` against `interface`.
///
/// Entries are visited in ascending name order. Each texture-valued entry
/// takes the next unit from 0 whether or not the program declares it.
/// Names the program does not declare, and values whose type disagrees with
/// the declaration, are skipped and reported at debug level (warn when
/// `strict`).
///
/// # Errors
///
/// [`UniformError::TooManyTextures`] past [`MAX_TEXTURE_UNITS`], and
/// [`UniformError::InvalidTexture`] for a zero handle on a declared
/// texture slot.
pub fn plan(
    interface: &UniformInterface,
    bag: &UniformBag,
    strict: bool,
) -> Result<BindingPlan, UniformError> {
    let texture_count = bag.textures().count();
    if texture_count > MAX_TEXTURE_UNITS {
        return Err(UniformError::TooManyTextures {
            count: texture_count,
        });
    }

    let mut plan = BindingPlan {
        params: vec![0; interface.params.as_ref().map_or(0, |p| p.size as usize)],
        ..BindingPlan::default()
    };

    for (name, value) in bag.iter() {
        let location = interface.location(name);
        let applied = match value {
            UniformValue::Texture2D(texture) | UniformValue::Cubemap(texture) => {
                let kind = if matches!(value, UniformValue::Cubemap(_)) {
                    TextureKind::Cube
                } else {
                    TextureKind::D2
                };
                let binding = match location {
                    Some(UniformLocation::Texture {
                        binding,
                        kind: declared,
                    }) if declared == kind => Some(binding),
                    _ => None,
                };
                if binding.is_some() && texture.is_none() {
                    return Err(UniformError::InvalidTexture {
                        name: name.to_owned(),
                        texture,
                    });
                }
                plan.units.push(TextureUnit {
                    unit: plan.units.len() as u32,
                    name: name.to_owned(),
                    texture,
                    kind,
                    binding,
                });
                binding.is_some()
            }
            UniformValue::Float(_) | UniformValue::Vec2(_) => match location {
                Some(UniformLocation::Param { offset, kind }) => {
                    write_param(&mut plan.params, offset, kind, value)
                }
                _ => false,
            },
        };

        if !applied {
            let kind = if location.is_some() {
                SkipKind::TypeMismatch
            } else {
                SkipKind::Undeclared
            };
            if strict {
                log::warn!("uniform '{name}' skipped: {kind:?}");
            } else {
                log::debug!("uniform '{name}' skipped: {kind:?}");
            }
            plan.skipped.push(SkippedUniform {
                name: name.to_owned(),
                kind,
            });
        }
    }

    Ok(plan)
}

/// Shared binding state every pass binds against.
pub struct BindContext<'a> {
    /// Texture storage.
    pub arena: &'a TextureArena,
    /// Textures bound to declared but unset slots.
    pub fallbacks: &'a FallbackTextures,
    /// Sampler bound to every declared sampler slot.
    pub sampler: &'a wgpu::Sampler,
}

/// Build the bind group for `program` from a resolved plan.
///
/// # Errors
///
/// [`UniformError::InvalidTexture`] when a unit's handle is unknown to the
/// arena, [`UniformError::WrongDimension`] when a handle's stored kind
/// disagrees with its bag tag.
pub fn apply(
    device: &wgpu::Device,
    program: &Program,
    plan: &BindingPlan,
    context: &BindContext<'_>,
) -> Result<wgpu::BindGroup, UniformError> {
    let mut views: Vec<(u32, &wgpu::TextureView)> = Vec::new();
    for unit in plan.units.iter().filter(|u| u.binding.is_some()) {
        let (view, stored) = context.arena.sampled(unit.texture).ok_or_else(|| {
            UniformError::InvalidTexture {
                name: unit.name.clone(),
                texture: unit.texture,
            }
        })?;
        if stored != unit.kind {
            return Err(UniformError::WrongDimension {
                name: unit.name.clone(),
            });
        }
        if let Some(binding) = unit.binding {
            views.push((binding, view));
        }
    }

    let interface = program.interface();
    let buffer = interface.params.is_some().then(|| {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Params", program.key())),
            contents: &plan.params,
            usage: wgpu::BufferUsages::UNIFORM,
        })
    });

    let mut entries = Vec::new();
    if let (Some(params), Some(buffer)) = (&interface.params, &buffer) {
        entries.push(wgpu::BindGroupEntry {
            binding: params.binding,
            resource: buffer.as_entire_binding(),
        });
    }
    for slot in &interface.textures {
        let view = views
            .iter()
            .find(|(b, _)| *b == slot.binding)
            .map_or_else(|| context.fallbacks.view(slot.kind), |(_, v)| *v);
        entries.push(wgpu::BindGroupEntry {
            binding: slot.binding,
            resource: wgpu::BindingResource::TextureView(view),
        });
    }
    for &binding in &interface.samplers {
        entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::Sampler(context.sampler),
        });
    }

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&program.key().to_string()),
        layout: program.bind_group_layout(),
        entries: &entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::reflect::{ParamBlock, ParamField, TextureSlot};

    fn interface() -> UniformInterface {
        UniformInterface {
            params: Some(ParamBlock {
                binding: 0,
                size: 16,
                fields: vec![
                    ParamField {
                        name: "resolution".into(),
                        offset: 0,
                        kind: ParamKind::Vec2,
                    },
                    ParamField {
                        name: "time".into(),
                        offset: 8,
                        kind: ParamKind::Float,
                    },
                ],
            }),
            textures: vec![
                TextureSlot {
                    name: "texture0".into(),
                    binding: 1,
                    kind: TextureKind::D2,
                },
                TextureSlot {
                    name: "galaxy".into(),
                    binding: 2,
                    kind: TextureKind::Cube,
                },
            ],
            samplers: vec![3],
        }
    }

    fn tex(raw: u32) -> UniformValue {
        UniformValue::Texture2D(TextureId::from_raw(raw))
    }

    #[test]
    fn units_start_at_zero_and_follow_name_order() {
        let bag = UniformBag::new()
            .with("texture1", tex(5))
            .with("texture0", tex(4))
            .with("galaxy", UniformValue::Cubemap(TextureId::from_raw(9)));
        let plan = plan(&interface(), &bag, false).unwrap();

        let units: Vec<(u32, &str)> =
            plan.units.iter().map(|u| (u.unit, u.name.as_str())).collect();
        assert_eq!(units, [(0, "galaxy"), (1, "texture0"), (2, "texture1")]);
        assert_eq!(plan.units[0].binding, Some(2));
        assert_eq!(plan.units[1].binding, Some(1));
        // Undeclared, but the unit is still consumed.
        assert_eq!(plan.units[2].binding, None);
    }

    #[test]
    fn scalars_land_at_their_offsets() {
        let bag = UniformBag::new()
            .with("resolution", [640.0, 480.0])
            .with("time", 2.5);
        let plan = plan(&interface(), &bag, false).unwrap();
        let floats: Vec<f32> = plan
            .params
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, [640.0, 480.0, 2.5, 0.0]);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn absent_names_are_skipped_idempotently() {
        let base = UniformBag::new().with("time", 1.0);
        let noisy = base.clone().with("notDeclaredAnywhere", 7.0);
        let a = plan(&interface(), &base, false).unwrap();
        let b = plan(&interface(), &noisy, true).unwrap();
        assert_eq!(a.params, b.params);
        assert_eq!(a.units, b.units);
        assert_eq!(
            b.skipped,
            [SkippedUniform {
                name: "notDeclaredAnywhere".into(),
                kind: SkipKind::Undeclared,
            }]
        );
    }

    #[test]
    fn mismatched_types_are_skipped() {
        let bag = UniformBag::new()
            .with("time", [1.0, 2.0])
            .with("texture0", UniformValue::Cubemap(TextureId::from_raw(1)));
        let plan = plan(&interface(), &bag, false).unwrap();
        assert!(plan.params.iter().all(|b| *b == 0));
        assert_eq!(plan.units[0].binding, None);
        assert!(plan
            .skipped
            .iter()
            .all(|s| s.kind == SkipKind::TypeMismatch));
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn zero_handle_disables_binding() {
        let bag = UniformBag::new().with("texture0", tex(0));
        assert_eq!(
            plan(&interface(), &bag, false).unwrap_err(),
            UniformError::InvalidTexture {
                name: "texture0".into(),
                texture: TextureId::NONE,
            }
        );
    }

    #[test]
    fn undeclared_zero_handle_leaves_other_bindings_intact() {
        let bag = UniformBag::new()
            .with("texture0", tex(3))
            .with("uvChecker", tex(0));
        let plan = plan(&interface(), &bag, false).unwrap();

        assert_eq!(plan.units.len(), 2);
        assert_eq!(plan.units[0].name, "texture0");
        assert_eq!(plan.units[0].binding, Some(1));
        assert_eq!(plan.units[1].unit, 1);
        assert_eq!(plan.units[1].binding, None);
        assert_eq!(
            plan.skipped,
            [SkippedUniform {
                name: "uvChecker".into(),
                kind: SkipKind::Undeclared,
            }]
        );
    }

    #[test]
    fn unit_limit_is_enforced() {
        let at_limit: UniformBag = (0..MAX_TEXTURE_UNITS)
            .map(|i| (format!("t{i:02}"), tex(i as u32 + 1)))
            .collect();
        let units = plan(&interface(), &at_limit, false).unwrap().units;
        assert_eq!(units.len(), MAX_TEXTURE_UNITS);
        assert!(units.iter().enumerate().all(|(i, u)| u.unit == i as u32));

        let over = at_limit.with("zz", tex(99));
        assert_eq!(
            plan(&interface(), &over, false).unwrap_err(),
            UniformError::TooManyTextures {
                count: MAX_TEXTURE_UNITS + 1
            }
        );
    }
}
