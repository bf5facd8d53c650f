use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::shader::{BuiltinShaders, ShaderDirectory, ShaderSource};

#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema,
)]
#[schemars(title = "Shaders", inline)]
#[serde(default)]
/// Shader source selection and binding diagnostics.
pub struct ShaderOptions {
    /// Directory whose `.wgsl` files override the built-in shaders. Files
    /// are re-read on every reload.
    #[schemars(skip)]
    pub directory: Option<PathBuf>,
    /// Report uniforms a program does not declare at warn level instead of
    /// debug.
    #[schemars(title = "Strict Uniforms")]
    pub strict_uniforms: bool,
}

impl ShaderOptions {
    /// The shader source these options select.
    #[must_use]
    pub fn source(&self) -> Box<dyn ShaderSource> {
        match &self.directory {
            Some(dir) => Box::new(ShaderDirectory::new(dir)),
            None => Box::new(BuiltinShaders),
        }
    }
}
