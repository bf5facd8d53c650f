//! Crate-level error types.

use std::fmt;

use crate::gpu::render_context::RenderContextError;
use crate::shader::Stage;

/// Errors produced by the horizon crate.
///
/// Every variant raised during setup is fatal for the session: the pipeline
/// never degrades to a partial configuration.
#[derive(Debug)]
pub enum HorizonError {
    /// GPU context initialization failure.
    Gpu(RenderContextError),
    /// A static texture or cubemap could not be loaded or decoded.
    AssetLoad {
        /// Path or prefix that was requested.
        path: String,
        /// Human-readable cause.
        reason: String,
    },
    /// Shader source text could not be read.
    ShaderRead {
        /// Shader source identity.
        id: String,
        /// Human-readable cause.
        reason: String,
    },
    /// A shader stage failed to compile.
    Compile {
        /// The failing stage.
        stage: Stage,
        /// Shader source identity of the failing stage.
        id: String,
        /// Compiler diagnostic text.
        diagnostic: String,
    },
    /// Two compiled stages could not be linked into a program.
    Link {
        /// `vertex + fragment` identity of the program.
        program: String,
        /// Linker log.
        log: String,
    },
    /// A texture, render target or vertex buffer could not be created.
    ResourceAllocation {
        /// Label of the resource being created.
        resource: String,
        /// Human-readable cause.
        reason: String,
    },
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Viewer event-loop failure.
    Viewer(String),
}

impl fmt::Display for HorizonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::AssetLoad { path, reason } => {
                write!(f, "failed to load asset '{path}': {reason}")
            }
            Self::ShaderRead { id, reason } => {
                write!(f, "failed to read shader '{id}': {reason}")
            }
            Self::Compile {
                stage,
                id,
                diagnostic,
            } => {
                write!(f, "{stage} shader '{id}' failed to compile:\n{diagnostic}")
            }
            Self::Link { program, log } => {
                write!(f, "program '{program}' failed to link: {log}")
            }
            Self::ResourceAllocation { resource, reason } => {
                write!(f, "failed to allocate {resource}: {reason}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Viewer(msg) => write!(f, "viewer error: {msg}"),
        }
    }
}

impl std::error::Error for HorizonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderContextError> for HorizonError {
    fn from(e: RenderContextError) -> Self {
        Self::Gpu(e)
    }
}

impl From<std::io::Error> for HorizonError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
