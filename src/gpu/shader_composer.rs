use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, ComposerError, NagaModuleDescriptor,
    ShaderLanguage, ShaderType,
};

use crate::error::HorizonError;
use crate::shader::Stage;

/// Wraps `naga_oil::compose::Composer` to provide shader composition with
/// `#import` support.
///
/// Pre-loads all shared WGSL modules at construction time. Consuming shaders
/// use `#import horizon::module_name` to pull in shared code. The composer
/// produces `naga::Module` IR directly, which is then validated and handed to
/// wgpu without a WGSL re-parse.
pub struct ShaderComposer {
    composer: Composer,
}

/// Shared module definition: (source, file_path)
struct ModuleDef {
    source: &'static str,
    file_path: &'static str,
}

const SHARED_MODULES: &[ModuleDef] = &[ModuleDef {
    source: include_str!("../../assets/shaders/modules/color.wgsl"),
    file_path: "modules/color.wgsl",
}];

impl ShaderComposer {
    /// Create a composer with every shared module registered.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::Compile`] if a shared module fails to parse.
    pub fn new() -> Result<Self, HorizonError> {
        let mut composer = Composer::default();

        // Register shared modules in dependency order.
        for m in SHARED_MODULES {
            let result = composer.add_composable_module(ComposableModuleDescriptor {
                source: m.source,
                file_path: m.file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            });
            if let Err(e) = result {
                return Err(HorizonError::Compile {
                    stage: Stage::Module,
                    id: m.file_path.to_owned(),
                    diagnostic: e.emit_to_string(&composer),
                });
            }
        }

        Ok(Self { composer })
    }

    /// Compose a shader source (which may contain `#import` directives) into
    /// a validated `naga::Module`.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::Compile`] tagged with `stage` and `file_path`
    /// carrying the composer or validator diagnostic.
    pub fn compose(
        &mut self,
        stage: Stage,
        source: &str,
        file_path: &str,
    ) -> Result<naga::Module, HorizonError> {
        let module = self
            .compose_naga(source, file_path)
            .map_err(|e| HorizonError::Compile {
                stage,
                id: file_path.to_owned(),
                diagnostic: e.emit_to_string(&self.composer),
            })?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        );
        let _ = validator.validate(&module).map_err(|e| {
            HorizonError::Compile {
                stage,
                id: file_path.to_owned(),
                diagnostic: error_chain(&e),
            }
        })?;
        Ok(module)
    }

    /// Compose a shader source into a `naga::Module` without validation or
    /// wgpu involvement.
    pub fn compose_naga(
        &mut self,
        source: &str,
        file_path: &str,
    ) -> Result<naga::Module, Box<ComposerError>> {
        self.composer
            .make_naga_module(NagaModuleDescriptor {
                source,
                file_path,
                shader_type: ShaderType::Wgsl,
                ..Default::default()
            })
            .map_err(Box::new)
    }
}

/// Render an error and all of its sources on one line each.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str("\n  caused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
