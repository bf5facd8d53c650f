//! Compiled shader programs and the cache that owns them.

use std::borrow::Cow;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::error::HorizonError;
use crate::gpu::error_scope::allocation_scope;
use crate::gpu::pipeline_helpers;
use crate::gpu::shader_composer::ShaderComposer;
use crate::shader::reflect::{self, UniformInterface};
use crate::shader::{ShaderSource, Stage};

/// Entry point every vertex stage must export.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point every fragment stage must export.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Source-file identity of a program: the pair it was compiled from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    /// Vertex source identity.
    pub vertex: String,
    /// Fragment source identity.
    pub fragment: String,
}

impl ProgramKey {
    /// Build a key from two source identities.
    #[must_use]
    pub fn new(vertex: &str, fragment: &str) -> Self {
        Self {
            vertex: vertex.to_owned(),
            fragment: fragment.to_owned(),
        }
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}", self.vertex, self.fragment)
    }
}

/// Handle to a program owned by a [`ProgramCache`].
///
/// Ids stay valid across [`ProgramCache::reload_all`]. After
/// [`ProgramCache::invalidate`] the id resolves to nothing until the pair is
/// compiled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(u32);

impl ProgramId {
    /// Build a handle from its raw value. It only resolves if the cache
    /// issued it.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// Both stages composed to validated IR and linked against each other.
#[derive(Debug)]
pub struct LinkedStages {
    /// Vertex stage IR.
    pub vertex: naga::Module,
    /// Fragment stage IR.
    pub fragment: naga::Module,
    /// Merged resource interface of both stages.
    pub interface: UniformInterface,
}

/// Check that two stages fit together and reflect their combined resource
/// interface.
///
/// # Errors
///
/// Returns [`HorizonError::Link`] with a log describing the first mismatch.
pub fn link(
    key: &ProgramKey,
    vertex: &naga::Module,
    fragment: &naga::Module,
) -> Result<UniformInterface, HorizonError> {
    let fail = |log: String| HorizonError::Link {
        program: key.to_string(),
        log,
    };

    let vs = reflect::entry_point(vertex, VERTEX_ENTRY, naga::ShaderStage::Vertex)
        .ok_or_else(|| {
            fail(format!("vertex stage has no `{VERTEX_ENTRY}` vertex entry point"))
        })?;
    let fs = reflect::entry_point(
        fragment,
        FRAGMENT_ENTRY,
        naga::ShaderStage::Fragment,
    )
    .ok_or_else(|| {
        fail(format!(
            "fragment stage has no `{FRAGMENT_ENTRY}` fragment entry point"
        ))
    })?;

    let outputs = reflect::stage_outputs(vertex, vs);
    for (location, ty) in reflect::stage_inputs(fragment, fs) {
        match outputs.iter().find(|(l, _)| *l == location) {
            None => {
                return Err(fail(format!(
                    "fragment input @location({location}) is not written by the vertex stage"
                )))
            }
            Some((_, out_ty)) if *out_ty != ty => {
                return Err(fail(format!(
                    "fragment input @location({location}) does not match the vertex output type"
                )))
            }
            Some(_) => {}
        }
    }

    let vertex_interface = UniformInterface::reflect(vertex)
        .map_err(|e| fail(format!("vertex stage: {e}")))?;
    let mut interface = UniformInterface::reflect(fragment)
        .map_err(|e| fail(format!("fragment stage: {e}")))?;

    if let Some(binding) = vertex_interface
        .bindings()
        .find(|b| interface.bindings().any(|f| f == *b))
    {
        return Err(fail(format!(
            "binding {binding} is declared by both stages"
        )));
    }
    if let Some(params) = vertex_interface.params {
        if interface.params.is_some() {
            return Err(fail(
                "both stages declare a uniform buffer; only one is supported"
                    .into(),
            ));
        }
        interface.params = Some(params);
    }
    interface.textures.extend(vertex_interface.textures);
    interface.samplers.extend(vertex_interface.samplers);
    Ok(interface)
}

/// Reads, composes and links source pairs. Performs no GPU work.
pub struct ProgramCompiler {
    source: Box<dyn ShaderSource>,
    composer: ShaderComposer,
}

impl ProgramCompiler {
    /// Create a compiler over a source collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::Compile`] if a shared shader module is broken.
    pub fn new(source: Box<dyn ShaderSource>) -> Result<Self, HorizonError> {
        Ok(Self {
            source,
            composer: ShaderComposer::new()?,
        })
    }

    /// Compile both stages of `key` and link them.
    ///
    /// The vertex stage is read and compiled first; a failure there returns
    /// before the fragment source is read.
    ///
    /// # Errors
    ///
    /// [`HorizonError::ShaderRead`], [`HorizonError::Compile`] or
    /// [`HorizonError::Link`]. Every diagnostic is also logged.
    pub fn compile(
        &mut self,
        key: &ProgramKey,
    ) -> Result<LinkedStages, HorizonError> {
        let result = self.compile_inner(key);
        if let Err(e) = &result {
            log::error!("{e}");
        }
        result
    }

    fn compile_inner(
        &mut self,
        key: &ProgramKey,
    ) -> Result<LinkedStages, HorizonError> {
        let vertex = self.compile_stage(Stage::Vertex, &key.vertex)?;
        let fragment = self.compile_stage(Stage::Fragment, &key.fragment)?;
        let interface = link(key, &vertex, &fragment)?;
        log::info!("linked program '{key}'");
        Ok(LinkedStages {
            vertex,
            fragment,
            interface,
        })
    }

    fn compile_stage(
        &mut self,
        stage: Stage,
        id: &str,
    ) -> Result<naga::Module, HorizonError> {
        let text = self.source.read(id)?;
        let module = self.composer.compose(stage, &text, id)?;
        log::debug!("compiled {stage} shader '{id}'");
        Ok(module)
    }
}

/// A linked program: reflected interface, bind group layout and one render
/// pipeline per color format the cache was configured with.
pub struct Program {
    key: ProgramKey,
    interface: UniformInterface,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: Vec<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
}

impl Program {
    /// The source pair this program was built from.
    #[must_use]
    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    /// Uniform-location table.
    #[must_use]
    pub fn interface(&self) -> &UniformInterface {
        &self.interface
    }

    /// Layout every per-pass bind group is created against.
    #[must_use]
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// The pipeline rendering into `format`, if the cache was configured
    /// with it.
    #[must_use]
    pub fn pipeline(
        &self,
        format: wgpu::TextureFormat,
    ) -> Option<&wgpu::RenderPipeline> {
        self.pipelines
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, p)| p)
    }

    fn build(
        device: &wgpu::Device,
        key: ProgramKey,
        stages: LinkedStages,
        formats: &[wgpu::TextureFormat],
    ) -> Result<Self, HorizonError> {
        let label = key.to_string();
        let LinkedStages {
            vertex,
            fragment,
            interface,
        } = stages;

        let built = allocation_scope(device, &label, || {
            let vertex_module =
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&key.vertex),
                    source: wgpu::ShaderSource::Naga(Cow::Owned(vertex)),
                });
            let fragment_module =
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&key.fragment),
                    source: wgpu::ShaderSource::Naga(Cow::Owned(fragment)),
                });
            let bind_group_layout = device.create_bind_group_layout(
                &wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{label} Layout")),
                    entries: &interface.layout_entries(),
                },
            );
            let layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&label),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
            let pipelines = formats
                .iter()
                .map(|&format| {
                    let pipeline = pipeline_helpers::create_screen_pipeline(
                        device,
                        &label,
                        &vertex_module,
                        &fragment_module,
                        &layout,
                        format,
                    );
                    (format, pipeline)
                })
                .collect::<Vec<_>>();
            // Stage modules drop here; the pipelines keep what they need.
            (bind_group_layout, pipelines)
        });

        let (bind_group_layout, pipelines) = built.map_err(|e| match e {
            HorizonError::ResourceAllocation { reason, .. } => {
                HorizonError::Link {
                    program: label.clone(),
                    log: reason,
                }
            }
            other => other,
        })?;

        Ok(Self {
            key,
            interface,
            bind_group_layout,
            pipelines,
        })
    }
}

/// Compiles and owns every shader program for the life of the session.
///
/// Programs are keyed by source identity: asking twice for the same
/// (vertex, fragment) pair returns the same [`ProgramId`] without compiling
/// again.
pub struct ProgramCache {
    compiler: ProgramCompiler,
    formats: Vec<wgpu::TextureFormat>,
    programs: Vec<Option<Program>>,
    keys: Vec<ProgramKey>,
    index: FxHashMap<ProgramKey, ProgramId>,
    compile_count: usize,
}

impl ProgramCache {
    /// Create an empty cache whose programs render into each of `formats`.
    ///
    /// # Errors
    ///
    /// Returns [`HorizonError::Compile`] if a shared shader module is broken.
    pub fn new(
        source: Box<dyn ShaderSource>,
        formats: &[wgpu::TextureFormat],
    ) -> Result<Self, HorizonError> {
        let mut unique = Vec::with_capacity(formats.len());
        for &format in formats {
            if !unique.contains(&format) {
                unique.push(format);
            }
        }
        Ok(Self {
            compiler: ProgramCompiler::new(source)?,
            formats: unique,
            programs: Vec::new(),
            keys: Vec::new(),
            index: FxHashMap::default(),
            compile_count: 0,
        })
    }

    /// Return the program for `(vertex, fragment)`, compiling it on first
    /// use.
    ///
    /// # Errors
    ///
    /// Propagates read, compile and link failures. Nothing is cached on
    /// failure.
    pub fn compile(
        &mut self,
        device: &wgpu::Device,
        vertex: &str,
        fragment: &str,
    ) -> Result<ProgramId, HorizonError> {
        let key = ProgramKey::new(vertex, fragment);
        if let Some(&id) = self.index.get(&key) {
            if self.programs[id.0 as usize].is_some() {
                log::debug!("program cache hit for '{key}'");
                return Ok(id);
            }
            let program = self.build(device, key)?;
            self.programs[id.0 as usize] = Some(program);
            return Ok(id);
        }

        let program = self.build(device, key.clone())?;
        let id = ProgramId(self.programs.len() as u32);
        self.programs.push(Some(program));
        self.keys.push(key.clone());
        let _ = self.index.insert(key, id);
        Ok(id)
    }

    fn build(
        &mut self,
        device: &wgpu::Device,
        key: ProgramKey,
    ) -> Result<Program, HorizonError> {
        let stages = self.compiler.compile(&key)?;
        let program = Program::build(device, key, stages, &self.formats)
            .inspect_err(|e| log::error!("{e}"))?;
        self.compile_count += 1;
        Ok(program)
    }

    /// Resolve a handle. `None` for invalidated programs.
    #[must_use]
    pub fn get(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(id.0 as usize)?.as_ref()
    }

    /// Drop the program compiled from `(vertex, fragment)`. Its id resolves
    /// to nothing until the pair is compiled again. Returns whether a
    /// program was dropped.
    pub fn invalidate(&mut self, vertex: &str, fragment: &str) -> bool {
        let key = ProgramKey::new(vertex, fragment);
        let Some(&id) = self.index.get(&key) else {
            return false;
        };
        let dropped = self.programs[id.0 as usize].take().is_some();
        if dropped {
            log::info!("invalidated program '{key}'");
        }
        dropped
    }

    /// Recompile every known pair in place. A pair that fails keeps its
    /// previous program. Returns the number of failures.
    pub fn reload_all(&mut self, device: &wgpu::Device) -> usize {
        let mut failures = 0;
        for index in 0..self.keys.len() {
            let key = self.keys[index].clone();
            match self.build(device, key) {
                Ok(program) => self.programs[index] = Some(program),
                Err(_) => failures += 1,
            }
        }
        log::info!(
            "reloaded {} program(s), {failures} failure(s)",
            self.keys.len()
        );
        failures
    }

    /// Number of successful compilations performed so far.
    #[must_use]
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    /// Number of known source pairs, including invalidated ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Color formats every program has a pipeline for.
    #[must_use]
    pub fn formats(&self) -> &[wgpu::TextureFormat] {
        &self.formats
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::gpu::test_support::headless_device;
    use crate::gpu::texture::HDR_FORMAT;
    use crate::shader::{ids, BuiltinShaders};

    /// In-memory sources that record every read.
    #[derive(Clone, Default)]
    struct MemorySource {
        files: Rc<RefCell<FxHashMap<String, String>>>,
        reads: Rc<RefCell<Vec<String>>>,
    }

    impl MemorySource {
        fn with(self, id: &str, text: &str) -> Self {
            let _ = self
                .files
                .borrow_mut()
                .insert(id.to_owned(), text.to_owned());
            self
        }
    }

    impl ShaderSource for MemorySource {
        fn read(&self, id: &str) -> Result<String, HorizonError> {
            self.reads.borrow_mut().push(id.to_owned());
            match self.files.borrow().get(id) {
                Some(text) => Ok(text.clone()),
                None => BuiltinShaders.read(id),
            }
        }
    }

    fn compiler(source: &MemorySource) -> ProgramCompiler {
        ProgramCompiler::new(Box::new(source.clone())).unwrap()
    }

    #[test]
    fn every_builtin_pass_links_with_the_fullscreen_stage() {
        let mut compiler = ProgramCompiler::new(Box::new(BuiltinShaders)).unwrap();
        for id in BuiltinShaders::IDS {
            if id == ids::FULLSCREEN_VERTEX {
                continue;
            }
            let key = ProgramKey::new(ids::FULLSCREEN_VERTEX, id);
            if let Err(e) = compiler.compile(&key) {
                panic!("{id}: {e}");
            }
        }
    }

    #[test]
    fn main_pass_declares_its_texture_uniforms() {
        let mut compiler = ProgramCompiler::new(Box::new(BuiltinShaders)).unwrap();
        let linked = compiler
            .compile(&ProgramKey::new(ids::FULLSCREEN_VERTEX, ids::BLACKHOLE_MAIN))
            .unwrap();
        assert!(linked.interface.location("galaxy").is_some());
        assert!(linked.interface.location("colorMap").is_some());
        assert!(linked.interface.location("resolution").is_some());
        assert!(linked.interface.location("adiskSpeed").is_some());
    }

    #[test]
    fn vertex_failure_stops_before_fragment_is_read() {
        let source = MemorySource::default().with("bad_vs.wgsl", "fn vs_main( {");
        let err = compiler(&source)
            .compile(&ProgramKey::new("bad_vs.wgsl", ids::PASSTHROUGH))
            .unwrap_err();
        match err {
            HorizonError::Compile { stage, id, .. } => {
                assert_eq!(stage, Stage::Vertex);
                assert_eq!(id, "bad_vs.wgsl");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*source.reads.borrow(), vec!["bad_vs.wgsl".to_owned()]);
    }

    #[test]
    fn fragment_failure_is_tagged_fragment() {
        let source = MemorySource::default().with(
            "bad_fs.wgsl",
            "@fragment fn fs_main() -> @location(0) vec4<f32> { return nope; }",
        );
        let err = compiler(&source)
            .compile(&ProgramKey::new(ids::FULLSCREEN_VERTEX, "bad_fs.wgsl"))
            .unwrap_err();
        assert!(matches!(
            err,
            HorizonError::Compile {
                stage: Stage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn missing_source_is_a_read_error() {
        let source = MemorySource::default();
        let err = compiler(&source)
            .compile(&ProgramKey::new(ids::FULLSCREEN_VERTEX, "missing.wgsl"))
            .unwrap_err();
        assert!(matches!(err, HorizonError::ShaderRead { .. }));
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let source = MemorySource::default().with(
            "needs_normal.wgsl",
            r"
@fragment
fn fs_main(@location(3) normal: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(normal, 1.0);
}
",
        );
        let err = compiler(&source)
            .compile(&ProgramKey::new(
                ids::FULLSCREEN_VERTEX,
                "needs_normal.wgsl",
            ))
            .unwrap_err();
        match err {
            HorizonError::Link { program, log } => {
                assert_eq!(program, "fullscreen.wgsl + needs_normal.wgsl");
                assert!(log.contains("@location(3)"), "{log}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_entry_point_fails_to_link() {
        let source = MemorySource::default().with(
            "wrong_entry.wgsl",
            r"
@fragment
fn main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
",
        );
        let err = compiler(&source)
            .compile(&ProgramKey::new(ids::FULLSCREEN_VERTEX, "wrong_entry.wgsl"))
            .unwrap_err();
        assert!(matches!(err, HorizonError::Link { .. }));
    }

    #[test]
    fn shared_bindings_fail_to_link() {
        let source = MemorySource::default()
            .with(
                "vs_with_texture.wgsl",
                r"
@group(0) @binding(0) var heights: texture_2d<f32>;

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    let h = textureLoad(heights, vec2<i32>(0, 0), 0).r;
    return vec4<f32>(position, h, 1.0);
}
",
            )
            .with(
                "fs_with_texture.wgsl",
                r"
@group(0) @binding(0) var image: texture_2d<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return textureLoad(image, vec2<i32>(0, 0), 0);
}
",
            );
        let err = compiler(&source)
            .compile(&ProgramKey::new(
                "vs_with_texture.wgsl",
                "fs_with_texture.wgsl",
            ))
            .unwrap_err();
        match err {
            HorizonError::Link { log, .. } => {
                assert!(log.contains("binding 0"), "{log}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cache_returns_same_program_for_same_pair() {
        let Some((device, _queue)) = headless_device() else {
            return;
        };
        let mut cache =
            ProgramCache::new(Box::new(BuiltinShaders), &[HDR_FORMAT]).unwrap();
        let a = cache
            .compile(&device, ids::FULLSCREEN_VERTEX, ids::BLOOM_UPSAMPLE)
            .unwrap();
        let b = cache
            .compile(&device, ids::FULLSCREEN_VERTEX, ids::BLOOM_UPSAMPLE)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.compile_count(), 1);
        assert!(cache.get(a).unwrap().pipeline(HDR_FORMAT).is_some());

        let c = cache
            .compile(&device, ids::FULLSCREEN_VERTEX, ids::BLOOM_DOWNSAMPLE)
            .unwrap();
        assert_ne!(a, c);
        assert_eq!(cache.compile_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidate_then_compile_rebuilds_under_same_id() {
        let Some((device, _queue)) = headless_device() else {
            return;
        };
        let mut cache =
            ProgramCache::new(Box::new(BuiltinShaders), &[HDR_FORMAT]).unwrap();
        let id = cache
            .compile(&device, ids::FULLSCREEN_VERTEX, ids::PASSTHROUGH)
            .unwrap();
        assert!(cache.invalidate(ids::FULLSCREEN_VERTEX, ids::PASSTHROUGH));
        assert!(cache.get(id).is_none());
        assert!(!cache.invalidate(ids::FULLSCREEN_VERTEX, ids::PASSTHROUGH));

        let again = cache
            .compile(&device, ids::FULLSCREEN_VERTEX, ids::PASSTHROUGH)
            .unwrap();
        assert_eq!(id, again);
        assert!(cache.get(id).is_some());
        assert_eq!(cache.compile_count(), 2);

        assert_eq!(cache.reload_all(&device), 0);
        assert_eq!(cache.compile_count(), 3);
    }
}
