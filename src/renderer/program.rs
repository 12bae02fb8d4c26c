//! Compiled Programs
//!
//! A [`CompiledProgram`] owns one linked driver program together with its
//! introspected uniform tree and attribute locations. Compile and link
//! failures never abort: the program is returned non-runnable with its
//! [`ProgramDiagnostics`] attached, and the renderer skips draws that use it.

use std::fmt;

use log::{error, warn};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_128;

use crate::renderer::driver::{GraphicsDriver, ProgramId, ShaderStage};
use crate::renderer::uniforms::ProgramUniforms;
use crate::resources::Material;

/// Dedup key of a program: xxh3-128 over the final stage sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramSignature(pub u128);

impl ProgramSignature {
    /// Hashes the prefixed sources (and the attribute forced to location 0,
    /// which changes the link result).
    #[must_use]
    pub fn compute(sources: &ProgramSources) -> Self {
        let mut key = String::with_capacity(
            sources.vertex.len() + sources.fragment.len() + 2 + sources.index0_attribute.as_ref().map_or(0, String::len),
        );
        key.push_str(&sources.vertex);
        key.push('\0');
        key.push_str(&sources.fragment);
        key.push('\0');
        if let Some(name) = &sources.index0_attribute {
            key.push_str(name);
        }
        Self(xxh3_128(key.as_bytes()))
    }
}

impl fmt::Display for ProgramSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Final stage sources handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSources {
    pub vertex: String,
    pub fragment: String,
    pub index0_attribute: Option<String>,
}

impl ProgramSources {
    /// Prepends the material's defines to both stages. A leading `#version`
    /// directive stays on the first line.
    #[must_use]
    pub fn from_material(material: &Material) -> Self {
        let prefix = material.defines.to_prefix();
        Self {
            vertex: with_prefix(&prefix, &material.vertex_shader),
            fragment: with_prefix(&prefix, &material.fragment_shader),
            index0_attribute: material.index0_attribute_name.clone(),
        }
    }
}

fn with_prefix(prefix: &str, source: &str) -> String {
    if prefix.is_empty() {
        return source.to_owned();
    }
    let trimmed = source.trim_start();
    if trimmed.starts_with("#version") {
        let (version, body) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        format!("{version}\n{prefix}{body}")
    } else {
        format!("{prefix}{source}")
    }
}

/// Logs kept for a program that failed to link or produced warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramDiagnostics {
    pub runnable: bool,
    pub program_log: String,
    pub vertex_log: String,
    pub fragment_log: String,
}

#[derive(Debug)]
pub struct CompiledProgram {
    id: u32,
    signature: ProgramSignature,
    pub(crate) usage: u32,
    pub(crate) generation: u64,
    program: ProgramId,
    runnable: bool,
    diagnostics: Option<ProgramDiagnostics>,
    pub(crate) uniforms: ProgramUniforms,
    attributes: FxHashMap<String, u32>,
}

impl CompiledProgram {
    /// Compiles both stages, links them and introspects the result.
    pub(crate) fn build<D: GraphicsDriver>(
        driver: &mut D,
        id: u32,
        signature: ProgramSignature,
        generation: u64,
        sources: &ProgramSources,
    ) -> Self {
        let program = driver.create_program();

        let vertex = driver.create_shader(ShaderStage::Vertex);
        driver.shader_source(vertex, &sources.vertex);
        driver.compile_shader(vertex);

        let fragment = driver.create_shader(ShaderStage::Fragment);
        driver.shader_source(fragment, &sources.fragment);
        driver.compile_shader(fragment);

        driver.attach_shader(program, vertex);
        driver.attach_shader(program, fragment);

        if let Some(name) = &sources.index0_attribute {
            driver.bind_attrib_location(program, 0, name);
        }

        driver.link_program(program);

        let runnable = driver.program_link_status(program);
        let program_log = driver.program_info_log(program).trim().to_owned();
        let vertex_log = driver.shader_info_log(vertex).trim().to_owned();
        let fragment_log = driver.shader_info_log(fragment).trim().to_owned();

        let diagnostics = if !runnable {
            error!(
                "Program {id} failed to link: {program_log}\nvertex: {vertex_log}\nfragment: {fragment_log}"
            );
            Some(ProgramDiagnostics {
                runnable,
                program_log,
                vertex_log,
                fragment_log,
            })
        } else if !program_log.is_empty() || !vertex_log.is_empty() || !fragment_log.is_empty() {
            warn!("Program {id} linked with warnings: {program_log}");
            Some(ProgramDiagnostics {
                runnable,
                program_log,
                vertex_log,
                fragment_log,
            })
        } else {
            None
        };

        driver.delete_shader(vertex);
        driver.delete_shader(fragment);

        let (uniforms, attributes) = if runnable {
            (
                ProgramUniforms::from_program(driver, program),
                fetch_attributes(driver, program),
            )
        } else {
            (ProgramUniforms::default(), FxHashMap::default())
        };

        Self {
            id,
            signature,
            usage: 1,
            generation,
            program,
            runnable,
            diagnostics,
            uniforms,
            attributes,
        }
    }

    /// Renderer-local serial number.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn signature(&self) -> ProgramSignature {
        self.signature
    }

    /// Number of materials currently holding this program.
    #[inline]
    #[must_use]
    pub fn usage(&self) -> u32 {
        self.usage
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    #[must_use]
    pub fn driver_program(&self) -> ProgramId {
        self.program
    }

    /// `false` when linking failed; draws with this program are skipped.
    #[inline]
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.runnable
    }

    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> Option<&ProgramDiagnostics> {
        self.diagnostics.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &ProgramUniforms {
        &self.uniforms
    }

    /// Active attribute locations by name.
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &FxHashMap<String, u32> {
        &self.attributes
    }
}

fn fetch_attributes<D: GraphicsDriver>(driver: &mut D, program: ProgramId) -> FxHashMap<String, u32> {
    let mut attributes = FxHashMap::default();
    for index in 0..driver.active_attribute_count(program) {
        let Some(info) = driver.active_attribute(program, index) else {
            continue;
        };
        if let Some(location) = driver.attrib_location(program, &info.name) {
            attributes.insert(info.name, location);
        }
    }
    attributes
}
