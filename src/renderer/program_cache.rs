//! Program Cache
//!
//! Deduplicates compiled programs by [`ProgramSignature`] and reference-counts
//! them per material.
//!
//! # Context generations
//!
//! Every program remembers the cache generation it was built in.
//! [`ProgramCache::invalidate`] bumps the generation after a context loss;
//! older programs are then stale: their driver objects are gone, so they are
//! dropped without delete calls and rebuilt on the next acquire.

use log::debug;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::renderer::driver::{GraphicsDriver, ProgramId};
use crate::renderer::program::{CompiledProgram, ProgramSignature, ProgramSources};
use crate::renderer::uniforms::ProgramUniforms;
use crate::resources::Material;

new_key_type! {
    /// Handle to a [`CompiledProgram`] in a [`ProgramCache`].
    pub struct ProgramHandle;
}

#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: SlotMap<ProgramHandle, CompiledProgram>,
    by_signature: FxHashMap<ProgramSignature, ProgramHandle>,
    generation: u64,
    next_id: u32,
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the program for `material`'s sources and defines, compiling it
    /// on first use. Each call adds one usage.
    pub fn acquire<D: GraphicsDriver>(&mut self, driver: &mut D, material: &Material) -> ProgramHandle {
        let sources = ProgramSources::from_material(material);
        let signature = ProgramSignature::compute(&sources);
        self.acquire_sources(driver, signature, &sources)
    }

    pub fn acquire_sources<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        signature: ProgramSignature,
        sources: &ProgramSources,
    ) -> ProgramHandle {
        if let Some(&handle) = self.by_signature.get(&signature) {
            match self.programs.get_mut(handle) {
                Some(program) if program.generation == self.generation => {
                    program.usage += 1;
                    return handle;
                }
                _ => {
                    debug!("Dropping stale program {signature}");
                    self.programs.remove(handle);
                    self.by_signature.remove(&signature);
                }
            }
        }

        self.next_id += 1;
        let program =
            CompiledProgram::build(driver, self.next_id, signature, self.generation, sources);
        let handle = self.programs.insert(program);
        self.by_signature.insert(signature, handle);
        handle
    }

    /// Drops one usage. The last release deletes the driver program and
    /// evicts the entry; stale programs are evicted without a delete call.
    /// Unknown handles are ignored.
    ///
    /// Returns the driver program that was deleted, if any. Drivers recycle
    /// program names, so callers caching the bound program must forget it.
    pub fn release<D: GraphicsDriver>(
        &mut self,
        driver: &mut D,
        handle: ProgramHandle,
    ) -> Option<ProgramId> {
        let program = self.programs.get_mut(handle)?;
        program.usage = program.usage.saturating_sub(1);
        if program.usage > 0 {
            return None;
        }

        let current = program.generation == self.generation;
        let signature = program.signature();
        let driver_program = program.driver_program();

        if current {
            driver.delete_program(driver_program);
        }
        self.programs.remove(handle);
        if self.by_signature.get(&signature) == Some(&handle) {
            self.by_signature.remove(&signature);
        }
        current.then_some(driver_program)
    }

    /// Marks every cached program stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` if `handle` refers to a program built in the current generation.
    #[must_use]
    pub fn is_current(&self, handle: ProgramHandle) -> bool {
        self.programs
            .get(handle)
            .is_some_and(|p| p.generation == self.generation)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: ProgramHandle) -> Option<&CompiledProgram> {
        self.programs.get(handle)
    }

    pub(crate) fn uniforms_mut(&mut self, handle: ProgramHandle) -> Option<&mut ProgramUniforms> {
        self.programs.get_mut(handle).map(|p| &mut p.uniforms)
    }

    /// Number of cached programs, stale ones included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProgramHandle, &CompiledProgram)> {
        self.programs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::driver::{DriverCall, RecordingDriver};

    const VS: &str = "attribute vec3 position; uniform mat4 modelViewMatrix; void main() {}";
    const FS: &str = "uniform vec3 diffuse; void main() {}";

    fn creates(driver: &RecordingDriver) -> usize {
        driver.count(|c| matches!(c, DriverCall::CreateProgram(_)))
    }

    #[test]
    fn identical_materials_share_a_program() {
        let mut driver = RecordingDriver::new();
        let mut cache = ProgramCache::new();
        let a = Material::new(VS, FS);
        let b = Material::new(VS, FS).with_name("other");

        let ha = cache.acquire(&mut driver, &a);
        let hb = cache.acquire(&mut driver, &b);
        assert_eq!(ha, hb);
        assert_eq!(cache.get(ha).map(CompiledProgram::usage), Some(2));
        assert_eq!(creates(&driver), 1);

        cache.release(&mut driver, ha);
        assert_eq!(cache.len(), 1);
        cache.release(&mut driver, hb);
        assert!(cache.is_empty());
        assert_eq!(driver.count(|c| matches!(c, DriverCall::DeleteProgram(_))), 1);

        // A further release is a no-op.
        cache.release(&mut driver, ha);
    }

    #[test]
    fn defines_split_programs() {
        let mut driver = RecordingDriver::new();
        let mut cache = ProgramCache::new();
        let plain = Material::new(VS, FS);
        let mapped = Material::new(VS, FS).with_define("USE_MAP", "1");
        let disabled = Material::new(VS, FS).with_define("USE_FOG", "false");

        let h1 = cache.acquire(&mut driver, &plain);
        let h2 = cache.acquire(&mut driver, &mapped);
        let h3 = cache.acquire(&mut driver, &disabled);
        assert_ne!(h1, h2);
        // False-valued defines are not emitted, so the sources are identical.
        assert_eq!(h1, h3);
    }

    #[test]
    fn invalidation_rebuilds_without_deleting() {
        let mut driver = RecordingDriver::new();
        let mut cache = ProgramCache::new();
        let material = Material::new(VS, FS);

        let old = cache.acquire(&mut driver, &material);
        cache.invalidate();
        assert!(!cache.is_current(old));

        let new = cache.acquire(&mut driver, &material);
        assert_ne!(old, new);
        assert!(cache.is_current(new));
        assert_eq!(creates(&driver), 2);

        cache.release(&mut driver, old);
        assert_eq!(driver.count(|c| matches!(c, DriverCall::DeleteProgram(_))), 0);
        assert_eq!(cache.get(new).map(CompiledProgram::usage), Some(1));
    }
}
