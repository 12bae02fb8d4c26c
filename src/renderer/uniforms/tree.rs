//! Uniform Tree
//!
//! Built once per linked program from the driver's active-uniform table.
//!
//! - [`SingleUniform`]: scalar, vector, matrix or sampler
//! - [`PureArrayUniform`]: fixed-size array of the above, set in one call
//! - [`StructuredUniform`]: a struct member path or array-of-struct element,
//!   holding further nodes keyed by member name or element index
//!
//! Every leaf caches the bit pattern it last uploaded and skips the driver
//! call when a value repeats.

use log::warn;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::assets::TextureHandle;
use crate::renderer::driver::{GraphicsDriver, ProgramId, UniformData, UniformLocation, UniformType};
use crate::renderer::uniforms::path::{LeafKind, UniformId, parse_uniform_path};
use crate::resources::{UniformEntry, UniformValue};
use crate::utils::interner::{self, Symbol};

// ============================================================================
// Upload context
// ============================================================================

/// Texture unit allocation and binding, supplied by the renderer.
pub trait SamplerBinding<D: GraphicsDriver> {
    /// Returns the next free unit; the counter restarts every draw.
    fn allocate_texture_unit(&mut self) -> u32;

    /// Binds `texture` (or the fallback texture for `None`) to `unit`.
    fn bind_texture(&mut self, driver: &mut D, texture: Option<TextureHandle>, unit: u32);
}

/// Reusable buffers values are flattened into before reaching the driver.
#[derive(Debug, Default)]
pub struct UniformScratch {
    floats: Vec<f32>,
    ints: Vec<i32>,
}

impl UniformScratch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct UploadContext<'a, D: GraphicsDriver> {
    pub driver: &'a mut D,
    pub scratch: &'a mut UniformScratch,
    pub textures: &'a mut dyn SamplerBinding<D>,
}

// ============================================================================
// Value layout
// ============================================================================

/// Element shape of a uniform or of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Floats(u8),
    Ints(u8),
    Matrix(u8),
    Sampler,
}

impl Layout {
    fn of_type(ty: UniformType) -> Option<Self> {
        use UniformType as T;
        Some(match ty {
            T::Float => Self::Floats(1),
            T::FloatVec2 => Self::Floats(2),
            T::FloatVec3 => Self::Floats(3),
            T::FloatVec4 => Self::Floats(4),
            T::Int | T::Bool => Self::Ints(1),
            T::IntVec2 | T::BoolVec2 => Self::Ints(2),
            T::IntVec3 | T::BoolVec3 => Self::Ints(3),
            T::IntVec4 | T::BoolVec4 => Self::Ints(4),
            T::FloatMat2 => Self::Matrix(2),
            T::FloatMat3 => Self::Matrix(3),
            T::FloatMat4 => Self::Matrix(4),
            T::Sampler2D
            | T::Sampler3D
            | T::SamplerCube
            | T::Sampler2DShadow
            | T::Sampler2DArray
            | T::IntSampler2D
            | T::UIntSampler2D => Self::Sampler,
            T::Unsupported(_) => return None,
        })
    }

    /// Scalars per element.
    fn width(self) -> usize {
        match self {
            Self::Floats(n) | Self::Ints(n) => n as usize,
            Self::Matrix(d) => (d as usize) * (d as usize),
            Self::Sampler => 1,
        }
    }
}

/// Element layout and element count of a value; `None` for structs.
fn value_layout(value: &UniformValue) -> Option<(Layout, usize)> {
    use Layout::{Floats, Ints, Matrix, Sampler};
    use UniformValue as V;

    Some(match value {
        V::Float(_) => (Floats(1), 1),
        V::Int(_) | V::Bool(_) => (Ints(1), 1),
        V::Vec2(_) => (Floats(2), 1),
        V::Vec3(_) => (Floats(3), 1),
        V::Vec4(_) => (Floats(4), 1),
        V::IVec2(_) => (Ints(2), 1),
        V::IVec3(_) => (Ints(3), 1),
        V::IVec4(_) => (Ints(4), 1),
        V::Mat2(_) => (Matrix(2), 1),
        V::Mat3(_) => (Matrix(3), 1),
        V::Mat4(_) => (Matrix(4), 1),
        V::Texture(_) => (Sampler, 1),
        V::FloatArray(v) => (Floats(1), v.len()),
        V::IntArray(v) => (Ints(1), v.len()),
        V::Vec2Array(v) => (Floats(2), v.len()),
        V::Vec3Array(v) => (Floats(3), v.len()),
        V::Vec4Array(v) => (Floats(4), v.len()),
        V::Mat3Array(v) => (Matrix(3), v.len()),
        V::Mat4Array(v) => (Matrix(4), v.len()),
        V::TextureArray(v) => (Sampler, v.len()),
        V::List(items) => {
            let (layout, _) = value_layout(items.first()?)?;
            for item in items {
                if value_layout(item)? != (layout, 1) {
                    return None;
                }
            }
            (layout, items.len())
        }
        V::Struct(_) => return None,
    })
}

fn push_floats(value: &UniformValue, out: &mut Vec<f32>) {
    use UniformValue as V;
    match value {
        V::Float(f) => out.push(*f),
        V::Vec2(v) => out.extend_from_slice(&v.to_array()),
        V::Vec3(v) => out.extend_from_slice(&v.to_array()),
        V::Vec4(v) => out.extend_from_slice(&v.to_array()),
        V::Mat2(m) => out.extend_from_slice(&m.to_cols_array()),
        V::Mat3(m) => out.extend_from_slice(&m.to_cols_array()),
        V::Mat4(m) => out.extend_from_slice(&m.to_cols_array()),
        V::FloatArray(v) => out.extend_from_slice(v),
        V::Vec2Array(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_array())),
        V::Vec3Array(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_array())),
        V::Vec4Array(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_array())),
        V::Mat3Array(v) => v.iter().for_each(|m| out.extend_from_slice(&m.to_cols_array())),
        V::Mat4Array(v) => v.iter().for_each(|m| out.extend_from_slice(&m.to_cols_array())),
        V::List(items) => items.iter().for_each(|item| push_floats(item, out)),
        _ => {}
    }
}

fn push_ints(value: &UniformValue, out: &mut Vec<i32>) {
    use UniformValue as V;
    match value {
        V::Int(i) => out.push(*i),
        V::Bool(b) => out.push(i32::from(*b)),
        V::IVec2(v) => out.extend_from_slice(&v.to_array()),
        V::IVec3(v) => out.extend_from_slice(&v.to_array()),
        V::IVec4(v) => out.extend_from_slice(&v.to_array()),
        V::IntArray(v) => out.extend_from_slice(v),
        V::List(items) => items.iter().for_each(|item| push_ints(item, out)),
        _ => {}
    }
}

fn texture_handles(value: &UniformValue) -> SmallVec<[Option<TextureHandle>; 8]> {
    match value {
        UniformValue::Texture(handle) => SmallVec::from_slice(&[*handle]),
        UniformValue::TextureArray(handles) => SmallVec::from_slice(handles),
        UniformValue::List(items) => items
            .iter()
            .map(|item| match item {
                UniformValue::Texture(handle) => *handle,
                _ => None,
            })
            .collect(),
        _ => SmallVec::new(),
    }
}

// ============================================================================
// Leaves
// ============================================================================

#[derive(Debug)]
struct LeafState {
    name: Symbol,
    location: UniformLocation,
    ty: UniformType,
    layout: Layout,
    cache: Vec<u32>,
}

impl LeafState {
    fn cache_matches_f32(&mut self, data: &[f32]) -> bool {
        if self.cache.len() == data.len()
            && self.cache.iter().zip(data).all(|(c, d)| *c == d.to_bits())
        {
            return true;
        }
        self.cache.clear();
        self.cache.extend(data.iter().map(|d| d.to_bits()));
        false
    }

    fn cache_matches_i32(&mut self, data: &[i32]) -> bool {
        if self.cache.len() == data.len()
            && self.cache.iter().zip(data).all(|(c, d)| *c == *d as u32)
        {
            return true;
        }
        self.cache.clear();
        self.cache.extend(data.iter().map(|d| *d as u32));
        false
    }

    fn mismatch(&self, value: &UniformValue) {
        warn!(
            "Uniform '{}' is {:?} but was given a {} value; skipped",
            interner::resolve(self.name),
            self.ty,
            value.kind_name()
        );
    }

    /// Uploads `value`. `array_size` is `None` for single uniforms.
    fn set<D: GraphicsDriver>(
        &mut self,
        ctx: &mut UploadContext<'_, D>,
        value: &UniformValue,
        array_size: Option<usize>,
    ) {
        let Some((layout, count)) = value_layout(value) else {
            self.mismatch(value);
            return;
        };
        if layout != self.layout || (array_size.is_none() && count != 1) {
            self.mismatch(value);
            return;
        }

        if layout == Layout::Sampler {
            self.set_samplers(ctx, value, array_size.unwrap_or(1));
            return;
        }
        if count == 0 {
            return;
        }

        let elements = array_size.map_or(1, |size| count.min(size));
        let scalars = elements * layout.width();

        match layout {
            Layout::Floats(components) => {
                let data = &mut ctx.scratch.floats;
                data.clear();
                push_floats(value, data);
                data.truncate(scalars);
                if !self.cache_matches_f32(data) {
                    ctx.driver
                        .uniform(self.location, UniformData::Floats { components, data: data.as_slice() });
                }
            }
            Layout::Matrix(dim) => {
                let data = &mut ctx.scratch.floats;
                data.clear();
                push_floats(value, data);
                data.truncate(scalars);
                if !self.cache_matches_f32(data) {
                    ctx.driver
                        .uniform(self.location, UniformData::Matrix { dim, data: data.as_slice() });
                }
            }
            Layout::Ints(components) => {
                let data = &mut ctx.scratch.ints;
                data.clear();
                push_ints(value, data);
                data.truncate(scalars);
                if !self.cache_matches_i32(data) {
                    ctx.driver
                        .uniform(self.location, UniformData::Ints { components, data: data.as_slice() });
                }
            }
            Layout::Sampler => {}
        }
    }

    /// Allocates and binds one unit per sampler slot, then points the uniform
    /// at those units. Slots without a texture get the fallback.
    fn set_samplers<D: GraphicsDriver>(
        &mut self,
        ctx: &mut UploadContext<'_, D>,
        value: &UniformValue,
        slots: usize,
    ) {
        let handles = texture_handles(value);
        let units = &mut ctx.scratch.ints;
        units.clear();

        for slot in 0..slots {
            let unit = ctx.textures.allocate_texture_unit();
            let texture = handles.get(slot).copied().flatten();
            ctx.textures.bind_texture(ctx.driver, texture, unit);
            units.push(unit as i32);
        }

        if !self.cache_matches_i32(units) {
            ctx.driver.uniform(
                self.location,
                UniformData::Ints {
                    components: 1,
                    data: units.as_slice(),
                },
            );
        }
    }
}

/// A scalar, vector, matrix or sampler uniform.
#[derive(Debug)]
pub struct SingleUniform {
    id: UniformId,
    leaf: LeafState,
}

impl SingleUniform {
    #[inline]
    #[must_use]
    pub fn id(&self) -> UniformId {
        self.id
    }

    /// Full active name as reported by the driver.
    #[must_use]
    pub fn name(&self) -> &'static str {
        interner::resolve(self.leaf.name)
    }

    #[must_use]
    pub fn uniform_type(&self) -> UniformType {
        self.leaf.ty
    }

    pub fn set_value<D: GraphicsDriver>(&mut self, ctx: &mut UploadContext<'_, D>, value: &UniformValue) {
        self.leaf.set(ctx, value, None);
    }
}

/// A fixed-size array of non-struct elements.
#[derive(Debug)]
pub struct PureArrayUniform {
    id: UniformId,
    size: usize,
    leaf: LeafState,
}

impl PureArrayUniform {
    #[inline]
    #[must_use]
    pub fn id(&self) -> UniformId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        interner::resolve(self.leaf.name)
    }

    #[must_use]
    pub fn uniform_type(&self) -> UniformType {
        self.leaf.ty
    }

    /// Declared element count.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Uploads up to `size` elements of `value`; sampler arrays always bind
    /// all `size` units.
    pub fn set_value<D: GraphicsDriver>(&mut self, ctx: &mut UploadContext<'_, D>, value: &UniformValue) {
        self.leaf.set(ctx, value, Some(self.size));
    }
}

// ============================================================================
// Structure
// ============================================================================

/// Ordered nodes plus an id index, shared by the program root and structs.
#[derive(Debug, Default)]
pub struct UniformContainer {
    seq: Vec<UniformNode>,
    map: FxHashMap<UniformId, usize>,
}

impl UniformContainer {
    fn insert(&mut self, node: UniformNode) {
        self.map.insert(node.id(), self.seq.len());
        self.seq.push(node);
    }

    /// Returns the struct child `id`, creating it on first use. `None` when a
    /// leaf already owns that id.
    fn struct_entry(&mut self, id: UniformId) -> Option<&mut UniformContainer> {
        let index = match self.map.get(&id) {
            Some(&index) => index,
            None => {
                let index = self.seq.len();
                self.insert(UniformNode::Struct(StructuredUniform {
                    id,
                    children: UniformContainer::default(),
                }));
                index
            }
        };
        match &mut self.seq[index] {
            UniformNode::Struct(s) => Some(&mut s.children),
            _ => None,
        }
    }

    fn container_at(&mut self, steps: &[UniformId]) -> Option<&mut UniformContainer> {
        match steps.split_first() {
            None => Some(self),
            Some((first, rest)) => self.struct_entry(*first)?.container_at(rest),
        }
    }

    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[UniformNode] {
        &self.seq
    }

    #[must_use]
    pub fn get(&self, id: UniformId) -> Option<&UniformNode> {
        self.map.get(&id).map(|&i| &self.seq[i])
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// A struct member path or an array-of-struct element.
#[derive(Debug)]
pub struct StructuredUniform {
    id: UniformId,
    children: UniformContainer,
}

impl StructuredUniform {
    #[inline]
    #[must_use]
    pub fn id(&self) -> UniformId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &UniformContainer {
        &self.children
    }

    /// Recurses into every child with the member (or element) of `value`
    /// keyed by the child's id. Children without a value are left alone.
    pub fn set_value<D: GraphicsDriver>(&mut self, ctx: &mut UploadContext<'_, D>, value: &UniformValue) {
        for node in &mut self.children.seq {
            let member = match (node.id(), value) {
                (UniformId::Name(sym), UniformValue::Struct(members)) => {
                    members.get(interner::resolve(sym))
                }
                (UniformId::Index(i), UniformValue::List(items)) => items.get(i as usize),
                (id, _) => {
                    warn!(
                        "Structured uniform '{}' cannot take member '{}' from a {} value; skipped",
                        self.id,
                        id,
                        value.kind_name()
                    );
                    return;
                }
            };
            if let Some(member) = member {
                node.set_value(ctx, member);
            }
        }
    }
}

#[derive(Debug)]
pub enum UniformNode {
    Single(SingleUniform),
    PureArray(PureArrayUniform),
    Struct(StructuredUniform),
}

impl UniformNode {
    #[must_use]
    pub fn id(&self) -> UniformId {
        match self {
            Self::Single(u) => u.id,
            Self::PureArray(u) => u.id,
            Self::Struct(u) => u.id,
        }
    }

    pub fn set_value<D: GraphicsDriver>(&mut self, ctx: &mut UploadContext<'_, D>, value: &UniformValue) {
        match self {
            Self::Single(u) => u.set_value(ctx, value),
            Self::PureArray(u) => u.set_value(ctx, value),
            Self::Struct(u) => u.set_value(ctx, value),
        }
    }
}

// ============================================================================
// Program root
// ============================================================================

/// The uniform tree of one linked program.
#[derive(Debug, Default)]
pub struct ProgramUniforms {
    root: UniformContainer,
}

impl ProgramUniforms {
    /// Introspects `program`'s active uniforms.
    ///
    /// Uniforms with an unsupported type or a name that cannot be parsed are
    /// logged and left out; they simply never receive values.
    pub fn from_program<D: GraphicsDriver>(driver: &mut D, program: ProgramId) -> Self {
        let mut root = UniformContainer::default();

        for index in 0..driver.active_uniform_count(program) {
            let Some(info) = driver.active_uniform(program, index) else {
                continue;
            };
            let Some(location) = driver.uniform_location(program, &info.name) else {
                continue;
            };

            let ty = UniformType::from_gl(info.gl_type);
            let Some(layout) = Layout::of_type(ty) else {
                warn!(
                    "Uniform '{}' has unsupported type 0x{:04X}; skipped",
                    info.name, info.gl_type
                );
                continue;
            };

            let path = match parse_uniform_path(&info.name) {
                Ok(path) => path,
                Err(e) => {
                    warn!("{e}; skipped");
                    continue;
                }
            };

            let Some(container) = root.container_at(&path.steps) else {
                warn!("Uniform '{}' collides with another uniform; skipped", info.name);
                continue;
            };

            let leaf = LeafState {
                name: interner::intern(&info.name),
                location,
                ty,
                layout,
                cache: Vec::new(),
            };
            let node = match path.kind {
                LeafKind::Single => UniformNode::Single(SingleUniform { id: path.leaf, leaf }),
                LeafKind::PureArray => UniformNode::PureArray(PureArrayUniform {
                    id: path.leaf,
                    size: info.size.max(1) as usize,
                    leaf,
                }),
            };
            container.insert(node);
        }

        Self { root }
    }

    /// Top-level nodes in introspection order.
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[UniformNode] {
        self.root.nodes()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformNode> {
        let sym = interner::get(name)?;
        self.root.get(UniformId::Name(sym))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Sets the top-level uniform `name`. Returns `false` if the program has
    /// no such uniform.
    pub fn set_value<D: GraphicsDriver>(
        &mut self,
        ctx: &mut UploadContext<'_, D>,
        name: &str,
        value: &UniformValue,
    ) -> bool {
        match interner::get(name) {
            Some(sym) => self.set_value_by_symbol(ctx, sym, value),
            None => false,
        }
    }

    /// Like [`set_value`](Self::set_value) for an already interned name.
    pub fn set_value_by_symbol<D: GraphicsDriver>(
        &mut self,
        ctx: &mut UploadContext<'_, D>,
        name: Symbol,
        value: &UniformValue,
    ) -> bool {
        let Some(&index) = self.root.map.get(&UniformId::Name(name)) else {
            return false;
        };
        self.root.seq[index].set_value(ctx, value);
        true
    }

    /// Indices of the top-level nodes that have an entry in `values`.
    #[must_use]
    pub fn seq_with_value(&self, values: &FxHashMap<String, UniformEntry>) -> Vec<usize> {
        self.root
            .seq
            .iter()
            .enumerate()
            .filter(|(_, node)| match node.id() {
                UniformId::Name(sym) => values.contains_key(interner::resolve(sym)),
                UniformId::Index(_) => false,
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Uploads the entries of `values` for the nodes in `seq`, skipping entries
    /// whose `needs_update` is explicitly `false`.
    ///
    /// An entry without the flag is always handed to its leaf, but each leaf
    /// remembers the last value it sent for this program and drops an
    /// identical repeat, so "always upload" means "upload whenever the value
    /// differs from what the program already holds". Samplers still bind
    /// their texture unit on every draw.
    pub fn upload<D: GraphicsDriver>(
        &mut self,
        ctx: &mut UploadContext<'_, D>,
        seq: &[usize],
        values: &FxHashMap<String, UniformEntry>,
    ) {
        for &index in seq {
            let Some(node) = self.root.seq.get_mut(index) else {
                continue;
            };
            let UniformId::Name(sym) = node.id() else {
                continue;
            };
            let Some(entry) = values.get(interner::resolve(sym)) else {
                continue;
            };
            if entry.should_upload() {
                node.set_value(ctx, &entry.value);
            }
        }
    }
}
