//! Material Uniform Values
//!
//! A material carries a flat `name -> UniformEntry` table. Values are plain
//! CPU data; the renderer's uniform binder decides how each one reaches the
//! driver based on the type the compiled program reports for that name.
//!
//! Structured uniforms mirror GLSL: a `struct` is a [`UniformValue::Struct`]
//! keyed by member name, an array of structs is a [`UniformValue::List`]
//! indexed by element.

use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::assets::TextureHandle;

/// A value that can be bound to a program uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    IVec2(IVec2),
    IVec3(IVec3),
    IVec4(IVec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    /// `None` binds the renderer's fallback texture.
    Texture(Option<TextureHandle>),

    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    Vec2Array(Vec<Vec2>),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    Mat3Array(Vec<Mat3>),
    Mat4Array(Vec<Mat4>),
    TextureArray(Vec<Option<TextureHandle>>),

    /// Members of a GLSL struct, by member name.
    Struct(FxHashMap<String, UniformValue>),
    /// Elements of an array of structs, by index.
    List(Vec<UniformValue>),
}

impl UniformValue {
    /// Short type name used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Vec4(_) => "vec4",
            Self::IVec2(_) => "ivec2",
            Self::IVec3(_) => "ivec3",
            Self::IVec4(_) => "ivec4",
            Self::Mat2(_) => "mat2",
            Self::Mat3(_) => "mat3",
            Self::Mat4(_) => "mat4",
            Self::Texture(_) => "texture",
            Self::FloatArray(_) => "float[]",
            Self::IntArray(_) => "int[]",
            Self::Vec2Array(_) => "vec2[]",
            Self::Vec3Array(_) => "vec3[]",
            Self::Vec4Array(_) => "vec4[]",
            Self::Mat3Array(_) => "mat3[]",
            Self::Mat4Array(_) => "mat4[]",
            Self::TextureArray(_) => "texture[]",
            Self::Struct(_) => "struct",
            Self::List(_) => "struct[]",
        }
    }

    /// Builds a struct value from `(member, value)` pairs.
    pub fn structure<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (S, UniformValue)>,
        S: Into<String>,
    {
        Self::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_value! {
    f32 => Float,
    i32 => Int,
    bool => Bool,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    IVec2 => IVec2,
    IVec3 => IVec3,
    IVec4 => IVec4,
    Mat2 => Mat2,
    Mat3 => Mat3,
    Mat4 => Mat4,
    Vec<f32> => FloatArray,
    Vec<i32> => IntArray,
    Vec<Vec2> => Vec2Array,
    Vec<Vec3> => Vec3Array,
    Vec<Vec4> => Vec4Array,
    Vec<Mat3> => Mat3Array,
    Vec<Mat4> => Mat4Array,
}

impl From<TextureHandle> for UniformValue {
    #[inline]
    fn from(value: TextureHandle) -> Self {
        Self::Texture(Some(value))
    }
}

/// One row of a material's uniform table.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformEntry {
    pub value: UniformValue,
    /// `Some(false)` suppresses uploads of this entry. `None` and `Some(true)`
    /// both mean "upload whenever the material is refreshed".
    pub needs_update: Option<bool>,
}

impl UniformEntry {
    #[must_use]
    pub fn new(value: impl Into<UniformValue>) -> Self {
        Self {
            value: value.into(),
            needs_update: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn should_upload(&self) -> bool {
        self.needs_update != Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_flag_means_upload() {
        let mut entry = UniformEntry::new(1.0f32);
        assert!(entry.should_upload());
        entry.needs_update = Some(true);
        assert!(entry.should_upload());
        entry.needs_update = Some(false);
        assert!(!entry.should_upload());
    }

    #[test]
    fn struct_builder_keys_members() {
        let value = UniformValue::structure([
            ("color", UniformValue::from(Vec3::ONE)),
            ("intensity", UniformValue::from(2.0f32)),
        ]);
        let UniformValue::Struct(members) = value else {
            panic!("expected struct");
        };
        assert_eq!(members.get("intensity"), Some(&UniformValue::Float(2.0)));
    }
}
