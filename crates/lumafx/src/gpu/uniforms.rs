use std::fmt;

use crate::error::ProgramError;

/// Uniform slot types a program may declare.
///
/// Booleans are stored as [`UniformType::Int`]; see [`UniformValue::Bool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
}

impl UniformType {
    pub(crate) fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Int => "int",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::Mat3 => "mat3",
        }
    }

    /// std140 base alignment in bytes.
    fn align(self) -> u32 {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 | UniformType::Vec4 | UniformType::Mat3 => 16,
        }
    }

    /// std140 size in bytes; mat3 columns are padded to vec4.
    fn size(self) -> u32 {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 48,
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glsl_name())
    }
}

/// A single uniform value handed to a pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    /// Uploaded as an int (0 or 1).
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Row list of a 3x3 matrix: `[m00, m01, m02, m10, ...]`.
    ///
    /// Uploaded the way GL's `uniformMatrix3fv` reads an untransposed list,
    /// so the list's consecutive triples become the matrix columns.
    Mat3([f32; 9]),
}

impl UniformValue {
    pub fn uniform_type(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Int(_) | UniformValue::Bool(_) => UniformType::Int,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat3(_) => UniformType::Mat3,
        }
    }

    fn write(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(value) => out[..4].copy_from_slice(&value.to_ne_bytes()),
            UniformValue::Int(value) => out[..4].copy_from_slice(&value.to_ne_bytes()),
            UniformValue::Bool(value) => {
                out[..4].copy_from_slice(&i32::from(*value).to_ne_bytes())
            }
            UniformValue::Vec2(value) => out[..8].copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Vec3(value) => out[..12].copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Vec4(value) => out[..16].copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Mat3(value) => {
                for column in 0..3 {
                    let start = column * 16;
                    out[start..start + 12]
                        .copy_from_slice(bytemuck::cast_slice(&value[column * 3..column * 3 + 3]));
                }
            }
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<[f32; 9]> for UniformValue {
    fn from(value: [f32; 9]) -> Self {
        UniformValue::Mat3(value)
    }
}

/// Named uniform values for one pass.
///
/// Setting the same name twice keeps the last value. Names the program does
/// not declare are rejected when the pass runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Uniforms {
    values: Vec<(String, UniformValue)>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Uniforms::set`].
    pub fn with(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> &mut Self {
        let value = value.into();
        match self.values.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Name of the uniform every program receives, set to the destination size.
pub(crate) const TEX_SIZE_UNIFORM: &str = "tex_size";

#[derive(Clone, Debug)]
struct UniformSlot {
    name: String,
    ty: UniformType,
    offset: u32,
}

/// std140 placement of a program's uniform block.
#[derive(Clone, Debug)]
pub(crate) struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: u32,
}

impl UniformLayout {
    pub(crate) fn std140(declared: &[(String, UniformType)]) -> Self {
        let mut slots = Vec::with_capacity(declared.len());
        let mut cursor = 0u32;
        for (name, ty) in declared {
            let offset = cursor.next_multiple_of(ty.align());
            slots.push(UniformSlot {
                name: name.clone(),
                ty: *ty,
                offset,
            });
            cursor = offset + ty.size();
        }
        Self {
            slots,
            size: cursor.next_multiple_of(16).max(16),
        }
    }

    pub(crate) fn size(&self) -> u32 {
        self.size
    }

    pub(crate) fn uniform_type(&self, name: &str) -> Option<UniformType> {
        self.slot(name).map(|slot| slot.ty)
    }

    fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Packs `uniforms` into a std140 block, with `tex_size` filled from the
    /// destination size. Slots the caller leaves unset stay zeroed.
    pub(crate) fn encode(
        &self,
        program: &str,
        uniforms: &Uniforms,
        tex_size: [f32; 2],
    ) -> Result<Vec<u8>, ProgramError> {
        let mut block = vec![0u8; self.size as usize];
        for (name, value) in uniforms.iter() {
            let slot = self.slot(name).ok_or_else(|| ProgramError::UnknownUniform {
                program: program.to_string(),
                name: name.to_string(),
            })?;
            let actual = value.uniform_type();
            if actual != slot.ty {
                return Err(ProgramError::UniformType {
                    program: program.to_string(),
                    name: name.to_string(),
                    expected: slot.ty,
                    actual,
                });
            }
            value.write(&mut block[slot.offset as usize..]);
        }
        if let Some(slot) = self.slot(TEX_SIZE_UNIFORM) {
            UniformValue::Vec2(tex_size).write(&mut block[slot.offset as usize..]);
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(entries: &[(&str, UniformType)]) -> UniformLayout {
        let declared: Vec<(String, UniformType)> = entries
            .iter()
            .map(|(name, ty)| (name.to_string(), *ty))
            .collect();
        UniformLayout::std140(&declared)
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    #[test]
    fn std140_offsets_respect_alignment() {
        let layout = layout(&[
            ("tex_size", UniformType::Vec2),
            ("amount", UniformType::Float),
            ("color", UniformType::Vec3),
            ("flag", UniformType::Int),
            ("transform", UniformType::Mat3),
        ]);
        let offsets: Vec<u32> = layout.slots.iter().map(|slot| slot.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 28, 32]);
        assert_eq!(layout.size(), 80);
    }

    #[test]
    fn mat3_rows_upload_as_padded_columns() {
        let layout = layout(&[("transform", UniformType::Mat3)]);
        let uniforms = Uniforms::new().with(
            "transform",
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        );
        let block = layout.encode("test", &uniforms, [1.0, 1.0]).unwrap();
        assert_eq!(
            floats(&block),
            vec![1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]
        );
    }

    #[test]
    fn tex_size_is_injected_and_bools_become_ints() {
        let layout = layout(&[("tex_size", UniformType::Vec2), ("flip", UniformType::Int)]);
        let uniforms = Uniforms::new().with("flip", true);
        let block = layout.encode("test", &uniforms, [640.0, 480.0]).unwrap();
        assert_eq!(floats(&block[..8]), vec![640.0, 480.0]);
        assert_eq!(i32::from_ne_bytes([block[8], block[9], block[10], block[11]]), 1);
    }

    #[test]
    fn unknown_and_mistyped_uniforms_are_rejected() {
        let layout = layout(&[("amount", UniformType::Float)]);
        let unknown = Uniforms::new().with("amuont", 1.0);
        assert!(matches!(
            layout.encode("sepia", &unknown, [1.0, 1.0]),
            Err(ProgramError::UnknownUniform { .. })
        ));
        let mistyped = Uniforms::new().with("amount", [1.0, 2.0]);
        assert!(matches!(
            layout.encode("sepia", &mistyped, [1.0, 1.0]),
            Err(ProgramError::UniformType {
                expected: UniformType::Float,
                actual: UniformType::Vec2,
                ..
            })
        ));
    }

    #[test]
    fn setting_twice_keeps_last_value() {
        let mut uniforms = Uniforms::new();
        uniforms.set("amount", 0.25).set("amount", 0.75);
        assert_eq!(uniforms.get("amount"), Some(&UniformValue::Float(0.75)));
        assert_eq!(uniforms.iter().count(), 1);
    }
}
