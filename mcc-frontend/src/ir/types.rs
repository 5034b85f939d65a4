//! IR Type System
//!
//! Types are interned in a `TypeRegistry`: structurally equal types share a
//! single `TypeId`, so type equality is an integer comparison. Composite
//! types refer to their components by `TypeId` as well.

use mcc_common::{IrError, TypeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// IR Type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    /// Void type (function results only)
    Void,

    /// Integer with bit width (1..=64)
    Int(u32),

    /// IEEE-754 double
    F64,

    /// Typed pointer
    Ptr(TypeId),

    /// Array type [len x elem]
    Array { elem: TypeId, len: u64 },

    /// Struct type, fields in declaration order
    Struct { fields: Vec<TypeId> },
}

/// Interned type universe for one module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<IrType>", into = "Vec<IrType>")]
pub struct TypeRegistry {
    types: Vec<IrType>,
    lookup: HashMap<IrType, TypeId>,
}

impl From<Vec<IrType>> for TypeRegistry {
    fn from(types: Vec<IrType>) -> Self {
        let lookup = types
            .iter()
            .enumerate()
            .map(|(i, ty)| (ty.clone(), TypeId(i as u32)))
            .collect();
        Self { types, lookup }
    }
}

impl From<TypeRegistry> for Vec<IrType> {
    fn from(registry: TypeRegistry) -> Self {
        registry.types
    }
}

impl PartialEq for TypeRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a type, returning the existing handle if it is already known
    pub fn intern(&mut self, ty: IrType) -> TypeId {
        if let Some(&id) = self.lookup.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.lookup.insert(ty, id);
        id
    }

    pub fn void(&mut self) -> TypeId {
        self.intern(IrType::Void)
    }

    pub fn int(&mut self, bits: u32) -> Result<TypeId, IrError> {
        if bits == 0 || bits > 64 {
            return Err(IrError::UnsupportedBitWidth { bits });
        }
        Ok(self.intern(IrType::Int(bits)))
    }

    pub fn bool(&mut self) -> TypeId {
        self.intern(IrType::Int(1))
    }

    pub fn f64(&mut self) -> TypeId {
        self.intern(IrType::F64)
    }

    pub fn ptr_to(&mut self, pointee: TypeId) -> TypeId {
        self.intern(IrType::Ptr(pointee))
    }

    pub fn array_of(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(IrType::Array { elem, len })
    }

    pub fn struct_of(&mut self, fields: Vec<TypeId>) -> TypeId {
        self.intern(IrType::Struct { fields })
    }

    /// Get the structure behind a handle.
    ///
    /// Handles are only ever created by this registry, so an unknown handle
    /// means it came from a different module; that is a caller bug.
    pub fn get(&self, id: TypeId) -> &IrType {
        &self.types[id.index()]
    }

    pub fn try_get(&self, id: TypeId) -> Option<&IrType> {
        self.types.get(id.index())
    }

    /// Look up a type without interning it
    pub fn find(&self, ty: &IrType) -> Option<TypeId> {
        self.lookup.get(ty).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All interned types in handle order
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &IrType)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32), ty))
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.get(id), IrType::Void)
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        matches!(self.get(id), IrType::Int(_))
    }

    pub fn is_f64(&self, id: TypeId) -> bool {
        matches!(self.get(id), IrType::F64)
    }

    pub fn is_ptr(&self, id: TypeId) -> bool {
        matches!(self.get(id), IrType::Ptr(_))
    }

    pub fn int_width(&self, id: TypeId) -> Option<u32> {
        match self.get(id) {
            IrType::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            IrType::Ptr(pointee) => Some(*pointee),
            _ => None,
        }
    }

    /// Whether loads and stores can move a value of this type
    pub fn is_scalar(&self, id: TypeId) -> bool {
        matches!(
            self.try_get(id),
            Some(IrType::Int(_) | IrType::F64 | IrType::Ptr(_))
        )
    }

    /// Size of a value of this type in bytes, `None` for unsized types and
    /// for sizes past `u64::MAX`
    pub fn size_of(&self, id: TypeId) -> Option<u64> {
        match self.get(id) {
            IrType::Void => None,
            IrType::Int(bits) => Some(int_storage_bytes(*bits)),
            IrType::F64 | IrType::Ptr(_) => Some(8),
            IrType::Array { elem, len } => self.size_of(*elem)?.checked_mul(*len),
            IrType::Struct { fields } => {
                let mut offset = 0u64;
                for &field in fields {
                    let align = self.align_of(field)?;
                    offset = align_to(offset, align)?.checked_add(self.size_of(field)?)?;
                }
                align_to(offset, self.align_of(id)?)
            }
        }
    }

    /// Natural alignment in bytes
    pub fn align_of(&self, id: TypeId) -> Option<u64> {
        match self.get(id) {
            IrType::Void => None,
            IrType::Int(bits) => Some(int_storage_bytes(*bits)),
            IrType::F64 | IrType::Ptr(_) => Some(8),
            IrType::Array { elem, .. } => self.align_of(*elem),
            IrType::Struct { fields } => {
                let mut align = 1;
                for &field in fields {
                    align = align.max(self.align_of(field)?);
                }
                Some(align)
            }
        }
    }

    /// Byte offset of field `index` within a struct type
    pub fn field_offset(&self, id: TypeId, index: usize) -> Option<u64> {
        let IrType::Struct { fields } = self.get(id) else {
            return None;
        };
        if index >= fields.len() {
            return None;
        }
        let mut offset = 0u64;
        for (i, &field) in fields.iter().enumerate() {
            offset = align_to(offset, self.align_of(field)?)?;
            if i == index {
                return Some(offset);
            }
            offset = offset.checked_add(self.size_of(field)?)?;
        }
        None
    }

    /// Render a type the way it appears in the textual IR
    pub fn display(&self, id: TypeId) -> String {
        match self.try_get(id) {
            None => format!("<{id}>"),
            Some(IrType::Void) => "void".to_string(),
            Some(IrType::Int(bits)) => format!("i{bits}"),
            Some(IrType::F64) => "double".to_string(),
            Some(IrType::Ptr(pointee)) => format!("{}*", self.display(*pointee)),
            Some(IrType::Array { elem, len }) => format!("[{len} x {}]", self.display(*elem)),
            Some(IrType::Struct { fields }) => {
                let fields: Vec<String> = fields.iter().map(|&f| self.display(f)).collect();
                format!("{{ {} }}", fields.join(", "))
            }
        }
    }
}

/// Integers are stored in the smallest power-of-two number of bytes that
/// holds them, and aligned to that size.
pub fn int_storage_bytes(bits: u32) -> u64 {
    (bits.div_ceil(8) as u64).next_power_of_two()
}

fn align_to(offset: u64, align: u64) -> Option<u64> {
    offset.div_ceil(align).checked_mul(align)
}
