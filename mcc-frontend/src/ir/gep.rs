//! GetElementPtr (GEP) address resolution
//!
//! Resolves an index chain against a base type without touching memory.
//!
//! # Index interpretation
//!
//! - The first index always applies to the pointer itself: it steps over
//!   whole values of the base type (`base + index * sizeof(base_ty)`), it
//!   never steps *into* the base type.
//! - Every following index steps into the type reached so far:
//!   - `Array(elem, n)`: any integer index selects an `elem`. Bounds are not
//!     checked; an out-of-range index is only undefined if executed.
//!   - `Struct(fields)`: the index must be a constant field position inside
//!     the declared field list.
//!   - anything else (including pointers) cannot be indexed into.
//!
//! The result is always a pointer to the type reached by the last index.

use log::trace;
use mcc_common::{IrError, TypeId};
use crate::ir::{IrType, TypeRegistry, Value};

/// One resolved step of an index chain
#[derive(Debug, Clone, PartialEq)]
pub enum GepStep {
    /// Pointer arithmetic over whole values of `stride`
    Pointer { stride: TypeId, index: Value },
    /// Element `index` of an array of `elem`
    Element { elem: TypeId, index: Value },
    /// Constant field of a struct
    Field { struct_ty: TypeId, field: usize },
}

/// A fully resolved index chain
#[derive(Debug, Clone, PartialEq)]
pub struct GepPath {
    pub steps: Vec<GepStep>,
    /// Type reached by the last index
    pub target: TypeId,
}

/// Resolve `indices` applied to `ptr_ty` (which must point at `base_ty`).
///
/// Returns the path and the type reached; the caller interns the pointer to
/// it. The registry is not modified.
pub fn resolve(
    types: &TypeRegistry,
    base_ty: TypeId,
    ptr_ty: TypeId,
    indices: &[Value],
) -> Result<GepPath, IrError> {
    let pointee = types
        .pointee(ptr_ty)
        .ok_or_else(|| IrError::InvalidFirstIndexTarget {
            found: types.display(ptr_ty),
        })?;
    if pointee != base_ty {
        return Err(IrError::type_mismatch(format!(
            "GEP base type {} does not match pointer type {}",
            types.display(base_ty),
            types.display(ptr_ty)
        )));
    }

    let mut steps = Vec::with_capacity(indices.len());
    let mut current = base_ty;

    for (position, &index) in indices.iter().enumerate() {
        if !types.is_int(index.ty()) {
            return Err(IrError::type_mismatch(format!(
                "GEP index {position} has non-integer type {}",
                types.display(index.ty())
            )));
        }

        if position == 0 {
            steps.push(GepStep::Pointer { stride: base_ty, index });
            continue;
        }

        match types.get(current) {
            IrType::Array { elem, .. } => {
                steps.push(GepStep::Element { elem: *elem, index });
                current = *elem;
            }
            IrType::Struct { fields } => {
                let Value::Const { bits, .. } = index else {
                    return Err(IrError::type_mismatch(format!(
                        "struct field index {position} into {} must be a constant",
                        types.display(current)
                    )));
                };
                let field = usize::try_from(bits)
                    .ok()
                    .filter(|&field| field < fields.len())
                    .ok_or_else(|| {
                        IrError::type_mismatch(format!(
                            "field {bits} out of range for {} ({} fields)",
                            types.display(current),
                            fields.len()
                        ))
                    })?;
                let field_ty = fields[field];
                steps.push(GepStep::Field { struct_ty: current, field });
                current = field_ty;
            }
            _ => {
                return Err(IrError::type_mismatch(format!(
                    "GEP index {position} cannot step into {}",
                    types.display(current)
                )));
            }
        }
    }

    trace!(
        "resolved GEP over {} with {} index(es) to {}",
        types.display(base_ty),
        indices.len(),
        types.display(current)
    );

    Ok(GepPath { steps, target: current })
}
