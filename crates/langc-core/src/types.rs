//! The type lattice (§4.1 of the spec): value kinds, numeric promotion,
//! operator result types and the conversion/assignability predicates the
//! resolver drives everything else from.

use crate::errors::{CompileErrorKind, CompileError};
use crate::source::SourceLocation;
use std::fmt;

/// Identifies a [`crate::class_registry::ClassDescriptor`] in a
/// [`crate::class_registry::ClassRegistry`].
///
/// Kept as a bare arena index (rather than a reference) per the "cyclic
/// graphs" design note: `Type::Instance`/`Type::Class` need to be `Copy` and
/// must be constructible before the class they name has finished resolving
/// (forward references), which an owning reference can't express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value's static type.
///
/// `Instance`/`Class` carry a [`ClassId`] that may be a forward reference:
/// the referenced [`crate::class_registry::ClassDescriptor`] is looked up
/// through the registry, never embedded by value, so it is always safe to
/// construct a `Type::Instance` for a class that hasn't finished class
/// preparation yet.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Type {
    Any,
    Boolean,
    Byte,
    Int,
    Long,
    Double,
    Decimal,
    String,
    List,
    Map,
    Array(Box<Type>),
    Iterator,
    Instance(ClassId),
    Class(ClassId),
    Function,
    Matcher,
    /// A value that may be `null`, wrapping the type it would otherwise have.
    /// Produced by `?.`/`?[` (§4.4.2) and by optional constructor/pattern
    /// parameters.
    Optional(Box<Type>),
    /// No type could be determined; always paired with a reported error
    /// (§8 universal property: unresolved ⇒ `Unknown` ⇒ an error exists).
    Unknown,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Boolean => write!(f, "boolean"),
            Type::Byte => write!(f, "byte"),
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Double => write!(f, "double"),
            Type::Decimal => write!(f, "decimal"),
            Type::String => write!(f, "String"),
            Type::List => write!(f, "List"),
            Type::Map => write!(f, "Map"),
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Iterator => write!(f, "Iterator"),
            Type::Instance(id) => write!(f, "Instance(#{})", id.0),
            Type::Class(id) => write!(f, "Class(#{})", id.0),
            Type::Function => write!(f, "Function"),
            Type::Matcher => write!(f, "Matcher"),
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Binary operators the type lattice assigns a result type to.
///
/// Field/index access (`.`, `?.`, `[`, `?[`) is handled separately by the
/// resolver (§4.4.2) since its result type depends on class/field lookup,
/// not purely on the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    #[must_use]
    pub fn is_boolean(self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(self, Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }

    #[must_use]
    pub fn is_shift(self) -> bool {
        matches!(self, Operator::Shl | Operator::Shr)
    }
}

/// Numeric promotion order: `Byte ⟶ Int ⟶ Long ⟶ Double ⟶ Decimal`.
fn numeric_rank(ty: &Type) -> Option<u8> {
    match ty {
        Type::Byte => Some(0),
        Type::Int => Some(1),
        Type::Long => Some(2),
        Type::Double => Some(3),
        Type::Decimal => Some(4),
        _ => None,
    }
}

/// Shift-count masks (§8 boundary behaviours): byte shifts mask to 3 bits
/// (mod 8), int to 5 bits (mod 32), long to 6 bits (mod 64).
#[must_use]
pub fn shift_mask_bits(operand_type: &Type) -> u32 {
    match operand_type {
        Type::Byte => 3,
        Type::Int => 5,
        Type::Long => 6,
        _ => 5,
    }
}

impl Type {
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        numeric_rank(self).is_some()
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Boolean | Type::Byte | Type::Int | Type::Long | Type::Double)
    }

    /// The boxed (nullable) form of a primitive type. Primitives stay
    /// themselves conceptually but become `Optional` so `null` can flow
    /// through, matching the `?.`/`?[` widening rule in §4.4.2.
    #[must_use]
    pub fn boxed(&self) -> Type {
        match self {
            Type::Optional(_) => self.clone(),
            other => Type::Optional(Box::new(other.clone())),
        }
    }

    /// Strips one level of `Optional`, if present.
    #[must_use]
    pub fn unboxed(&self) -> Type {
        match self {
            Type::Optional(inner) => (**inner).clone(),
            other => other.clone(),
        }
    }

    #[must_use]
    pub fn get_array_elem_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Is a value of `self` usable wherever `target` is expected, with no
    /// conversion (only widening reference compatibility, `Any`, and
    /// identical types)?
    #[must_use]
    pub fn is_assignable_from(&self, value: &Type) -> bool {
        if matches!(self, Type::Any) {
            return true;
        }
        if matches!(value, Type::Unknown) {
            // An already-errored expression is compatible with anything so
            // that later checks don't cascade (§7 recovery substitution).
            return true;
        }
        match (self, value) {
            (Type::Optional(a), Type::Optional(b)) => a.is_assignable_from(b),
            (Type::Optional(a), b) => a.is_assignable_from(b),
            (a, b) if a == b => true,
            (a, b) => numeric_rank(a).zip(numeric_rank(b)).is_some_and(|(ra, rb)| ra >= rb),
        }
    }

    /// Can a value of `self` be converted to `target`, optionally allowing a
    /// lossy narrowing conversion (`allowLoss`)?
    #[must_use]
    pub fn is_convertible_to(&self, target: &Type, allow_loss: bool) -> bool {
        if self.is_assignable_from_rev(target) {
            return true;
        }
        match (self, target) {
            (a, b) if a.is_numeric() && b.is_numeric() => allow_loss || numeric_rank(b) >= numeric_rank(a),
            (Type::String, b) if b.is_numeric() => allow_loss,
            (a, Type::String) if a.is_numeric() || matches!(a, Type::Boolean) => true,
            (Type::Instance(_), Type::Instance(_)) => allow_loss,
            _ => false,
        }
    }

    fn is_assignable_from_rev(&self, target: &Type) -> bool {
        target.is_assignable_from(self)
    }

    #[must_use]
    pub fn is_castable_to(&self, target: &Type) -> bool {
        matches!(target, Type::Any) || matches!(self, Type::Any) || self.is_convertible_to(target, true)
    }

    /// The narrowest type assignable from both `a` and `b`. Commutative and
    /// reflexive by construction (§8).
    #[must_use]
    pub fn common_super_type(a: &Type, b: &Type) -> Type {
        if a == b {
            return a.clone();
        }
        if matches!(a, Type::Unknown) {
            return b.clone();
        }
        if matches!(b, Type::Unknown) {
            return a.clone();
        }
        if let (Some(ra), Some(rb)) = (numeric_rank(a), numeric_rank(b)) {
            return if ra >= rb { a.clone() } else { b.clone() };
        }
        match (a, b) {
            (Type::Optional(ia), Type::Optional(ib)) => Type::Optional(Box::new(Type::common_super_type(ia, ib))),
            (Type::Optional(ia), other) | (other, Type::Optional(ia)) => {
                Type::Optional(Box::new(Type::common_super_type(ia, other)))
            }
            (Type::Array(ea), Type::Array(eb)) if ea == eb => Type::Array(ea.clone()),
            _ => Type::Any,
        }
    }

    /// The result type of `left op right`, per §4.1.
    ///
    /// # Errors
    /// Returns a `TypeError` when the operands are incompatible for `op`.
    pub fn result(left: &Type, op: Operator, right: &Type, at: SourceLocation) -> Result<Type, CompileError> {
        if op.is_boolean() {
            return Ok(Type::Boolean);
        }
        if op.is_comparison() {
            return Ok(Type::Boolean);
        }
        if matches!(left, Type::Any) || matches!(right, Type::Any) {
            return Ok(Type::Any);
        }
        if matches!(left, Type::String) && matches!(op, Operator::Add) {
            return Ok(Type::String);
        }
        if left.is_numeric() && right.is_numeric() {
            if op.is_shift() {
                return Ok(left.clone());
            }
            return Ok(promote(left, right));
        }
        Err(CompileError::new(
            CompileErrorKind::TypeError(format!("operator {op} is not defined for {left} and {right}")),
            at,
        ))
    }
}

fn promote(a: &Type, b: &Type) -> Type {
    let (ra, rb) = (numeric_rank(a).unwrap_or(0), numeric_rank(b).unwrap_or(0));
    if ra >= rb { a.clone() } else { b.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_super_type_is_commutative_and_reflexive() {
        let pairs = [(Type::Int, Type::Long), (Type::Byte, Type::Double), (Type::String, Type::Int)];
        for (a, b) in pairs {
            assert_eq!(Type::common_super_type(&a, &b), Type::common_super_type(&b, &a));
        }
        for ty in [Type::Int, Type::String, Type::Boolean, Type::Any] {
            assert_eq!(Type::common_super_type(&ty, &ty), ty);
        }
    }

    #[test]
    fn numeric_promotion_follows_byte_int_long_double_decimal() {
        let at = SourceLocation::synthetic();
        assert_eq!(Type::result(&Type::Byte, Operator::Add, &Type::Int, at).unwrap(), Type::Int);
        assert_eq!(Type::result(&Type::Int, Operator::Add, &Type::Long, at).unwrap(), Type::Long);
        assert_eq!(Type::result(&Type::Long, Operator::Add, &Type::Double, at).unwrap(), Type::Double);
        assert_eq!(Type::result(&Type::Double, Operator::Add, &Type::Decimal, at).unwrap(), Type::Decimal);
    }

    #[test]
    fn boolean_operators_always_produce_boolean() {
        let at = SourceLocation::synthetic();
        assert_eq!(Type::result(&Type::Int, Operator::And, &Type::String, at).unwrap(), Type::Boolean);
    }

    #[test]
    fn incompatible_operands_are_a_type_error() {
        let at = SourceLocation::synthetic();
        assert!(Type::result(&Type::String, Operator::Sub, &Type::Int, at).is_err());
    }

    #[test]
    fn any_absorbs_everything() {
        assert!(Type::Any.is_assignable_from(&Type::Int));
        assert!(Type::Any.is_assignable_from(&Type::Instance(ClassId(3))));
    }
}
