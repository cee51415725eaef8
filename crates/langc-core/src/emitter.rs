//! The emitter capability (§6.3): the narrow interface `SwitchCompiler`
//! drives to direct code generation, implemented by the external bytecode
//! emitter (out of scope here; see §1). Mirrors the shape of the teacher's
//! `CodeBuilder` (opcode emission, forward-jump labels, constant pooling)
//! but expressed as a trait so this crate never depends on a concrete
//! bytecode format.

use crate::ast::{ConstValue, ExprLoc, VarDeclId};
use crate::intern::StringId;
use crate::source::SourceLocation;
use crate::types::{ClassId, Type};

/// Distinguishes an `if` used as a statement from one used as an expression,
/// for the `emit_if` structured-emission primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfKind {
    Statement,
    Expression,
}

/// The capability interface an external bytecode emitter exposes to
/// `SwitchCompiler` (§6.3). Each primitive operates on a type-stack
/// abstraction the emitter itself tracks; this crate has no visibility into
/// stack depth or the bytecode format.
///
/// `SwitchCompiler` exercises every primitive here except `emit_if`, which
/// is listed in §6.3 for completeness (it backs the host's lowering of plain
/// `if` expressions elsewhere) but is never called while lowering a
/// `switch`: every conditional branch a switch needs is expressed directly
/// with the jump primitives, since `switch` lowering chains pattern tests
/// rather than nesting structured conditionals (§4.6.2, §4.6.3).
pub trait Emitter {
    /// A forward-jump label; opaque to this crate.
    type Label: Copy + Eq + std::fmt::Debug;

    /// Recurses into an arbitrary AST node (used for guard expressions and
    /// pattern sub-expressions that aren't themselves special-cased by the
    /// switch compiler).
    fn compile(&mut self, expr: &ExprLoc);

    fn load_var(&mut self, var: VarDeclId);
    fn store_var(&mut self, var: VarDeclId);
    fn load_local(&mut self, slot: u32);
    fn store_local(&mut self, slot: u32);

    fn load_const(&mut self, value: &ConstValue);
    fn load_default_value(&mut self, ty: &Type);

    /// Semantic length of a List/Map/Array/String already on the stack.
    fn emit_length(&mut self, at: SourceLocation);
    /// Indexed element fetch for `parent_type` (List/Array/Map), index
    /// already on the stack.
    fn unsafe_load_elem(&mut self, parent_type: &Type, at: SourceLocation);

    /// Boolean type test against one or more alternative types.
    fn is_instance_of(&mut self, types: &[Type]);
    /// Narrowing cast, panicking at runtime (outside this crate) on
    /// mismatch; only ever emitted after a matching `is_instance_of`.
    fn check_cast(&mut self, ty: &Type);

    fn box_value(&mut self);
    fn unbox_value(&mut self);
    fn dup_val(&mut self);
    fn pop_val(&mut self);
    fn swap(&mut self);

    fn invoke_method(&mut self, class: Option<ClassId>, method_name: StringId, param_types: &[Type]);
    fn convert_to(&mut self, ty: &Type, at_node: &ExprLoc, allow_loss: bool, at: SourceLocation);

    /// Structured conditional emission, used by the host's general `if`
    /// lowering; not exercised by `SwitchCompiler` (see trait docs).
    fn emit_if(
        &mut self,
        maybe_async: bool,
        kind: IfKind,
        then_label: Self::Label,
        else_label: Option<Self::Label>,
        finally_label: Option<Self::Label>,
    );

    fn label(&mut self) -> Self::Label;
    fn label_here(&mut self, label: Self::Label);
    fn jump(&mut self, label: Self::Label);
    /// Jumps to `label` if the boolean already on the stack is true.
    fn jump_if(&mut self, label: Self::Label);

    /// Dense jump-table dispatch over a contiguous integer range.
    fn table_switch(&mut self, min: i64, max: i64, default_label: Self::Label, labels: &[Self::Label]);
    /// Sparse hashed dispatch, one bucket label per distinct hash code.
    fn lookup_switch(&mut self, default_label: Self::Label, keys: &[i64], labels: &[Self::Label]);
}
