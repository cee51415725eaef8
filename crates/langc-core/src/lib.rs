//! Semantic-analysis and pattern-compilation core: name binding, type
//! inference, closure/heap-local analysis, wrapper/init-method synthesis,
//! and `switch` pattern validation/reachability/lowering.
//!
//! Consumes an AST already produced by a parser (out of scope here) and
//! produces an annotated AST plus diagnostics; the only thing downstream of
//! this crate is an external bytecode emitter, reached through the
//! [`emitter::Emitter`] capability trait during switch lowering.

mod ast;
mod class_registry;
mod context;
mod emitter;
mod errors;
mod intern;
mod resolver;
mod source;
mod switch;
mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::ast::{
    Annotations, Arenas, Arg, Block, BlockId, ConstValue, ConstructorArgs, DecimalValue, Expr, ExprLoc, FunDecl,
    FunDeclId, Ident, Pattern, Stmt, SwitchCase, SwitchExpr, VarDecl, VarDeclFlags, VarDeclId, UNDEFINED_MARKER,
};
pub use crate::class_registry::{ClassDescriptor, ClassRegistry, Field, FunctionDescriptor, Param};
pub use crate::context::CompilationContext;
pub use crate::emitter::{Emitter, IfKind};
pub use crate::errors::{CompileError, CompileErrorKind, Diagnostics};
pub use crate::intern::{Interns, StringId};
pub use crate::resolver::Resolver;
pub use crate::source::SourceLocation;
pub use crate::switch::compiler::SwitchCompiler;
pub use crate::switch::resolver::SwitchResolver;
pub use crate::types::{shift_mask_bits, ClassId, Operator, Type};
