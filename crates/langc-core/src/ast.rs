//! The AST model (§4.3, §3): statement and expression tagged sums, the
//! symbol records (`VarDecl`, `FunDecl`, `Block`), and the arenas that own
//! them.
//!
//! Per the "cyclic graphs" design note, symbols are addressed by index
//! (`VarDeclId`, `FunDeclId`, `BlockId`) rather than by owning reference:
//! heap-local promotion (§4.4.2) creates back-edges between a nested
//! function's synthesized parameter and the original declaration in an
//! enclosing function, which a tree of `Box`/`Rc` can't express without
//! reference cycles.

use crate::intern::StringId;
use crate::source::SourceLocation;
use crate::types::{ClassId, Operator, Type};
use indexmap::IndexMap;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[must_use]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(VarDeclId);
arena_id!(FunDeclId);
arena_id!(BlockId);

/// A compile-time constant value, produced by constant folding or carried by
/// a literal pattern/expression.
///
/// `Decimal` stores an unscaled integer and a scale rather than a string, so
/// that zero-detection after "stripping trailing zeros" (§8) is just
/// `unscaled == 0`, independent of how the value was originally written.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Byte(u8),
    Int(i32),
    Long(i64),
    Double(f64),
    Decimal(DecimalValue),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecimalValue {
    pub unscaled: i128,
    pub scale: u32,
}

impl DecimalValue {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.unscaled == 0
    }
}

impl ConstValue {
    #[must_use]
    pub fn type_of(&self) -> Type {
        match self {
            ConstValue::Null => Type::Any,
            ConstValue::Bool(_) => Type::Boolean,
            ConstValue::Byte(_) => Type::Byte,
            ConstValue::Int(_) => Type::Int,
            ConstValue::Long(_) => Type::Long,
            ConstValue::Double(_) => Type::Double,
            ConstValue::Decimal(_) => Type::Decimal,
            ConstValue::Str(_) => Type::String,
        }
    }
}

/// Which closure-chain link a [`VarDecl`] plays, or none.
///
/// Struct-of-bools, matching the teacher's convention for grouped flag state
/// (e.g. `repl.rs`'s `TestConfig`) rather than a bitflags type, since these
/// flags are read individually throughout the resolver, not as a mask.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct VarDeclFlags {
    pub is_global: bool,
    pub is_field: bool,
    pub is_const_var: bool,
    pub is_param: bool,
    pub is_heap_local: bool,
    pub is_passed_as_heap_local: bool,
    pub is_binding_var: bool,
    pub is_final: bool,
}

/// A symbol record: one declared name, whatever it denotes (§3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VarDecl {
    pub name: StringId,
    pub ty: Type,
    pub owning_function: Option<FunDeclId>,
    pub declaring_block: Option<BlockId>,
    pub nesting_level: u32,
    pub flags: VarDeclFlags,
    pub const_value: Option<ConstValue>,
    pub initialiser: Option<Box<ExprLoc>>,
    /// Set when this name denotes a function rather than a plain variable.
    pub fun_decl: Option<FunDeclId>,
    /// For a heap-local's per-function link: the link one step closer to the
    /// function that originally declared the variable.
    pub parent_var_decl: Option<VarDeclId>,
    /// For a heap-local's per-function link: the very first declaration in
    /// the chain (the function that actually owns the variable's storage).
    pub original_var_decl: Option<VarDeclId>,
    /// Set on a synthesized wrapper parameter to point back at the
    /// underlying function's parameter `VarDecl`.
    pub param_var_decl: Option<VarDeclId>,
    pub location: SourceLocation,
}

/// Sentinel used while a `VarDecl`'s initialiser is still being resolved, so
/// a reference to the variable from inside its own initialiser can be
/// detected as a `SelfReferenceError` (§4.4.2).
pub const UNDEFINED_MARKER: &str = "<undefined>";

impl VarDecl {
    #[must_use]
    pub fn new(name: StringId, ty: Type, location: SourceLocation) -> Self {
        Self {
            name,
            ty,
            owning_function: None,
            declaring_block: None,
            nesting_level: 0,
            flags: VarDeclFlags::default(),
            const_value: None,
            initialiser: None,
            fun_decl: None,
            parent_var_decl: None,
            original_var_decl: None,
            param_var_decl: None,
            location,
        }
    }
}

/// A user or synthesized function (§3 `FunDecl`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunDecl {
    pub name: StringId,
    pub return_type: Type,
    pub params: Vec<VarDeclId>,
    pub body: BlockId,
    /// Back-reference to this function's synthesized vararg wrapper, once
    /// wrapper synthesis (§4.4.1) has run.
    pub wrapper: Option<FunDeclId>,
    /// The lexically enclosing function, `None` at script/class top level.
    pub owning_function: Option<FunDeclId>,
    /// Variables closed over by nested functions that this function
    /// consumes or forwards, keyed by name (§4.4.2).
    pub heap_locals_by_name: IndexMap<StringId, VarDeclId>,
    pub while_loops: u32,
    pub closure_count: u32,
    pub globals: Vec<StringId>,
    pub is_static: bool,
    pub is_final: bool,
    pub is_async: bool,
    pub is_wrapper: bool,
    pub is_init_method: bool,
    pub is_init_wrapper: bool,
}

impl FunDecl {
    #[must_use]
    pub fn new(name: StringId, return_type: Type, body: BlockId) -> Self {
        Self {
            name,
            return_type,
            params: Vec::new(),
            body,
            wrapper: None,
            owning_function: None,
            heap_locals_by_name: IndexMap::new(),
            while_loops: 0,
            closure_count: 0,
            globals: Vec::new(),
            is_static: false,
            is_final: false,
            is_async: false,
            is_wrapper: false,
            is_init_method: false,
            is_init_wrapper: false,
        }
    }
}

/// A lexical block: a statement list plus the symbol table for names
/// declared directly in it (§3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub owning_class: Option<ClassId>,
    pub enclosing_block: Option<BlockId>,
    /// Insertion order matters for field blocks (declaration order drives
    /// `_initMissing` bit assignment, §9); irrelevant elsewhere.
    pub vars: IndexMap<StringId, VarDeclId>,
    pub is_resolving_params: bool,
    /// Index of the statement currently being resolved, so a helper (regex
    /// capture hoisting, switch binding-variable hoisting) can splice a new
    /// `Stmt::VarDeclStmt` in immediately before it without invalidating the
    /// in-progress iteration (§9 "wrapper synthesis in-place AST rewriting").
    pub current_resolving_stmt: Option<usize>,
}

impl Block {
    #[must_use]
    pub fn new(enclosing_block: Option<BlockId>, owning_class: Option<ClassId>) -> Self {
        Self {
            stmts: Vec::new(),
            owning_class,
            enclosing_block,
            vars: IndexMap::new(),
            is_resolving_params: false,
            current_resolving_stmt: None,
        }
    }

    /// Inserts `stmt` immediately before the statement currently being
    /// resolved, advancing the resolving cursor so the new statement becomes
    /// the next one visited (§4.4.3, §9).
    pub fn insert_before_current(&mut self, stmt: Stmt) {
        let at = self.current_resolving_stmt.unwrap_or(0);
        self.stmts.insert(at, stmt);
        if let Some(cursor) = &mut self.current_resolving_stmt {
            *cursor += 1;
        }
    }
}

/// A statement.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Stmt {
    VarDeclStmt(VarDeclId),
    ExprStmt(Box<ExprLoc>),
    If { cond: Box<ExprLoc>, then_block: BlockId, else_block: Option<BlockId> },
    While { cond: Box<ExprLoc>, body: BlockId },
    Return(Option<Box<ExprLoc>>),
    ClassDecl(ClassId),
    Import(StringId),
    FunDeclStmt(FunDeclId),
}

/// Either a name not yet looked up, or one resolved to a `VarDecl`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum Ident {
    Unresolved(StringId),
    Resolved(VarDeclId),
}

/// One call argument: positional (`name: None`) or named.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Arg {
    pub name: Option<StringId>,
    pub value: Box<ExprLoc>,
}

/// An expression's shape. Immutable once constructed — per §4.3, a node is
/// never mutated in place to change kind; a `TypeExpr` folded to a constant
/// is replaced wholesale in its parent's slot by [`crate::ast::ExprLoc`]
/// assignment, not rewritten in place.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(ConstValue),
    Name(Ident),
    This,
    Super,
    Field { object: Box<ExprLoc>, name: StringId, safe: bool },
    Index { object: Box<ExprLoc>, index: Box<ExprLoc>, safe: bool },
    Binary { left: Box<ExprLoc>, op: Operator, right: Box<ExprLoc> },
    /// Assignment to a name, field, or index target. The only mutating
    /// expression shape in the model: plain variable reassignment, field
    /// assignment in synthesized init/wrapper bodies, and REPL-mode
    /// auto-declared globals all go through this node.
    Assign { target: Box<ExprLoc>, value: Box<ExprLoc> },
    InstanceOf { expr: Box<ExprLoc>, ty: Type, negated: bool },
    As { expr: Box<ExprLoc>, ty: Type },
    Call { callee: Box<ExprLoc>, args: Vec<Arg> },
    If { cond: Box<ExprLoc>, then_branch: Box<ExprLoc>, else_branch: Option<Box<ExprLoc>> },
    ListLit(Vec<ExprLoc>),
    MapLit(Vec<(ExprLoc, ExprLoc)>),
    Switch(Box<SwitchExpr>),
    RegexMatch { subject: Box<ExprLoc>, pattern: String, flags: String },
    /// A closure literal: the function body was already parsed into
    /// `FunDeclId`; this expression is what makes it a value at the point
    /// it's referenced (e.g. `{ -> f() }`).
    FunctionRef(FunDeclId),
    /// A bare type name used as a value (e.g. a static-const field access
    /// spelled as a type reference); constant folding may rewrite the whole
    /// node into `Expr::Literal`.
    TypeExpr(Type),
}

/// Post-resolution annotations attached to every expression node (§4.3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Annotations {
    pub ty: Type,
    pub is_const: bool,
    pub const_value: Option<ConstValue>,
    pub could_be_null: bool,
    pub is_resolved: bool,
    pub owning_function: Option<FunDeclId>,
    pub enclosing_block: Option<BlockId>,
    /// Set on a single `Expr::RegexMatch` node by
    /// `resolver::regex::check_loop_condition` when it is the sole
    /// global-flag match directly inside a while-condition (§4.4.3) — the
    /// one place a global regex match is legal. Checked, not set, by
    /// `resolve_regex_match`.
    pub is_vetted_loop_regex: bool,
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            ty: Type::Unknown,
            is_const: false,
            const_value: None,
            could_be_null: false,
            is_resolved: false,
            owning_function: None,
            enclosing_block: None,
            is_vetted_loop_regex: false,
        }
    }
}

/// An expression together with its source location and post-resolution
/// annotations.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExprLoc {
    pub kind: Expr,
    pub location: SourceLocation,
    pub annotations: Annotations,
}

impl ExprLoc {
    #[must_use]
    pub fn new(kind: Expr, location: SourceLocation) -> Self {
        Self { kind, location, annotations: Annotations::default() }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.annotations.is_resolved
    }
}

/// A pattern's shape (§3 `Pattern`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Pattern {
    Literal(ConstValue),
    /// An interpolated ("expr") string pattern, matched via equality against
    /// its fully-interpolated text at runtime; opaque to static analysis
    /// beyond that it always covers exactly `Type::String`.
    ExprString,
    TypeTest(Type),
    Underscore,
    Star,
    /// First occurrence of a name in a case's patterns: binds the matched
    /// sub-value. `first_time_in_pattern` is `false` once the resolver has
    /// rewritten a later occurrence of the same name into
    /// [`Pattern::Identifier`] (§4.5).
    BindingVar { var: VarDeclId, declared_type: Option<Type> },
    /// Reuse of an earlier binding: an equality test against the already-
    /// bound value, not a fresh bind.
    Identifier(VarDeclId),
    ListPattern(Vec<Pattern>),
    /// Literal-string-keyed entries only, per §4.5 ("map keys must be
    /// literal strings").
    MapPattern(Vec<(String, Pattern)>),
    ConstructorPattern { class: ClassId, args: ConstructorArgs },
    RegexMatch(String),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ConstructorArgs {
    Positional(Vec<Pattern>),
    Named(Vec<(StringId, Pattern)>),
}

/// One `pattern [if guard] -> result` arm of a case. A case may list several
/// patterns sharing one result and guard (`1, 2, 3 -> ...`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SwitchCase {
    pub patterns: Vec<Pattern>,
    pub guard: Option<Box<ExprLoc>>,
    pub result: Box<ExprLoc>,
    pub block: Option<BlockId>,
}

/// A `switch` expression (§3, §4.5, §4.6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SwitchExpr {
    pub subject: Box<ExprLoc>,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Box<ExprLoc>>,
    /// Synthesized variable holding the subject's (unboxed) value, scoped to
    /// `block`. `None` until the `SwitchResolver` has run.
    pub it_var: Option<VarDeclId>,
    /// Fresh block enclosing all cases, where `it_var` and every case's
    /// binding variables live.
    pub block: Option<BlockId>,
    pub result_type: Type,
}

/// Owns every [`VarDecl`], [`FunDecl`] and [`Block`] created while resolving
/// one compilation unit.
#[derive(Debug, Default)]
pub struct Arenas {
    var_decls: Vec<VarDecl>,
    fun_decls: Vec<FunDecl>,
    blocks: Vec<Block>,
}

impl Arenas {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_var(&mut self, decl: VarDecl) -> VarDeclId {
        let id = VarDeclId(self.var_decls.len().try_into().expect("too many variables"));
        self.var_decls.push(decl);
        id
    }

    #[must_use]
    pub fn var(&self, id: VarDeclId) -> &VarDecl {
        &self.var_decls[id.index()]
    }

    pub fn var_mut(&mut self, id: VarDeclId) -> &mut VarDecl {
        &mut self.var_decls[id.index()]
    }

    pub fn alloc_fun(&mut self, decl: FunDecl) -> FunDeclId {
        let id = FunDeclId(self.fun_decls.len().try_into().expect("too many functions"));
        self.fun_decls.push(decl);
        id
    }

    #[must_use]
    pub fn fun(&self, id: FunDeclId) -> &FunDecl {
        &self.fun_decls[id.index()]
    }

    pub fn fun_mut(&mut self, id: FunDeclId) -> &mut FunDecl {
        &mut self.fun_decls[id.index()]
    }

    pub fn alloc_block(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.blocks.len().try_into().expect("too many blocks"));
        self.blocks.push(block);
        id
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Walks `var`'s `parent_var_decl` chain and returns the id it
    /// terminates at (the function that actually owns the variable's
    /// storage). Used to verify the §8 heap-local chain-termination
    /// property.
    #[must_use]
    pub fn heap_local_root(&self, var: VarDeclId) -> VarDeclId {
        let mut current = var;
        while let Some(parent) = self.var(current).parent_var_decl {
            current = parent;
        }
        current
    }
}
