//! AST-construction helpers for tests (and the CLI demo), standing in for
//! the out-of-scope parser. Every helper here builds already-unresolved
//! nodes — interning names and allocating arena slots through a
//! [`Resolver`] — so a test can assemble a small script or class body and
//! then drive the resolver/switch passes over it exactly as a real
//! front-end would.

use crate::ast::{
    Arg, Block, BlockId, ConstValue, ConstructorArgs, Expr, ExprLoc, FunDecl, FunDeclId, Ident, Pattern, Stmt,
    SwitchCase, SwitchExpr, VarDecl, VarDeclId,
};
use crate::class_registry::{ClassDescriptor, Field, FunctionDescriptor, Param};
use crate::intern::StringId;
use crate::resolver::Resolver;
use crate::source::SourceLocation;
use crate::types::{ClassId, Type};

/// Thin wrapper over a [`Resolver`] that adds node-construction
/// conveniences; every method here is a direct stand-in for what a parser
/// would otherwise produce.
pub struct AstBuilder<'r> {
    pub resolver: &'r mut Resolver,
    at: SourceLocation,
}

impl<'r> AstBuilder<'r> {
    #[must_use]
    pub fn new(resolver: &'r mut Resolver) -> Self {
        Self { resolver, at: SourceLocation::synthetic() }
    }

    #[must_use]
    pub fn intern(&mut self, name: &str) -> StringId {
        self.resolver.interns.intern(name)
    }

    #[must_use]
    pub fn new_block(&mut self, enclosing: Option<BlockId>, owning_class: Option<ClassId>) -> BlockId {
        self.resolver.arenas.alloc_block(Block::new(enclosing, owning_class))
    }

    pub fn push_stmt(&mut self, block: BlockId, stmt: Stmt) {
        self.resolver.arenas.block_mut(block).stmts.push(stmt);
    }

    /// Declares `name: ty = initialiser` in `block`, pushing the
    /// `VarDeclStmt` and registering the name.
    pub fn var_decl(&mut self, block: BlockId, name: &str, ty: Type, initialiser: Option<ExprLoc>) -> VarDeclId {
        let interned = self.intern(name);
        let mut decl = VarDecl::new(interned, ty, self.at);
        decl.declaring_block = Some(block);
        decl.initialiser = initialiser.map(Box::new);
        let id = self.resolver.arenas.alloc_var(decl);
        self.resolver.arenas.block_mut(block).vars.insert(interned, id);
        self.push_stmt(block, Stmt::VarDeclStmt(id));
        id
    }

    #[must_use]
    pub fn name_expr(&mut self, name: &str) -> ExprLoc {
        let interned = self.intern(name);
        ExprLoc::new(Expr::Name(Ident::Unresolved(interned)), self.at)
    }

    #[must_use]
    pub fn literal(&self, value: ConstValue) -> ExprLoc {
        ExprLoc::new(Expr::Literal(value), self.at)
    }

    #[must_use]
    pub fn binary(&self, left: ExprLoc, op: crate::types::Operator, right: ExprLoc) -> ExprLoc {
        ExprLoc::new(Expr::Binary { left: Box::new(left), op, right: Box::new(right) }, self.at)
    }

    #[must_use]
    pub fn call(&mut self, callee: ExprLoc, args: Vec<(Option<&str>, ExprLoc)>) -> ExprLoc {
        let args = args
            .into_iter()
            .map(|(name, value)| Arg { name: name.map(|n| self.intern(n)), value: Box::new(value) })
            .collect();
        ExprLoc::new(Expr::Call { callee: Box::new(callee), args }, self.at)
    }

    /// Builds a fresh, as-yet-unbound first occurrence of `name` inside a
    /// switch pattern: the resolver finalizes it into a real `BindingVar` (or
    /// rewrites it to `Identifier` if this is a repeat within the same case)
    /// the first time it walks this case's patterns (§4.5 step 2).
    pub fn binding_pattern(&mut self, name: &str, declared_type: Option<Type>) -> Pattern {
        let interned = self.intern(name);
        let var = self.resolver.arenas.alloc_var(VarDecl::new(interned, Type::Any, self.at));
        Pattern::BindingVar { var, declared_type }
    }

    #[must_use]
    pub fn switch_case(&self, patterns: Vec<Pattern>, guard: Option<ExprLoc>, result: ExprLoc) -> SwitchCase {
        SwitchCase { patterns, guard: guard.map(Box::new), result: Box::new(result), block: None }
    }

    #[must_use]
    pub fn switch_expr(&self, subject: ExprLoc, cases: Vec<SwitchCase>, default: Option<ExprLoc>) -> ExprLoc {
        let switch = SwitchExpr {
            subject: Box::new(subject),
            cases,
            default: default.map(Box::new),
            it_var: None,
            block: None,
            result_type: Type::Unknown,
        };
        ExprLoc::new(Expr::Switch(Box::new(switch)), self.at)
    }

    #[must_use]
    pub fn constructor_pattern(&self, class: ClassId, args: ConstructorArgs) -> Pattern {
        Pattern::ConstructorPattern { class, args }
    }

    /// Declares an empty function `name(params) -> return_type { body }`,
    /// where `body` has already been populated with statements.
    pub fn fun_decl(&mut self, name: &str, params: Vec<VarDeclId>, return_type: Type, body: BlockId) -> FunDeclId {
        let interned = self.intern(name);
        let mut fun = FunDecl::new(interned, return_type, body);
        fun.params = params;
        self.resolver.arenas.alloc_fun(fun)
    }

    pub fn param(&mut self, name: &str, ty: Type) -> VarDeclId {
        let interned = self.intern(name);
        let mut decl = VarDecl::new(interned, ty, self.at);
        decl.flags.is_param = true;
        self.resolver.arenas.alloc_var(decl)
    }

    /// Registers a fresh class with `name` (and optional `base`), returning
    /// its id so fields/methods can be added with `add_field`/`add_method`.
    pub fn new_class(&mut self, name: &str, base: Option<ClassId>) -> ClassId {
        let interned = self.intern(name);
        let mut descriptor = ClassDescriptor::new(interned, self.resolver.context.package);
        descriptor.base_class = base;
        self.resolver.classes.register(descriptor)
    }

    pub fn add_field(&mut self, class: ClassId, name: &str, ty: Type, is_mandatory: bool) {
        let interned = self.intern(name);
        let field = Field { name: interned, ty, is_mandatory, is_const_static: false, const_value: None };
        let builtin_names = self.resolver.builtin_method_names().to_vec();
        self.resolver
            .classes
            .add_field(class, field, &builtin_names, self.at)
            .expect("test field declarations don't clash");
    }

    pub fn add_method(&mut self, class: ClassId, name: &str, params: Vec<Param>, return_type: Type) {
        let interned = self.intern(name);
        let descriptor = FunctionDescriptor {
            name: interned,
            implementing_class: Some(class),
            implementing_method: interned,
            wrapper_method: interned,
            params,
            return_type,
            first_arg_type: Some(Type::Instance(class)),
            is_static: false,
            is_final: false,
            is_async: false,
            is_wrapper: false,
            needs_location: false,
            is_builtin: false,
            fun_decl: None,
        };
        self.resolver.classes.add_method(class, descriptor, self.at).expect("test method declarations don't clash");
    }

    #[must_use]
    pub fn param_descriptor(&mut self, name: &str, ty: Type, is_mandatory: bool) -> Param {
        let interned = self.intern(name);
        Param { name: interned, ty, is_mandatory, initialiser_expr: None }
    }
}
