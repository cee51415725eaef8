//! The Resolver (§4.4): name binding, type inference, closure analysis, and
//! the driver that prepares classes before resolving their bodies.
//!
//! One `Resolver` is created per compilation (§5) and owns everything that
//! compilation produces — its `Interns`, `ClassRegistry`, `Arenas` and
//! `Diagnostics` — so nothing here is shared across concurrent compilations.

mod class_prep;
mod heap_locals;
mod regex;
mod wrappers;

use crate::ast::{
    Arenas, Block, BlockId, ConstValue, DecimalValue, Expr, ExprLoc, FunDecl, FunDeclId, Ident, Stmt, VarDecl,
    VarDeclId,
};
use crate::class_registry::ClassRegistry;
use crate::context::CompilationContext;
use crate::errors::{CompileError, CompileErrorKind, Diagnostics};
use crate::intern::{Interns, StringId};
use crate::source::SourceLocation;
use crate::types::{ClassId, Operator, Type};
use ahash::AHashMap;
use indexmap::IndexMap;

/// Drives name binding, type checking, and closure/class preparation over a
/// parsed AST.
pub struct Resolver {
    pub interns: Interns,
    pub classes: ClassRegistry,
    pub arenas: Arenas,
    pub diagnostics: Diagnostics,
    pub context: CompilationContext,

    globals: IndexMap<StringId, VarDeclId>,
    global_functions: IndexMap<StringId, VarDeclId>,
    imported_classes: IndexMap<StringId, ClassId>,
    imported_constants: IndexMap<StringId, VarDeclId>,
    class_field_vars: AHashMap<(ClassId, StringId), VarDeclId>,
    class_method_vars: AHashMap<(ClassId, StringId), VarDeclId>,
    builtin_method_names: Vec<StringId>,
    prepared_classes: std::collections::HashSet<ClassId>,
    /// Functions whose body has already been walked by
    /// [`Resolver::resolve_function_body`], so a closure reached both as a
    /// `def` statement and as a first-class value (`Expr::FunctionRef`)
    /// isn't resolved twice.
    resolved_functions: std::collections::HashSet<FunDeclId>,

    current_class: Option<ClassId>,
    /// Set while resolving a `VarDeclStmt`'s own initialiser, so a reference
    /// to the variable from inside it is a `SelfReferenceError` rather than
    /// an ordinary forward reference.
    resolving_var: Option<VarDeclId>,
    error_var: Option<VarDeclId>,
}

impl Resolver {
    #[must_use]
    pub fn new(context: CompilationContext) -> Self {
        let mut resolver = Self {
            interns: Interns::new(),
            classes: ClassRegistry::new(),
            arenas: Arenas::new(),
            diagnostics: Diagnostics::new(context.ide_plugin_mode),
            context,
            globals: IndexMap::new(),
            global_functions: IndexMap::new(),
            imported_classes: IndexMap::new(),
            imported_constants: IndexMap::new(),
            class_field_vars: AHashMap::new(),
            class_method_vars: AHashMap::new(),
            builtin_method_names: Vec::new(),
            prepared_classes: std::collections::HashSet::new(),
            resolved_functions: std::collections::HashSet::new(),
            current_class: None,
            resolving_var: None,
            error_var: None,
        };
        // Wrapper synthesis (§4.4.1) emits calls to these by name; they are
        // resolved like any other global function, typed `Function` since
        // their real signature is supplied by whatever runtime implements
        // them, out of scope here.
        for helper in [
            "__namedContains",
            "__positionalContains",
            "__regexGroup",
            "__positionalArg",
            "__missingArgError",
            "__extraArgsError",
            "__convertTo",
        ] {
            let name = resolver.interns.intern(helper);
            resolver.seed_global(name, Type::Function);
        }
        resolver
    }

    pub fn set_builtin_method_names(&mut self, names: Vec<StringId>) {
        self.builtin_method_names = names;
    }

    #[must_use]
    pub fn builtin_method_names(&self) -> &[StringId] {
        &self.builtin_method_names
    }

    /// Seeds a script global from the `name → value` map (§6.1); the value's
    /// type is supplied already boxed by the caller, since this crate has no
    /// runtime value representation of its own.
    pub fn seed_global(&mut self, name: StringId, ty: Type) -> VarDeclId {
        let mut decl = VarDecl::new(name, ty, SourceLocation::synthetic());
        decl.flags.is_global = true;
        let id = self.arenas.alloc_var(decl);
        self.globals.insert(name, id);
        id
    }

    pub fn register_global_function(&mut self, name: StringId, fun: FunDeclId) -> VarDeclId {
        let mut decl = VarDecl::new(name, Type::Function, SourceLocation::synthetic());
        decl.fun_decl = Some(fun);
        let id = self.arenas.alloc_var(decl);
        self.global_functions.insert(name, id);
        id
    }

    pub fn import_class(&mut self, local_name: StringId, class: ClassId) {
        self.imported_classes.insert(local_name, class);
    }

    pub fn import_constant(&mut self, name: StringId, var: VarDeclId) {
        self.imported_constants.insert(name, var);
    }

    #[must_use]
    pub(crate) fn lookup_global(&self, name: StringId) -> Option<VarDeclId> {
        self.globals.get(&name).copied()
    }

    /// Entry point for `switch::resolver`, a sibling module (not a
    /// descendant of `resolver`, unlike `class_prep`/`wrappers`/`regex`) to
    /// recurse into ordinary expression resolution for a switch's subject,
    /// guards, and case results.
    pub(crate) fn resolve_expr_for_switch(&mut self, expr: &mut ExprLoc, block: BlockId, cur_fun: Option<FunDeclId>) {
        self.resolve_expr(expr, block, cur_fun);
    }

    /// As [`Resolver::resolve_expr_for_switch`], for a case's own statement
    /// block.
    pub(crate) fn resolve_block_for_switch(&mut self, block: BlockId, cur_fun: Option<FunDeclId>) {
        self.resolve_block(block, cur_fun);
    }

    /// As [`Resolver::resolve_expr_for_switch`], exposing the base-class
    /// field walk a constructor pattern needs.
    pub(crate) fn find_field_for_switch(&self, class: ClassId, name: StringId) -> Option<crate::class_registry::Field> {
        self.find_field(class, name)
    }

    /// Consumes the resolver, applying the strict/IDE diagnostics policy.
    pub fn finish(self) -> Result<Vec<CompileError>, CompileError> {
        self.diagnostics.into_result()
    }

    // ---------------------------------------------------------------
    // Entry points (§4.4)
    // ---------------------------------------------------------------

    /// Resolves a script's top-level statements. Nested `class`/`def`
    /// declarations are dispatched to [`Resolver::resolve_class`] /
    /// function-body resolution as they're encountered.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn resolve_script(&mut self, body: BlockId) {
        self.current_class = None;
        self.process_imports(body);
        self.resolve_block(body, None);
        tracing::debug!(errors = self.diagnostics.errors().len(), "script resolved");
    }

    /// Prepares `class` (§4.4.1) and resolves every method body it owns.
    #[tracing::instrument(level = "debug", skip(self), fields(class = ?class))]
    pub fn resolve_class(&mut self, class: ClassId) {
        let at = SourceLocation::synthetic();
        if let Err(err) = self.classes.check_cycles(class, at) {
            self.diagnostics.report(err.kind, err.location);
            return;
        }
        class_prep::prepare_class(self, class);

        let method_bodies: Vec<FunDeclId> =
            self.classes.get(class).methods.values().filter_map(|m| m.fun_decl).collect();
        tracing::debug!(methods = method_bodies.len(), "class prepared, resolving method bodies");
        let previous_class = self.current_class.replace(class);
        for fun in method_bodies {
            self.resolve_function_body(fun);
        }
        self.current_class = previous_class;
    }

    fn process_imports(&mut self, body: BlockId) {
        let len = self.arenas.block(body).stmts.len();
        for i in 0..len {
            if let Stmt::Import(name) = self.arenas.block(body).stmts[i] {
                if let Some(class) = self.classes.lookup(self.context.package, name) {
                    self.imported_classes.insert(name, class);
                } else {
                    self.diagnostics.report(
                        CompileErrorKind::LookupError(format!("unknown import '{}'", self.interns.get(name))),
                        SourceLocation::synthetic(),
                    );
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Statement / block resolution
    // ---------------------------------------------------------------

    fn resolve_block(&mut self, block: BlockId, cur_fun: Option<FunDeclId>) {
        let mut i = 0;
        loop {
            let len = self.arenas.block(block).stmts.len();
            if i >= len {
                break;
            }
            self.arenas.block_mut(block).current_resolving_stmt = Some(i);
            let mut stmt = std::mem::replace(&mut self.arenas.block_mut(block).stmts[i], Stmt::Import(StringId::synthetic()));
            self.resolve_stmt(&mut stmt, block, cur_fun);
            let write_at = self.arenas.block(block).current_resolving_stmt.unwrap_or(i);
            self.arenas.block_mut(block).stmts[write_at] = stmt;
            i = write_at + 1;
        }
        self.arenas.block_mut(block).current_resolving_stmt = None;
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt, block: BlockId, cur_fun: Option<FunDeclId>) {
        match stmt {
            Stmt::VarDeclStmt(id) => self.resolve_var_decl(*id, block, cur_fun),
            Stmt::ExprStmt(expr) => self.resolve_expr(expr, block, cur_fun),
            Stmt::If { cond, then_block, else_block } => {
                self.resolve_expr(cond, block, cur_fun);
                self.resolve_block(*then_block, cur_fun);
                if let Some(eb) = else_block {
                    self.resolve_block(*eb, cur_fun);
                }
            }
            Stmt::While { cond, body } => {
                if let Some(f) = cur_fun {
                    self.arenas.fun_mut(f).while_loops += 1;
                }
                regex::check_loop_condition(self, cond);
                self.resolve_expr(cond, block, cur_fun);
                self.resolve_block(*body, cur_fun);
            }
            Stmt::Return(expr) => {
                if let Some(e) = expr.as_mut() {
                    self.resolve_expr(e, block, cur_fun);
                }
                self.check_return_type(expr.as_deref(), cur_fun);
            }
            Stmt::ClassDecl(class) => self.resolve_class(*class),
            Stmt::Import(_) => {}
            Stmt::FunDeclStmt(fun) => {
                // Bind the function's own name in the declaring block before
                // resolving its body, so a self-recursive call (including
                // one reached only through a nested closure, §8 scenario 6)
                // finds it. The name's own `VarDecl::owning_function` is left
                // `None`: a function handle is not data that needs a heap
                // cell, so referencing it from a nested closure must never
                // trigger heap-local promotion (§4.4.2 only promotes actual
                // locals). `FunDecl::owning_function` is a different field —
                // the lexical-nesting link `heap_locals::promote` walks — and
                // does need to be set to `cur_fun` here.
                let name = self.arenas.fun(*fun).name;
                if !self.arenas.block(block).vars.contains_key(&name) {
                    let mut decl = VarDecl::new(name, Type::Function, SourceLocation::synthetic());
                    decl.fun_decl = Some(*fun);
                    decl.declaring_block = Some(block);
                    let id = self.arenas.alloc_var(decl);
                    self.arenas.block_mut(block).vars.insert(name, id);
                }
                self.arenas.fun_mut(*fun).owning_function = cur_fun;
                self.resolve_function_body(*fun);
            }
        }
    }

    fn resolve_var_decl(&mut self, id: VarDeclId, block: BlockId, cur_fun: Option<FunDeclId>) {
        let mut initialiser = self.arenas.var_mut(id).initialiser.take();
        if let Some(init) = initialiser.as_mut() {
            self.resolving_var = Some(id);
            self.resolve_expr(init, block, cur_fun);
            self.resolving_var = None;
        }
        if let Some(init) = &initialiser {
            let init_ty = init.annotations.ty.clone();
            let decl = self.arenas.var_mut(id);
            if matches!(decl.ty, Type::Unknown) {
                decl.ty = init_ty.clone();
            }
            if init.annotations.is_const {
                decl.const_value = init.annotations.const_value.clone();
            }
        }
        self.arenas.var_mut(id).initialiser = initialiser;
    }

    fn check_return_type(&mut self, expr: Option<&ExprLoc>, cur_fun: Option<FunDeclId>) {
        let Some(fun) = cur_fun else { return };
        let return_ty = self.arenas.fun(fun).return_type.clone();
        let at = expr.map_or_else(SourceLocation::synthetic, |e| e.location);
        let is_null = match expr {
            None => true,
            Some(e) => matches!(e.annotations.const_value, Some(ConstValue::Null)),
        };
        if return_ty.is_primitive() && is_null {
            self.diagnostics.report(
                CompileErrorKind::TypeError(format!("cannot return null from a function returning {return_ty}")),
                at,
            );
            return;
        }
        if let Some(e) = expr {
            if !return_ty.is_assignable_from(&e.annotations.ty) && !matches!(return_ty, Type::Any) {
                self.diagnostics.report(
                    CompileErrorKind::TypeError(format!(
                        "expected return type {return_ty}, found {}",
                        e.annotations.ty
                    )),
                    at,
                );
            }
        }
    }

    /// Resolves one function's parameters (triggering same-function
    /// heap-local promotion for defaults that close over earlier
    /// parameters), then its body, then applies the return/block-expression
    /// defaulting rules of §4.4.2.
    fn resolve_function_body(&mut self, fun: FunDeclId) {
        if !self.resolved_functions.insert(fun) {
            return;
        }
        let body = self.arenas.fun(fun).body;
        let params = self.arenas.fun(fun).params.clone();

        // Params live in the body block's own symbol table (step 1 of the
        // §4.4.2 lookup order: "blocks of the current function, innermost
        // first") so references to them from the body, or from a later
        // parameter's default expression, resolve like any other local.
        for &p in &params {
            let name = self.arenas.var(p).name;
            let decl = self.arenas.var_mut(p);
            decl.declaring_block = Some(body);
            decl.owning_function = Some(fun);
            self.arenas.block_mut(body).vars.insert(name, p);
        }

        self.arenas.block_mut(body).is_resolving_params = true;
        for &p in &params {
            let mut init = self.arenas.var_mut(p).initialiser.take();
            if let Some(expr) = init.as_mut() {
                self.resolve_expr(expr, body, Some(fun));
            }
            self.arenas.var_mut(p).initialiser = init;
        }
        self.arenas.block_mut(body).is_resolving_params = false;

        self.resolve_block(body, Some(fun));
        self.finalize_return(fun);

        if self.arenas.fun(fun).wrapper.is_none() && !self.arenas.fun(fun).is_wrapper {
            let is_init = self.arenas.fun(fun).is_init_method;
            wrappers::synthesize(self, fun);
            let wrapper_id = self.arenas.fun(fun).wrapper.expect("synthesize always sets wrapper");
            if is_init {
                // This is the init wrapper (§4.4.1): the one legal entry point
                // for named-args construction, chaining to the base class's
                // own init wrapper through the `super.init(...)` call
                // synthesized into `fun`'s body.
                self.arenas.fun_mut(wrapper_id).is_init_wrapper = true;
            }
            self.resolve_function_body(wrapper_id);
        }
    }

    /// §4.4.2 "Return and block expressions": the body's last statement
    /// becomes an explicit return of its value; a body ending in a
    /// statement with no value gets a synthesized default return.
    fn finalize_return(&mut self, fun: FunDeclId) {
        let body = self.arenas.fun(fun).body;
        let return_ty = self.arenas.fun(fun).return_type.clone();
        let last_idx = self.arenas.block(body).stmts.len().checked_sub(1);
        match last_idx {
            None => {
                let default = default_value_expr(&return_ty);
                self.arenas.block_mut(body).stmts.push(Stmt::Return(default));
            }
            Some(i) => match &self.arenas.block(body).stmts[i] {
                Stmt::Return(_) => {}
                Stmt::ExprStmt(_) => {
                    let stmt = self.arenas.block_mut(body).stmts.remove(i);
                    if let Stmt::ExprStmt(expr) = stmt {
                        self.arenas.block_mut(body).stmts.push(Stmt::Return(Some(expr)));
                    }
                }
                Stmt::If { else_block: None, .. } => {
                    if let Stmt::If { cond, then_block, .. } = self.arenas.block_mut(body).stmts.remove(i) {
                        let default_block = self.arenas.alloc_block(Block::new(None, None));
                        let default = default_value_expr(&return_ty);
                        self.arenas.block_mut(default_block).stmts.push(Stmt::Return(default));
                        self.arenas.block_mut(body).stmts.push(Stmt::If {
                            cond,
                            then_block,
                            else_block: Some(default_block),
                        });
                    }
                }
                _ => {
                    let default = default_value_expr(&return_ty);
                    self.arenas.block_mut(body).stmts.push(Stmt::Return(default));
                }
            },
        }
    }

    // ---------------------------------------------------------------
    // Expression resolution
    // ---------------------------------------------------------------

    fn resolve_expr(&mut self, expr: &mut ExprLoc, block: BlockId, cur_fun: Option<FunDeclId>) {
        if expr.annotations.is_resolved {
            return;
        }
        let at = expr.location;
        match &mut expr.kind {
            Expr::Literal(value) => {
                expr.annotations.ty = value.type_of();
                expr.annotations.const_value = Some(value.clone());
                expr.annotations.is_const = true;
            }
            Expr::Name(Ident::Unresolved(name)) => {
                let name = *name;
                self.resolve_name(expr, name, block, cur_fun);
                // resolve_name already rewrote expr.kind/ty; just stamp bookkeeping.
                expr.annotations.is_resolved = true;
                expr.annotations.owning_function = cur_fun;
                expr.annotations.enclosing_block = Some(block);
                return;
            }
            Expr::Name(Ident::Resolved(id)) => {
                let id = *id;
                self.finish_resolved_name(expr, id, block, cur_fun);
            }
            Expr::This => {
                expr.annotations.ty = match self.current_class {
                    Some(class) => Type::Instance(class),
                    None => {
                        self.diagnostics
                            .report(CompileErrorKind::LookupError("'this' used outside a class".into()), at);
                        Type::Unknown
                    }
                };
            }
            Expr::Super => {
                expr.annotations.ty = match self.current_class.and_then(|c| self.classes.get(c).base_class) {
                    Some(base) => Type::Instance(base),
                    None => {
                        self.diagnostics
                            .report(CompileErrorKind::LookupError("'super' used without a base class".into()), at);
                        Type::Unknown
                    }
                };
            }
            Expr::Field { object, name, safe } => {
                let name = *name;
                let safe = *safe;
                self.resolve_expr(object, block, cur_fun);
                let object_ty = object.annotations.ty.clone();
                expr.annotations.ty = self.field_access_type(&object_ty, name, safe, at);
                expr.annotations.could_be_null = safe || matches!(expr.annotations.ty, Type::Optional(_));
            }
            Expr::Index { object, index, safe } => {
                let safe = *safe;
                self.resolve_expr(object, block, cur_fun);
                self.resolve_expr(index, block, cur_fun);
                let object_ty = object.annotations.ty.clone();
                let index_ty = index.annotations.ty.clone();
                expr.annotations.ty = self.index_access_type(&object_ty, &index_ty, safe, at);
                expr.annotations.could_be_null = safe || matches!(expr.annotations.ty, Type::Optional(_));
            }
            Expr::Binary { left, op, right } => {
                let op = *op;
                self.resolve_expr(left, block, cur_fun);
                self.resolve_expr(right, block, cur_fun);
                match Type::result(&left.annotations.ty, op, &right.annotations.ty, at) {
                    Ok(ty) => expr.annotations.ty = ty,
                    Err(err) => {
                        self.diagnostics.report(err.kind, err.location);
                        expr.annotations.ty = Type::Unknown;
                    }
                }
                if self.context.constant_folding_enabled && left.annotations.is_const && right.annotations.is_const {
                    match fold_binary(
                        op,
                        left.annotations.const_value.as_ref(),
                        right.annotations.const_value.as_ref(),
                        at,
                    ) {
                        Ok(value) => {
                            expr.annotations.is_const = true;
                            expr.annotations.const_value = Some(value);
                        }
                        Err(err) => self.diagnostics.report(err.kind, err.location),
                    }
                }
            }
            Expr::Assign { target, value } => {
                self.resolve_assign_target(target, block, cur_fun);
                self.resolve_expr(value, block, cur_fun);
                expr.annotations.ty = value.annotations.ty.clone();
                if let Expr::Name(Ident::Resolved(id)) = &target.kind {
                    if self.arenas.var(*id).flags.is_const_var {
                        self.diagnostics.report(
                            CompileErrorKind::TypeError("cannot assign to a const variable".into()),
                            at,
                        );
                    }
                }
            }
            Expr::InstanceOf { expr: inner, .. } => {
                self.resolve_expr(inner, block, cur_fun);
                expr.annotations.ty = Type::Boolean;
            }
            Expr::As { expr: inner, ty } => {
                let ty = ty.clone();
                self.resolve_expr(inner, block, cur_fun);
                if !inner.annotations.ty.is_castable_to(&ty) {
                    self.diagnostics.report(
                        CompileErrorKind::TypeError(format!("cannot cast {} to {ty}", inner.annotations.ty)),
                        at,
                    );
                }
                expr.annotations.ty = ty;
            }
            Expr::Call { callee, args } => {
                self.resolve_expr(callee, block, cur_fun);
                for arg in args.iter_mut() {
                    self.resolve_expr(&mut arg.value, block, cur_fun);
                }
                expr.annotations.ty = self.call_return_type(callee);
            }
            Expr::If { cond, then_branch, else_branch } => {
                self.resolve_expr(cond, block, cur_fun);
                self.resolve_expr(then_branch, block, cur_fun);
                expr.annotations.ty = match else_branch {
                    Some(eb) => {
                        self.resolve_expr(eb, block, cur_fun);
                        Type::common_super_type(&then_branch.annotations.ty, &eb.annotations.ty)
                    }
                    None => Type::Optional(Box::new(then_branch.annotations.ty.clone())),
                };
                expr.annotations.could_be_null = else_branch.is_none();
            }
            Expr::ListLit(items) => {
                for item in items.iter_mut() {
                    self.resolve_expr(item, block, cur_fun);
                }
                expr.annotations.ty = Type::List;
            }
            Expr::MapLit(pairs) => {
                for (k, v) in pairs.iter_mut() {
                    self.resolve_expr(k, block, cur_fun);
                    self.resolve_expr(v, block, cur_fun);
                }
                expr.annotations.ty = Type::Map;
            }
            Expr::Switch(switch) => {
                crate::switch::resolver::SwitchResolver::new(self, block, cur_fun).resolve(switch, at);
                expr.annotations.ty = switch.result_type.clone();
            }
            Expr::RegexMatch { .. } => {
                regex::resolve_regex_match(self, expr, block, cur_fun);
            }
            Expr::FunctionRef(fid) => {
                // A closure literal's body is lexically nested wherever the
                // literal itself appears, exactly like a `def` statement —
                // it just doubles as a value here instead of binding a name.
                self.arenas.fun_mut(*fid).owning_function = cur_fun;
                self.resolve_function_body(*fid);
                expr.annotations.ty = Type::Function;
            }
            Expr::TypeExpr(ty) => {
                expr.annotations.ty = ty.clone();
            }
        }
        expr.annotations.is_resolved = true;
        expr.annotations.owning_function = cur_fun;
        expr.annotations.enclosing_block = Some(block);
    }

    fn resolve_assign_target(&mut self, target: &mut ExprLoc, block: BlockId, cur_fun: Option<FunDeclId>) {
        if let Expr::Name(Ident::Unresolved(name)) = &target.kind {
            let name = *name;
            if self.try_lookup_var(name, block, cur_fun).is_none()
                && self.context.allows_auto_global_declaration(self.current_class.is_some())
                && !self.globals.contains_key(&name)
            {
                let id = self.seed_global(name, Type::Any);
                target.kind = Expr::Name(Ident::Resolved(id));
            }
        }
        self.resolve_expr(target, block, cur_fun);
    }

    fn resolve_name(&mut self, expr: &mut ExprLoc, name: StringId, block: BlockId, cur_fun: Option<FunDeclId>) {
        if let Some((var_id, owner_fun)) = self.try_lookup_var(name, block, cur_fun) {
            let target = self.apply_heap_local_if_needed(var_id, owner_fun, block, cur_fun);
            expr.kind = Expr::Name(Ident::Resolved(target));
            expr.annotations.ty = self.arenas.var(target).ty.clone();
            return;
        }
        if let Some(&class) = self.imported_classes.get(&name) {
            expr.kind = Expr::TypeExpr(Type::Class(class));
            expr.annotations.ty = Type::Class(class);
            return;
        }
        if let Some(class) = self.classes.lookup(self.context.package, name) {
            expr.kind = Expr::TypeExpr(Type::Class(class));
            expr.annotations.ty = Type::Class(class);
            return;
        }
        if let Some(&var_id) = self.imported_constants.get(&name) {
            expr.kind = Expr::Name(Ident::Resolved(var_id));
            expr.annotations.ty = self.arenas.var(var_id).ty.clone();
            return;
        }
        if let Some(&var_id) = self.global_functions.get(&name) {
            expr.kind = Expr::Name(Ident::Resolved(var_id));
            expr.annotations.ty = self.arenas.var(var_id).ty.clone();
            return;
        }
        let in_class_scope = self.current_class.is_some();
        if let Some(&var_id) = self.globals.get(&name) {
            if in_class_scope && !self.context.class_access_to_globals_allowed {
                self.diagnostics.report(
                    CompileErrorKind::LookupError(format!(
                        "global '{}' is not accessible from class scope",
                        self.interns.get(name)
                    )),
                    expr.location,
                );
                let err = self.error_sentinel();
                expr.kind = Expr::Name(Ident::Resolved(err));
                expr.annotations.ty = Type::Unknown;
                return;
            }
            expr.kind = Expr::Name(Ident::Resolved(var_id));
            expr.annotations.ty = self.arenas.var(var_id).ty.clone();
            return;
        }
        self.diagnostics.report(
            CompileErrorKind::LookupError(self.interns.get(name).to_owned()),
            expr.location,
        );
        let err = self.error_sentinel();
        expr.kind = Expr::Name(Ident::Resolved(err));
        expr.annotations.ty = Type::Unknown;
    }

    fn finish_resolved_name(&mut self, expr: &mut ExprLoc, id: VarDeclId, block: BlockId, cur_fun: Option<FunDeclId>) {
        let owner_fun = self.arenas.var(id).owning_function;
        let target = self.apply_heap_local_if_needed(id, owner_fun, block, cur_fun);
        expr.kind = Expr::Name(Ident::Resolved(target));
        expr.annotations.ty = self.arenas.var(target).ty.clone();
    }

    fn apply_heap_local_if_needed(
        &mut self,
        var_id: VarDeclId,
        owner_fun: Option<FunDeclId>,
        block: BlockId,
        cur_fun: Option<FunDeclId>,
    ) -> VarDeclId {
        if Some(var_id) == self.resolving_var {
            self.diagnostics.report(
                CompileErrorKind::SelfReferenceError(self.interns.get(self.arenas.var(var_id).name).to_owned()),
                SourceLocation::synthetic(),
            );
            return self.error_sentinel();
        }
        if self.arenas.block(block).is_resolving_params
            && cur_fun == owner_fun
            && self.arenas.var(var_id).flags.is_param
        {
            heap_locals::mark_passed_as_heap_local(self, var_id);
            return var_id;
        }
        match (owner_fun, cur_fun) {
            (Some(owner), Some(referencing)) if owner != referencing => {
                heap_locals::promote(self, var_id, owner, referencing)
            }
            _ => var_id,
        }
    }

    /// Combines symbol-lookup steps 1–3 of §4.4.2: a function's own blocks
    /// (innermost first), continuing outward through enclosing functions'
    /// blocks via the lexical `enclosing_block` chain, then current-class
    /// members (fields and methods, searched up the base-class chain).
    fn try_lookup_var(&mut self, name: StringId, block: BlockId, cur_fun: Option<FunDeclId>) -> Option<(VarDeclId, Option<FunDeclId>)> {
        let _ = cur_fun;
        let mut cursor = Some(block);
        while let Some(b) = cursor {
            if let Some(&id) = self.arenas.block(b).vars.get(&name) {
                return Some((id, self.arenas.var(id).owning_function));
            }
            cursor = self.arenas.block(b).enclosing_block;
        }
        if let Some(class) = self.current_class {
            if let Some(id) = self.class_member_var(class, name) {
                return Some((id, None));
            }
        }
        None
    }

    /// Lazily materializes a `VarDecl` standing in for a class field or
    /// method so the name-lookup machinery (and heap-local promotion) can
    /// treat `this.field` references the same way as any other variable.
    /// Cached per `(class, name)` so repeated references share one id.
    fn class_member_var(&mut self, class: ClassId, name: StringId) -> Option<VarDeclId> {
        if let Some(&id) = self.class_field_vars.get(&(class, name)) {
            return Some(id);
        }
        if let Some(&id) = self.class_method_vars.get(&(class, name)) {
            return Some(id);
        }
        if let Some(field) = self.find_field(class, name) {
            let mut decl = VarDecl::new(name, field.ty.clone(), SourceLocation::synthetic());
            decl.flags.is_field = true;
            decl.flags.is_const_var = field.is_const_static;
            decl.const_value = field.const_value.clone();
            let id = self.arenas.alloc_var(decl);
            self.class_field_vars.insert((class, name), id);
            return Some(id);
        }
        let methods = self.classes.all_methods(class);
        if let Some(method) = methods.get(&name) {
            let mut decl = VarDecl::new(name, Type::Function, SourceLocation::synthetic());
            decl.fun_decl = method.fun_decl;
            let id = self.arenas.alloc_var(decl);
            self.class_method_vars.insert((class, name), id);
            return Some(id);
        }
        None
    }

    fn error_sentinel(&mut self) -> VarDeclId {
        if let Some(id) = self.error_var {
            return id;
        }
        let mut decl = VarDecl::new(StringId::synthetic(), Type::Unknown, SourceLocation::synthetic());
        decl.name = self.interns.intern("<error>");
        let id = self.arenas.alloc_var(decl);
        self.error_var = Some(id);
        id
    }

    fn find_field(&self, class: ClassId, name: StringId) -> Option<crate::class_registry::Field> {
        let mut cur = Some(class);
        while let Some(c) = cur {
            if let Some(field) = self.classes.get(c).fields.get(&name) {
                return Some(field.clone());
            }
            cur = self.classes.get(c).base_class;
        }
        None
    }

    fn field_access_type(&mut self, object_ty: &Type, name: StringId, safe: bool, at: SourceLocation) -> Type {
        let unboxed = object_ty.unboxed();
        let ty = match &unboxed {
            Type::Instance(class) => {
                if let Some(field) = self.find_field(*class, name) {
                    field.ty
                } else if self.classes.all_methods(*class).contains_key(&name) {
                    Type::Function
                } else {
                    self.diagnostics.report(
                        CompileErrorKind::LookupError(format!("no field or method '{}'", self.interns.get(name))),
                        at,
                    );
                    Type::Unknown
                }
            }
            Type::Class(class) => {
                if let Some(field) = self.find_field(*class, name) {
                    field.ty
                } else if self.classes.all_methods(*class).contains_key(&name) {
                    Type::Function
                } else if let Some(&inner) = self.classes.get(*class).inner_classes.get(&name) {
                    Type::Class(inner)
                } else {
                    self.diagnostics.report(
                        CompileErrorKind::LookupError(format!("no static member '{}'", self.interns.get(name))),
                        at,
                    );
                    Type::Unknown
                }
            }
            Type::Array(_) => {
                if self.interns.get(name) == "length" {
                    Type::Int
                } else {
                    Type::Any
                }
            }
            _ => Type::Any,
        };
        if safe { ty.boxed() } else { ty }
    }

    fn index_access_type(&mut self, object_ty: &Type, index_ty: &Type, safe: bool, at: SourceLocation) -> Type {
        let unboxed = object_ty.unboxed();
        let ty = match &unboxed {
            Type::Array(elem) => {
                if !index_ty.is_numeric() && !matches!(index_ty, Type::Any | Type::Unknown) {
                    self.diagnostics.report(
                        CompileErrorKind::TypeError("non-numeric index into an array".into()),
                        at,
                    );
                }
                (**elem).clone()
            }
            Type::List => {
                if !index_ty.is_numeric() && !matches!(index_ty, Type::Any | Type::Unknown) {
                    self.diagnostics
                        .report(CompileErrorKind::TypeError("non-numeric index into a list".into()), at);
                }
                Type::Any
            }
            _ => Type::Any,
        };
        if safe { ty.boxed() } else { ty }
    }

    /// A call whose callee is a bare class reference (`Foo(a: 1)`) denotes
    /// construction rather than invoking a value named `Foo`; there is no
    /// separate AST node for it (§9 "no constructor-call node").
    fn call_return_type(&self, callee: &ExprLoc) -> Type {
        if let Type::Class(class) = &callee.annotations.ty {
            return Type::Instance(*class);
        }
        match &callee.kind {
            Expr::FunctionRef(fid) => self.arenas.fun(*fid).return_type.clone(),
            Expr::Name(Ident::Resolved(id)) => match self.arenas.var(*id).fun_decl {
                Some(fid) => self.arenas.fun(fid).return_type.clone(),
                None => Type::Any,
            },
            _ => Type::Any,
        }
    }
}

/// Default value used to synthesize a missing `return` (§4.4.2): a literal
/// zero-ish value for primitives, `null` for everything else.
fn default_value_expr(ty: &Type) -> Option<Box<ExprLoc>> {
    let value = match ty {
        Type::Boolean => ConstValue::Bool(false),
        Type::Byte => ConstValue::Byte(0),
        Type::Int => ConstValue::Int(0),
        Type::Long => ConstValue::Long(0),
        Type::Double => ConstValue::Double(0.0),
        _ => ConstValue::Null,
    };
    let mut expr = ExprLoc::new(Expr::Literal(value.clone()), SourceLocation::synthetic());
    expr.annotations.ty = value.type_of();
    expr.annotations.const_value = Some(value);
    expr.annotations.is_const = true;
    expr.annotations.is_resolved = true;
    Some(Box::new(expr))
}

/// Centralised constant evaluation (§9 "Constant evaluation"): the result
/// type is already known from [`Type::result`]; this picks the matching
/// numeric domain and applies the boundary behaviours of §8 (byte
/// wraparound, masked shift counts, divide-by-zero).
fn fold_binary(
    op: Operator,
    left: Option<&ConstValue>,
    right: Option<&ConstValue>,
    at: SourceLocation,
) -> Result<ConstValue, CompileError> {
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => return Err(CompileError::new(CompileErrorKind::InternalError("missing constant operand".into()), at)),
    };
    if op.is_boolean() {
        let (Some(l), Some(r)) = (as_bool(left), as_bool(right)) else {
            return Err(CompileError::new(CompileErrorKind::TypeError("non-boolean operand".into()), at));
        };
        return Ok(ConstValue::Bool(match op {
            Operator::And => l && r,
            Operator::Or => l || r,
            _ => unreachable!(),
        }));
    }
    if op.is_comparison() {
        return Ok(ConstValue::Bool(compare_consts(op, left, right)));
    }
    if let (ConstValue::Str(a), ConstValue::Str(b)) = (left, right) {
        if matches!(op, Operator::Add) {
            return Ok(ConstValue::Str(format!("{a}{b}")));
        }
    }
    fold_numeric(op, left, right, at)
}

fn as_bool(value: &ConstValue) -> Option<bool> {
    match value {
        ConstValue::Bool(b) => Some(*b),
        _ => None,
    }
}

fn compare_consts(op: Operator, left: &ConstValue, right: &ConstValue) -> bool {
    let ordering = match (to_f64(left), to_f64(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => None,
    };
    match op {
        Operator::Eq => consts_equal(left, right),
        Operator::Ne => !consts_equal(left, right),
        Operator::Lt => ordering.is_some_and(std::cmp::Ordering::is_lt),
        Operator::Le => ordering.is_some_and(std::cmp::Ordering::is_le),
        Operator::Gt => ordering.is_some_and(std::cmp::Ordering::is_gt),
        Operator::Ge => ordering.is_some_and(std::cmp::Ordering::is_ge),
        _ => unreachable!(),
    }
}

fn consts_equal(left: &ConstValue, right: &ConstValue) -> bool {
    match (left, right) {
        (ConstValue::Str(a), ConstValue::Str(b)) => a == b,
        (ConstValue::Bool(a), ConstValue::Bool(b)) => a == b,
        (ConstValue::Null, ConstValue::Null) => true,
        _ => matches!((to_f64(left), to_f64(right)), (Some(a), Some(b)) if (a - b).abs() < f64::EPSILON),
    }
}

fn to_f64(value: &ConstValue) -> Option<f64> {
    match value {
        ConstValue::Byte(b) => Some(f64::from(*b)),
        ConstValue::Int(i) => Some(f64::from(*i)),
        ConstValue::Long(l) => Some(*l as f64),
        ConstValue::Double(d) => Some(*d),
        ConstValue::Decimal(d) => Some(d.unscaled as f64 / 10f64.powi(d.scale as i32)),
        _ => None,
    }
}

fn fold_numeric(op: Operator, left: &ConstValue, right: &ConstValue, at: SourceLocation) -> Result<ConstValue, CompileError> {
    if op.is_shift() {
        let bits = crate::types::shift_mask_bits(&left.type_of());
        let mask = (1u32 << bits) - 1;
        let shift = (as_i64(right).unwrap_or(0) as u32) & mask;
        return Ok(match (left, shift) {
            (ConstValue::Byte(v), s) => ConstValue::Byte((shift_i64(i64::from(*v), op, s) as u8 & 0xFF) as u8),
            (ConstValue::Int(v), s) => ConstValue::Int(shift_i64(i64::from(*v), op, s) as i32),
            (ConstValue::Long(v), s) => ConstValue::Long(shift_i64(*v, op, s)),
            (other, _) => other.clone(),
        });
    }

    match (left, right) {
        (ConstValue::Byte(a), ConstValue::Byte(b)) => fold_integral(op, i64::from(*a), i64::from(*b), at)
            .map(|v| ConstValue::Byte((v & 0xFF) as u8)),
        (ConstValue::Long(_), _) | (_, ConstValue::Long(_)) if is_integral(left) && is_integral(right) => {
            fold_integral(op, as_i64(left).unwrap(), as_i64(right).unwrap(), at).map(ConstValue::Long)
        }
        (a, b) if is_integral(a) && is_integral(b) => {
            fold_integral(op, as_i64(a).unwrap(), as_i64(b).unwrap(), at).map(|v| ConstValue::Int(v as i32))
        }
        (ConstValue::Decimal(a), ConstValue::Decimal(b)) => fold_decimal(op, *a, *b, at).map(ConstValue::Decimal),
        (a, b) => {
            let (fa, fb) = (to_f64(a), to_f64(b));
            match (fa, fb) {
                (Some(fa), Some(fb)) => Ok(ConstValue::Double(match op {
                    Operator::Add => fa + fb,
                    Operator::Sub => fa - fb,
                    Operator::Mul => fa * fb,
                    Operator::Div => fa / fb,
                    Operator::Mod => fa % fb,
                    _ => return Err(CompileError::new(CompileErrorKind::TypeError(format!("{op} not defined")), at)),
                })),
                _ => Err(CompileError::new(CompileErrorKind::TypeError("incompatible constant operands".into()), at)),
            }
        }
    }
}

fn is_integral(v: &ConstValue) -> bool {
    matches!(v, ConstValue::Byte(_) | ConstValue::Int(_) | ConstValue::Long(_))
}

fn as_i64(v: &ConstValue) -> Option<i64> {
    match v {
        ConstValue::Byte(b) => Some(i64::from(*b)),
        ConstValue::Int(i) => Some(i64::from(*i)),
        ConstValue::Long(l) => Some(*l),
        _ => None,
    }
}

fn shift_i64(value: i64, op: Operator, shift: u32) -> i64 {
    match op {
        Operator::Shl => value.wrapping_shl(shift),
        Operator::Shr => value.wrapping_shr(shift),
        _ => value,
    }
}

/// Integer division/modulo by a literal zero is a compile-time error (§8);
/// everything else wraps per the operator's own arithmetic (byte wraparound
/// is applied by the caller, which truncates the `i64` result back to `u8`).
fn fold_integral(op: Operator, a: i64, b: i64, at: SourceLocation) -> Result<i64, CompileError> {
    match op {
        Operator::Add => Ok(a.wrapping_add(b)),
        Operator::Sub => Ok(a.wrapping_sub(b)),
        Operator::Mul => Ok(a.wrapping_mul(b)),
        Operator::Div => {
            if b == 0 {
                return Err(CompileError::new(CompileErrorKind::TypeError("division by zero".into()), at));
            }
            Ok(a.wrapping_div(b))
        }
        Operator::Mod => {
            if b == 0 {
                return Err(CompileError::new(CompileErrorKind::TypeError("division by zero".into()), at));
            }
            Ok(a.wrapping_rem(b))
        }
        Operator::BitAnd => Ok(a & b),
        Operator::BitOr => Ok(a | b),
        Operator::BitXor => Ok(a ^ b),
        _ => Err(CompileError::new(CompileErrorKind::TypeError(format!("{op} not defined for integers")), at)),
    }
}

/// Decimal division by a value that is zero after stripping trailing zeros
/// is a divide-by-zero error (§8); `DecimalValue::is_zero` already ignores
/// scale, so the comparison is just `unscaled == 0`.
fn fold_decimal(op: Operator, a: DecimalValue, b: DecimalValue, at: SourceLocation) -> Result<DecimalValue, CompileError> {
    let scale = a.scale.max(b.scale);
    let scale_to = |v: DecimalValue| v.unscaled * 10i128.pow(scale - v.scale);
    let (ua, ub) = (scale_to(a), scale_to(b));
    match op {
        Operator::Add => Ok(DecimalValue { unscaled: ua + ub, scale }),
        Operator::Sub => Ok(DecimalValue { unscaled: ua - ub, scale }),
        Operator::Mul => Ok(DecimalValue { unscaled: a.unscaled * b.unscaled, scale: a.scale + b.scale }),
        Operator::Div => {
            if b.is_zero() {
                return Err(CompileError::new(CompileErrorKind::TypeError("decimal division by zero".into()), at));
            }
            let numerator = ua * 10i128.pow(scale.max(1));
            Ok(DecimalValue { unscaled: numerator / ub, scale: scale.max(1) })
        }
        _ => Err(CompileError::new(CompileErrorKind::TypeError(format!("{op} not defined for decimal")), at)),
    }
}
