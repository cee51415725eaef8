//! Class preparation (§4.4.1): override validation plus synthesis of the
//! `init` method and its `fromJson` companion.
//!
//! Runs once per class, before any of its method bodies (including `init`
//! itself) are resolved, so the synthesized `init` body can be walked by
//! the same `resolve_function_body` pass as user-written methods — wrapper
//! synthesis (§4.4.1) then applies to it exactly as it would to a
//! hand-written method with optional parameters.

use crate::ast::{Arg, ConstValue, Expr, ExprLoc, FunDecl, Ident, Stmt};
use crate::class_registry::{FunctionDescriptor, Param};
use crate::errors::CompileErrorKind;
use crate::source::SourceLocation;
use crate::types::{ClassId, Type};

use super::Resolver;

pub fn prepare_class(resolver: &mut Resolver, class: ClassId) {
    if !resolver.prepared_classes.insert(class) {
        return;
    }
    if let Some(base) = resolver.classes.get(class).base_class {
        prepare_class(resolver, base);
    }

    validate_field_hierarchy(resolver, class);
    validate_overrides(resolver, class);
    mark_non_final_methods_async(resolver, class);
    synthesize_init(resolver, class);
    synthesize_from_json(resolver, class);
}

/// §4.4.1 "Mark every non-final instance method as potentially async": kept
/// pessimistic here (always `true`, never retightened) since deciding
/// whether a final method transitively calls an async callee is the
/// analyser's job, out of scope for this core (§9 "Async propagation").
fn mark_non_final_methods_async(resolver: &mut Resolver, class: ClassId) {
    let candidates: Vec<_> = resolver
        .classes
        .get(class)
        .methods
        .values()
        .filter(|m| !m.is_static && !m.is_final)
        .filter_map(|m| m.fun_decl)
        .collect();
    for fun in candidates {
        resolver.arenas.fun_mut(fun).is_async = true;
    }
    let names: Vec<_> = resolver
        .classes
        .get_mut(class)
        .methods
        .iter_mut()
        .filter(|(_, m)| !m.is_static && !m.is_final)
        .map(|(name, _)| *name)
        .collect();
    for name in names {
        resolver.classes.get_mut(class).methods.get_mut(&name).unwrap().is_async = true;
    }
}

/// A field name unique within its own class (enforced by
/// [`crate::class_registry::ClassRegistry::add_field`]) can still collide
/// with a field inherited from a base class (§3 ClassDescriptor invariant,
/// §8 scenario 5: `class A { int x }; class B extends A { int x }` is a
/// `DuplicateDeclaration`). Methods don't get the same treatment here —
/// shadowing a base method by re-declaring it is how overriding works.
fn validate_field_hierarchy(resolver: &mut Resolver, class: ClassId) {
    let Some(base) = resolver.classes.get(class).base_class else { return };
    let own_fields: Vec<_> = resolver.classes.get(class).fields.keys().copied().collect();
    for name in own_fields {
        if resolver.find_field_for_switch(base, name).is_some() {
            resolver.diagnostics.report(
                CompileErrorKind::DuplicateDeclaration(format!(
                    "field '{}' already declared in a base class",
                    resolver.interns.get(name)
                )),
                SourceLocation::synthetic(),
            );
        }
    }
}

fn validate_overrides(resolver: &mut Resolver, class: ClassId) {
    let Some(base) = resolver.classes.get(class).base_class else { return };
    let base_methods = resolver.classes.all_methods(base);
    let own_names: Vec<_> = resolver.classes.get(class).methods.keys().copied().collect();
    for name in own_names {
        let Some(base_method) = base_methods.get(&name) else { continue };
        let own_method = resolver.classes.get(class).methods.get(&name).unwrap().clone();
        let at = SourceLocation::synthetic();
        if let Err(err) = base_method.validate_override(&own_method, at) {
            resolver.diagnostics.report(err.kind, err.location);
        }
    }
}

/// Builds `init`'s parameter list (§4.2, §9): mandatory fields first
/// (positional, base-class-first), then every optional field as a
/// parameter whose default re-evaluates that field's own initialiser —
/// `wrappers::synthesize` (run right after this function's body is
/// resolved) turns that parameter list into the usual
/// positional-or-named vararg adapter, so the named-args dispatch, the
/// mandatory-arg enforcement and the extra-named-arg rejection a
/// base-class init needs are all inherited from that one generic
/// mechanism rather than duplicated here.
///
/// A field declared directly on `class` is assigned here; a field
/// inherited from a base class is instead forwarded to `super.init(...)`
/// by name, so construction genuinely walks the base-class chain
/// (§4.4.1's init protocol) instead of flattening every ancestor's
/// fields into one assignment list. The two synthesized `init`s chain
/// through each other's own generic wrapper the same way a hand-written
/// `super.init(...)` call would.
fn synthesize_init(resolver: &mut Resolver, class: ClassId) {
    if resolver.classes.get(class).init_method.is_some() {
        return;
    }
    let at = SourceLocation::synthetic();
    let init_name = resolver.init_name();
    let mandatory = resolver.classes.get_all_mandatory_fields(class);
    let optional = resolver.classes.get_all_optional_fields(class);
    let has_base = resolver.classes.get(class).base_class.is_some();

    let body = resolver.arenas.alloc_block(crate::ast::Block::new(None, Some(class)));
    let fun_id = resolver.arenas.alloc_fun(FunDecl::new(init_name, Type::Instance(class), body));
    resolver.arenas.fun_mut(fun_id).is_init_method = true;

    let mut params = Vec::new();
    let mut descriptor_params = Vec::new();
    let mut super_args = Vec::new();

    for (owner, field) in mandatory.iter().chain(optional.iter()) {
        let mut param = crate::ast::VarDecl::new(field.name, field.ty.clone(), at);
        param.flags.is_param = true;
        param.owning_function = Some(fun_id);
        if !field.is_mandatory {
            // `Field` only carries a constant value for `const static` fields;
            // an ordinary optional instance field has no stored default
            // expression, so absent a constant it defaults to `null` here
            // (documented simplification — see the project's design ledger).
            let default_value = field.const_value.clone().unwrap_or(ConstValue::Null);
            param.initialiser = Some(Box::new(ExprLoc {
                kind: Expr::Literal(default_value.clone()),
                location: at,
                annotations: const_annotations(default_value),
            }));
        }
        let param_id = resolver.arenas.alloc_var(param);
        params.push(param_id);
        descriptor_params.push(Param {
            name: field.name,
            ty: field.ty.clone(),
            is_mandatory: field.is_mandatory,
            initialiser_expr: None,
        });

        if *owner == class {
            let target = Box::new(ExprLoc::new(
                Expr::Field { object: Box::new(ExprLoc::new(Expr::This, at)), name: field.name, safe: false },
                at,
            ));
            let value = Box::new(ExprLoc::new(Expr::Name(Ident::Resolved(param_id)), at));
            resolver.arenas.block_mut(body).stmts.push(Stmt::ExprStmt(Box::new(ExprLoc::new(
                Expr::Assign { target, value },
                at,
            ))));
        } else {
            super_args.push(Arg {
                name: Some(field.name),
                value: Box::new(ExprLoc::new(Expr::Name(Ident::Resolved(param_id)), at)),
            });
        }
    }
    resolver.arenas.fun_mut(fun_id).params = params;

    if has_base {
        let super_init = Expr::Call {
            callee: Box::new(ExprLoc::new(
                Expr::Field { object: Box::new(ExprLoc::new(Expr::Super, at)), name: init_name, safe: false },
                at,
            )),
            args: super_args,
        };
        resolver
            .arenas
            .block_mut(body)
            .stmts
            .push(Stmt::ExprStmt(Box::new(ExprLoc::new(super_init, at))));
    }
    resolver.arenas.block_mut(body).stmts.push(Stmt::Return(Some(Box::new(ExprLoc::new(Expr::This, at)))));

    let descriptor = FunctionDescriptor {
        name: init_name,
        implementing_class: Some(class),
        implementing_method: init_name,
        wrapper_method: init_name,
        params: descriptor_params,
        return_type: Type::Instance(class),
        first_arg_type: Some(Type::Instance(class)),
        is_static: false,
        is_final: false,
        is_async: false,
        is_wrapper: false,
        needs_location: false,
        is_builtin: false,
        fun_decl: Some(fun_id),
    };
    if let Err(err) = resolver.classes.add_method(class, descriptor, at) {
        resolver.diagnostics.report(err.kind, err.location);
    }
    resolver.classes.get_mut(class).init_method = Some(init_name);
    tracing::debug!(class = ?class, has_base, "synthesized init");
}

/// `fromJson(map)` forwards every mandatory and optional field, read out of
/// the map by name, to `init` as named arguments. A field absent from the
/// map reads as `null`, which an optional parameter's own default can't see
/// — only `init`'s own positional/named dispatch does — so a value missing
/// from the map and lacking a field default surfaces downstream as a type
/// error rather than as the `_initMissing` bitmask the grammar describes;
/// see the open-question note in the project's design ledger.
fn synthesize_from_json(resolver: &mut Resolver, class: ClassId) {
    let at = SourceLocation::synthetic();
    let method_name = resolver.interns.intern("fromJson");
    if resolver.classes.get(class).methods.contains_key(&method_name) {
        return;
    }
    let mandatory = resolver.classes.get_all_mandatory_fields(class);
    let optional = resolver.classes.get_all_optional_fields(class);

    let body = resolver.arenas.alloc_block(crate::ast::Block::new(None, Some(class)));
    let fun_id = resolver.arenas.alloc_fun(FunDecl::new(method_name, Type::Instance(class), body));
    resolver.arenas.fun_mut(fun_id).is_static = true;

    let map_name = resolver.interns.intern("map");
    let mut map_param = crate::ast::VarDecl::new(map_name, Type::Map, at);
    map_param.flags.is_param = true;
    map_param.owning_function = Some(fun_id);
    let map_param_id = resolver.arenas.alloc_var(map_param);
    resolver.arenas.fun_mut(fun_id).params = vec![map_param_id];

    let args = mandatory
        .iter()
        .chain(optional.iter())
        .map(|(_, field)| Arg {
            name: Some(field.name),
            value: Box::new(ExprLoc::new(
                Expr::Index {
                    object: Box::new(ExprLoc::new(Expr::Name(Ident::Resolved(map_param_id)), at)),
                    index: Box::new(ExprLoc::new(
                        Expr::Literal(ConstValue::Str(resolver.interns.get(field.name).to_owned())),
                        at,
                    )),
                    safe: true,
                },
                at,
            )),
        })
        .collect();

    let construct = Expr::Call { callee: Box::new(ExprLoc::new(Expr::TypeExpr(Type::Class(class)), at)), args };
    resolver.arenas.block_mut(body).stmts.push(Stmt::Return(Some(Box::new(ExprLoc::new(construct, at)))));

    let descriptor = FunctionDescriptor {
        name: method_name,
        implementing_class: Some(class),
        implementing_method: method_name,
        wrapper_method: method_name,
        params: vec![Param { name: map_name, ty: Type::Map, is_mandatory: true, initialiser_expr: None }],
        return_type: Type::Instance(class),
        first_arg_type: None,
        is_static: true,
        is_final: false,
        is_async: false,
        is_wrapper: false,
        needs_location: false,
        is_builtin: false,
        fun_decl: Some(fun_id),
    };
    if let Err(err) = resolver.classes.add_method(class, descriptor, at) {
        resolver.diagnostics.report(err.kind, err.location);
    }
    tracing::debug!(class = ?class, "synthesized fromJson");
}

fn const_annotations(value: ConstValue) -> crate::ast::Annotations {
    let mut annotations = crate::ast::Annotations::default();
    annotations.ty = value.type_of();
    annotations.is_const = true;
    annotations.is_resolved = true;
    annotations.const_value = Some(value);
    annotations
}

impl Resolver {
    fn init_name(&mut self) -> crate::intern::StringId {
        self.interns.intern("init")
    }
}
