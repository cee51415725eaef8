//! Pattern resolution, reachability and subsumption analysis for `switch`
//! expressions (§4.5). Invoked once per unresolved `Expr::Switch` node from
//! the main expression dispatcher.

use crate::ast::{Block, BlockId, ConstValue, ConstructorArgs, Expr, ExprLoc, FunDeclId, Pattern, SwitchExpr, VarDecl};
use crate::errors::CompileErrorKind;
use crate::intern::StringId;
use crate::resolver::Resolver;
use crate::source::SourceLocation;
use crate::types::Type;
use ahash::AHashMap;

pub struct SwitchResolver<'r> {
    resolver: &'r mut Resolver,
    block: BlockId,
    cur_fun: Option<FunDeclId>,
}

impl<'r> SwitchResolver<'r> {
    pub fn new(resolver: &'r mut Resolver, block: BlockId, cur_fun: Option<FunDeclId>) -> Self {
        Self { resolver, block, cur_fun }
    }

    pub fn resolve(&mut self, switch: &mut SwitchExpr, at: SourceLocation) {
        self.resolver.resolve_expr_for_switch(&mut switch.subject, self.block, self.cur_fun);
        let subject_ty = switch.subject.annotations.ty.unboxed();

        let switch_block = self.resolver.arenas.alloc_block(Block::new(Some(self.block), None));
        let it_name = self.resolver.interns.intern(&format!("$it@{}", at.offset));
        let mut it_decl = VarDecl::new(it_name, subject_ty.clone(), at);
        it_decl.declaring_block = Some(switch_block);
        let it_var = self.resolver.arenas.alloc_var(it_decl);
        self.resolver.arenas.block_mut(switch_block).vars.insert(it_name, it_var);
        switch.it_var = Some(it_var);
        switch.block = Some(switch_block);

        // Covering types of patterns broad enough to make every later case
        // unreachable outright (Underscore/Star/TypeTest/unconstrained
        // BindingVar — the glossary's "universal cover"), in source order;
        // used by the coarse reachability check (step 5). A literal, list,
        // map, constructor, or regex pattern never seeds this list: two
        // `Literal(Int)` patterns share a covering type but are not
        // mutually unreachable (§8 scenario 2's `1,2,3,4,5` run), so
        // same-typed-but-distinct-value coverage is left entirely to the
        // finer structural subsumption check in step 6 below.
        let mut universal_covers: Vec<Type> = Vec::new();
        let mut prior_guard_free: Vec<Pattern> = Vec::new();

        for case in switch.cases.iter_mut() {
            let has_guard = case.guard.is_some();
            let mut seen_names: AHashMap<StringId, crate::ast::VarDeclId> = AHashMap::new();
            for pattern in case.patterns.iter_mut() {
                bind_pattern(self.resolver, pattern, switch_block, &subject_ty, &mut seen_names);
            }

            for pattern in &case.patterns {
                if !is_compatible(self.resolver, pattern, &subject_ty) {
                    self.resolver.diagnostics.report(
                        CompileErrorKind::MatchError(format!(
                            "pattern is not compatible with subject type {subject_ty}"
                        )),
                        case.result.location,
                    );
                }

                let covering = covering_type(pattern, self.resolver);
                let reachability_blocked = universal_covers.iter().any(|c| c.is_assignable_from(&covering));
                if reachability_blocked {
                    self.resolver.diagnostics.report(
                        CompileErrorKind::MatchError("unreachable case".into()),
                        case.result.location,
                    );
                } else if !has_guard && prior_guard_free.iter().any(|q| covers(q, pattern, self.resolver)) {
                    self.resolver.diagnostics.report(
                        CompileErrorKind::MatchError("case is subsumed by an earlier pattern".into()),
                        case.result.location,
                    );
                }

                if is_universal_cover_pattern(pattern) {
                    universal_covers.push(covering);
                }
                if !has_guard {
                    prior_guard_free.push(pattern.clone());
                }
            }

            if let Some(body) = case.block {
                self.resolver.resolve_block_for_switch(body, self.cur_fun);
            }
            if let Some(guard) = case.guard.as_mut() {
                self.resolver.resolve_expr_for_switch(guard, switch_block, self.cur_fun);
            }
            self.resolver.resolve_expr_for_switch(&mut case.result, switch_block, self.cur_fun);
        }

        if let Some(default) = switch.default.as_ref() {
            let universally_covered = universal_covers.iter().any(|c| c.is_assignable_from(&subject_ty));
            if universally_covered {
                self.resolver.diagnostics.report(
                    CompileErrorKind::MatchError("default is unreachable after a universal cover".into()),
                    default.location,
                );
            }
        }

        match switch.default.as_mut() {
            Some(default) => self.resolver.resolve_expr_for_switch(default, switch_block, self.cur_fun),
            None => {
                let mut null_default = ExprLoc::new(Expr::Literal(ConstValue::Null), at);
                null_default.annotations.ty = Type::Any;
                null_default.annotations.is_const = true;
                null_default.annotations.const_value = Some(ConstValue::Null);
                null_default.annotations.is_resolved = true;
                switch.default = Some(Box::new(null_default));
            }
        }

        let mut result_ty = switch
            .cases
            .iter()
            .fold(Type::Unknown, |acc, case| Type::common_super_type(&acc, &case.result.annotations.ty));
        if let Some(default) = &switch.default {
            result_ty = Type::common_super_type(&result_ty, &default.annotations.ty);
        }
        switch.result_type = result_ty;
    }
}

/// Converts the first occurrence of each bound name within one case into a
/// finalized `BindingVar` (registered in the switch's block), rewriting
/// every later occurrence of the same name into `Identifier` in place (§4.5
/// step 2). Recurses into list/map/constructor sub-patterns, checking the
/// "at most one `*`" rule at every list/map nesting level.
fn bind_pattern(
    resolver: &mut Resolver,
    pattern: &mut Pattern,
    block: BlockId,
    subject_ty: &Type,
    seen: &mut AHashMap<StringId, crate::ast::VarDeclId>,
) {
    match pattern {
        Pattern::BindingVar { var, declared_type } => {
            let name = resolver.arenas.var(*var).name;
            if let Some(&existing) = seen.get(&name) {
                *pattern = Pattern::Identifier(existing);
            } else {
                let ty = declared_type.clone().unwrap_or_else(|| subject_ty.clone());
                let decl = resolver.arenas.var_mut(*var);
                decl.ty = ty;
                decl.flags.is_binding_var = true;
                decl.declaring_block = Some(block);
                resolver.arenas.block_mut(block).vars.insert(name, *var);
                seen.insert(name, *var);
            }
        }
        Pattern::ListPattern(items) => {
            check_single_star(resolver, items.iter().map(|p| matches!(p, Pattern::Star)));
            let elem_ty = subject_ty.get_array_elem_type().cloned().unwrap_or(Type::Any);
            for item in items.iter_mut() {
                bind_pattern(resolver, item, block, &elem_ty, seen);
            }
        }
        Pattern::MapPattern(entries) => {
            check_single_star(resolver, entries.iter().map(|(_, p)| matches!(p, Pattern::Star)));
            for (_, value) in entries.iter_mut() {
                bind_pattern(resolver, value, block, &Type::Any, seen);
            }
        }
        Pattern::ConstructorPattern { class, args } => {
            let class = *class;
            match args {
                ConstructorArgs::Positional(items) => {
                    let mandatory = resolver.classes.get_all_mandatory_fields(class).len();
                    if items.len() != mandatory {
                        resolver.diagnostics.report(
                            CompileErrorKind::ArgError(format!(
                                "constructor pattern has {} positional argument(s), expected {mandatory} (optional fields cannot be matched positionally)",
                                items.len()
                            )),
                            SourceLocation::synthetic(),
                        );
                    }
                    for item in items.iter_mut() {
                        bind_pattern(resolver, item, block, &Type::Any, seen);
                    }
                }
                ConstructorArgs::Named(items) => {
                    for (field_name, item) in items.iter_mut() {
                        let field_ty =
                            resolver.find_field_for_switch(class, *field_name).map_or(Type::Any, |f| f.ty);
                        bind_pattern(resolver, item, block, &field_ty, seen);
                    }
                }
            }
        }
        Pattern::Literal(_)
        | Pattern::ExprString
        | Pattern::TypeTest(_)
        | Pattern::Underscore
        | Pattern::Star
        | Pattern::Identifier(_)
        | Pattern::RegexMatch(_) => {}
    }
}

fn check_single_star(resolver: &mut Resolver, is_star: impl Iterator<Item = bool>) {
    if is_star.filter(|&b| b).count() > 1 {
        resolver.diagnostics.report(
            CompileErrorKind::MatchError("'*' may appear at most once in a list or map pattern".into()),
            SourceLocation::synthetic(),
        );
    }
}

/// The type a pattern covers, used by both the reachability check (§4.5
/// step 5) and the compatibility check (step 4).
fn covering_type(pattern: &Pattern, resolver: &Resolver) -> Type {
    match pattern {
        Pattern::Literal(v) => v.type_of(),
        Pattern::ExprString | Pattern::RegexMatch(_) => Type::String,
        Pattern::TypeTest(t) => t.clone(),
        Pattern::Underscore | Pattern::Star => Type::Any,
        Pattern::BindingVar { declared_type: Some(t), .. } => t.clone(),
        Pattern::BindingVar { declared_type: None, .. } => Type::Any,
        Pattern::Identifier(var) => resolver.arenas.var(*var).ty.clone(),
        Pattern::ListPattern(_) => Type::List,
        Pattern::MapPattern(_) => Type::Map,
        Pattern::ConstructorPattern { class, .. } => Type::Instance(*class),
    }
}

/// Whether a pattern's covering type is broad enough to seed the coarse
/// reachability check — i.e. it matches every value of that type, not just
/// one value among others of the same type. `Underscore`/`Star` cover `Any`
/// outright; `TypeTest`/`BindingVar` cover their whole declared (or
/// inferred) type. A `Literal`, `ExprString`, `RegexMatch`, `Identifier`,
/// `ListPattern`, `MapPattern`, or `ConstructorPattern` only ever matches a
/// subset of its covering type's values, so it never counts here — two
/// `Literal(Int)` patterns for different integers must not shadow each
/// other (§8 scenario 2).
fn is_universal_cover_pattern(pattern: &Pattern) -> bool {
    matches!(pattern, Pattern::Underscore | Pattern::Star | Pattern::TypeTest(_) | Pattern::BindingVar { .. })
}

/// §4.5 step 4: can `pattern` ever match a value of `subject_ty`? Numeric
/// compatibility is symmetric; an `Int` literal pattern against a `Byte`
/// subject is allowed only for values representable in a byte (`0..=255`).
fn is_compatible(resolver: &Resolver, pattern: &Pattern, subject_ty: &Type) -> bool {
    match pattern {
        Pattern::Underscore | Pattern::Star => true,
        Pattern::BindingVar { declared_type: None, .. } => true,
        Pattern::BindingVar { declared_type: Some(t), .. } | Pattern::TypeTest(t) => type_compatible(t, subject_ty),
        Pattern::Identifier(var) => type_compatible(&resolver.arenas.var(*var).ty, subject_ty),
        Pattern::Literal(ConstValue::Int(i)) if matches!(subject_ty.unboxed(), Type::Byte) => (0..=255).contains(i),
        Pattern::Literal(v) => type_compatible(&v.type_of(), subject_ty),
        Pattern::ExprString | Pattern::RegexMatch(_) => type_compatible(&Type::String, subject_ty),
        Pattern::ListPattern(_) => matches!(subject_ty.unboxed(), Type::List | Type::Array(_) | Type::Any),
        Pattern::MapPattern(_) => matches!(subject_ty.unboxed(), Type::Map | Type::Any),
        Pattern::ConstructorPattern { class, .. } => match subject_ty.unboxed() {
            Type::Instance(subject_class) => {
                resolver.classes.is_subclass_of(subject_class, *class)
                    || resolver.classes.is_subclass_of(*class, subject_class)
            }
            Type::Any => true,
            _ => false,
        },
    }
}

fn type_compatible(pattern_ty: &Type, subject_ty: &Type) -> bool {
    let (pt, st) = (pattern_ty.unboxed(), subject_ty.unboxed());
    if matches!(pt, Type::Any) || matches!(st, Type::Any) {
        return true;
    }
    if pt.is_numeric() && st.is_numeric() {
        return true;
    }
    pt.is_assignable_from(&st) || st.is_assignable_from(&pt)
}

/// §4.5 step 6: does `q` (an earlier, guard-free pattern) structurally
/// subsume `p`, making `p` unreachable? Recurses into list/map/constructor
/// sub-patterns; a `*` on `q`'s side tolerates a longer/looser match on `p`.
fn covers(q: &Pattern, p: &Pattern, resolver: &Resolver) -> bool {
    match (q, p) {
        (Pattern::Underscore | Pattern::Star, _) => true,
        (Pattern::BindingVar { declared_type: None, .. }, _) => true,
        (Pattern::BindingVar { declared_type: Some(t), .. }, _) | (Pattern::TypeTest(t), _) => {
            t.is_assignable_from(&covering_type(p, resolver))
        }
        (Pattern::Literal(a), Pattern::Literal(b)) => const_eq(a, b),
        (Pattern::ExprString, Pattern::ExprString) => true,
        (Pattern::Identifier(qv), Pattern::Identifier(pv)) => qv == pv,
        (Pattern::RegexMatch(a), Pattern::RegexMatch(b)) => a == b,
        (Pattern::ListPattern(qs), Pattern::ListPattern(ps)) => covers_sequence(qs, ps, resolver),
        (Pattern::MapPattern(qs), Pattern::MapPattern(ps)) => covers_map(qs, ps, resolver),
        (Pattern::ConstructorPattern { class: qc, args: qa }, Pattern::ConstructorPattern { class: pc, args: pa }) => {
            qc == pc && covers_args(qa, pa, resolver)
        }
        _ => false,
    }
}

fn covers_sequence(qs: &[Pattern], ps: &[Pattern], resolver: &Resolver) -> bool {
    match qs.iter().position(|p| matches!(p, Pattern::Star)) {
        None => qs.len() == ps.len() && qs.iter().zip(ps).all(|(q, p)| covers(q, p, resolver)),
        Some(star_idx) => {
            let prefix = &qs[..star_idx];
            let suffix = &qs[star_idx + 1..];
            if ps.len() < prefix.len() + suffix.len() {
                return false;
            }
            let prefix_ok = prefix.iter().zip(&ps[..prefix.len()]).all(|(q, p)| covers(q, p, resolver));
            let suffix_ok =
                suffix.iter().zip(&ps[ps.len() - suffix.len()..]).all(|(q, p)| covers(q, p, resolver));
            prefix_ok && suffix_ok
        }
    }
}

fn covers_map(qs: &[(String, Pattern)], ps: &[(String, Pattern)], resolver: &Resolver) -> bool {
    let has_star = qs.iter().any(|(_, p)| matches!(p, Pattern::Star));
    let named_qs: Vec<_> = qs.iter().filter(|(_, p)| !matches!(p, Pattern::Star)).collect();
    if !has_star && named_qs.len() != ps.len() {
        return false;
    }
    named_qs
        .iter()
        .all(|(k, qp)| ps.iter().find(|(pk, _)| pk == k).is_some_and(|(_, pp)| covers(qp, pp, resolver)))
}

fn covers_args(q: &ConstructorArgs, p: &ConstructorArgs, resolver: &Resolver) -> bool {
    match (q, p) {
        (ConstructorArgs::Positional(qs), ConstructorArgs::Positional(ps)) => {
            qs.len() == ps.len() && qs.iter().zip(ps).all(|(a, b)| covers(a, b, resolver))
        }
        (ConstructorArgs::Named(qs), ConstructorArgs::Named(ps)) => {
            qs.len() == ps.len()
                && qs
                    .iter()
                    .all(|(k, qp)| ps.iter().find(|(pk, _)| pk == k).is_some_and(|(_, pp)| covers(qp, pp, resolver)))
        }
        _ => false,
    }
}

fn const_eq(a: &ConstValue, b: &ConstValue) -> bool {
    if let (Some(x), Some(y)) = (numeric_value(a), numeric_value(b)) {
        return x == y;
    }
    match (a, b) {
        (ConstValue::Null, ConstValue::Null) => true,
        (ConstValue::Bool(x), ConstValue::Bool(y)) => x == y,
        (ConstValue::Str(x), ConstValue::Str(y)) => x == y,
        _ => false,
    }
}

fn numeric_value(v: &ConstValue) -> Option<f64> {
    match v {
        ConstValue::Byte(b) => Some(f64::from(*b)),
        ConstValue::Int(i) => Some(f64::from(*i)),
        ConstValue::Long(l) => Some(*l as f64),
        ConstValue::Double(d) => Some(*d),
        ConstValue::Decimal(d) => Some(d.unscaled as f64 / 10f64.powi(d.scale as i32)),
        _ => None,
    }
}
