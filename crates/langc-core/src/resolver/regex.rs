//! Regex capture-array hoisting and the global-modifier-in-loop-condition
//! check (§4.4.3).
//!
//! A regex literal with capture groups implicitly binds one local per
//! group, scoped to the statement it appears in — those locals have to
//! exist as ordinary `VarDecl`s (so later references resolve and
//! heap-local-promote like any other variable) before the statement that
//! declares them finishes resolving, which is exactly what
//! `Block::insert_before_current` is for.

use crate::ast::{Arg, BlockId, ConstValue, Expr, ExprLoc, FunDeclId, Ident, Stmt, VarDecl};
use crate::errors::CompileErrorKind;
use crate::source::SourceLocation;
use crate::types::Type;

use super::Resolver;

/// A `while (match =~ /.../g)` condition is the one place a global-flag
/// match is legal; it advances to the next hit on every re-evaluation of the
/// condition (§8 boundary behaviour), and may appear at most once there.
/// Walks `cond`'s whole expression tree (not just its top node, since a
/// condition may combine a regex match with other operators, e.g.
/// `m =~ /x/g && flag`) and marks the single legal match so the generic
/// `resolve_regex_match` check below doesn't also reject it. Two or more
/// global matches in one condition are ambiguous about which one the loop
/// actually advances, so none are vetted and a `ModifierError` is reported
/// directly.
pub fn check_loop_condition(resolver: &mut Resolver, cond: &mut ExprLoc) {
    match count_global_matches(cond) {
        0 => {}
        1 => mark_vetted(cond),
        _ => resolver.diagnostics.report(
            CompileErrorKind::ModifierError("global regex match may appear at most once in a loop condition".into()),
            cond.location,
        ),
    }
}

fn count_global_matches(expr: &ExprLoc) -> usize {
    let here = matches!(&expr.kind, Expr::RegexMatch { flags, .. } if flags.contains('g'));
    usize::from(here) + child_exprs(expr).into_iter().map(count_global_matches).sum::<usize>()
}

fn mark_vetted(expr: &mut ExprLoc) {
    if matches!(&expr.kind, Expr::RegexMatch { flags, .. } if flags.contains('g')) {
        expr.annotations.is_vetted_loop_regex = true;
    }
    for child in child_exprs_mut(expr) {
        mark_vetted(child);
    }
}

fn child_exprs(expr: &ExprLoc) -> Vec<&ExprLoc> {
    match &expr.kind {
        Expr::Field { object, .. } | Expr::InstanceOf { expr: object, .. } | Expr::As { expr: object, .. } => {
            vec![object]
        }
        Expr::Index { object, index, .. } => vec![object, index],
        Expr::Binary { left, right, .. } => vec![left, right],
        Expr::Assign { target, value } => vec![target, value],
        Expr::Call { callee, args } => {
            std::iter::once(callee.as_ref()).chain(args.iter().map(|a| a.value.as_ref())).collect()
        }
        Expr::If { cond, then_branch, else_branch } => {
            let mut v = vec![cond.as_ref(), then_branch.as_ref()];
            v.extend(else_branch.as_deref());
            v
        }
        Expr::ListLit(items) => items.iter().collect(),
        Expr::MapLit(entries) => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
        Expr::RegexMatch { subject, .. } => vec![subject],
        Expr::Literal(_)
        | Expr::Name(_)
        | Expr::This
        | Expr::Super
        | Expr::Switch(_)
        | Expr::FunctionRef(_)
        | Expr::TypeExpr(_) => vec![],
    }
}

fn child_exprs_mut(expr: &mut ExprLoc) -> Vec<&mut ExprLoc> {
    match &mut expr.kind {
        Expr::Field { object, .. } | Expr::InstanceOf { expr: object, .. } | Expr::As { expr: object, .. } => {
            vec![object]
        }
        Expr::Index { object, index, .. } => vec![object, index],
        Expr::Binary { left, right, .. } => vec![left, right],
        Expr::Assign { target, value } => vec![target, value],
        Expr::Call { callee, args } => {
            std::iter::once(callee.as_mut()).chain(args.iter_mut().map(|a| a.value.as_mut())).collect()
        }
        Expr::If { cond, then_branch, else_branch } => {
            let mut v = vec![cond.as_mut(), then_branch.as_mut()];
            v.extend(else_branch.as_deref_mut());
            v
        }
        Expr::ListLit(items) => items.iter_mut().collect(),
        Expr::MapLit(entries) => entries.iter_mut().flat_map(|(k, v)| [k, v]).collect(),
        Expr::RegexMatch { subject, .. } => vec![subject],
        Expr::Literal(_)
        | Expr::Name(_)
        | Expr::This
        | Expr::Super
        | Expr::Switch(_)
        | Expr::FunctionRef(_)
        | Expr::TypeExpr(_) => vec![],
    }
}

/// A global-flag match anywhere other than a vetted loop condition (§4.4.3).
pub fn resolve_regex_match(resolver: &mut Resolver, expr: &mut ExprLoc, block: BlockId, cur_fun: Option<FunDeclId>) {
    let at = expr.location;
    if let Expr::RegexMatch { flags, .. } = &expr.kind {
        if flags.contains('g') && !expr.annotations.is_vetted_loop_regex {
            resolver.diagnostics.report(
                CompileErrorKind::ModifierError(
                    "global regex match is only allowed directly in a while-loop condition".into(),
                ),
                at,
            );
        }
    }
    let group_count = match &mut expr.kind {
        Expr::RegexMatch { subject, pattern, .. } => {
            resolver.resolve_expr(subject, block, cur_fun);
            count_capture_groups(pattern)
        }
        _ => unreachable!("resolve_regex_match called on a non-RegexMatch node"),
    };
    expr.annotations.ty = Type::Matcher;
    expr.annotations.is_resolved = true;
    if group_count == 0 {
        return;
    }

    let regex_group = resolver.interns.intern("__regexGroup");
    let regex_group_var = resolver.lookup_global(regex_group).expect("__regexGroup seeded in Resolver::new");

    // Give the match result itself a name, with the match itself run as
    // that declaration's initialiser, so the hoisted declaration actually
    // performs the match and every group extraction below (and the
    // statement the match appeared in) reads back out of an already-
    // populated matcher (§4.4.3). The original expression site becomes a
    // plain read of that name.
    let matcher_name = resolver.interns.intern(&format!("$match@{}", at.offset));
    let mut matcher_decl = VarDecl::new(matcher_name, Type::Matcher, at);
    matcher_decl.declaring_block = Some(block);
    let original = std::mem::replace(&mut expr.kind, Expr::Literal(ConstValue::Null));
    let mut value = ExprLoc::new(original, at);
    value.annotations.ty = Type::Matcher;
    value.annotations.is_resolved = true;
    matcher_decl.initialiser = Some(Box::new(value));
    let matcher_id = resolver.arenas.alloc_var(matcher_decl);
    resolver.arenas.block_mut(block).vars.insert(matcher_name, matcher_id);
    resolver.arenas.block_mut(block).insert_before_current(Stmt::VarDeclStmt(matcher_id));

    expr.kind = Expr::Name(Ident::Resolved(matcher_id));

    for group in 1..=group_count {
        let name = resolver.interns.intern(&format!("${group}"));
        let mut decl = VarDecl::new(name, Type::Optional(Box::new(Type::String)), at);
        decl.declaring_block = Some(block);
        let group_call = Expr::Call {
            callee: Box::new(ExprLoc::new(Expr::Name(Ident::Resolved(regex_group_var)), at)),
            args: vec![
                Arg { name: None, value: Box::new(ExprLoc::new(Expr::Name(Ident::Resolved(matcher_id)), at)) },
                Arg { name: None, value: Box::new(ExprLoc::new(Expr::Literal(ConstValue::Int(group as i32)), at)) },
            ],
        };
        decl.initialiser = Some(Box::new(ExprLoc::new(group_call, at)));
        let id = resolver.arenas.alloc_var(decl);
        resolver.arenas.block_mut(block).vars.insert(name, id);
        resolver.arenas.block_mut(block).insert_before_current(Stmt::VarDeclStmt(id));
    }
}

/// Counts capturing groups: every `(` not immediately followed by `?`
/// (non-capturing/lookaround groups all start `(?`), ignoring escaped
/// parentheses.
fn count_capture_groups(pattern: &str) -> usize {
    let bytes = pattern.as_bytes();
    let mut count = 0;
    let mut i = 0;
    let mut escaped = false;
    while i < bytes.len() {
        let c = bytes[i];
        if escaped {
            escaped = false;
        } else if c == b'\\' {
            escaped = true;
        } else if c == b'(' && bytes.get(i + 1) != Some(&b'?') {
            count += 1;
        }
        i += 1;
    }
    count
}
