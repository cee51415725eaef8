mod common;

use langc_core::testing::AstBuilder;
use langc_core::{ConstValue, Expr, ExprLoc, Operator, SourceLocation, Stmt, Type};

use common::new_resolver;

fn regex_match(subject: ExprLoc, pattern: &str, flags: &str) -> ExprLoc {
    ExprLoc::new(
        Expr::RegexMatch { subject: Box::new(subject), pattern: pattern.into(), flags: flags.into() },
        SourceLocation::synthetic(),
    )
}

/// §4.4.3: a global-flag match is legal as the sole while-condition.
#[test]
fn global_regex_is_legal_as_sole_while_condition() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Str("abc".into()));
        let cond = regex_match(subject, "a(b)c", "g");
        let body = b.new_block(Some(script), None);
        b.push_stmt(script, Stmt::While { cond: Box::new(cond), body });
        script
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());
}

/// A global match anywhere other than a loop condition is always rejected.
#[test]
fn global_regex_outside_loop_condition_is_a_modifier_error() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Str("abc".into()));
        let matched = regex_match(subject, "a(b)c", "g");
        b.var_decl(script, "m", Type::Unknown, Some(matched));
        script
    };
    resolver.resolve_script(script);
    assert!(resolver.diagnostics.has_errors());
}

/// Two global matches combined in one while-condition are ambiguous about
/// which one the loop advances, so neither is vetted.
#[test]
fn two_global_regex_matches_in_one_condition_is_a_modifier_error() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let s1 = b.literal(ConstValue::Str("abc".into()));
        let s2 = b.literal(ConstValue::Str("def".into()));
        let m1 = regex_match(s1, "a", "g");
        let m2 = regex_match(s2, "d", "g");
        let cond = b.binary(m1, Operator::And, m2);
        let body = b.new_block(Some(script), None);
        b.push_stmt(script, Stmt::While { cond: Box::new(cond), body });
        script
    };
    resolver.resolve_script(script);
    assert!(resolver.diagnostics.has_errors());
}

/// A non-global match combined with another condition in a while-loop is
/// unaffected by the "at most one" rule, since neither is global.
#[test]
fn non_global_regex_matches_are_unrestricted_outside_or_inside_conditions() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let s1 = b.literal(ConstValue::Str("abc".into()));
        let s2 = b.literal(ConstValue::Str("def".into()));
        let m1 = regex_match(s1, "a", "");
        let m2 = regex_match(s2, "d", "");
        let cond = b.binary(m1, Operator::And, m2);
        let body = b.new_block(Some(script), None);
        b.push_stmt(script, Stmt::While { cond: Box::new(cond), body });
        script
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());
}

/// Each capture group gets its own hoisted `$n` local, declared in the
/// enclosing block before the statement that performs the match.
#[test]
fn capture_groups_hoist_numbered_locals_into_the_enclosing_block() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Str("abc".into()));
        let matched = regex_match(subject, "a(b)(c)", "");
        b.var_decl(script, "m", Type::Unknown, Some(matched));
        script
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());

    let one = resolver.interns.intern("$1");
    let two = resolver.interns.intern("$2");
    assert!(resolver.arenas.block(script).vars.contains_key(&one));
    assert!(resolver.arenas.block(script).vars.contains_key(&two));
}

/// Non-capturing groups (`(?...)`) don't hoist anything.
#[test]
fn non_capturing_group_hoists_nothing() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Str("abc".into()));
        let matched = regex_match(subject, "a(?:b)c", "");
        b.var_decl(script, "m", Type::Unknown, Some(matched));
        script
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());

    let one = resolver.interns.intern("$1");
    assert!(!resolver.arenas.block(script).vars.contains_key(&one));
}
