mod common;

use langc_core::testing::AstBuilder;
use langc_core::{ConstValue, ConstructorArgs, Pattern, Type};

use common::new_resolver;

/// §8 scenario 2: several literal patterns sharing one case must not shadow
/// each other just because they share a covering type.
#[test]
fn run_of_distinct_int_literals_in_one_case_is_not_unreachable() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let five = b.literal(ConstValue::Int(5));
        let a = b.literal(ConstValue::Str("a".into()));
        let bee = b.literal(ConstValue::Str("b".into()));
        let patterns = (1..=5).map(|i| Pattern::Literal(ConstValue::Int(i))).collect();
        let case = b.switch_case(patterns, None, a);
        let switch = b.switch_expr(five, vec![case], Some(bee));
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());
}

/// Two literal patterns for the *same* value in two different cases are a
/// genuine unreachable/subsumed case, caught by the finer structural check.
#[test]
fn duplicate_literal_across_cases_is_subsumed() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let two = b.literal(ConstValue::Int(2));
        let one_a = b.literal(ConstValue::Int(1));
        let one_b = b.literal(ConstValue::Int(1));
        let a = b.literal(ConstValue::Str("a".into()));
        let again = b.literal(ConstValue::Str("again".into()));
        let zero = b.literal(ConstValue::Str("z".into()));
        let case1 = b.switch_case(vec![Pattern::Literal(ConstValue::Int(1))], None, a);
        let _ = one_a;
        let case2 = b.switch_case(vec![Pattern::Literal(ConstValue::Int(1))], None, again);
        let _ = one_b;
        let switch = b.switch_expr(two, vec![case1, case2], Some(zero));
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(resolver.diagnostics.has_errors());
}

/// A wildcard (`_`) case makes every later case unreachable (§8 "universal
/// cover").
#[test]
fn wildcard_case_makes_following_cases_unreachable() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Int(1));
        let wild = b.literal(ConstValue::Str("any".into()));
        let after = b.literal(ConstValue::Str("late".into()));
        let case1 = b.switch_case(vec![Pattern::Underscore], None, wild);
        let case2 = b.switch_case(vec![Pattern::Literal(ConstValue::Int(1))], None, after);
        let switch = b.switch_expr(subject, vec![case1, case2], None);
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(resolver.diagnostics.has_errors());
}

/// A wildcard case makes an explicit `default` clause unreachable too.
#[test]
fn wildcard_case_makes_default_unreachable() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Int(1));
        let wild = b.literal(ConstValue::Str("any".into()));
        let default = b.literal(ConstValue::Str("default".into()));
        let case1 = b.switch_case(vec![Pattern::Underscore], None, wild);
        let switch = b.switch_expr(subject, vec![case1], Some(default));
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(resolver.diagnostics.has_errors());
}

/// §8 scenario 3: a list pattern `[a,b,c]` binds each element name on first
/// occurrence.
#[test]
fn list_pattern_binds_each_element() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let one = b.literal(ConstValue::Int(1));
        let two = b.literal(ConstValue::Int(2));
        let three = b.literal(ConstValue::Int(3));
        let list = langc_core::ExprLoc::new(langc_core::Expr::ListLit(vec![one, two, three]), langc_core::SourceLocation::synthetic());

        let a = b.binding_pattern("a", None);
        let bb = b.binding_pattern("b", None);
        let c = b.binding_pattern("c", None);
        let a_ref = b.name_expr("a");
        let b_ref = b.name_expr("b");
        let sum_ab = b.binary(a_ref, langc_core::Operator::Add, b_ref);
        let c_ref = b.name_expr("c");
        let result = b.binary(sum_ab, langc_core::Operator::Add, c_ref);
        let zero = b.literal(ConstValue::Int(0));

        let case = b.switch_case(vec![Pattern::ListPattern(vec![a, bb, c])], None, result);
        let switch = b.switch_expr(list, vec![case], Some(zero));
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());
}

/// §9 Open Question #3: a positional constructor pattern's arg count must
/// equal the class's own mandatory-field count; optional fields can't be
/// matched positionally.
#[test]
fn positional_constructor_pattern_arity_must_match_mandatory_field_count() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let point = b.new_class("Point", None);
        b.add_field(point, "x", Type::Int, true);
        b.add_field(point, "y", Type::Int, true);
        b.add_field(point, "label", Type::String, false);

        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Int(0));
        let result = b.literal(ConstValue::Int(1));
        let default = b.literal(ConstValue::Int(0));
        let x = b.binding_pattern("x", None);
        let ctor = b.constructor_pattern(point, ConstructorArgs::Positional(vec![x]));
        let case = b.switch_case(vec![ctor], None, result);
        let switch = b.switch_expr(subject, vec![case], Some(default));
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(resolver.diagnostics.has_errors());
}

/// A positional pattern whose arity does match the mandatory-field count is
/// legal, and optional fields are simply not covered by it.
#[test]
fn positional_constructor_pattern_with_correct_arity_is_not_an_error() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let point = b.new_class("Point", None);
        b.add_field(point, "x", Type::Int, true);
        b.add_field(point, "y", Type::Int, true);
        b.add_field(point, "label", Type::String, false);

        let script = b.new_block(None, None);
        let subject = b.literal(ConstValue::Int(0));
        let result = b.literal(ConstValue::Int(1));
        let default = b.literal(ConstValue::Int(0));
        let x = b.binding_pattern("x", None);
        let y = b.binding_pattern("y", None);
        let ctor = b.constructor_pattern(point, ConstructorArgs::Positional(vec![x, y]));
        let case = b.switch_case(vec![ctor], None, result);
        let switch = b.switch_expr(subject, vec![case], Some(default));
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());
}

/// The "at most one `*`" rule (§4.5 step 2) is enforced inside a list
/// pattern.
#[test]
fn two_stars_in_one_list_pattern_is_an_error() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let subject = langc_core::ExprLoc::new(langc_core::Expr::ListLit(vec![]), langc_core::SourceLocation::synthetic());
        let result = b.literal(ConstValue::Int(0));
        let default = b.literal(ConstValue::Int(1));
        let case = b.switch_case(vec![Pattern::ListPattern(vec![Pattern::Star, Pattern::Star])], None, result);
        let switch = b.switch_expr(subject, vec![case], Some(default));
        b.var_decl(script, "label", Type::Unknown, Some(switch));
        script
    };
    resolver.resolve_script(script);
    assert!(resolver.diagnostics.has_errors());
}
