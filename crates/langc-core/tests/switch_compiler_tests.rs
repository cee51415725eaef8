mod common;

use langc_core::testing::AstBuilder;
use langc_core::{ConstValue, Expr, Pattern, Resolver, SwitchCompiler, SwitchExpr, Type};

use common::{new_resolver, RecordingEmitter};

/// Resolves `script`, then pulls the [`SwitchExpr`] out of the named
/// variable's initialiser the way the CLI demo does.
fn extract_switch(resolver: &mut Resolver, script: langc_core::BlockId, var_name: &str) -> SwitchExpr {
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors(), "{:?}", resolver.diagnostics.errors());
    let name = resolver.interns.intern(var_name);
    let var_id = resolver.arenas.block(script).vars[&name];
    match resolver.arenas.var(var_id).initialiser.as_ref().map(|init| &init.kind) {
        Some(Expr::Switch(switch)) => (**switch).clone(),
        _ => panic!("`{var_name}`'s initialiser is not a resolved switch expression"),
    }
}

/// A contiguous run of more than two integer literals lowers to a dense
/// `table_switch` (§4.6.1's "(max-min+1) <= 5 * run length" threshold).
#[test]
fn contiguous_int_literals_lower_to_table_switch() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let two = b.literal(ConstValue::Int(2));
        b.var_decl(script, "code", Type::Int, Some(two));
        let subject = b.name_expr("code");
        let labels: Vec<_> = (1..=4).map(|i| b.literal(ConstValue::Str(format!("l{i}")))).collect();
        let other = b.literal(ConstValue::Str("other".into()));
        let mut labels = labels.into_iter();
        let cases = (1..=4)
            .map(|i| b.switch_case(vec![Pattern::Literal(ConstValue::Int(i))], None, labels.next().unwrap()))
            .collect();
        let switch_expr = b.switch_expr(subject, cases, Some(other));
        b.var_decl(script, "label", Type::Unknown, Some(switch_expr));
        script
    };
    let switch = extract_switch(&mut resolver, script, "label");

    let mut emitter = RecordingEmitter::new();
    let mut compiler = SwitchCompiler::new(&mut emitter, &resolver.arenas, &mut resolver.interns);
    compiler.compile(&switch, switch.subject.location).unwrap();

    assert!(emitter.contains("table_switch(min=1, max=4"));
    assert_eq!(emitter.count("lookup_switch"), 0);
}

/// A sparse run of integer literals (gaps far wider than the run length)
/// lowers to `lookup_switch` instead of a dense table.
#[test]
fn sparse_int_literals_lower_to_lookup_switch() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let two = b.literal(ConstValue::Int(2));
        b.var_decl(script, "code", Type::Int, Some(two));
        let subject = b.name_expr("code");
        let sparse_keys = [1, 1000, 2_000_000];
        let mut results = sparse_keys.iter().map(|k| b.literal(ConstValue::Str(format!("v{k}"))));
        let other = b.literal(ConstValue::Str("other".into()));
        let cases = sparse_keys
            .iter()
            .map(|&k| b.switch_case(vec![Pattern::Literal(ConstValue::Int(k))], None, results.next().unwrap()))
            .collect();
        let switch_expr = b.switch_expr(subject, cases, Some(other));
        b.var_decl(script, "label", Type::Unknown, Some(switch_expr));
        script
    };
    let switch = extract_switch(&mut resolver, script, "label");

    let mut emitter = RecordingEmitter::new();
    let mut compiler = SwitchCompiler::new(&mut emitter, &resolver.arenas, &mut resolver.interns);
    compiler.compile(&switch, switch.subject.location).unwrap();

    assert!(emitter.contains("lookup_switch"));
    assert_eq!(emitter.count("table_switch"), 0);
}

/// Only two literal cases (no default batch, §4.6's ">2" run threshold) fall
/// back to individually chained `is_instance_of`/equality tests rather than
/// a dispatch table.
#[test]
fn short_run_of_literals_lowers_to_chained_tests() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let one = b.literal(ConstValue::Int(1));
        b.var_decl(script, "code", Type::Int, Some(one));
        let subject = b.name_expr("code");
        let a = b.literal(ConstValue::Str("a".into()));
        let bee = b.literal(ConstValue::Str("b".into()));
        let other = b.literal(ConstValue::Str("other".into()));
        let cases = vec![
            b.switch_case(vec![Pattern::Literal(ConstValue::Int(1))], None, a),
            b.switch_case(vec![Pattern::Literal(ConstValue::Int(2))], None, bee),
        ];
        let switch_expr = b.switch_expr(subject, cases, Some(other));
        b.var_decl(script, "label", Type::Unknown, Some(switch_expr));
        script
    };
    let switch = extract_switch(&mut resolver, script, "label");

    let mut emitter = RecordingEmitter::new();
    let mut compiler = SwitchCompiler::new(&mut emitter, &resolver.arenas, &mut resolver.interns);
    compiler.compile(&switch, switch.subject.location).unwrap();

    assert_eq!(emitter.count("table_switch"), 0);
    assert_eq!(emitter.count("lookup_switch"), 0);
    // One equality-test `invoke_method` per literal, chained independently
    // rather than folded into a dispatch table.
    assert_eq!(emitter.count("invoke_method"), 2);
}

/// Destructuring a list pattern's elements allocates and releases temporary
/// slots rather than growing the frame per case.
#[test]
fn list_pattern_allocates_and_releases_element_slots() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let one = b.literal(ConstValue::Int(1));
        let two = b.literal(ConstValue::Int(2));
        let list = langc_core::ExprLoc::new(Expr::ListLit(vec![one, two]), langc_core::SourceLocation::synthetic());
        b.var_decl(script, "pair", Type::Unknown, Some(list));
        let subject = b.name_expr("pair");

        let a = b.binding_pattern("a", None);
        let bb = b.binding_pattern("b", None);
        let a_ref = b.name_expr("a");
        let b_ref = b.name_expr("b");
        let result = b.binary(a_ref, langc_core::Operator::Add, b_ref);
        let zero = b.literal(ConstValue::Int(0));
        let case = b.switch_case(vec![Pattern::ListPattern(vec![a, bb])], None, result);
        let switch_expr = b.switch_expr(subject, vec![case], Some(zero));
        b.var_decl(script, "label", Type::Unknown, Some(switch_expr));
        script
    };
    let switch = extract_switch(&mut resolver, script, "label");

    let mut emitter = RecordingEmitter::new();
    let mut compiler = SwitchCompiler::new(&mut emitter, &resolver.arenas, &mut resolver.interns);
    compiler.compile(&switch, switch.subject.location).unwrap();

    // Two sibling elements at the same nesting depth reuse one pooled slot:
    // both `store_local(0)` and no slot number beyond 0 should appear.
    assert!(emitter.contains("store_local(0)"));
    assert!(!emitter.contains("store_local(1)"));
}

/// Elements after a `*` in a list pattern are indexed relative to the list's
/// end, each at a distinct offset — `[a, *, b, c]` must not bind `b` and `c`
/// to the same slot value.
#[test]
fn list_pattern_suffix_elements_after_star_get_distinct_end_relative_offsets() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let items = (1..=4).map(|i| b.literal(ConstValue::Int(i))).collect();
        let list = langc_core::ExprLoc::new(Expr::ListLit(items), langc_core::SourceLocation::synthetic());
        b.var_decl(script, "xs", Type::Unknown, Some(list));
        let subject = b.name_expr("xs");

        let a = b.binding_pattern("a", None);
        let bb = b.binding_pattern("b", None);
        let c = b.binding_pattern("c", None);
        let a_ref = b.name_expr("a");
        let b_ref = b.name_expr("b");
        let c_ref = b.name_expr("c");
        let sum = b.binary(a_ref, langc_core::Operator::Add, b_ref);
        let result = b.binary(sum, langc_core::Operator::Add, c_ref);
        let zero = b.literal(ConstValue::Int(0));
        let case = b.switch_case(vec![Pattern::ListPattern(vec![a, Pattern::Star, bb, c])], None, result);
        let switch_expr = b.switch_expr(subject, vec![case], Some(zero));
        b.var_decl(script, "label", Type::Unknown, Some(switch_expr));
        script
    };
    let switch = extract_switch(&mut resolver, script, "label");

    let mut emitter = RecordingEmitter::new();
    let mut compiler = SwitchCompiler::new(&mut emitter, &resolver.arenas, &mut resolver.interns);
    compiler.compile(&switch, switch.subject.location).unwrap();

    // `b` is 2-from-the-end, `c` is 1-from-the-end: two distinct offsets
    // must reach the runtime helper, not the same constant twice.
    assert!(emitter.contains("load_const(Int(2))"));
    assert!(emitter.contains("load_const(Int(1))"));
    // One `emit_length` + `swap` pair per suffix element (`b` and `c`); the
    // prefix element `a` never computes a length.
    assert_eq!(emitter.count("emit_length"), 2);
    assert_eq!(emitter.count("swap"), 2);
}

/// A `default` result is always compiled, even when every case is covered by
/// a dense dispatch table, since the default is the lowering's fallthrough
/// target.
#[test]
fn default_case_is_always_compiled() {
    let mut resolver = new_resolver();
    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let one = b.literal(ConstValue::Int(1));
        b.var_decl(script, "code", Type::Int, Some(one));
        let subject = b.name_expr("code");
        let a = b.literal(ConstValue::Str("a".into()));
        let default_result = b.literal(ConstValue::Str("default".into()));
        let case = b.switch_case(vec![Pattern::Literal(ConstValue::Int(1))], None, a);
        let switch_expr = b.switch_expr(subject, vec![case], Some(default_result));
        b.var_decl(script, "label", Type::Unknown, Some(switch_expr));
        script
    };
    let switch = extract_switch(&mut resolver, script, "label");

    let mut emitter = RecordingEmitter::new();
    let mut compiler = SwitchCompiler::new(&mut emitter, &resolver.arenas, &mut resolver.interns);
    compiler.compile(&switch, switch.subject.location).unwrap();

    // `compile` is called once for the subject, once for the default, and
    // once per case result — never skipped, even though the one case here
    // gets its own chained test rather than a dispatch table.
    assert_eq!(emitter.count("compile"), 3);
}
