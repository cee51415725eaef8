mod common;

use langc_core::testing::AstBuilder;
use langc_core::{ConstValue, Operator, Stmt, Type};

use common::new_resolver;

/// A local closed over two lexical levels down gets a chained link at every
/// intermediate function, each pointing at its parent via `parent_var_decl`,
/// terminating at the original declaration (§8 universal property).
#[test]
fn two_level_closure_chains_heap_local_links() {
    let mut resolver = new_resolver();
    let (script, g, h, x_id) = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let f_body = b.new_block(Some(script), None);
        let one = b.literal(ConstValue::Int(1));
        let x_id = b.var_decl(f_body, "x", Type::Int, Some(one));

        let g_body = b.new_block(Some(f_body), None);
        let h_body = b.new_block(Some(g_body), None);
        let x_ref = b.name_expr("x");
        b.push_stmt(h_body, Stmt::Return(Some(Box::new(x_ref))));
        let h = b.fun_decl("h", vec![], Type::Int, h_body);
        b.push_stmt(g_body, Stmt::FunDeclStmt(h));
        let h_ref = b.name_expr("h");
        let call_h = b.call(h_ref, vec![]);
        b.push_stmt(g_body, Stmt::Return(Some(Box::new(call_h))));
        let g = b.fun_decl("g", vec![], Type::Int, g_body);
        b.push_stmt(f_body, Stmt::FunDeclStmt(g));
        let g_ref = b.name_expr("g");
        let call_g = b.call(g_ref, vec![]);
        b.push_stmt(f_body, Stmt::Return(Some(Box::new(call_g))));

        let f = b.fun_decl("f", vec![], Type::Int, f_body);
        b.push_stmt(script, Stmt::FunDeclStmt(f));
        (script, g, h, x_id)
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors());

    let x_name = resolver.arenas.var(x_id).name;
    assert!(resolver.arenas.var(x_id).flags.is_heap_local);
    let g_link = resolver.arenas.fun(g).heap_locals_by_name[&x_name];
    let h_link = resolver.arenas.fun(h).heap_locals_by_name[&x_name];
    assert_eq!(resolver.arenas.var(g_link).parent_var_decl, Some(x_id));
    assert_eq!(resolver.arenas.var(h_link).parent_var_decl, Some(g_link));
    assert_eq!(resolver.arenas.var(h_link).original_var_decl, Some(x_id));
}

/// Two references to the same outer local from the same nested function
/// reuse one link rather than synthesizing a second (§9 "cyclic graphs" /
/// idempotent promotion).
#[test]
fn repeated_reference_reuses_one_heap_local_link() {
    let mut resolver = new_resolver();
    let (script, g) = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);
        let f_body = b.new_block(Some(script), None);
        let one = b.literal(ConstValue::Int(1));
        b.var_decl(f_body, "x", Type::Int, Some(one));

        let g_body = b.new_block(Some(f_body), None);
        let x_ref_a = b.name_expr("x");
        let x_ref_b = b.name_expr("x");
        let sum = b.binary(x_ref_a, Operator::Add, x_ref_b);
        b.push_stmt(g_body, Stmt::Return(Some(Box::new(sum))));
        let g = b.fun_decl("g", vec![], Type::Int, g_body);
        b.push_stmt(f_body, Stmt::FunDeclStmt(g));
        let g_ref = b.name_expr("g");
        let call_g = b.call(g_ref, vec![]);
        b.push_stmt(f_body, Stmt::ExprStmt(Box::new(call_g)));

        let f = b.fun_decl("f", vec![], Type::Int, f_body);
        b.push_stmt(script, Stmt::FunDeclStmt(f));
        (script, g)
    };
    resolver.resolve_script(script);
    assert!(!resolver.diagnostics.has_errors());
    assert_eq!(resolver.arenas.fun(g).closure_count, 1);
}
