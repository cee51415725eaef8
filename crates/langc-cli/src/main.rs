//! Demo driver: builds a small AST in-process (there is no parser here —
//! see `langc_core::testing::AstBuilder`), runs it through `Resolver`, and
//! lowers a `switch` expression with a toy `Emitter` that just prints the
//! primitive calls it receives, standing in for a real bytecode backend.

use std::fmt;

use langc_core::testing::AstBuilder;
use langc_core::{
    CompilationContext, ConstValue, Emitter, Expr, IfKind, Operator, Pattern, Resolver, Stmt, SwitchCompiler, Type,
    VarDeclId,
};

fn main() {
    tracing_subscriber::fmt::init();

    let (mut resolver, script) = build_script();
    print_diagnostics(&resolver);

    let label_var = resolver.interns.intern("label");
    let label_id = resolver
        .arenas
        .block(script)
        .vars
        .get(&label_var)
        .copied()
        .expect("the demo script declares `label`");

    let switch = resolver.arenas.var(label_id).initialiser.as_ref().and_then(|init| match &init.kind {
        Expr::Switch(switch) => Some((**switch).clone()),
        _ => None,
    });

    match switch {
        Some(switch) => {
            println!("--- lowering `switch (code) {{ ... }}` ---");
            let mut emitter = PrintingEmitter::new();
            let mut compiler = SwitchCompiler::new(&mut emitter, &resolver.arenas, &mut resolver.interns);
            match compiler.compile(&switch, switch.subject.location) {
                Ok(()) => {}
                Err(err) => eprintln!("switch lowering failed: {err}"),
            }
        }
        None => eprintln!("`label`'s initialiser was not a resolved switch expression"),
    }
}

/// Builds:
/// ```text
/// def f(int x) -> int {
///     def g() -> int { return x + 1 }   // closes over `x`: heap-local promotion
///     return g()
/// }
/// f(3)
///
/// int code = 2
/// var label = switch (code) {
///     1 -> "one"
///     2 -> "two"
///     3 -> "three"
///     4 -> "four"
///     else -> "other"
/// }
/// ```
fn build_script() -> (Resolver, langc_core::BlockId) {
    let context = CompilationContext::new(langc_core::StringId::synthetic()).script_mode(true);
    let mut resolver = Resolver::new(context);

    let script = {
        let mut b = AstBuilder::new(&mut resolver);
        let script = b.new_block(None, None);

        let outer_body = b.new_block(Some(script), None);
        let x_param = b.param("x", Type::Int);
        let inner_body = b.new_block(Some(outer_body), None);
        let x_ref = b.name_expr("x");
        let one = b.literal(ConstValue::Int(1));
        let x_plus_one = b.binary(x_ref, Operator::Add, one);
        b.push_stmt(inner_body, Stmt::Return(Some(Box::new(x_plus_one))));
        let g = b.fun_decl("g", vec![], Type::Int, inner_body);
        b.push_stmt(outer_body, Stmt::FunDeclStmt(g));
        let g_ref = b.name_expr("g");
        let call_g = b.call(g_ref, vec![]);
        b.push_stmt(outer_body, Stmt::Return(Some(Box::new(call_g))));
        let f = b.fun_decl("f", vec![x_param], Type::Int, outer_body);
        b.push_stmt(script, Stmt::FunDeclStmt(f));

        let f_ref = b.name_expr("f");
        let three = b.literal(ConstValue::Int(3));
        let call_f = b.call(f_ref, vec![(None, three)]);
        b.push_stmt(script, Stmt::ExprStmt(Box::new(call_f)));

        let two = b.literal(ConstValue::Int(2));
        b.var_decl(script, "code", Type::Int, Some(two));

        let subject = b.name_expr("code");
        let one_label = b.literal(ConstValue::Str("one".into()));
        let two_label = b.literal(ConstValue::Str("two".into()));
        let three_label = b.literal(ConstValue::Str("three".into()));
        let four_label = b.literal(ConstValue::Str("four".into()));
        let other_label = b.literal(ConstValue::Str("other".into()));
        let cases = vec![
            b.switch_case(vec![Pattern::Literal(ConstValue::Int(1))], None, one_label),
            b.switch_case(vec![Pattern::Literal(ConstValue::Int(2))], None, two_label),
            b.switch_case(vec![Pattern::Literal(ConstValue::Int(3))], None, three_label),
            b.switch_case(vec![Pattern::Literal(ConstValue::Int(4))], None, four_label),
        ];
        let switch_expr = b.switch_expr(subject, cases, Some(other_label));
        b.var_decl(script, "label", Type::Unknown, Some(switch_expr));

        script
    };
    resolver.resolve_script(script);
    (resolver, script)
}

fn print_diagnostics(resolver: &Resolver) {
    if resolver.diagnostics.has_errors() {
        println!("--- diagnostics ---");
        for err in resolver.diagnostics.errors() {
            println!("{err}");
        }
    } else {
        println!("resolved with no diagnostics");
    }
}

/// A trivial [`Emitter`] that prints every primitive it is asked to emit
/// instead of producing real bytecode, so `SwitchCompiler`'s lowering
/// decisions (batched dispatch vs. chained pattern tests) are visible.
struct PrintingEmitter {
    next_label: u32,
}

impl PrintingEmitter {
    fn new() -> Self {
        Self { next_label: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Label(u32);

impl fmt::Debug for PrintingEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintingEmitter").finish()
    }
}

impl Emitter for PrintingEmitter {
    type Label = Label;

    fn compile(&mut self, expr: &langc_core::ExprLoc) {
        println!("  compile({:?})", expr.kind);
    }

    fn load_var(&mut self, var: VarDeclId) {
        println!("  load_var({var:?})");
    }

    fn store_var(&mut self, var: VarDeclId) {
        println!("  store_var({var:?})");
    }

    fn load_local(&mut self, slot: u32) {
        println!("  load_local({slot})");
    }

    fn store_local(&mut self, slot: u32) {
        println!("  store_local({slot})");
    }

    fn load_const(&mut self, value: &ConstValue) {
        println!("  load_const({value:?})");
    }

    fn load_default_value(&mut self, ty: &Type) {
        println!("  load_default_value({ty})");
    }

    fn emit_length(&mut self, _at: langc_core::SourceLocation) {
        println!("  emit_length");
    }

    fn unsafe_load_elem(&mut self, parent_type: &Type, _at: langc_core::SourceLocation) {
        println!("  unsafe_load_elem({parent_type})");
    }

    fn is_instance_of(&mut self, types: &[Type]) {
        println!("  is_instance_of({types:?})");
    }

    fn check_cast(&mut self, ty: &Type) {
        println!("  check_cast({ty})");
    }

    fn box_value(&mut self) {
        println!("  box_value");
    }

    fn unbox_value(&mut self) {
        println!("  unbox_value");
    }

    fn dup_val(&mut self) {
        println!("  dup_val");
    }

    fn pop_val(&mut self) {
        println!("  pop_val");
    }

    fn swap(&mut self) {
        println!("  swap");
    }

    fn invoke_method(
        &mut self,
        _class: Option<langc_core::ClassId>,
        method_name: langc_core::StringId,
        _param_types: &[Type],
    ) {
        println!("  invoke_method({method_name:?})");
    }

    fn convert_to(
        &mut self,
        ty: &Type,
        _at_node: &langc_core::ExprLoc,
        allow_loss: bool,
        _at: langc_core::SourceLocation,
    ) {
        println!("  convert_to({ty}, allow_loss={allow_loss})");
    }

    fn emit_if(
        &mut self,
        _maybe_async: bool,
        _kind: IfKind,
        _then_label: Self::Label,
        _else_label: Option<Self::Label>,
        _finally_label: Option<Self::Label>,
    ) {
        println!("  emit_if");
    }

    fn label(&mut self) -> Self::Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn label_here(&mut self, label: Self::Label) {
        println!("  label_here({label:?})");
    }

    fn jump(&mut self, label: Self::Label) {
        println!("  jump({label:?})");
    }

    fn jump_if(&mut self, label: Self::Label) {
        println!("  jump_if({label:?})");
    }

    fn table_switch(&mut self, min: i64, max: i64, default_label: Self::Label, labels: &[Self::Label]) {
        println!("  table_switch(min={min}, max={max}, default={default_label:?}, labels={labels:?})");
    }

    fn lookup_switch(&mut self, default_label: Self::Label, keys: &[i64], labels: &[Self::Label]) {
        println!("  lookup_switch(default={default_label:?}, keys={keys:?}, labels={labels:?})");
    }
}
