//! Shared test plumbing: a recording [`Emitter`] that lowering tests can
//! inspect afterwards instead of printing, plus small helpers to spin up a
//! resolver the way a real caller would.

use langc_core::{
    ClassId, CompilationContext, ConstValue, Emitter, ExprLoc, IfKind, Resolver, SourceLocation, StringId, Type,
    VarDeclId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// Every primitive call the compiler drove, in order, formatted as a short
/// opcode-ish string — enough for a test to assert on dispatch shape
/// (`table_switch` vs `lookup_switch` vs chained `is_instance_of`/`jump_if`
/// pairs) without depending on a real bytecode format.
#[derive(Default)]
pub struct RecordingEmitter {
    pub ops: Vec<String>,
    next_label: u32,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.ops.iter().any(|op| op.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.ops.iter().filter(|op| op.contains(needle)).count()
    }
}

impl Emitter for RecordingEmitter {
    type Label = Label;

    fn compile(&mut self, _expr: &ExprLoc) {
        self.ops.push("compile".into());
    }

    fn load_var(&mut self, var: VarDeclId) {
        self.ops.push(format!("load_var({var:?})"));
    }

    fn store_var(&mut self, var: VarDeclId) {
        self.ops.push(format!("store_var({var:?})"));
    }

    fn load_local(&mut self, slot: u32) {
        self.ops.push(format!("load_local({slot})"));
    }

    fn store_local(&mut self, slot: u32) {
        self.ops.push(format!("store_local({slot})"));
    }

    fn load_const(&mut self, value: &ConstValue) {
        self.ops.push(format!("load_const({value:?})"));
    }

    fn load_default_value(&mut self, ty: &Type) {
        self.ops.push(format!("load_default_value({ty})"));
    }

    fn emit_length(&mut self, _at: SourceLocation) {
        self.ops.push("emit_length".into());
    }

    fn unsafe_load_elem(&mut self, parent_type: &Type, _at: SourceLocation) {
        self.ops.push(format!("unsafe_load_elem({parent_type})"));
    }

    fn is_instance_of(&mut self, types: &[Type]) {
        self.ops.push(format!("is_instance_of({types:?})"));
    }

    fn check_cast(&mut self, ty: &Type) {
        self.ops.push(format!("check_cast({ty})"));
    }

    fn box_value(&mut self) {
        self.ops.push("box_value".into());
    }

    fn unbox_value(&mut self) {
        self.ops.push("unbox_value".into());
    }

    fn dup_val(&mut self) {
        self.ops.push("dup_val".into());
    }

    fn pop_val(&mut self) {
        self.ops.push("pop_val".into());
    }

    fn swap(&mut self) {
        self.ops.push("swap".into());
    }

    fn invoke_method(&mut self, _class: Option<ClassId>, method_name: StringId, _param_types: &[Type]) {
        self.ops.push(format!("invoke_method({method_name:?})"));
    }

    fn convert_to(&mut self, ty: &Type, _at_node: &ExprLoc, allow_loss: bool, _at: SourceLocation) {
        self.ops.push(format!("convert_to({ty}, allow_loss={allow_loss})"));
    }

    fn emit_if(
        &mut self,
        _maybe_async: bool,
        _kind: IfKind,
        _then_label: Self::Label,
        _else_label: Option<Self::Label>,
        _finally_label: Option<Self::Label>,
    ) {
        self.ops.push("emit_if".into());
    }

    fn label(&mut self) -> Self::Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn label_here(&mut self, label: Self::Label) {
        self.ops.push(format!("label_here({label:?})"));
    }

    fn jump(&mut self, label: Self::Label) {
        self.ops.push(format!("jump({label:?})"));
    }

    fn jump_if(&mut self, label: Self::Label) {
        self.ops.push(format!("jump_if({label:?})"));
    }

    fn table_switch(&mut self, min: i64, max: i64, default_label: Self::Label, labels: &[Self::Label]) {
        self.ops.push(format!("table_switch(min={min}, max={max}, default={default_label:?}, n={})", labels.len()));
    }

    fn lookup_switch(&mut self, default_label: Self::Label, keys: &[i64], labels: &[Self::Label]) {
        self.ops.push(format!(
            "lookup_switch(default={default_label:?}, keys={keys:?}, n={})",
            labels.len()
        ));
    }
}

pub fn new_resolver() -> Resolver {
    let context = CompilationContext::new(StringId::synthetic()).script_mode(true);
    Resolver::new(context)
}
