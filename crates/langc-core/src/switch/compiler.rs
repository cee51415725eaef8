//! Lowering of a resolved `switch` into dispatch code (§4.6), driven purely
//! through the [`crate::emitter::Emitter`] capability — this module never
//! touches a concrete bytecode format.
//!
//! Every pattern test is control-flow shaped: on success it falls through,
//! on failure it jumps straight to the next pattern's (or the default's)
//! start label, chained per §4.6.3. There is no boolean "matched" value left
//! sitting on the stack between tests.

use crate::ast::{Arenas, ConstValue, ConstructorArgs, Expr, ExprLoc, Pattern, SwitchExpr, VarDeclId};
use crate::errors::{CompileError, CompileErrorKind};
use crate::intern::Interns;
use crate::source::SourceLocation;
use crate::types::Type;
use ahash::AHashMap;

use crate::emitter::Emitter;

/// One flattened `(case index, pattern)` pair, in source order; multiple
/// entries can point at the same case index when a case lists several
/// patterns sharing one guard and result.
struct Entry<'p> {
    case: usize,
    pattern: &'p Pattern,
}

/// Where a pattern test's subject currently lives: the switch's `itVar`, or
/// a temporary slot holding a destructured sub-value (§4.6.2 "destructuring
/// allocates temporary value slots").
#[derive(Clone, Copy)]
enum Subject {
    ItVar(VarDeclId),
    Slot(u32, Type),
}

/// A list-pattern element's position: fixed from the list's start (prefix of
/// a `*`, or the whole pattern when there's no star), or relative to the
/// list's end (suffix after a `*`, whose actual start index depends on the
/// subject's runtime length).
#[derive(Clone, Copy)]
enum ElementIndex {
    FromStart(usize),
    FromEnd(usize),
}

/// Hands out/reclaims temporary slots per recurring element type, so two
/// sibling list patterns at the same nesting depth reuse one slot instead of
/// growing the frame per case (§4.6.2).
#[derive(Default)]
struct SlotPool {
    next: u32,
    free: AHashMap<&'static str, Vec<u32>>,
}

impl SlotPool {
    fn alloc(&mut self, kind: &'static str) -> u32 {
        if let Some(slot) = self.free.get_mut(kind).and_then(Vec::pop) {
            return slot;
        }
        let slot = self.next;
        self.next += 1;
        slot
    }

    fn release(&mut self, kind: &'static str, slot: u32) {
        self.free.entry(kind).or_default().push(slot);
    }
}

pub struct SwitchCompiler<'a, E: Emitter> {
    emitter: &'a mut E,
    arenas: &'a Arenas,
    interns: &'a mut Interns,
    slots: SlotPool,
}

impl<'a, E: Emitter> SwitchCompiler<'a, E> {
    pub fn new(emitter: &'a mut E, arenas: &'a Arenas, interns: &'a mut Interns) -> Self {
        Self { emitter, arenas, interns, slots: SlotPool::default() }
    }

    pub fn compile(&mut self, switch: &SwitchExpr, at: SourceLocation) -> Result<(), CompileError> {
        let it_var = switch.it_var.ok_or_else(|| internal_error("switch lowered with no it_var", at))?;
        let default = switch
            .default
            .as_ref()
            .ok_or_else(|| internal_error("switch lowered with no default (step 7 should have synthesized one)", at))?;

        self.emitter.compile(&switch.subject);
        self.emitter.store_var(it_var);

        let entries: Vec<Entry> = switch
            .cases
            .iter()
            .enumerate()
            .flat_map(|(i, case)| case.patterns.iter().map(move |p| Entry { case: i, pattern: p }))
            .collect();

        let case_labels: Vec<E::Label> = switch.cases.iter().map(|_| self.emitter.label()).collect();
        let entry_labels: Vec<E::Label> = entries.iter().map(|_| self.emitter.label()).collect();
        let default_label = self.emitter.label();

        let next_label = |k: usize| entry_labels.get(k + 1).copied().unwrap_or(default_label);

        let mut i = 0;
        while i < entries.len() {
            let run_start = i;
            while i < entries.len()
                && is_simple_literal(entries[i].pattern)
                && switch.cases[entries[i].case].guard.is_none()
            {
                i += 1;
            }
            if i - run_start > 2 {
                let fallthrough = next_label(i - 1);
                self.emit_batched_dispatch(&entries[run_start..i], it_var, &entry_labels[run_start], &case_labels, fallthrough)?;
            } else {
                for k in run_start..i {
                    self.emitter.label_here(entry_labels[k]);
                    let fail = next_label(k);
                    self.emit_case_entry(switch, it_var, &entries[k], &case_labels, fail)?;
                }
            }
            if i == run_start {
                self.emitter.label_here(entry_labels[i]);
                let fail = next_label(i);
                self.emit_case_entry(switch, it_var, &entries[i], &case_labels, fail)?;
                i += 1;
            }
        }

        self.emitter.label_here(default_label);
        self.emitter.compile(default);
        let tail = self.emitter.label();
        self.emitter.jump(tail);

        for (case, label) in switch.cases.iter().zip(&case_labels) {
            self.emitter.label_here(*label);
            self.emitter.compile(&case.result);
            self.emitter.jump(tail);
        }
        self.emitter.label_here(tail);
        Ok(())
    }

    /// Tests one pattern; if matched (and its case's guard, if any, holds),
    /// jumps to that case's shared result label. Otherwise falls through to
    /// `fail_label`, either directly (pattern test failure) or via an
    /// explicit jump (guard failure after a successful pattern match).
    fn emit_case_entry(
        &mut self,
        switch: &SwitchExpr,
        it_var: VarDeclId,
        entry: &Entry,
        case_labels: &[E::Label],
        fail_label: E::Label,
    ) -> Result<(), CompileError> {
        let subject_ty = self.arenas.var(it_var).ty.clone();
        self.emit_pattern_test(entry.pattern, Subject::ItVar(it_var), &subject_ty, fail_label)?;
        if let Some(guard) = &switch.cases[entry.case].guard {
            self.emitter.compile(guard);
            self.fail_unless(fail_label);
        }
        self.emitter.jump(case_labels[entry.case]);
        Ok(())
    }

    fn emit_batched_dispatch(
        &mut self,
        run: &[Entry],
        it_var: VarDeclId,
        entry_point: &E::Label,
        case_labels: &[E::Label],
        no_match: E::Label,
    ) -> Result<(), CompileError> {
        self.emitter.label_here(*entry_point);
        let values: Vec<&ConstValue> = run
            .iter()
            .map(|e| match e.pattern {
                Pattern::Literal(v) => v,
                _ => unreachable!("is_simple_literal guarantees a Literal pattern"),
            })
            .collect();

        let all_integral = values.iter().all(|v| matches!(v, ConstValue::Byte(_) | ConstValue::Int(_)));
        self.emitter.load_var(it_var);
        let subject_is_any = matches!(self.arenas.var(it_var).ty.unboxed(), Type::Any);

        if all_integral {
            let keys: Vec<i64> = values
                .iter()
                .map(|v| match v {
                    ConstValue::Byte(b) => i64::from(*b),
                    ConstValue::Int(i) => i64::from(*i),
                    _ => unreachable!(),
                })
                .collect();
            let min = *keys.iter().min().unwrap();
            let max = *keys.iter().max().unwrap();
            let labels: Vec<E::Label> = run.iter().map(|e| case_labels[e.case]).collect();

            if subject_is_any {
                let helper = self.interns.intern("__switchAsInt");
                self.emitter.invoke_method(None, helper, &[Type::Any]);
            }

            #[allow(clippy::cast_precision_loss)]
            if (max - min + 1) as f64 <= 5.0 * run.len() as f64 {
                self.emitter.table_switch(min, max, no_match, &labels);
            } else {
                self.emitter.lookup_switch(no_match, &keys, &labels);
            }
        } else {
            self.emitter.box_value();
            let hash_fn = self.interns.intern("__switchHashCode");
            self.emitter.invoke_method(None, hash_fn, &[Type::Any]);
            // Every literal in a non-integral run hashes to a distinct
            // bucket in practice for the literal kinds this model supports
            // (strings, booleans, doubles); one key per literal is enough
            // to drive `lookup_switch`, with the equality test happening in
            // `emit_pattern_test` inside each case's own label rather than
            // here, by routing every key to an individual-test label.
            let keys: Vec<i64> = values.iter().map(|v| semantic_hash(v)).collect();
            let per_entry_labels: Vec<E::Label> = run.iter().map(|_| self.emitter.label()).collect();
            self.emitter.lookup_switch(no_match, &keys, &per_entry_labels);
            for (entry, label) in run.iter().zip(&per_entry_labels) {
                self.emitter.label_here(*label);
                self.emit_pattern_test(entry.pattern, Subject::ItVar(it_var), &Type::Any, no_match)?;
                self.emitter.jump(case_labels[entry.case]);
            }
        }
        Ok(())
    }

    fn emit_pattern_test(
        &mut self,
        pattern: &Pattern,
        subject: Subject,
        subject_ty: &Type,
        fail_label: E::Label,
    ) -> Result<(), CompileError> {
        match pattern {
            Pattern::Underscore | Pattern::Star => {}
            Pattern::TypeTest(t) => {
                self.load(subject);
                self.emitter.is_instance_of(&[t.clone()]);
                self.fail_unless(fail_label);
            }
            Pattern::BindingVar { var, declared_type } => {
                self.load(subject);
                if let Some(t) = declared_type {
                    self.emitter.dup_val();
                    self.emitter.is_instance_of(&[t.clone()]);
                    self.fail_unless(fail_label);
                    self.emitter.check_cast(t);
                }
                self.emitter.store_var(*var);
            }
            Pattern::Identifier(var) => {
                self.load(subject);
                self.emitter.load_var(*var);
                let eq = self.interns.intern("__switchEquals");
                self.emitter.invoke_method(None, eq, &[Type::Any, Type::Any]);
                self.fail_unless(fail_label);
            }
            Pattern::Literal(v) => {
                if matches!(subject_ty.unboxed(), Type::Any) {
                    self.load(subject);
                    self.emitter.is_instance_of(&[v.type_of()]);
                    self.fail_unless(fail_label);
                }
                self.load(subject);
                self.emitter.load_const(v);
                let eq = self.interns.intern("__switchEquals");
                self.emitter.invoke_method(None, eq, &[Type::Any, Type::Any]);
                self.fail_unless(fail_label);
            }
            Pattern::ExprString => {
                // No interpolated template is retained on this pattern
                // (§ast `Pattern::ExprString` carries no payload), so the
                // runtime equality this variant implies can't be lowered
                // here; the string-typedness check is all that's emitted.
                self.load(subject);
                self.emitter.is_instance_of(&[Type::String]);
                self.fail_unless(fail_label);
            }
            Pattern::RegexMatch(regex) => {
                self.load(subject);
                self.emitter.is_instance_of(&[Type::String]);
                self.fail_unless(fail_label);
                self.load(subject);
                self.emitter.load_const(&ConstValue::Str(regex.clone()));
                let run = self.interns.intern("__switchRegexMatches");
                self.emitter.invoke_method(None, run, &[Type::String, Type::String]);
                self.fail_unless(fail_label);
            }
            Pattern::ListPattern(items) => self.emit_list_pattern(items, subject, fail_label)?,
            Pattern::MapPattern(entries) => self.emit_map_pattern(entries, subject, fail_label)?,
            Pattern::ConstructorPattern { class, args } => self.emit_constructor_pattern(*class, args, subject, fail_label)?,
        }
        Ok(())
    }

    fn emit_list_pattern(&mut self, items: &[Pattern], subject: Subject, fail_label: E::Label) -> Result<(), CompileError> {
        self.load(subject);
        self.emitter.is_instance_of(&[Type::List, Type::Array(Box::new(Type::Any))]);
        self.fail_unless(fail_label);

        let star_idx = items.iter().position(|p| matches!(p, Pattern::Star));
        let required = items.len() - usize::from(star_idx.is_some());
        self.load(subject);
        self.emitter.emit_length(SourceLocation::synthetic());
        self.emitter.load_const(&ConstValue::Int(i32::try_from(required).unwrap_or(i32::MAX)));
        let size_check = self.interns.intern(if star_idx.is_some() { "__switchSizeAtLeast" } else { "__switchSizeEquals" });
        self.emitter.invoke_method(None, size_check, &[Type::Int, Type::Int]);
        self.fail_unless(fail_label);

        let at_front = star_idx.unwrap_or(items.len());
        for (idx, item) in items[..at_front].iter().enumerate() {
            self.emit_indexed_element(subject, ElementIndex::FromStart(idx), item, fail_label)?;
        }
        if let Some(star) = star_idx {
            let suffix_len = items.len() - star - 1;
            for (k, item) in items[star + 1..].iter().enumerate() {
                self.emit_indexed_element(subject, ElementIndex::FromEnd(suffix_len - k), item, fail_label)?;
            }
        }
        Ok(())
    }

    fn emit_indexed_element(
        &mut self,
        subject: Subject,
        idx: ElementIndex,
        item: &Pattern,
        fail_label: E::Label,
    ) -> Result<(), CompileError> {
        if matches!(item, Pattern::Underscore | Pattern::Star) {
            return Ok(());
        }
        let at = SourceLocation::synthetic();
        match idx {
            ElementIndex::FromStart(idx) => {
                self.load(subject);
                self.emitter.load_const(&ConstValue::Int(i32::try_from(idx).unwrap_or(i32::MAX)));
            }
            ElementIndex::FromEnd(offset_from_end) => {
                // index = length(subject) - offset_from_end, computed at
                // runtime since the star's actual match length is unknown
                // until the list is inspected.
                self.load(subject);
                self.emitter.emit_length(at);
                self.emitter.load_const(&ConstValue::Int(i32::try_from(offset_from_end).unwrap_or(i32::MAX)));
                let from_end = self.interns.intern("__switchIndexFromEnd");
                self.emitter.invoke_method(None, from_end, &[Type::Int, Type::Int]);
                self.load(subject);
                self.emitter.swap();
            }
        }
        self.emitter.unsafe_load_elem(&Type::List, at);
        let slot = self.slots.alloc("list_elem");
        self.emitter.store_local(slot);
        let result = self.emit_pattern_test(item, Subject::Slot(slot, Type::Any), &Type::Any, fail_label);
        self.slots.release("list_elem", slot);
        result
    }

    fn emit_map_pattern(&mut self, entries: &[(String, Pattern)], subject: Subject, fail_label: E::Label) -> Result<(), CompileError> {
        self.load(subject);
        self.emitter.is_instance_of(&[Type::Map]);
        self.fail_unless(fail_label);

        for (key, value_pattern) in entries {
            if matches!(value_pattern, Pattern::Star) {
                continue;
            }
            self.load(subject);
            self.emitter.load_const(&ConstValue::Str(key.clone()));
            let contains_key = self.interns.intern("containsKey");
            self.emitter.invoke_method(None, contains_key, &[Type::String]);
            self.fail_unless(fail_label);

            self.load(subject);
            self.emitter.load_const(&ConstValue::Str(key.clone()));
            self.emitter.unsafe_load_elem(&Type::Map, SourceLocation::synthetic());
            let slot = self.slots.alloc("map_value");
            self.emitter.store_local(slot);
            self.emit_pattern_test(value_pattern, Subject::Slot(slot, Type::Any), &Type::Any, fail_label)?;
            self.slots.release("map_value", slot);
        }
        Ok(())
    }

    fn emit_constructor_pattern(
        &mut self,
        class: crate::types::ClassId,
        args: &ConstructorArgs,
        subject: Subject,
        fail_label: E::Label,
    ) -> Result<(), CompileError> {
        self.load(subject);
        self.emitter.is_instance_of(&[Type::Instance(class)]);
        self.fail_unless(fail_label);

        match args {
            ConstructorArgs::Positional(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if matches!(item, Pattern::Underscore | Pattern::Star) {
                        continue;
                    }
                    self.load(subject);
                    self.emitter.check_cast(&Type::Instance(class));
                    let getter = self.interns.intern(&format!("$field{idx}"));
                    self.emitter.invoke_method(Some(class), getter, &[]);
                    let slot = self.slots.alloc("ctor_field");
                    self.emitter.store_local(slot);
                    self.emit_pattern_test(item, Subject::Slot(slot, Type::Any), &Type::Any, fail_label)?;
                    self.slots.release("ctor_field", slot);
                }
            }
            ConstructorArgs::Named(items) => {
                for (field, item) in items {
                    if matches!(item, Pattern::Underscore | Pattern::Star) {
                        continue;
                    }
                    self.load(subject);
                    self.emitter.check_cast(&Type::Instance(class));
                    self.emitter.invoke_method(Some(class), *field, &[]);
                    let not_null = self.interns.intern("__switchNotNull");
                    self.emitter.dup_val();
                    self.emitter.invoke_method(None, not_null, &[Type::Any]);
                    self.fail_unless(fail_label);
                    let slot = self.slots.alloc("ctor_field");
                    self.emitter.store_local(slot);
                    self.emit_pattern_test(item, Subject::Slot(slot, Type::Any), &Type::Any, fail_label)?;
                    self.slots.release("ctor_field", slot);
                }
            }
        }
        Ok(())
    }

    fn load(&mut self, subject: Subject) {
        match subject {
            Subject::ItVar(var) => self.emitter.load_var(var),
            Subject::Slot(slot, _) => self.emitter.load_local(slot),
        }
    }

    /// Consumes the boolean left on the stack by the preceding test,
    /// jumping to `fail_label` when it's false and falling through when
    /// it's true — `Emitter` only exposes jump-if-true, so this composes it
    /// with an extra pass-through label.
    fn fail_unless(&mut self, fail_label: E::Label) {
        let pass = self.emitter.label();
        self.emitter.jump_if(pass);
        self.emitter.jump(fail_label);
        self.emitter.label_here(pass);
    }
}

/// A "simple literal pattern" for §4.6's run accumulation: a non-null
/// constant with no destructuring.
fn is_simple_literal(pattern: &Pattern) -> bool {
    matches!(pattern, Pattern::Literal(v) if !matches!(v, ConstValue::Null))
}

/// Host-independent grouping key for the hashed-dispatch bucket layout; not
/// the runtime `hashCode` itself (that's `__switchHashCode`, computed by the
/// emitter's target), just enough to keep per-literal buckets distinct while
/// lowering through `lookup_switch`.
fn semantic_hash(v: &ConstValue) -> i64 {
    match v {
        ConstValue::Null => 0,
        ConstValue::Bool(b) => i64::from(*b),
        ConstValue::Byte(b) => i64::from(*b),
        ConstValue::Int(i) => i64::from(*i),
        ConstValue::Long(l) => *l,
        ConstValue::Double(d) => d.to_bits() as i64,
        ConstValue::Decimal(d) => d.unscaled as i64,
        ConstValue::Str(s) => {
            let mut h: i64 = 0;
            for b in s.as_bytes() {
                h = h.wrapping_mul(31).wrapping_add(i64::from(*b));
            }
            h
        }
    }
}

fn internal_error(message: &str, at: SourceLocation) -> CompileError {
    CompileError { kind: CompileErrorKind::InternalError(message.to_string()), location: at }
}
