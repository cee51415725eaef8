//! Compilation context (§6.1): the flags that reach the resolver, and
//! nothing else — there is deliberately no global or thread-local
//! compilation state (§5: independent compilations use independent
//! `Resolver`s).

use crate::intern::StringId;

/// Flags controlling a single compilation, threaded through the `Resolver`
/// the way the teacher threads `ResourceLimits` through `Executor::new`.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    pub package: StringId,
    pub script_mode: bool,
    pub repl_mode: bool,
    pub min_decimal_scale: u32,
    pub constant_folding_enabled: bool,
    pub ide_plugin_mode: bool,
    pub class_access_to_globals_allowed: bool,
}

impl CompilationContext {
    #[must_use]
    pub fn new(package: StringId) -> Self {
        Self {
            package,
            script_mode: false,
            repl_mode: false,
            min_decimal_scale: 0,
            constant_folding_enabled: true,
            ide_plugin_mode: false,
            class_access_to_globals_allowed: false,
        }
    }

    #[must_use]
    pub fn script_mode(mut self, value: bool) -> Self {
        self.script_mode = value;
        self
    }

    #[must_use]
    pub fn repl_mode(mut self, value: bool) -> Self {
        self.repl_mode = value;
        self
    }

    #[must_use]
    pub fn min_decimal_scale(mut self, scale: u32) -> Self {
        self.min_decimal_scale = scale;
        self
    }

    #[must_use]
    pub fn constant_folding_enabled(mut self, value: bool) -> Self {
        self.constant_folding_enabled = value;
        self
    }

    #[must_use]
    pub fn ide_plugin_mode(mut self, value: bool) -> Self {
        self.ide_plugin_mode = value;
        self
    }

    #[must_use]
    pub fn class_access_to_globals_allowed(mut self, value: bool) -> Self {
        self.class_access_to_globals_allowed = value;
        self
    }

    /// §9 open question: repl-mode auto-declaration of globals on first
    /// assignment is orthogonal to class scope — it is never permitted
    /// inside a class body regardless of `repl_mode`.
    #[must_use]
    pub fn allows_auto_global_declaration(&self, in_class_scope: bool) -> bool {
        self.repl_mode && !in_class_scope
    }
}
