//! Class descriptors and the registry that owns them (§3, §4.2).

use crate::errors::{CompileErrorKind, CompileError};
use crate::intern::StringId;
use crate::source::SourceLocation;
use crate::types::{ClassId, Type};
use ahash::AHashMap;
use indexmap::IndexMap;

/// One parameter of a [`FunctionDescriptor`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Param {
    pub name: StringId,
    pub ty: Type,
    pub is_mandatory: bool,
    /// Present for optional parameters; `None` for mandatory ones.
    pub initialiser_expr: Option<Box<crate::ast::ExprLoc>>,
}

/// Describes a function or method's call signature (§3 `FunctionDescriptor`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionDescriptor {
    pub name: StringId,
    pub implementing_class: Option<ClassId>,
    pub implementing_method: StringId,
    pub wrapper_method: StringId,
    pub params: Vec<Param>,
    pub return_type: Type,
    /// The receiver type, for instance methods.
    pub first_arg_type: Option<Type>,
    pub is_static: bool,
    pub is_final: bool,
    pub is_async: bool,
    pub is_wrapper: bool,
    pub needs_location: bool,
    pub is_builtin: bool,
    /// Body for a non-builtin method, resolved by the `Resolver`. `None` for
    /// built-in methods and for the synthesized vararg wrapper itself before
    /// synthesis runs.
    pub fun_decl: Option<crate::ast::FunDeclId>,
}

impl FunctionDescriptor {
    #[must_use]
    pub fn mandatory_param_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_mandatory).count()
    }

    /// Validates `other` as a legal override of `self` (§4.4.1): same
    /// mandatory parameter count and names in order, invariant parameter
    /// types, covariant return type when both sides are `Instance`.
    pub fn validate_override(&self, other: &FunctionDescriptor, at: SourceLocation) -> Result<(), CompileError> {
        if self.is_final {
            return Err(CompileError::new(
                CompileErrorKind::OverrideError(format!("cannot override final method '{}'", name_str(self.name))),
                at,
            ));
        }
        if self.params.len() != other.params.len() {
            return Err(CompileError::new(
                CompileErrorKind::OverrideError(format!(
                    "'{}' overrides with a different parameter count",
                    name_str(self.name)
                )),
                at,
            ));
        }
        for (base_param, over_param) in self.params.iter().zip(&other.params) {
            if base_param.name != over_param.name {
                return Err(CompileError::new(
                    CompileErrorKind::OverrideError(format!(
                        "'{}' overrides with a different parameter name",
                        name_str(self.name)
                    )),
                    at,
                ));
            }
            if base_param.ty != over_param.ty {
                return Err(CompileError::new(
                    CompileErrorKind::OverrideError(format!(
                        "'{}' overrides parameter '{}' with a different type",
                        name_str(self.name),
                        name_str(base_param.name)
                    )),
                    at,
                ));
            }
        }
        // Covariant Instance return types are accepted here unconditionally;
        // whether the override's class is actually a subtype of the base's
        // is a hierarchy question the caller checks once both classes are
        // registered (this validation can run before that's guaranteed).
        let return_ok = match (&self.return_type, &other.return_type) {
            (Type::Instance(_), Type::Instance(_)) => true,
            (a, b) => a == b,
        };
        if !return_ok {
            return Err(CompileError::new(
                CompileErrorKind::OverrideError(format!(
                    "'{}' overrides with an incompatible return type",
                    name_str(self.name)
                )),
                at,
            ));
        }
        Ok(())
    }
}

/// Placeholder name formatter used only inside this module's error messages;
/// real name resolution goes through `Interns`, which the registry does not
/// own (callers format messages with access to `Interns` where possible).
fn name_str(id: StringId) -> String {
    format!("#{}", id.index())
}

/// A field declaration (§3 `ClassDescriptor.Field`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Field {
    pub name: StringId,
    pub ty: Type,
    pub is_mandatory: bool,
    pub is_const_static: bool,
    pub const_value: Option<crate::ast::ConstValue>,
}

/// Describes a class's static shape: base class, interfaces, fields, methods
/// and inner classes (§3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassDescriptor {
    pub name: StringId,
    pub package: StringId,
    pub is_interface: bool,
    pub base_class: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    /// Insertion order is significant: it is the declaration order used by
    /// `get_all_mandatory_fields` and by `_initMissing` bit assignment (§9).
    pub fields: IndexMap<StringId, Field>,
    pub methods: IndexMap<StringId, FunctionDescriptor>,
    pub inner_classes: AHashMap<StringId, ClassId>,
    pub init_method: Option<StringId>,
    /// Set by [`ClassRegistry::check_cycles`] once this class's ancestor
    /// chain has been walked without finding a cycle; prevents infinite
    /// descent if a cycle is found and the class is visited again.
    pub cycle_checked: bool,
}

impl ClassDescriptor {
    #[must_use]
    pub fn new(name: StringId, package: StringId) -> Self {
        Self {
            name,
            package,
            is_interface: false,
            base_class: None,
            interfaces: Vec::new(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            inner_classes: AHashMap::new(),
            init_method: None,
            cycle_checked: false,
        }
    }
}

/// Owns every [`ClassDescriptor`] created while compiling one unit.
///
/// Classes are published to the host's process-wide registry only at
/// compilation boundaries (§5); within a single `Resolver` run, everything
/// here is private and single-threaded.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassDescriptor>,
    by_qualified_name: AHashMap<(StringId, StringId), ClassId>,
}

impl ClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ClassDescriptor) -> ClassId {
        let key = (descriptor.package, descriptor.name);
        let id = ClassId(self.classes.len().try_into().expect("too many classes"));
        self.classes.push(descriptor);
        self.by_qualified_name.insert(key, id);
        id
    }

    #[must_use]
    pub fn get(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.index()]
    }

    pub fn get_mut(&mut self, id: ClassId) -> &mut ClassDescriptor {
        &mut self.classes[id.index()]
    }

    #[must_use]
    pub fn lookup(&self, package: StringId, name: StringId) -> Option<ClassId> {
        self.by_qualified_name.get(&(package, name)).copied()
    }

    /// Adds a field to `id`'s class, rejecting a name clash with an existing
    /// field, method, or built-in method name (§4.2).
    pub fn add_field(
        &mut self,
        id: ClassId,
        field: Field,
        builtin_method_names: &[StringId],
        at: SourceLocation,
    ) -> Result<(), CompileError> {
        let class = self.get(id);
        if class.fields.contains_key(&field.name) || class.methods.contains_key(&field.name) {
            return Err(CompileError::new(
                CompileErrorKind::DuplicateDeclaration(name_str(field.name)),
                at,
            ));
        }
        if builtin_method_names.contains(&field.name) {
            return Err(CompileError::new(
                CompileErrorKind::DuplicateDeclaration(format!(
                    "{} clashes with a built-in method",
                    name_str(field.name)
                )),
                at,
            ));
        }
        self.get_mut(id).fields.insert(field.name, field);
        Ok(())
    }

    /// Adds a method to `id`'s class, rejecting a name clash with an
    /// existing field or method (§4.2).
    pub fn add_method(
        &mut self,
        id: ClassId,
        descriptor: FunctionDescriptor,
        at: SourceLocation,
    ) -> Result<(), CompileError> {
        let class = self.get(id);
        if class.fields.contains_key(&descriptor.name) || class.methods.contains_key(&descriptor.name) {
            return Err(CompileError::new(
                CompileErrorKind::DuplicateDeclaration(name_str(descriptor.name)),
                at,
            ));
        }
        self.get_mut(id).methods.insert(descriptor.name, descriptor);
        Ok(())
    }

    pub fn add_inner_class(&mut self, parent: ClassId, name: StringId, inner: ClassId) {
        self.get_mut(parent).inner_classes.insert(name, inner);
    }

    /// Detects inheritance cycles reachable from `id`, marking every class on
    /// an acyclic chain as `cycle_checked` so repeated queries don't re-walk
    /// it. Per §3/§4.2 this is mandatory, not best-effort.
    pub fn check_cycles(&mut self, id: ClassId, at: SourceLocation) -> Result<(), CompileError> {
        let mut seen = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            if seen.contains(&cur) {
                return Err(CompileError::new(
                    CompileErrorKind::CyclicInheritance(name_str(self.get(cur).name)),
                    at,
                ));
            }
            if self.get(cur).cycle_checked {
                break;
            }
            seen.push(cur);
            current = self.get(cur).base_class;
        }
        for class in seen {
            self.get_mut(class).cycle_checked = true;
        }
        Ok(())
    }

    /// All mandatory fields across the inheritance chain, base-class-first,
    /// each in its declaring class's declaration order (§4.2, §9).
    #[must_use]
    pub fn get_all_mandatory_fields(&self, id: ClassId) -> Vec<(ClassId, Field)> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            chain.push(cur);
            current = self.get(cur).base_class;
        }
        chain.reverse();
        let mut result = Vec::new();
        for class_id in chain {
            for field in self.get(class_id).fields.values() {
                if field.is_mandatory && !field.is_const_static {
                    result.push((class_id, field.clone()));
                }
            }
        }
        result
    }

    /// All optional (non-const) fields across the inheritance chain in the
    /// same order `_initMissing`'s bitset indexes them by (§9: both sides of
    /// the JSON decoder must agree on this order).
    #[must_use]
    pub fn get_all_optional_fields(&self, id: ClassId) -> Vec<(ClassId, Field)> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            chain.push(cur);
            current = self.get(cur).base_class;
        }
        chain.reverse();
        let mut result = Vec::new();
        for class_id in chain {
            for field in self.get(class_id).fields.values() {
                if !field.is_mandatory && !field.is_const_static {
                    result.push((class_id, field.clone()));
                }
            }
        }
        result
    }

    /// Enumerates every method visible on `id`, including inherited ones,
    /// most-derived override winning (first occurrence walking from `id`
    /// toward the root).
    #[must_use]
    pub fn all_methods(&self, id: ClassId) -> IndexMap<StringId, FunctionDescriptor> {
        let mut result: IndexMap<StringId, FunctionDescriptor> = IndexMap::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            for (name, method) in &self.get(cur).methods {
                result.entry(*name).or_insert_with(|| method.clone());
            }
            current = self.get(cur).base_class;
        }
        result
    }

    /// True if `ancestor` appears in `id`'s base-class chain (including
    /// `id` itself).
    #[must_use]
    pub fn is_subclass_of(&self, id: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.get(cur).base_class;
        }
        false
    }
}
