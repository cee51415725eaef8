//! Heap-local promotion (§4.4.2): when a local declared in function `F` is
//! referenced from a nested function `G`, its storage must move from `F`'s
//! frame into a cell every function on the path `F`→…→`G` can forward.

use crate::ast::{FunDeclId, VarDecl, VarDeclId};
use crate::source::SourceLocation;

use super::Resolver;

/// Promotes `var` (owned by `owner_fun`) to a heap-local visible to
/// `referencing_fun`, synthesising one link per function on the path between
/// them. Returns the `VarDeclId` that `referencing_fun`'s own code should
/// bind the name to.
///
/// Idempotent per function: a function already on the path from a previous
/// promotion of the same variable reuses its existing link rather than
/// synthesising a second one.
pub fn promote(resolver: &mut Resolver, var: VarDeclId, owner_fun: FunDeclId, referencing_fun: FunDeclId) -> VarDeclId {
    resolver.arenas.var_mut(var).flags.is_heap_local = true;

    let mut chain = vec![referencing_fun];
    let mut cur = referencing_fun;
    while cur != owner_fun {
        cur = resolver
            .arenas
            .fun(cur)
            .owning_function
            .expect("heap-local reference must be lexically nested inside its owner");
        chain.push(cur);
    }
    chain.reverse();

    let name = resolver.arenas.var(var).name;
    let ty = resolver.arenas.var(var).ty.clone();

    let mut parent_link = var;
    for &f in &chain[1..] {
        let existing = resolver.arenas.fun(f).heap_locals_by_name.get(&name).copied();
        let link_id = match existing {
            Some(id) => id,
            None => {
                let mut link = VarDecl::new(name, ty.clone(), SourceLocation::synthetic());
                link.flags.is_heap_local = true;
                link.owning_function = Some(f);
                link.parent_var_decl = Some(parent_link);
                link.original_var_decl = Some(var);
                let id = resolver.arenas.alloc_var(link);
                resolver.arenas.fun_mut(f).heap_locals_by_name.insert(name, id);
                resolver.arenas.fun_mut(f).closure_count += 1;
                id
            }
        };
        parent_link = link_id;
    }
    parent_link
}

/// Step 3 of §4.4.2: a parameter of `F` referenced by another parameter's
/// default-value expression while `F` is resolving its own parameter list.
/// The default expression conceptually runs inside the vararg wrapper, one
/// lexical level below `F`, so the parameter must already be in its heap
/// cell before the wrapper evaluates the later default.
pub fn mark_passed_as_heap_local(resolver: &mut Resolver, var: VarDeclId) {
    let flags = &mut resolver.arenas.var_mut(var).flags;
    flags.is_heap_local = true;
    flags.is_passed_as_heap_local = true;
}
